//! Bevy application setup

use archiview_core::{
    requested_model_id, ArPlatform, Catalog, SessionChange, SessionController, ShellController,
    ViewerEvents, ViewerSettings,
};
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use bevy_picking::DefaultPickingPlugins;
use tracing::{error, info, trace, warn};

use crate::ar::ArPlugin;
use crate::models::ModelsPlugin;
use crate::scene::ScenePlugin;
use crate::snapshot::SnapshotPlugin;
use crate::ui::UiPlugin;
use crate::viewer::{BevyViewer, ViewerPlugin};
use crate::web;

/// Building catalog shown in the model list
#[derive(Resource, Deref, DerefMut)]
pub struct ModelCatalog(pub Catalog);

/// Selection, panel and share dialog state
#[derive(Resource, Deref, DerefMut)]
pub struct Shell(pub ShellController);

/// Session of the model in the viewer
#[derive(Resource, Deref, DerefMut)]
pub struct Session(pub SessionController);

/// Load the first record the shell selected
pub fn select_initial_model(
    catalog: Res<ModelCatalog>,
    shell: Res<Shell>,
    mut session: ResMut<Session>,
    mut viewer: ResMut<BevyViewer>,
) {
    match shell.selected(&catalog) {
        Some(record) => {
            session.select(record, &mut *viewer);
        }
        None => warn!(
            model_id = %shell.state().selected_model_id,
            "Selected model missing from catalog"
        ),
    }
}

/// Feed viewer events into the session and act on what changed
fn process_session(mut session: ResMut<Session>, mut viewer: ResMut<BevyViewer>) {
    session.process_events(&mut *viewer);

    for change in session.drain_changes() {
        match change {
            SessionChange::SnapshotReady(file) => {
                web::save_file(&file.filename, &file.bytes, file.mime_type);
            }
            SessionChange::LoadFailed(message) => {
                error!(error = %message, "Model failed to load");
            }
            other => trace!(change = ?other, "Session changed"),
        }
    }
}

/// Run the Bevy application
pub fn run(catalog: Catalog, settings: ViewerSettings) {
    let page_url = web::page_url();
    let requested = requested_model_id(&page_url);
    let shell = ShellController::new(
        &catalog,
        page_url.clone(),
        requested.as_deref(),
        settings.narrow_viewport_width,
    );
    let platform = ArPlatform::from_user_agent(&web::user_agent());
    info!(?platform, models = catalog.len(), "Starting ArchiView");

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.95, 0.96, 0.97)))
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "ArchiView AR".to_string(),
                        canvas: Some("#archiview-canvas".to_string()),
                        fit_canvas_to_parent: true,
                        prevent_default_event_handling: false,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    // Hosted assets carry no .meta files
                    meta_check: bevy::asset::AssetMetaCheck::Never,
                    ..default()
                }),
        )
        // Picking must be registered before EguiPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(EguiPlugin::default())
        .insert_resource(Session(SessionController::new(settings, ViewerEvents::new())))
        .insert_resource(Shell(shell))
        .insert_resource(ModelCatalog(catalog))
        .insert_resource(BevyViewer::new(platform, page_url))
        .add_plugins(ViewerPlugin)
        .add_plugins(ScenePlugin)
        .add_plugins(ModelsPlugin)
        .add_plugins(ArPlugin)
        .add_plugins(SnapshotPlugin)
        .add_plugins(UiPlugin)
        .add_systems(Startup, select_initial_model.after(crate::viewer::mount_viewer))
        .add_systems(
            Update,
            process_session.before(crate::viewer::dispatch_viewer_commands),
        )
        .run();
}
