//! UI overlays using bevy_egui

use archiview_core::hotspot::pulse_scale;
use archiview_core::{ArPhase, HotspotOverlay, LoadPhase, ViewerSurface};
use archiview_qr::{encode, ShareCode, ShareCodeError};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use tracing::{debug, trace, warn};

use crate::app::{ModelCatalog, Session, Shell};
use crate::scene::{to_model, to_world, MainCamera};
use crate::viewer::BevyViewer;
use crate::web;

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ViewportWidth>()
            .add_systems(
                Startup,
                encode_share_code.after(crate::app::select_initial_model),
            )
            .add_systems(Update, update_viewport_width)
            .add_systems(EguiPrimaryContextPass, ui_system);
    }
}

const ACCENT: egui::Color32 = egui::Color32::from_rgb(79, 70, 229);

/// Logical width of the primary window
#[derive(Resource, Debug, Clone, Copy)]
pub struct ViewportWidth(pub f32);

impl Default for ViewportWidth {
    fn default() -> Self {
        Self(f32::MAX)
    }
}

/// Share code for the page address, encoded once at startup
#[derive(Resource)]
pub struct ShareQr(pub Result<ShareCode, ShareCodeError>);

/// Something the user asked for this frame
#[derive(Debug, Clone, PartialEq)]
enum UiAction {
    SelectModel(String),
    TogglePanel,
    ClosePanel,
    OpenShare,
    CloseShare,
    ViewInRoom,
    PlaceInRoom,
    ExitAr,
    ToggleLock,
    ResetView,
    Snapshot,
    SetFloor(String),
    ToggleHotspot(String),
    DismissNotice,
    Reload,
}

fn encode_share_code(mut commands: Commands, shell: Res<Shell>) {
    let code = encode(shell.share_url());
    if let Err(e) = &code {
        warn!(error = %e, url = %shell.share_url(), "Share link cannot be encoded");
    }
    commands.insert_resource(ShareQr(code));
}

fn update_viewport_width(windows: Query<&Window>, mut width: ResMut<ViewportWidth>) {
    if let Ok(window) = windows.single() {
        if (width.0 - window.width()).abs() > 1.0 {
            width.0 = window.width();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn ui_system(
    mut contexts: EguiContexts,
    catalog: Res<ModelCatalog>,
    mut shell: ResMut<Shell>,
    mut session: ResMut<Session>,
    mut viewer: ResMut<BevyViewer>,
    share_qr: Option<Res<ShareQr>>,
    viewport: Res<ViewportWidth>,
    camera_query: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    time: Res<Time>,
) {
    let Ok(ctx) = contexts.ctx_mut() else { return };
    let mut actions = Vec::new();
    let is_narrow = viewport.0 < session.settings().narrow_viewport_width;

    // Top bar
    egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            let menu = if shell.state().is_panel_open { "☰ Close" } else { "☰ Projects" };
            if ui.button(menu).clicked() {
                actions.push(UiAction::TogglePanel);
            }
            ui.separator();
            ui.label(egui::RichText::new("ArchiView AR").strong().size(18.0).color(ACCENT));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("📱 Connect Mobile").clicked() {
                    actions.push(UiAction::OpenShare);
                }
            });
        });
    });

    // Model list
    if shell.state().is_panel_open {
        let selected_id = shell.state().selected_model_id.clone();
        egui::SidePanel::left("projects_panel")
            .default_width(if is_narrow { viewport.0 * 0.85 } else { 300.0 })
            .resizable(!is_narrow)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Projects");
                    if is_narrow {
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.button("✕").clicked() {
                                actions.push(UiAction::ClosePanel);
                            }
                        });
                    }
                });
                ui.label(
                    egui::RichText::new("Select a model to visualize")
                        .small()
                        .color(egui::Color32::GRAY),
                );
                ui.separator();

                egui::ScrollArea::vertical().show(ui, |ui| {
                    for record in catalog.get_all() {
                        let is_selected = record.id == selected_id;
                        let frame = egui::Frame::group(ui.style()).stroke(if is_selected {
                            egui::Stroke::new(2.0, ACCENT)
                        } else {
                            ui.style().visuals.widgets.noninteractive.bg_stroke
                        });
                        let response = frame
                            .show(ui, |ui| {
                                ui.set_width(ui.available_width());
                                ui.label(egui::RichText::new(&record.name).strong());
                                ui.label(egui::RichText::new(&record.description).small());
                                if record.has_floors() {
                                    ui.label(
                                        egui::RichText::new(format!(
                                            "{} floors",
                                            record.floors.len()
                                        ))
                                        .small()
                                        .color(egui::Color32::GRAY),
                                    );
                                }
                            })
                            .response
                            .interact(egui::Sense::click());
                        if response.clicked() {
                            actions.push(UiAction::SelectModel(record.id.clone()));
                        }
                        ui.add_space(4.0);
                    }
                });
            });
    }

    let state = session.state().clone();
    let record = session.record().cloned();

    // Hotspot markers
    if let (Some(record), Ok((camera, camera_transform))) = (&record, camera_query.single()) {
        if state.load_phase == LoadPhase::Loaded && !state.ar_phase.is_active() {
            let eye = to_model(camera_transform.translation());
            let expanded = state.expanded_hotspot_id.as_deref();
            let overlay = HotspotOverlay::build(record, expanded, Some(eye));
            let pulse = pulse_scale(time.elapsed_secs());

            for view in overlay.visible() {
                let hotspot = view.hotspot;
                let world = to_world(hotspot.position);
                let Ok(screen) = camera.world_to_viewport(camera_transform, world) else {
                    continue;
                };
                let [r, g, b] = hotspot.category.marker_rgb();
                let color = egui::Color32::from_rgb(r, g, b);
                let radius = 9.0;

                egui::Area::new(egui::Id::new(("hotspot", hotspot.id.as_str())))
                    .fixed_pos(egui::pos2(screen.x - radius, screen.y - radius))
                    .order(egui::Order::Middle)
                    .show(ctx, |ui| {
                        let (rect, response) = ui.allocate_exact_size(
                            egui::vec2(radius * 2.0, radius * 2.0),
                            egui::Sense::click(),
                        );
                        let painter = ui.painter();
                        if view.pulsing {
                            painter.circle_filled(
                                rect.center(),
                                radius * pulse,
                                color.gamma_multiply(0.35),
                            );
                        }
                        painter.circle_filled(rect.center(), radius, color);
                        painter.circle_stroke(
                            rect.center(),
                            radius,
                            egui::Stroke::new(2.0, egui::Color32::WHITE),
                        );
                        if response.on_hover_text(&hotspot.label).clicked() {
                            actions.push(UiAction::ToggleHotspot(hotspot.id.clone()));
                        }

                        if view.expanded {
                            egui::Frame::popup(ui.style()).show(ui, |ui| {
                                ui.set_max_width(220.0);
                                ui.label(
                                    egui::RichText::new(hotspot.category.label())
                                        .small()
                                        .color(color),
                                );
                                ui.label(egui::RichText::new(&hotspot.label).strong());
                                if let Some(description) = &hotspot.description {
                                    ui.label(description);
                                }
                                if let Some(dimensions) = &hotspot.dimensions {
                                    let text = format!("📐 {}", dimensions);
                                    ui.label(egui::RichText::new(text).small());
                                }
                            });
                        }
                    });
            }
        }
    }

    // Floor selector
    if let Some(record) = record.as_ref().filter(|r| r.has_floors()) {
        egui::Area::new(egui::Id::new("floor_selector"))
            .anchor(egui::Align2::RIGHT_CENTER, egui::vec2(-12.0, 0.0))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.label(egui::RichText::new("Floors").small().strong());
                    for floor in &record.floors {
                        let active = state.active_floor_id.as_deref() == Some(floor.id.as_str());
                        if ui.selectable_label(active, &floor.name).clicked() && !active {
                            actions.push(UiAction::SetFloor(floor.id.clone()));
                        }
                    }
                });
            });
    }

    // Bottom controls
    if record.is_some() {
        let can_ar = viewer.can_activate_ar() && state.load_phase == LoadPhase::Loaded;
        egui::Area::new(egui::Id::new("viewer_controls"))
            .anchor(egui::Align2::CENTER_BOTTOM, egui::vec2(0.0, -16.0))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.horizontal(|ui| {
                        let in_ar = state.ar_phase.is_active();
                        if can_ar && !in_ar && ui.button("🏠 View in Room").clicked() {
                            actions.push(UiAction::ViewInRoom);
                        }
                        if in_ar {
                            let label = if state.is_placement_locked {
                                "🔒 Unlock Placement"
                            } else {
                                "🔓 Lock Placement"
                            };
                            if ui.selectable_label(state.is_placement_locked, label).clicked() {
                                actions.push(UiAction::ToggleLock);
                            }
                            if state.ar_phase == ArPhase::SessionStarted
                                && ui.button("📍 Place in Room").clicked()
                            {
                                actions.push(UiAction::PlaceInRoom);
                            }
                            if ui.button("✕ Exit AR").clicked() {
                                actions.push(UiAction::ExitAr);
                            }
                        }
                        if ui.button("⟲ Reset View").clicked() {
                            actions.push(UiAction::ResetView);
                        }
                        let snapshot = ui.add_enabled(
                            !session.snapshot_pending() && state.load_phase == LoadPhase::Loaded,
                            egui::Button::new("📷 Snapshot"),
                        );
                        if snapshot.clicked() {
                            actions.push(UiAction::Snapshot);
                        }
                    });
                });
            });
    }

    // Loading overlay
    if state.is_loading() {
        egui::Area::new(egui::Id::new("loading_overlay"))
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.spinner();
                        ui.label(egui::RichText::new("LOADING ASSET").small().strong());
                        let percent = format!("{}%", state.loading_percent());
                        ui.label(egui::RichText::new(percent).size(20.0));
                    });
                });
            });
    }

    // Blocking load error
    if let Some(error) = &state.load_error {
        let screen = ctx.available_rect();
        egui::Area::new(egui::Id::new("error_scrim"))
            .fixed_pos(screen.min)
            .order(egui::Order::Foreground)
            .interactable(true)
            .show(ctx, |ui| {
                let (rect, _) = ui.allocate_exact_size(screen.size(), egui::Sense::click());
                ui.painter().rect_filled(rect, 0.0, egui::Color32::from_black_alpha(170));
            });
        egui::Window::new("Unable to load model")
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .collapsible(false)
            .resizable(false)
            .order(egui::Order::Tooltip)
            .show(ctx, |ui| {
                ui.label(error);
                ui.add_space(8.0);
                if ui.button("Reload").clicked() {
                    actions.push(UiAction::Reload);
                }
            });
    }

    // Share dialog
    if shell.state().is_share_dialog_open {
        let mut open = true;
        let name = record.as_ref().map(|r| r.name.as_str()).unwrap_or("the model");
        egui::Window::new("View in Augmented Reality")
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.set_max_width(320.0);
                match share_qr.as_deref().map(|q| &q.0) {
                    Some(Ok(code)) => paint_share_code(ui, code, 240.0),
                    Some(Err(e)) => {
                        let message = format!("Share link unavailable: {}", e);
                        ui.colored_label(egui::Color32::RED, message);
                    }
                    None => {
                        ui.spinner();
                    }
                }
                ui.add_space(8.0);
                ui.label(format!(
                    "Scan this QR code with your iOS or Android device \
                     to view {} in your physical space.",
                    name
                ));
                ui.label(
                    egui::RichText::new(
                        "Make sure you are in a well-lit room. \
                         Point your camera at the floor to place the model.",
                    )
                    .small()
                    .color(egui::Color32::GRAY),
                );
                ui.label(egui::RichText::new(shell.share_url()).small().monospace());
            });
        if !open {
            actions.push(UiAction::CloseShare);
        }
    }

    // Transient notice
    if let Some(notice) = &state.notice {
        egui::Area::new(egui::Id::new("notice_toast"))
            .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, 48.0))
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.colored_label(egui::Color32::from_rgb(220, 38, 38), notice);
                        if ui.small_button("✕").clicked() {
                            actions.push(UiAction::DismissNotice);
                        }
                    });
                });
            });
    }

    for action in actions {
        apply_action(
            action,
            &catalog,
            &mut shell,
            &mut session,
            &mut viewer,
            viewport.0,
        );
    }
}

fn paint_share_code(ui: &mut egui::Ui, code: &ShareCode, side: f32) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(side, side), egui::Sense::hover());
    let painter = ui.painter();
    painter.rect_filled(rect, 0.0, egui::Color32::WHITE);
    let module = side / code.size() as f32;
    for (x, y) in code.dark_modules() {
        let min = rect.min + egui::vec2(x as f32 * module, y as f32 * module);
        painter.rect_filled(
            egui::Rect::from_min_size(min, egui::vec2(module, module)),
            0.0,
            egui::Color32::BLACK,
        );
    }
}

fn apply_action(
    action: UiAction,
    catalog: &ModelCatalog,
    shell: &mut Shell,
    session: &mut Session,
    viewer: &mut BevyViewer,
    viewport_width: f32,
) {
    debug!(?action, "UI action");
    let result = match action {
        UiAction::SelectModel(id) => {
            if let Some(record) = shell.select_model(catalog, &id, viewport_width) {
                session.select(record, viewer);
            }
            Ok(())
        }
        UiAction::TogglePanel => {
            shell.toggle_panel();
            Ok(())
        }
        UiAction::ClosePanel => {
            shell.close_panel();
            Ok(())
        }
        UiAction::OpenShare => {
            shell.open_share_dialog();
            Ok(())
        }
        UiAction::CloseShare => {
            shell.close_share_dialog();
            Ok(())
        }
        UiAction::ViewInRoom => session.activate_ar(viewer),
        UiAction::PlaceInRoom => {
            // Navigates with the lock as it stands now
            if session.state().ar_phase == ArPhase::SessionStarted {
                viewer.place_in_room();
            }
            Ok(())
        }
        UiAction::ExitAr => {
            if session.state().ar_phase.is_active() {
                viewer.exit_ar();
            }
            Ok(())
        }
        UiAction::ToggleLock => session.toggle_lock(viewer).map(|_| ()),
        UiAction::ResetView => session.reset_camera(viewer),
        UiAction::Snapshot => session.capture_snapshot(viewer),
        UiAction::SetFloor(id) => session.set_active_floor(&id, viewer),
        UiAction::ToggleHotspot(id) => session.toggle_hotspot(&id).map(|_| ()),
        UiAction::DismissNotice => {
            session.dismiss_notice();
            Ok(())
        }
        UiAction::Reload => {
            web::reload_page();
            Ok(())
        }
    };

    // Rejections are already logged by the session
    if let Err(e) = result {
        trace!(error = %e, "UI command had no effect");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::ViewerCommand;
    use archiview_core::{
        ArLaunch, ArPlatform, Catalog, SessionController, ShellController, ViewerEvent,
        ViewerEvents, ViewerSettings,
    };

    const PAGE: &str = "https://archiview.app/";
    const WIDE: f32 = 1920.0;

    struct Harness {
        catalog: ModelCatalog,
        shell: Shell,
        session: Session,
        viewer: BevyViewer,
    }

    impl Harness {
        fn on(platform: ArPlatform) -> Self {
            let catalog = Catalog::builtin().unwrap();
            let settings = ViewerSettings::default();
            let shell = ShellController::new(&catalog, PAGE, None, settings.narrow_viewport_width);
            let mut session = SessionController::new(settings, ViewerEvents::new());
            let mut viewer = BevyViewer::new(platform, PAGE.to_string());
            viewer.mount();
            session.select(catalog.default_record(), &mut viewer);
            Self {
                catalog: ModelCatalog(catalog),
                shell: Shell(shell),
                session: Session(session),
                viewer,
            }
        }

        fn act(&mut self, action: UiAction, width: f32) {
            apply_action(
                action,
                &self.catalog,
                &mut self.shell,
                &mut self.session,
                &mut self.viewer,
                width,
            );
        }

        /// Deliver an event from the viewer systems as the next frame would
        fn report(&mut self, event: ViewerEvent) {
            self.viewer.emitter().unwrap().emit(event);
            self.session.process_events(&mut self.viewer);
        }

        fn start_ar(&mut self) {
            self.report(ViewerEvent::Load);
            self.act(UiAction::ViewInRoom, WIDE);
            self.report(ViewerEvent::ArStatus(ArPhase::SessionStarted));
        }

        fn intent_url(&self) -> String {
            match self.viewer.ar_launch() {
                ArLaunch::SceneViewer { intent_url } => intent_url,
                other => panic!("expected a Scene Viewer launch, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_select_action_switches_session() {
        let mut h = Harness::on(ArPlatform::Other);
        h.act(UiAction::SelectModel("bldg-002".to_string()), WIDE);
        assert_eq!(h.session.state().model_id.as_deref(), Some("bldg-002"));
        assert_eq!(h.shell.state().selected_model_id, "bldg-002");
        assert!(h.shell.state().is_panel_open);
    }

    #[test]
    fn test_narrow_select_closes_panel() {
        let mut h = Harness::on(ArPlatform::Other);
        h.act(UiAction::SelectModel("bldg-001".to_string()), 400.0);
        assert!(!h.shell.state().is_panel_open);
        assert_eq!(h.session.state().model_id.as_deref(), Some("bldg-001"));
    }

    #[test]
    fn test_lock_action_outside_ar_is_noop() {
        let mut h = Harness::on(ArPlatform::Other);
        h.act(UiAction::ToggleLock, WIDE);
        assert!(!h.session.state().is_placement_locked);
        assert_eq!(h.session.state().ar_phase, ArPhase::NotPresenting);
    }

    #[test]
    fn test_floor_and_hotspot_actions() {
        let mut h = Harness::on(ArPlatform::Other);
        h.act(UiAction::SetFloor("roof".to_string()), WIDE);
        assert_eq!(h.session.state().active_floor_id.as_deref(), Some("roof"));

        h.act(UiAction::ToggleHotspot("lobby".to_string()), WIDE);
        assert_eq!(h.session.state().expanded_hotspot_id.as_deref(), Some("lobby"));
    }

    #[test]
    fn test_lock_before_placement_reaches_launch() {
        let mut h = Harness::on(ArPlatform::Android);
        h.start_ar();
        assert_eq!(h.session.state().ar_phase, ArPhase::SessionStarted);

        h.act(UiAction::ToggleLock, WIDE);
        assert!(h.session.state().is_placement_locked);
        h.viewer.take_commands();

        h.act(UiAction::PlaceInRoom, WIDE);
        let commands = h.viewer.take_commands();
        assert!(matches!(commands.as_slice(), [ViewerCommand::PlaceAr]));
        assert!(h.intent_url().contains("&resizable=false"));
    }

    #[test]
    fn test_exit_ar_returns_to_view() {
        let mut h = Harness::on(ArPlatform::Android);
        h.start_ar();
        h.act(UiAction::ToggleLock, WIDE);
        h.viewer.take_commands();

        h.act(UiAction::ExitAr, WIDE);
        let commands = h.viewer.take_commands();
        assert!(matches!(commands.as_slice(), [ViewerCommand::ExitAr]));

        // The launch system answers an exit with not-presenting
        h.report(ViewerEvent::ArStatus(ArPhase::NotPresenting));
        assert_eq!(h.session.state().ar_phase, ArPhase::NotPresenting);
        assert!(!h.session.state().is_placement_locked);
        assert!(!h.intent_url().contains("resizable"));
    }

    #[test]
    fn test_place_outside_ar_session_is_ignored() {
        let mut h = Harness::on(ArPlatform::Android);
        h.viewer.take_commands();
        h.act(UiAction::PlaceInRoom, WIDE);
        h.act(UiAction::ExitAr, WIDE);
        assert!(h.viewer.take_commands().is_empty());
    }
}
