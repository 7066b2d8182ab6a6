//! Bevy-backed implementation of the viewer surface
//!
//! Session commands land in a queue on [`BevyViewer`]; `dispatch_viewer_commands`
//! hands each one to the system that owns the matching part of the world
//! (model asset, camera rig, AR hand-off, screenshot).

use std::collections::VecDeque;

use archiview_core::{
    plan_launch, ArLaunch, ArPlatform, CameraOrbit, CameraTarget, EventEmitter, ImageFormat,
    ViewerConfig, ViewerSurface,
};
use bevy::prelude::*;
use tracing::debug;

use crate::ar::{ArCommand, ArRequest};
use crate::models::ModelRequest;
use crate::scene::{CameraSettings, LightingSettings};
use crate::snapshot::SnapshotRequest;

/// Imperative viewer call waiting for the next frame
#[derive(Debug, Clone)]
pub enum ViewerCommand {
    Load(ViewerConfig, EventEmitter),
    ApplyConfig(ViewerConfig),
    Unload,
    ActivateAr,
    PlaceAr,
    ExitAr,
    Orbit(CameraOrbit),
    Target(CameraTarget),
    JumpToGoal,
    Snapshot(ImageFormat),
}

#[derive(Resource)]
pub struct BevyViewer {
    mounted: bool,
    platform: ArPlatform,
    page_url: String,
    config: Option<ViewerConfig>,
    emitter: Option<EventEmitter>,
    pending: VecDeque<ViewerCommand>,
}

impl BevyViewer {
    pub fn new(platform: ArPlatform, page_url: String) -> Self {
        Self {
            mounted: false,
            platform,
            page_url,
            config: None,
            emitter: None,
            pending: VecDeque::new(),
        }
    }

    pub fn mount(&mut self) {
        self.mounted = true;
    }

    pub fn config(&self) -> Option<&ViewerConfig> {
        self.config.as_ref()
    }

    /// Emitter of the asset currently in the viewer
    pub fn emitter(&self) -> Option<&EventEmitter> {
        self.emitter.as_ref()
    }

    /// How AR would start for the current configuration
    pub fn ar_launch(&self) -> ArLaunch {
        match &self.config {
            Some(config) => plan_launch(config, self.platform, &self.page_url),
            None => ArLaunch::Unsupported,
        }
    }

    /// Confirm placement of a started AR session and leave for the platform viewer
    pub fn place_in_room(&mut self) {
        self.pending.push_back(ViewerCommand::PlaceAr);
    }

    /// End the AR session without placing the model
    pub fn exit_ar(&mut self) {
        self.pending.push_back(ViewerCommand::ExitAr);
    }

    pub(crate) fn take_commands(&mut self) -> Vec<ViewerCommand> {
        self.pending.drain(..).collect()
    }
}

impl ViewerSurface for BevyViewer {
    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn load(&mut self, config: &ViewerConfig, emitter: EventEmitter) {
        self.config = Some(config.clone());
        self.emitter = Some(emitter.clone());
        self.pending.push_back(ViewerCommand::Load(config.clone(), emitter));
    }

    fn apply_config(&mut self, config: &ViewerConfig) {
        self.config = Some(config.clone());
        self.pending.push_back(ViewerCommand::ApplyConfig(config.clone()));
    }

    fn unload(&mut self) {
        self.config = None;
        self.emitter = None;
        self.pending.push_back(ViewerCommand::Unload);
    }

    fn can_activate_ar(&self) -> bool {
        self.ar_launch().is_supported()
    }

    fn activate_ar(&mut self) {
        self.pending.push_back(ViewerCommand::ActivateAr);
    }

    fn set_camera_orbit(&mut self, orbit: CameraOrbit) {
        self.pending.push_back(ViewerCommand::Orbit(orbit));
    }

    fn set_camera_target(&mut self, target: CameraTarget) {
        self.pending.push_back(ViewerCommand::Target(target));
    }

    fn jump_camera_to_goal(&mut self) {
        self.pending.push_back(ViewerCommand::JumpToGoal);
    }

    fn request_snapshot(&mut self, format: ImageFormat) {
        self.pending.push_back(ViewerCommand::Snapshot(format));
    }
}

pub struct ViewerPlugin;

impl Plugin for ViewerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, mount_viewer)
            .add_systems(Update, dispatch_viewer_commands);
    }
}

pub fn mount_viewer(mut viewer: ResMut<BevyViewer>) {
    viewer.mount();
    debug!("Viewer mounted");
}

/// Route queued commands to the systems that carry them out
pub fn dispatch_viewer_commands(
    mut viewer: ResMut<BevyViewer>,
    mut model: ResMut<ModelRequest>,
    mut camera: ResMut<CameraSettings>,
    mut lighting: ResMut<LightingSettings>,
    mut ar: ResMut<ArRequest>,
    mut snapshot: ResMut<SnapshotRequest>,
) {
    for command in viewer.take_commands() {
        match command {
            ViewerCommand::Load(config, emitter) => {
                camera.apply_config(&config);
                lighting.apply_config(&config);
                model.load(config, emitter);
            }
            ViewerCommand::ApplyConfig(config) => {
                camera.apply_config(&config);
                lighting.apply_config(&config);
                model.apply_config(config);
            }
            ViewerCommand::Unload => model.unload(),
            ViewerCommand::ActivateAr => ar.push(ArCommand::Start),
            ViewerCommand::PlaceAr => ar.push(ArCommand::Place),
            ViewerCommand::ExitAr => ar.push(ArCommand::Exit),
            ViewerCommand::Orbit(orbit) => camera.set_orbit(orbit),
            ViewerCommand::Target(target) => camera.set_target(target),
            ViewerCommand::JumpToGoal => camera.jump_to_goal(),
            ViewerCommand::Snapshot(format) => snapshot.requested = Some(format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiview_core::{Catalog, ViewerEvents, ViewerSettings};

    fn config() -> ViewerConfig {
        let catalog = Catalog::builtin().unwrap();
        ViewerConfig::for_model(catalog.default_record(), &ViewerSettings::default())
    }

    #[test]
    fn test_commands_are_queued_in_order() {
        let events = ViewerEvents::new();
        let sub = events.subscribe("bldg-001");
        let mut viewer = BevyViewer::new(ArPlatform::Other, String::new());
        viewer.mount();

        viewer.load(&config(), sub.emitter());
        viewer.set_camera_orbit(CameraOrbit::DEFAULT);
        viewer.jump_camera_to_goal();

        let commands = viewer.take_commands();
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], ViewerCommand::Load(..)));
        assert!(matches!(commands[2], ViewerCommand::JumpToGoal));
        assert!(viewer.take_commands().is_empty());
    }

    #[test]
    fn test_ar_availability_follows_platform() {
        let events = ViewerEvents::new();
        let sub = events.subscribe("bldg-001");

        let page = "https://archiview.app/".to_string();
        let mut desktop = BevyViewer::new(ArPlatform::Other, page.clone());
        desktop.load(&config(), sub.emitter());
        assert!(!desktop.can_activate_ar());

        let mut android = BevyViewer::new(ArPlatform::Android, page);
        assert!(!android.can_activate_ar());
        android.load(&config(), sub.emitter());
        assert!(android.can_activate_ar());

        android.unload();
        assert!(!android.can_activate_ar());
        assert!(android.emitter().is_none());
    }
}
