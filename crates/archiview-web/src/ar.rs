//! Hand-off to the platform AR viewer
//!
//! Activation only opens the AR session on the page (`session-started`), so
//! the placement lock can still be set. Navigation to Scene Viewer or Quick
//! Look waits for the user to confirm placement, and uses whatever
//! configuration the viewer holds at that moment.

use archiview_core::{ArPhase, EventEmitter, ViewerEvent};
use bevy::prelude::*;
use tracing::{debug, info, warn};

use crate::models::ModelRequest;
use crate::viewer::BevyViewer;
use crate::web::{self, HandoffStage, VisibilityGuard};

pub struct ArPlugin;

impl Plugin for ArPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ArRequest>()
            .insert_non_send_resource(ArHandoff::default())
            .add_systems(
                Update,
                launch_ar.after(crate::viewer::dispatch_viewer_commands),
            );
    }
}

/// Step of the AR flow requested through the viewer surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArCommand {
    /// Open the AR session on the page
    Start,
    /// Leave for the platform viewer with the current configuration
    Place,
    /// Abandon the session and return to the 3D view
    Exit,
}

/// AR commands waiting for the launch system, in order
#[derive(Resource, Default)]
pub struct ArRequest {
    pending: Vec<ArCommand>,
}

impl ArRequest {
    pub fn push(&mut self, command: ArCommand) {
        self.pending.push(command);
    }

    fn take(&mut self) -> Vec<ArCommand> {
        std::mem::take(&mut self.pending)
    }
}

/// AR session of the current model, from start to return
#[derive(Default)]
pub struct ArHandoff {
    /// Emitter of the session that was started and not yet ended
    session: Option<EventEmitter>,
    guard: Option<VisibilityGuard>,
}

impl ArHandoff {
    fn end(&mut self) -> Option<EventEmitter> {
        self.guard = None;
        self.session.take()
    }
}

fn launch_ar(
    mut request: ResMut<ArRequest>,
    mut handoff: NonSendMut<ArHandoff>,
    viewer: Res<BevyViewer>,
    model: Res<ModelRequest>,
) {
    // A new model session ends any hand-off of the previous one
    if handoff.session.as_ref().is_some_and(|e| !e.is_live()) {
        debug!("Releasing AR session of a closed model session");
        handoff.end();
    }
    // The visibility watcher reports the return on its own
    if handoff.guard.as_ref().is_some_and(|g| g.stage() == HandoffStage::Returned) {
        handoff.end();
    }

    for command in request.take() {
        match command {
            ArCommand::Start => start_session(&mut handoff, &viewer, &model),
            ArCommand::Place => place_in_room(&mut handoff, &viewer),
            ArCommand::Exit => {
                if let Some(emitter) = handoff.end() {
                    info!(token = %emitter.token(), "AR session exited");
                    emitter.emit(ViewerEvent::ArStatus(ArPhase::NotPresenting));
                }
            }
        }
    }
}

fn start_session(handoff: &mut ArHandoff, viewer: &BevyViewer, model: &ModelRequest) {
    let Some(emitter) = viewer.emitter() else {
        warn!("AR requested without a loaded model");
        return;
    };
    if !model.is_framed() {
        warn!("AR requested before the model finished loading");
        return;
    }
    if !viewer.ar_launch().is_supported() {
        warn!("AR requested on a device without AR support");
        return;
    }
    if handoff.session.is_some() {
        debug!("AR session already started");
        return;
    }

    info!(token = %emitter.token(), "AR session started");
    handoff.session = Some(emitter.clone());
    emitter.emit(ViewerEvent::ArStatus(ArPhase::SessionStarted));
}

fn place_in_room(handoff: &mut ArHandoff, viewer: &BevyViewer) {
    let Some(emitter) = handoff.session.clone() else {
        warn!("Placement confirmed without an AR session");
        return;
    };
    if handoff.guard.is_some() {
        debug!("AR hand-off already in progress");
        return;
    }

    let launch = viewer.ar_launch();
    info!(mode = ?launch.mode(), token = %emitter.token(), "Starting AR hand-off");
    handoff.guard = VisibilityGuard::install(emitter.clone());

    if let Err(e) = web::open_ar(&launch) {
        warn!(error = %e, "AR hand-off failed");
        handoff.end();
        emitter.emit(ViewerEvent::ArStatus(ArPhase::NotPresenting));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiview_core::ViewerEvents;

    #[test]
    fn test_commands_keep_order() {
        let mut request = ArRequest::default();
        request.push(ArCommand::Start);
        request.push(ArCommand::Exit);
        assert_eq!(request.take(), vec![ArCommand::Start, ArCommand::Exit]);
        assert!(request.take().is_empty());
    }

    #[test]
    fn test_exit_reports_not_presenting_once() {
        let events = ViewerEvents::new();
        let sub = events.subscribe("bldg-001");
        let mut handoff = ArHandoff {
            session: Some(sub.emitter()),
            guard: None,
        };

        let emitter = handoff.end().unwrap();
        emitter.emit(ViewerEvent::ArStatus(ArPhase::NotPresenting));
        assert!(handoff.end().is_none());
        assert_eq!(events.pending(), 1);
    }

    #[test]
    fn test_place_without_session_does_nothing() {
        let mut handoff = ArHandoff::default();
        let viewer = BevyViewer::new(archiview_core::ArPlatform::Android, String::new());
        place_in_room(&mut handoff, &viewer);
        assert!(handoff.session.is_none());
        assert!(handoff.guard.is_none());
    }
}
