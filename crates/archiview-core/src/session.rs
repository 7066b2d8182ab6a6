//! Viewer session controller
//!
//! Owns the state of the one model currently shown in the viewer: load
//! progress, AR phase, placement lock, active floor, expanded hotspot and the
//! dismissable notice. User commands flow down into a [`ViewerSurface`];
//! viewer events flow back through [`ViewerEvents`] and are applied once per
//! frame by [`SessionController::process_events`]. Every state change is also
//! appended to an outbox of [`SessionChange`]s for the presentation layer.

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::events::{Delivery, SessionToken, Subscription, ViewerEvents};
use crate::model::ModelRecord;
use crate::settings::ViewerSettings;
use crate::snapshot::SnapshotFile;
use crate::viewer::{
    ArPhase, CameraOrbit, CameraTarget, ImageFormat, ViewerConfig, ViewerEvent, ViewerSurface,
};

/// Shown when the viewer reports a load error without a message
pub const DEFAULT_LOAD_ERROR: &str = "Failed to load 3D model";

/// A command the current state does not allow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Viewer is not mounted")]
    ViewerNotMounted,
    #[error("No model is selected")]
    NoActiveSession,
    #[error("Model {model} has no floor {floor}")]
    UnknownFloor { model: String, floor: String },
    #[error("Model {0} has no floors")]
    NoFloors(String),
    #[error("Model {model} has no hotspot {hotspot}")]
    UnknownHotspot { model: String, hotspot: String },
    #[error("Placement lock requires an active AR session")]
    NotPresenting,
    #[error("AR is not available on this device")]
    ArUnavailable,
    #[error("A snapshot is already being captured")]
    SnapshotInFlight,
}

/// Asset loading stage for the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub model_id: Option<String>,
    pub load_phase: LoadPhase,
    /// Highest progress reported for this session, in 0..=1
    pub loading_fraction: f32,
    pub load_error: Option<String>,
    pub ar_phase: ArPhase,
    pub is_placement_locked: bool,
    pub active_floor_id: Option<String>,
    pub expanded_hotspot_id: Option<String>,
    /// Non-fatal message the user can dismiss
    pub notice: Option<String>,
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        self.load_phase == LoadPhase::Loading
    }

    /// Load progress as a whole percentage for display
    pub fn loading_percent(&self) -> u32 {
        (self.loading_fraction * 100.0).round() as u32
    }
}

/// Notification of one state change, in the order they happened
#[derive(Debug, Clone, PartialEq)]
pub enum SessionChange {
    ModelChanged(String),
    Progress(f32),
    Loaded,
    LoadFailed(String),
    ArPhase(ArPhase),
    PlacementLock(bool),
    ActiveFloor(Option<String>),
    ExpandedHotspot(Option<String>),
    Notice(Option<String>),
    SnapshotReady(SnapshotFile),
    Unmounted,
}

pub struct SessionController {
    settings: ViewerSettings,
    events: ViewerEvents,
    record: Option<ModelRecord>,
    config: Option<ViewerConfig>,
    subscription: Option<Subscription>,
    state: SessionState,
    snapshot_pending: bool,
    outbox: Vec<SessionChange>,
}

impl SessionController {
    pub fn new(settings: ViewerSettings, events: ViewerEvents) -> Self {
        Self {
            settings,
            events,
            record: None,
            config: None,
            subscription: None,
            state: SessionState::default(),
            snapshot_pending: false,
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn record(&self) -> Option<&ModelRecord> {
        self.record.as_ref()
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.subscription.as_ref().map(|s| s.token())
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    pub fn snapshot_pending(&self) -> bool {
        self.snapshot_pending
    }

    /// Configuration the viewer should currently be running with
    pub fn viewer_config(&self) -> Option<ViewerConfig> {
        self.config
            .clone()
            .map(|c| c.with_placement_lock(self.state.is_placement_locked))
    }

    /// Take all pending change notifications
    pub fn drain_changes(&mut self) -> Vec<SessionChange> {
        std::mem::take(&mut self.outbox)
    }

    /// Switch the session to `record`
    ///
    /// Returns false when `record` is already the active model. Otherwise the
    /// previous subscription is released and the state reset before the
    /// viewer is asked to load the new asset.
    pub fn select<V: ViewerSurface + ?Sized>(
        &mut self,
        record: &ModelRecord,
        viewer: &mut V,
    ) -> bool {
        if self.state.model_id.as_deref() == Some(record.id.as_str()) {
            return false;
        }

        drop(self.subscription.take());
        let subscription = self.events.subscribe(&record.id);
        let emitter = subscription.emitter();
        self.subscription = Some(subscription);

        self.state = SessionState {
            model_id: Some(record.id.clone()),
            load_phase: LoadPhase::Loading,
            active_floor_id: record.default_floor().map(|f| f.id.clone()),
            ..SessionState::default()
        };
        self.snapshot_pending = false;
        self.record = Some(record.clone());
        let config = ViewerConfig::for_model(record, &self.settings);
        self.config = Some(config.clone());

        info!(model_id = %record.id, token = %emitter.token(), "Model session started");
        self.outbox.push(SessionChange::ModelChanged(record.id.clone()));

        if !viewer.is_mounted() {
            warn!(model_id = %record.id, "Viewer not mounted, asset will not load");
            return true;
        }

        viewer.load(&config, emitter);
        let target = match record.default_floor() {
            Some(floor) => CameraTarget::Point(floor.camera_target),
            None => CameraTarget::Auto,
        };
        viewer.set_camera_target(target);
        true
    }

    /// Release the viewer and forget the current model
    pub fn unmount<V: ViewerSurface + ?Sized>(&mut self, viewer: &mut V) {
        drop(self.subscription.take());
        if viewer.is_mounted() {
            viewer.unload();
        }
        self.record = None;
        self.config = None;
        self.state = SessionState::default();
        self.snapshot_pending = false;
        debug!("Model session closed");
        self.outbox.push(SessionChange::Unmounted);
    }

    /// Apply every queued viewer event belonging to the current session
    pub fn process_events<V: ViewerSurface + ?Sized>(&mut self, viewer: &mut V) {
        for delivery in self.events.drain() {
            self.deliver(delivery, viewer);
        }
    }

    fn deliver<V: ViewerSurface + ?Sized>(&mut self, delivery: Delivery, viewer: &mut V) {
        if self.token() != Some(&delivery.token) {
            trace!(
                token = %delivery.token,
                event = ?delivery.event,
                "Discarding stale viewer event"
            );
            return;
        }

        match delivery.event {
            ViewerEvent::Progress(fraction) => self.on_progress(fraction),
            ViewerEvent::Load => self.on_load(),
            ViewerEvent::Error(message) => self.on_error(message),
            ViewerEvent::ArStatus(phase) => self.on_ar_status(phase, viewer),
            ViewerEvent::Snapshot(result) => {
                self.complete_snapshot(result);
            }
        }
    }

    fn on_progress(&mut self, fraction: f32) {
        if self.state.load_phase != LoadPhase::Loading {
            trace!(fraction, phase = ?self.state.load_phase, "Ignoring progress outside loading");
            return;
        }
        if fraction.is_nan() {
            return;
        }

        let fraction = fraction.clamp(0.0, 1.0);
        if fraction > self.state.loading_fraction {
            self.state.loading_fraction = fraction;
            self.outbox.push(SessionChange::Progress(fraction));
        }
        if fraction >= 1.0 {
            self.on_load();
        }
    }

    fn on_load(&mut self) {
        if self.state.load_phase != LoadPhase::Loading {
            return;
        }
        if self.state.loading_fraction < 1.0 {
            self.state.loading_fraction = 1.0;
            self.outbox.push(SessionChange::Progress(1.0));
        }
        self.state.load_phase = LoadPhase::Loaded;
        debug!(model_id = ?self.state.model_id, "Model loaded");
        self.outbox.push(SessionChange::Loaded);
    }

    fn on_error(&mut self, message: Option<String>) {
        if matches!(self.state.load_phase, LoadPhase::Idle | LoadPhase::Errored) {
            return;
        }
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOAD_ERROR.to_string());
        warn!(model_id = ?self.state.model_id, error = %message, "Model failed to load");
        self.state.load_phase = LoadPhase::Errored;
        self.state.load_error = Some(message.clone());
        self.outbox.push(SessionChange::LoadFailed(message));
    }

    fn on_ar_status<V: ViewerSurface + ?Sized>(&mut self, phase: ArPhase, viewer: &mut V) {
        if phase == self.state.ar_phase {
            return;
        }
        debug!(from = %self.state.ar_phase, to = %phase, "AR status changed");
        self.state.ar_phase = phase;
        self.outbox.push(SessionChange::ArPhase(phase));

        if phase != ArPhase::NotPresenting {
            return;
        }

        // Lock never outlives an AR session
        if self.state.is_placement_locked {
            self.state.is_placement_locked = false;
            self.outbox.push(SessionChange::PlacementLock(false));
        }
        if let (Some(config), true) = (self.viewer_config(), viewer.is_mounted()) {
            viewer.apply_config(&config);
        }
    }

    /// Finish the in-flight capture
    ///
    /// Returns the file on success. A failure sets the notice and leaves
    /// everything else as it was. Results nobody asked for are dropped.
    pub fn complete_snapshot(&mut self, result: Result<Vec<u8>, String>) -> Option<SnapshotFile> {
        if !self.snapshot_pending {
            trace!("Ignoring unrequested snapshot result");
            return None;
        }
        self.snapshot_pending = false;
        let model_id = self.state.model_id.clone()?;

        match result {
            Ok(bytes) => {
                let file = SnapshotFile::new(&model_id, ImageFormat::Png, bytes);
                info!(filename = %file.filename, size = file.bytes.len(), "Snapshot captured");
                self.outbox.push(SessionChange::SnapshotReady(file.clone()));
                Some(file)
            }
            Err(error) => {
                warn!(model_id = %model_id, error = %error, "Snapshot failed");
                self.set_notice(format!("Snapshot failed: {}", error));
                None
            }
        }
    }

    fn set_notice(&mut self, notice: String) {
        self.state.notice = Some(notice.clone());
        self.outbox.push(SessionChange::Notice(Some(notice)));
    }

    pub fn dismiss_notice(&mut self) {
        if self.state.notice.take().is_some() {
            self.outbox.push(SessionChange::Notice(None));
        }
    }

    fn reject<T>(&self, command: &str, err: CommandError) -> Result<T, CommandError> {
        warn!(command, model_id = ?self.state.model_id, error = %err, "Rejected viewer command");
        Err(err)
    }

    /// Common precondition: mounted viewer and a selected model
    fn check_ready<V: ViewerSurface + ?Sized>(
        &self,
        command: &str,
        viewer: &V,
    ) -> Result<(), CommandError> {
        if !viewer.is_mounted() {
            return self.reject(command, CommandError::ViewerNotMounted);
        }
        if self.record.is_none() {
            return self.reject(command, CommandError::NoActiveSession);
        }
        Ok(())
    }

    /// Restore the default orbit and, if the model has floors, the first floor
    pub fn reset_camera<V: ViewerSurface + ?Sized>(
        &mut self,
        viewer: &mut V,
    ) -> Result<(), CommandError> {
        self.check_ready("reset_camera", viewer)?;
        let first_floor = self
            .record
            .as_ref()
            .and_then(|r| r.default_floor())
            .map(|f| (f.id.clone(), f.camera_target));

        viewer.set_camera_orbit(CameraOrbit::DEFAULT);
        match first_floor {
            Some((floor_id, target)) => {
                viewer.set_camera_target(CameraTarget::Point(target));
                self.set_floor(floor_id);
            }
            None => viewer.set_camera_target(CameraTarget::Auto),
        }
        viewer.jump_camera_to_goal();
        Ok(())
    }

    fn set_floor(&mut self, floor_id: String) {
        if self.state.active_floor_id.as_deref() != Some(floor_id.as_str()) {
            self.state.active_floor_id = Some(floor_id.clone());
            self.outbox.push(SessionChange::ActiveFloor(Some(floor_id)));
        }
    }

    pub fn set_active_floor<V: ViewerSurface + ?Sized>(
        &mut self,
        floor_id: &str,
        viewer: &mut V,
    ) -> Result<(), CommandError> {
        self.check_ready("set_active_floor", viewer)?;
        let Some(record) = self.record.as_ref() else {
            return self.reject("set_active_floor", CommandError::NoActiveSession);
        };
        if !record.has_floors() {
            let err = CommandError::NoFloors(record.id.clone());
            return self.reject("set_active_floor", err);
        }
        let Some(floor) = record.floor(floor_id) else {
            let err = CommandError::UnknownFloor {
                model: record.id.clone(),
                floor: floor_id.to_string(),
            };
            return self.reject("set_active_floor", err);
        };

        let target = floor.camera_target;
        viewer.set_camera_target(CameraTarget::Point(target));
        self.set_floor(floor_id.to_string());
        Ok(())
    }

    /// Ask the viewer to start AR; phase changes arrive as events
    pub fn activate_ar<V: ViewerSurface + ?Sized>(
        &mut self,
        viewer: &mut V,
    ) -> Result<(), CommandError> {
        self.check_ready("activate_ar", viewer)?;
        if !viewer.can_activate_ar() {
            return self.reject("activate_ar", CommandError::ArUnavailable);
        }
        viewer.activate_ar();
        Ok(())
    }

    /// Flip the placement lock; returns the new value
    pub fn toggle_lock<V: ViewerSurface + ?Sized>(
        &mut self,
        viewer: &mut V,
    ) -> Result<bool, CommandError> {
        self.check_ready("toggle_lock", viewer)?;
        if !self.state.ar_phase.is_active() {
            return self.reject("toggle_lock", CommandError::NotPresenting);
        }

        self.state.is_placement_locked = !self.state.is_placement_locked;
        let locked = self.state.is_placement_locked;
        if let Some(config) = self.viewer_config() {
            viewer.apply_config(&config);
        }
        debug!(locked, "Placement lock toggled");
        self.outbox.push(SessionChange::PlacementLock(locked));
        Ok(locked)
    }

    /// Request a PNG still; the result is applied by `process_events`
    pub fn capture_snapshot<V: ViewerSurface + ?Sized>(
        &mut self,
        viewer: &mut V,
    ) -> Result<(), CommandError> {
        self.check_ready("capture_snapshot", viewer)?;
        if self.snapshot_pending {
            return self.reject("capture_snapshot", CommandError::SnapshotInFlight);
        }
        self.snapshot_pending = true;
        viewer.request_snapshot(ImageFormat::Png);
        Ok(())
    }

    /// Expand `hotspot_id`, or collapse it if it is already expanded
    ///
    /// Returns the id that is expanded afterwards.
    pub fn toggle_hotspot(&mut self, hotspot_id: &str) -> Result<Option<&str>, CommandError> {
        let Some(record) = self.record.as_ref() else {
            return self.reject("toggle_hotspot", CommandError::NoActiveSession);
        };
        if record.hotspot(hotspot_id).is_none() {
            let err = CommandError::UnknownHotspot {
                model: record.id.clone(),
                hotspot: hotspot_id.to_string(),
            };
            return self.reject("toggle_hotspot", err);
        }

        self.state.expanded_hotspot_id = match self.state.expanded_hotspot_id.as_deref() {
            Some(current) if current == hotspot_id => None,
            _ => Some(hotspot_id.to_string()),
        };
        self.outbox.push(SessionChange::ExpandedHotspot(
            self.state.expanded_hotspot_id.clone(),
        ));
        Ok(self.state.expanded_hotspot_id.as_deref())
    }
}
