//! ArchiView Core - Catalog, viewer session state, and AR hand-off
//!
//! This crate holds everything the ArchiView frontend needs that does not
//! touch a renderer:
//! - Building catalog (models, floors, hotspots) loaded from TOML
//! - Viewer capability interface and its event channel
//! - Session controller driving load progress, AR phases, and commands
//! - Shell state, hotspot overlay model, snapshot naming, AR launch links

pub mod ar;
pub mod catalog;
pub mod events;
pub mod hotspot;
pub mod model;
pub mod session;
pub mod settings;
pub mod shell;
pub mod snapshot;
pub mod viewer;

pub use ar::{plan_launch, ArLaunch, ArPlatform};
pub use catalog::{Catalog, CatalogError, BUILTIN_CATALOG};
pub use events::{EventEmitter, SessionToken, Subscription, ViewerEvents};
pub use hotspot::{HotspotOverlay, HotspotView};
pub use model::{Floor, Hotspot, HotspotCategory, ModelRecord, Vec3};
pub use session::{CommandError, LoadPhase, SessionChange, SessionController, SessionState};
pub use settings::{SettingsError, ViewerSettings};
pub use shell::{requested_model_id, ShellController, ShellState};
pub use snapshot::SnapshotFile;
pub use viewer::{
    ArMode, ArPhase, ArPlacement, ArScale, CameraOrbit, CameraTarget, ImageFormat, ViewerConfig,
    ViewerEvent, ViewerSurface,
};
