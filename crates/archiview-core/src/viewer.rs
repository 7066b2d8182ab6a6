//! Capability interface for the embedded 3D/AR viewer
//!
//! The session logic only ever talks to the renderer through [`ViewerSurface`]:
//! a declarative [`ViewerConfig`], a handful of imperative camera/AR/snapshot
//! methods, and asynchronous [`ViewerEvent`]s delivered through an
//! [`EventEmitter`](crate::events::EventEmitter).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::events::EventEmitter;
use crate::model::{ModelRecord, Vec3};
use crate::settings::ViewerSettings;

/// AR presentation mode, in the order the viewer should try them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArMode {
    #[serde(rename = "webxr")]
    WebXr,
    #[serde(rename = "scene-viewer")]
    SceneViewer,
    #[serde(rename = "quick-look")]
    QuickLook,
}

impl ArMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebXr => "webxr",
            Self::SceneViewer => "scene-viewer",
            Self::QuickLook => "quick-look",
        }
    }
}

/// Surface type the model is anchored to in AR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArPlacement {
    #[default]
    Floor,
    Wall,
}

/// Whether the user may rescale the model once placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArScale {
    #[default]
    Auto,
    Fixed,
}

/// When to show the "drag to rotate" hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionPrompt {
    #[default]
    Auto,
    None,
}

/// Lifecycle stage of an AR placement session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArPhase {
    #[default]
    NotPresenting,
    SessionStarted,
    ObjectPlaced,
    Presenting,
}

impl ArPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotPresenting => "not-presenting",
            Self::SessionStarted => "session-started",
            Self::ObjectPlaced => "object-placed",
            Self::Presenting => "presenting",
        }
    }

    /// True for every phase except `not-presenting`
    pub fn is_active(&self) -> bool {
        *self != Self::NotPresenting
    }
}

impl fmt::Display for ArPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not-presenting" => Ok(Self::NotPresenting),
            "session-started" => Ok(Self::SessionStarted),
            "object-placed" => Ok(Self::ObjectPlaced),
            "presenting" => Ok(Self::Presenting),
            other => Err(format!("unknown AR status: {}", other)),
        }
    }
}

/// Spherical camera orbit around the camera target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraOrbit {
    /// Azimuth in degrees
    pub theta_deg: f32,
    /// Polar angle from the up axis in degrees
    pub phi_deg: f32,
    /// Distance relative to the framing distance (100 = framed)
    pub radius_percent: f32,
}

impl CameraOrbit {
    /// Orbit restored by "reset view"
    pub const DEFAULT: CameraOrbit = CameraOrbit {
        theta_deg: 45.0,
        phi_deg: 55.0,
        radius_percent: 105.0,
    };
}

impl Default for CameraOrbit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for CameraOrbit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}deg {}deg {}%",
            self.theta_deg, self.phi_deg, self.radius_percent
        )
    }
}

/// Where the camera looks
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CameraTarget {
    /// Center of the model's bounds
    #[default]
    Auto,
    Point(Vec3),
}

/// Still-image export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
        }
    }
}

/// Declarative configuration of the embedded viewer
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub src: String,
    pub ios_src: Option<String>,
    pub alt: String,
    pub ar: bool,
    pub ar_modes: Vec<ArMode>,
    pub ar_placement: ArPlacement,
    pub ar_scale: ArScale,
    pub camera_controls: bool,
    pub disable_pan: bool,
    pub auto_rotate: bool,
    pub rotation_per_second_deg: f32,
    pub interaction_prompt: InteractionPrompt,
    pub shadow_intensity: f32,
    pub shadow_softness: f32,
    pub environment_image: String,
    pub exposure: f32,
    pub autoplay: bool,
    pub animation_name: Option<String>,
    /// Title shown by platform AR viewers
    pub title: String,
}

impl ViewerConfig {
    /// Build the unlocked configuration for a catalog record
    pub fn for_model(record: &ModelRecord, settings: &ViewerSettings) -> Self {
        Self {
            src: record.primary_asset_url.clone(),
            ios_src: record.alternate_asset_url.clone(),
            alt: format!("3D model of {}", record.name),
            ar: true,
            ar_modes: settings.ar_modes.clone(),
            ar_placement: settings.ar_placement,
            ar_scale: ArScale::Auto,
            camera_controls: true,
            disable_pan: false,
            auto_rotate: settings.auto_rotate,
            rotation_per_second_deg: settings.rotation_per_second_deg,
            interaction_prompt: settings.interaction_prompt,
            shadow_intensity: settings.shadow_intensity,
            shadow_softness: settings.shadow_softness,
            environment_image: settings.environment_image.clone(),
            exposure: settings.exposure,
            autoplay: settings.autoplay,
            animation_name: settings.animation_name.clone(),
            title: record.name.clone(),
        }
    }

    /// Placement lock pins the scale and disables two-finger pan
    pub fn with_placement_lock(mut self, locked: bool) -> Self {
        self.ar_scale = if locked { ArScale::Fixed } else { ArScale::Auto };
        self.disable_pan = locked;
        self
    }
}

/// Notification emitted by the viewer
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// Fractional load progress in 0..=1
    Progress(f32),
    /// Asset finished loading
    Load,
    /// Asset failed to load
    Error(Option<String>),
    /// AR session phase changed
    ArStatus(ArPhase),
    /// Result of a `request_snapshot` call
    Snapshot(Result<Vec<u8>, String>),
}

/// Narrow interface to the renderer/AR engine
pub trait ViewerSurface {
    /// Whether the viewer is attached and able to take commands
    fn is_mounted(&self) -> bool;

    /// Replace the current asset; all events for it go through `emitter`
    fn load(&mut self, config: &ViewerConfig, emitter: EventEmitter);

    /// Apply a configuration change to the loaded asset without reloading
    fn apply_config(&mut self, config: &ViewerConfig);

    /// Drop the current asset and release its listeners
    fn unload(&mut self);

    /// Whether any configured AR mode can be presented on this device
    fn can_activate_ar(&self) -> bool;

    fn activate_ar(&mut self);

    fn set_camera_orbit(&mut self, orbit: CameraOrbit);

    fn set_camera_target(&mut self, target: CameraTarget);

    /// Skip interpolation and snap the camera to its goal
    fn jump_camera_to_goal(&mut self);

    /// Start an asynchronous still export; the result arrives as `ViewerEvent::Snapshot`
    fn request_snapshot(&mut self, format: ImageFormat);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ar_phase_names() {
        for phase in [
            ArPhase::NotPresenting,
            ArPhase::SessionStarted,
            ArPhase::ObjectPlaced,
            ArPhase::Presenting,
        ] {
            assert_eq!(phase.as_str().parse::<ArPhase>().unwrap(), phase);
        }
        assert!("failed".parse::<ArPhase>().is_err());
        assert!(!ArPhase::NotPresenting.is_active());
        assert!(ArPhase::ObjectPlaced.is_active());
    }

    #[test]
    fn test_default_orbit_display() {
        assert_eq!(CameraOrbit::DEFAULT.to_string(), "45deg 55deg 105%");
    }

    #[test]
    fn test_placement_lock_config() {
        let record = ModelRecord {
            id: "m".to_string(),
            name: "Villa".to_string(),
            description: String::new(),
            primary_asset_url: "https://example.com/v.glb".to_string(),
            alternate_asset_url: Some("https://example.com/v.usdz".to_string()),
            preview_image_url: String::new(),
            floors: Vec::new(),
            hotspots: Vec::new(),
        };
        let base = ViewerConfig::for_model(&record, &ViewerSettings::default());
        assert_eq!(base.alt, "3D model of Villa");
        assert_eq!(base.ar_scale, ArScale::Auto);
        assert!(!base.disable_pan);

        let locked = base.clone().with_placement_lock(true);
        assert_eq!(locked.ar_scale, ArScale::Fixed);
        assert!(locked.disable_pan);
        assert_eq!(locked.clone().with_placement_lock(false), base);
    }
}
