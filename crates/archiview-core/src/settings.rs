//! Viewer settings loading and validation
//!
//! Settings live in the `[viewer]` table of the catalog document. Every field
//! has a default, so a document without the table is valid.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::viewer::{ArMode, ArPlacement, InteractionPrompt};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to parse viewer settings: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid viewer setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Rendering, AR, and layout defaults for the viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default = "default_exposure")]
    pub exposure: f32,
    #[serde(default = "default_shadow_intensity")]
    pub shadow_intensity: f32,
    #[serde(default = "default_shadow_softness")]
    pub shadow_softness: f32,
    /// Lighting environment preset
    #[serde(default = "default_environment")]
    pub environment_image: String,
    #[serde(default = "default_true")]
    pub auto_rotate: bool,
    #[serde(default = "default_rotation_speed")]
    pub rotation_per_second_deg: f32,
    #[serde(default)]
    pub interaction_prompt: InteractionPrompt,
    /// AR modes in priority order
    #[serde(default = "default_ar_modes")]
    pub ar_modes: Vec<ArMode>,
    #[serde(default)]
    pub ar_placement: ArPlacement,
    /// Play an embedded animation once the model loads
    #[serde(default)]
    pub autoplay: bool,
    /// Animation to play; the first one when unset
    #[serde(default)]
    pub animation_name: Option<String>,
    /// Viewports narrower than this close the model panel after a selection
    #[serde(default = "default_narrow_viewport_width")]
    pub narrow_viewport_width: f32,
    /// Max log level for the browser console (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_exposure() -> f32 {
    1.2
}

fn default_shadow_intensity() -> f32 {
    1.2
}

fn default_shadow_softness() -> f32 {
    1.0
}

fn default_environment() -> String {
    "neutral".to_string()
}

fn default_true() -> bool {
    true
}

fn default_rotation_speed() -> f32 {
    30.0
}

fn default_ar_modes() -> Vec<ArMode> {
    vec![ArMode::WebXr, ArMode::SceneViewer, ArMode::QuickLook]
}

fn default_narrow_viewport_width() -> f32 {
    1024.0
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            exposure: default_exposure(),
            shadow_intensity: default_shadow_intensity(),
            shadow_softness: default_shadow_softness(),
            environment_image: default_environment(),
            auto_rotate: true,
            rotation_per_second_deg: default_rotation_speed(),
            interaction_prompt: InteractionPrompt::default(),
            ar_modes: default_ar_modes(),
            ar_placement: ArPlacement::default(),
            autoplay: false,
            animation_name: None,
            narrow_viewport_width: default_narrow_viewport_width(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize)]
struct SettingsDocument {
    #[serde(default)]
    viewer: Option<ViewerSettings>,
}

impl ViewerSettings {
    /// Read the `[viewer]` table from a TOML document
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let doc: SettingsDocument = toml::from_str(content)?;
        let settings = match doc.viewer {
            Some(settings) => settings,
            None => {
                debug!("No [viewer] table, using default settings");
                Self::default()
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let non_negative = [
            ("exposure", self.exposure),
            ("shadow_intensity", self.shadow_intensity),
            ("shadow_softness", self.shadow_softness),
            ("rotation_per_second_deg", self.rotation_per_second_deg),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SettingsError::Invalid {
                    field,
                    reason: format!("must be a non-negative number, got {}", value),
                });
            }
        }

        if !(self.narrow_viewport_width > 0.0) {
            return Err(SettingsError::Invalid {
                field: "narrow_viewport_width",
                reason: "must be positive".to_string(),
            });
        }

        if self.ar_modes.is_empty() {
            return Err(SettingsError::Invalid {
                field: "ar_modes",
                reason: "at least one AR mode is required".to_string(),
            });
        }

        Ok(())
    }

    /// Parsed log level, falling back to WARN
    pub fn tracing_level(&self) -> tracing::Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::WARN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_table() {
        let settings = ViewerSettings::from_toml("[[model]]\nid = \"x\"\n").unwrap();
        assert_eq!(settings, ViewerSettings::default());
        assert_eq!(settings.exposure, 1.2);
        assert_eq!(settings.rotation_per_second_deg, 30.0);
        assert_eq!(
            settings.ar_modes,
            vec![ArMode::WebXr, ArMode::SceneViewer, ArMode::QuickLook]
        );
    }

    #[test]
    fn test_partial_table() {
        let toml = r#"
[viewer]
exposure = 0.8
ar_modes = ["quick-look"]
ar_placement = "wall"
log_level = "debug"
"#;
        let settings = ViewerSettings::from_toml(toml).unwrap();
        assert_eq!(settings.exposure, 0.8);
        assert_eq!(settings.shadow_intensity, 1.2);
        assert_eq!(settings.ar_modes, vec![ArMode::QuickLook]);
        assert_eq!(settings.ar_placement, ArPlacement::Wall);
        assert_eq!(settings.tracing_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_invalid_values() {
        let err = ViewerSettings::from_toml("[viewer]\nexposure = -1.0\n").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "exposure", .. }));

        let err = ViewerSettings::from_toml("[viewer]\nar_modes = []\n").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "ar_modes", .. }));

        let err = ViewerSettings::from_toml("[viewer]\nar_modes = [\"hologram\"]\n").unwrap_err();
        assert!(matches!(err, SettingsError::ParseError(_)));
    }
}
