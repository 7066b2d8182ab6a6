//! AR hand-off to the platform viewers
//!
//! Android devices are sent to Scene Viewer through an `intent://` link and
//! iOS devices open the USDZ alternate asset in AR Quick Look. Both run
//! outside the page; the page only learns that the user came back.

use tracing::debug;
use url::Url;
use urlencoding::encode;

use crate::viewer::{ArMode, ArPlacement, ArScale, ViewerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArPlatform {
    Android,
    Ios,
    Other,
}

impl ArPlatform {
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Android") {
            Self::Android
        } else if ["iPhone", "iPad", "iPod"]
            .iter()
            .any(|device| user_agent.contains(device))
        {
            Self::Ios
        } else {
            Self::Other
        }
    }
}

/// How to start AR for the current model on this device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArLaunch {
    SceneViewer { intent_url: String },
    QuickLook { usdz_url: String },
    Unsupported,
}

impl ArLaunch {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    pub fn mode(&self) -> Option<ArMode> {
        match self {
            Self::SceneViewer { .. } => Some(ArMode::SceneViewer),
            Self::QuickLook { .. } => Some(ArMode::QuickLook),
            Self::Unsupported => None,
        }
    }
}

/// Pick the first configured AR mode the platform can present
///
/// WebXR sessions are not started from the page, so `webxr` entries are
/// skipped and the next mode in the list is tried.
pub fn plan_launch(config: &ViewerConfig, platform: ArPlatform, page_url: &str) -> ArLaunch {
    if !config.ar {
        return ArLaunch::Unsupported;
    }

    for mode in &config.ar_modes {
        match (mode, platform) {
            (ArMode::SceneViewer, ArPlatform::Android) => {
                return ArLaunch::SceneViewer {
                    intent_url: scene_viewer_intent(config, page_url),
                };
            }
            (ArMode::QuickLook, ArPlatform::Ios) => {
                if let Some(usdz) = &config.ios_src {
                    return ArLaunch::QuickLook {
                        usdz_url: quick_look_url(usdz, config.ar_scale, page_url),
                    };
                }
            }
            _ => debug!(mode = mode.as_str(), ?platform, "AR mode not available"),
        }
    }

    ArLaunch::Unsupported
}

/// Resolve a possibly relative asset address against the page
fn absolute_url(asset: &str, page_url: &str) -> String {
    match Url::parse(page_url).and_then(|base| base.join(asset)) {
        Ok(url) => url.to_string(),
        Err(_) => asset.to_string(),
    }
}

pub fn scene_viewer_intent(config: &ViewerConfig, page_url: &str) -> String {
    let file = absolute_url(&config.src, page_url);

    let mut query = format!(
        "file={}&mode=ar_preferred&title={}",
        encode(&file),
        encode(&config.title)
    );
    if config.ar_scale == ArScale::Fixed {
        query.push_str("&resizable=false");
    }
    if config.ar_placement == ArPlacement::Wall {
        query.push_str("&enable_vertical_placement=true");
    }

    format!(
        "intent://arvr.google.com/scene-viewer/1.2?{}#Intent;scheme=https;\
         package=com.google.ar.core;action=android.intent.action.VIEW;\
         S.browser_fallback_url={};end;",
        query,
        encode(page_url)
    )
}

pub fn quick_look_url(usdz: &str, scale: ArScale, page_url: &str) -> String {
    let mut url = absolute_url(usdz, page_url);
    if scale == ArScale::Fixed {
        url.push_str("#allowsContentScaling=0");
    }
    url
}
