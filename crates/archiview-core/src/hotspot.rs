//! Hotspot overlay model
//!
//! Turns a record's hotspots plus the session's expanded id into the list of
//! markers the UI draws. Projection to screen space is left to the renderer.

use crate::model::{Hotspot, ModelRecord, Vec3};

/// Period of the marker pulse animation in seconds
pub const PULSE_PERIOD_SECS: f32 = 1.6;

/// One marker as it should currently be drawn
#[derive(Debug, Clone, PartialEq)]
pub struct HotspotView<'a> {
    pub hotspot: &'a Hotspot,
    /// Card with label, category and details is open
    pub expanded: bool,
    /// Marker runs the attention pulse
    pub pulsing: bool,
    /// Anchor faces the camera
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HotspotOverlay<'a> {
    pub views: Vec<HotspotView<'a>>,
}

impl<'a> HotspotOverlay<'a> {
    /// Build the overlay for `record`
    ///
    /// Pulsing stops on every marker of the model while any hotspot is
    /// expanded. Without a camera position every marker is visible.
    pub fn build(record: &'a ModelRecord, expanded: Option<&str>, camera: Option<Vec3>) -> Self {
        let any_expanded = expanded.is_some_and(|id| record.hotspot(id).is_some());

        let views = record
            .hotspots
            .iter()
            .map(|hotspot| {
                let is_expanded = expanded == Some(hotspot.id.as_str());
                HotspotView {
                    hotspot,
                    expanded: is_expanded,
                    pulsing: !any_expanded,
                    visible: camera.map_or(true, |c| faces_camera(hotspot, c)),
                }
            })
            .collect();

        Self { views }
    }

    pub fn expanded(&self) -> Option<&HotspotView<'a>> {
        self.views.iter().find(|v| v.expanded)
    }

    pub fn visible(&self) -> impl Iterator<Item = &HotspotView<'a>> {
        self.views.iter().filter(|v| v.visible)
    }
}

/// Whether the anchor's normal points toward `camera`
///
/// A zero normal counts as facing every direction.
pub fn faces_camera(hotspot: &Hotspot, camera: Vec3) -> bool {
    hotspot.normal.dot(camera.sub(hotspot.position)) >= 0.0
}

/// Marker scale factor for the pulse at `elapsed_secs`, between 1.0 and 1.35
pub fn pulse_scale(elapsed_secs: f32) -> f32 {
    let phase = (elapsed_secs / PULSE_PERIOD_SECS).fract();
    let wave = (phase * std::f32::consts::TAU).sin() * 0.5 + 0.5;
    1.0 + 0.35 * wave
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HotspotCategory;

    fn hotspot(id: &str, position: Vec3, normal: Vec3) -> Hotspot {
        Hotspot {
            id: id.to_string(),
            position,
            normal,
            label: id.to_uppercase(),
            category: HotspotCategory::Room,
            description: None,
            dimensions: None,
        }
    }

    fn record() -> ModelRecord {
        ModelRecord {
            id: "m".to_string(),
            name: "M".to_string(),
            description: String::new(),
            primary_asset_url: "https://example.com/m.glb".to_string(),
            alternate_asset_url: None,
            preview_image_url: String::new(),
            floors: Vec::new(),
            hotspots: vec![
                hotspot("front", Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 1.0)),
                hotspot("back", Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, -1.0)),
            ],
        }
    }

    #[test]
    fn test_all_pulse_when_collapsed() {
        let record = record();
        let overlay = HotspotOverlay::build(&record, None, None);
        assert_eq!(overlay.views.len(), 2);
        assert!(overlay.views.iter().all(|v| v.pulsing && v.visible && !v.expanded));
        assert!(overlay.expanded().is_none());
    }

    #[test]
    fn test_expanding_one_stops_all_pulses() {
        let record = record();
        let overlay = HotspotOverlay::build(&record, Some("back"), None);
        assert_eq!(overlay.expanded().unwrap().hotspot.id, "back");
        assert!(overlay.views.iter().all(|v| !v.pulsing));
        assert_eq!(overlay.views.iter().filter(|v| v.expanded).count(), 1);
    }

    #[test]
    fn test_unknown_expanded_id_is_ignored() {
        let record = record();
        let overlay = HotspotOverlay::build(&record, Some("ghost"), None);
        assert!(overlay.expanded().is_none());
        assert!(overlay.views.iter().all(|v| v.pulsing));
    }

    #[test]
    fn test_back_facing_markers_hidden() {
        let record = record();
        let overlay = HotspotOverlay::build(&record, None, Some(Vec3::new(0.0, 1.0, 5.0)));
        let visible: Vec<&str> = overlay.visible().map(|v| v.hotspot.id.as_str()).collect();
        assert_eq!(visible, vec!["front"]);
    }

    #[test]
    fn test_pulse_range() {
        for i in 0..32 {
            let s = pulse_scale(i as f32 * 0.1);
            assert!(s > 0.9999 && s < 1.3501, "scale {} out of range", s);
        }
        assert!((pulse_scale(0.0) - 1.175).abs() < 1e-5);
    }
}
