//! Catalog data model: building models, floors, and hotspot annotations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VectorError {
    #[error("Expected 3 components, found {0}")]
    WrongArity(usize),
    #[error("Invalid vector component: {0:?}")]
    InvalidComponent(String),
}

/// A point or direction in model space
///
/// Catalog documents store vectors as whitespace-separated `"x y z"` strings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Parse a `"x y z"` string into a vector
pub fn parse_vec3(s: &str) -> Result<Vec3, VectorError> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(VectorError::WrongArity(parts.len()));
    }

    let mut values = [0.0f64; 3];
    for (value, part) in values.iter_mut().zip(&parts) {
        let parsed: f64 = part
            .parse()
            .map_err(|_| VectorError::InvalidComponent(part.to_string()))?;
        if !parsed.is_finite() {
            return Err(VectorError::InvalidComponent(part.to_string()));
        }
        *value = parsed;
    }

    Ok(Vec3::new(values[0], values[1], values[2]))
}

impl FromStr for Vec3 {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_vec3(s)
    }
}

impl TryFrom<String> for Vec3 {
    type Error = VectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_vec3(&value)
    }
}

impl From<Vec3> for String {
    fn from(v: Vec3) -> Self {
        v.to_string()
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.x, self.y, self.z)
    }
}

/// A named camera-target preset for one vertical level of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    pub id: String,
    /// Display label (e.g., "Ground Floor")
    pub name: String,
    /// Where the camera focuses when this floor is active
    pub camera_target: Vec3,
}

/// Kind of thing a hotspot annotates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotCategory {
    Room,
    Furniture,
    Structure,
}

impl HotspotCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Room => "Room",
            Self::Furniture => "Furniture",
            Self::Structure => "Structure",
        }
    }

    /// Marker color as sRGB bytes
    pub fn marker_rgb(&self) -> [u8; 3] {
        match self {
            Self::Room => [79, 70, 229],
            Self::Furniture => [217, 119, 6],
            Self::Structure => [71, 85, 105],
        }
    }
}

impl fmt::Display for HotspotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A labeled annotation anchored to a point on the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: String,
    /// Anchor position in model space
    pub position: Vec3,
    /// Outward-facing surface normal at the anchor
    pub normal: Vec3,
    pub label: String,
    pub category: HotspotCategory,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form display string (e.g., "12 m x 8 m")
    #[serde(default)]
    pub dimensions: Option<String>,
}

/// A catalog entry describing one building model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Stable identifier, unique across the catalog
    pub id: String,
    pub name: String,
    pub description: String,
    /// Platform-neutral asset (glTF binary)
    #[serde(rename = "src")]
    pub primary_asset_url: String,
    /// Optional USDZ asset for AR Quick Look on iOS
    #[serde(rename = "ios_src", default)]
    pub alternate_asset_url: Option<String>,
    #[serde(rename = "preview_image")]
    pub preview_image_url: String,
    #[serde(rename = "floor", default)]
    pub floors: Vec<Floor>,
    #[serde(rename = "hotspot", default)]
    pub hotspots: Vec<Hotspot>,
}

impl ModelRecord {
    /// The floor that is active whenever this model is freshly selected
    pub fn default_floor(&self) -> Option<&Floor> {
        self.floors.first()
    }

    pub fn floor(&self, id: &str) -> Option<&Floor> {
        self.floors.iter().find(|f| f.id == id)
    }

    pub fn hotspot(&self, id: &str) -> Option<&Hotspot> {
        self.hotspots.iter().find(|h| h.id == id)
    }

    pub fn has_floors(&self) -> bool {
        !self.floors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vec3() {
        let v = parse_vec3("0.5  -1 2e-1").unwrap();
        assert_eq!(v, Vec3::new(0.5, -1.0, 0.2));
    }

    #[test]
    fn test_parse_vec3_rejects_wrong_arity() {
        assert_eq!(parse_vec3("1 2"), Err(VectorError::WrongArity(2)));
        assert_eq!(parse_vec3("1 2 3 4"), Err(VectorError::WrongArity(4)));
        assert_eq!(parse_vec3(""), Err(VectorError::WrongArity(0)));
    }

    #[test]
    fn test_parse_vec3_rejects_non_numbers() {
        assert!(matches!(
            parse_vec3("1 two 3"),
            Err(VectorError::InvalidComponent(c)) if c == "two"
        ));
        assert!(parse_vec3("1 NaN 3").is_err());
        assert!(parse_vec3("1 inf 3").is_err());
    }

    #[test]
    fn test_vec3_display_roundtrip() {
        let v = Vec3::new(1.5, 0.0, -2.25);
        assert_eq!(v.to_string(), "1.5 0 -2.25");
        assert_eq!(v.to_string().parse::<Vec3>().unwrap(), v);
    }

    #[test]
    fn test_vec3_math() {
        let a = Vec3::new(1.0, 2.0, 2.0);
        assert_eq!(a.length(), 3.0);
        assert_eq!(a.sub(Vec3::new(1.0, 0.0, 0.0)), Vec3::new(0.0, 2.0, 2.0));
        assert_eq!(a.dot(Vec3::new(0.0, 0.0, 1.0)), 2.0);
    }

    #[test]
    fn test_record_lookups() {
        let toml = r#"
id = "bldg"
name = "Building"
description = "Test"
src = "https://example.com/b.glb"
preview_image = "https://example.com/b.png"

[[floor]]
id = "ground"
name = "Ground"
camera_target = "0 0 0"

[[floor]]
id = "roof"
name = "Roof"
camera_target = "0 3 0"

[[hotspot]]
id = "door"
position = "0 1 2"
normal = "0 0 1"
label = "Front Door"
category = "structure"
"#;
        let record: ModelRecord = toml::from_str(toml).unwrap();
        assert_eq!(record.default_floor().unwrap().id, "ground");
        assert_eq!(record.floor("roof").unwrap().camera_target, Vec3::new(0.0, 3.0, 0.0));
        assert!(record.floor("basement").is_none());
        assert_eq!(record.hotspot("door").unwrap().category, HotspotCategory::Structure);
        assert!(record.alternate_asset_url.is_none());
        assert!(record.has_floors());
    }
}
