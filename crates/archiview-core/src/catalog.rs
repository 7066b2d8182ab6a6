//! Catalog store
//!
//! The catalog is an ordered, immutable list of building models. The built-in
//! document ships inside the binary; see `catalog.toml` next to this crate.

use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::model::ModelRecord;

/// The catalog compiled into the application
pub const BUILTIN_CATALOG: &str = include_str!("../catalog.toml");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to parse catalog: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Catalog has no models")]
    Empty,
    #[error("Duplicate model id: {0}")]
    DuplicateModel(String),
    #[error("Duplicate floor id {floor} in model {model}")]
    DuplicateFloor { model: String, floor: String },
    #[error("Duplicate hotspot id {hotspot} in model {model}")]
    DuplicateHotspot { model: String, hotspot: String },
}

/// Raw catalog document; other top-level tables are ignored here
#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    model: Vec<ModelRecord>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    records: Vec<ModelRecord>,
}

impl Catalog {
    /// Validate and wrap a list of records
    pub fn new(records: Vec<ModelRecord>) -> Result<Self, CatalogError> {
        if records.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut model_ids = HashSet::new();
        for record in &records {
            if !model_ids.insert(record.id.as_str()) {
                return Err(CatalogError::DuplicateModel(record.id.clone()));
            }

            let mut floor_ids = HashSet::new();
            for floor in &record.floors {
                if !floor_ids.insert(floor.id.as_str()) {
                    return Err(CatalogError::DuplicateFloor {
                        model: record.id.clone(),
                        floor: floor.id.clone(),
                    });
                }
            }

            let mut hotspot_ids = HashSet::new();
            for hotspot in &record.hotspots {
                if !hotspot_ids.insert(hotspot.id.as_str()) {
                    return Err(CatalogError::DuplicateHotspot {
                        model: record.id.clone(),
                        hotspot: hotspot.id.clone(),
                    });
                }
            }
        }

        Ok(Self { records })
    }

    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = toml::from_str(content)?;
        let catalog = Self::new(doc.model)?;
        debug!(models = catalog.len(), "Loaded catalog");
        Ok(catalog)
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml(BUILTIN_CATALOG)
    }

    /// All records in catalog order
    pub fn get_all(&self) -> &[ModelRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&ModelRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// First record; the initial selection
    pub fn default_record(&self) -> &ModelRecord {
        // new() rejects empty catalogs
        &self.records[0]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HotspotCategory, Vec3};
    use crate::settings::ViewerSettings;

    const TWO_MODELS: &str = r#"
[[model]]
id = "a"
name = "Alpha"
description = "First"
src = "https://example.com/a.glb"
preview_image = "https://example.com/a.png"

[[model]]
id = "b"
name = "Beta"
description = "Second"
src = "https://example.com/b.glb"
preview_image = "https://example.com/b.png"
"#;

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin().unwrap();
        let ids: Vec<&str> = catalog.get_all().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["bldg-001", "bldg-002"]);

        let office = catalog.default_record();
        assert_eq!(office.name, "Modern Office Complex");
        assert_eq!(office.floors.len(), 2);
        assert_eq!(office.default_floor().unwrap().id, "ground");
        assert_eq!(
            office.hotspot("workstations").unwrap().category,
            HotspotCategory::Furniture
        );

        let villa = catalog.get("bldg-002").unwrap();
        assert!(!villa.has_floors());
        assert!(villa.alternate_asset_url.is_none());
    }

    #[test]
    fn test_builtin_settings_match_defaults() {
        let settings = ViewerSettings::from_toml(BUILTIN_CATALOG).unwrap();
        assert_eq!(settings, ViewerSettings::default());
    }

    #[test]
    fn test_lookup() {
        let catalog = Catalog::from_toml(TWO_MODELS).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("b"));
        assert!(!catalog.contains("c"));
        assert!(catalog.get("c").is_none());
        assert_eq!(catalog.default_record().id, "a");
    }

    #[test]
    fn test_empty_catalog() {
        assert!(matches!(Catalog::from_toml(""), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_duplicate_model() {
        let doc = TWO_MODELS.replace("id = \"b\"", "id = \"a\"");
        assert!(matches!(
            Catalog::from_toml(&doc),
            Err(CatalogError::DuplicateModel(id)) if id == "a"
        ));
    }

    #[test]
    fn test_duplicate_floor_and_hotspot() {
        let floors = format!(
            "{}\n[[model.floor]]\nid = \"f\"\nname = \"F\"\ncamera_target = \"0 0 0\"\n\
             [[model.floor]]\nid = \"f\"\nname = \"F2\"\ncamera_target = \"0 1 0\"\n",
            TWO_MODELS
        );
        assert!(matches!(
            Catalog::from_toml(&floors),
            Err(CatalogError::DuplicateFloor { model, floor }) if model == "b" && floor == "f"
        ));

        let hotspots = format!(
            "{}\n[[model.hotspot]]\nid = \"h\"\nposition = \"0 0 0\"\nnormal = \"0 1 0\"\n\
             label = \"H\"\ncategory = \"room\"\n\
             [[model.hotspot]]\nid = \"h\"\nposition = \"1 0 0\"\nnormal = \"0 1 0\"\n\
             label = \"H2\"\ncategory = \"room\"\n",
            TWO_MODELS
        );
        assert!(matches!(
            Catalog::from_toml(&hotspots),
            Err(CatalogError::DuplicateHotspot { model, hotspot }) if model == "b" && hotspot == "h"
        ));
    }

    #[test]
    fn test_bad_vector_is_parse_error() {
        let doc = format!(
            "{}\n[[model.floor]]\nid = \"f\"\nname = \"F\"\ncamera_target = \"0 0\"\n",
            TWO_MODELS
        );
        assert!(matches!(
            Catalog::from_toml(&doc),
            Err(CatalogError::ParseError(_))
        ));
    }

    #[test]
    fn test_new_from_records() {
        let catalog = Catalog::from_toml(TWO_MODELS).unwrap();
        let mut records = catalog.get_all().to_vec();
        records[1].floors.push(crate::model::Floor {
            id: "g".to_string(),
            name: "G".to_string(),
            camera_target: Vec3::ZERO,
        });
        let rebuilt = Catalog::new(records).unwrap();
        assert!(rebuilt.get("b").unwrap().has_floors());
    }
}
