//! ArchiView Web - Bevy-powered building model viewer with AR hand-off
//!
//! This crate provides the browser frontend: the model list, the 3D viewer,
//! and the controls that drive the session logic in `archiview-core`.

mod app;
mod ar;
mod models;
mod scene;
mod snapshot;
mod ui;
mod viewer;
mod web;

use archiview_core::{Catalog, ViewerSettings, BUILTIN_CATALOG};
use wasm_bindgen::prelude::*;

/// Entry point for WASM module
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();

    let settings = ViewerSettings::from_toml(BUILTIN_CATALOG);
    let level = settings
        .as_ref()
        .map(|s| s.tracing_level())
        .unwrap_or(tracing::Level::WARN);

    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(level)
            .build(),
    );

    let settings = settings.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Invalid viewer settings, using defaults");
        ViewerSettings::default()
    });

    let catalog = match Catalog::builtin() {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(error = %e, "Built-in catalog is invalid");
            return;
        }
    };

    app::run(catalog, settings);
}
