//! Selection and shell state: which model is shown, panel and share dialog

use tracing::{debug, info};
use url::Url;

use crate::catalog::Catalog;
use crate::model::ModelRecord;

/// Query parameter that picks the initial model (`?model=bldg-002`)
pub const MODEL_QUERY_PARAM: &str = "model";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellState {
    pub selected_model_id: String,
    pub is_panel_open: bool,
    pub is_share_dialog_open: bool,
    /// Page address captured at startup
    pub share_url: String,
}

#[derive(Debug, Clone)]
pub struct ShellController {
    state: ShellState,
    narrow_viewport_width: f32,
}

impl ShellController {
    /// Start on `requested_id` when the catalog knows it, else the first record
    pub fn new(
        catalog: &Catalog,
        share_url: impl Into<String>,
        requested_id: Option<&str>,
        narrow_viewport_width: f32,
    ) -> Self {
        let selected = match requested_id {
            Some(id) if catalog.contains(id) => {
                info!(model_id = %id, "Selecting model from URL parameter");
                id.to_string()
            }
            Some(id) => {
                debug!(model_id = %id, "Ignoring unknown model in URL parameter");
                catalog.default_record().id.clone()
            }
            None => catalog.default_record().id.clone(),
        };

        Self {
            state: ShellState {
                selected_model_id: selected,
                is_panel_open: true,
                is_share_dialog_open: false,
                share_url: share_url.into(),
            },
            narrow_viewport_width,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn share_url(&self) -> &str {
        &self.state.share_url
    }

    pub fn selected<'c>(&self, catalog: &'c Catalog) -> Option<&'c ModelRecord> {
        catalog.get(&self.state.selected_model_id)
    }

    /// Select `id`; returns the record only when the selection changed
    ///
    /// Unknown ids are ignored. On a narrow viewport the panel closes even
    /// when the same model is picked again.
    pub fn select_model<'c>(
        &mut self,
        catalog: &'c Catalog,
        id: &str,
        viewport_width: f32,
    ) -> Option<&'c ModelRecord> {
        let record = catalog.get(id)?;

        if viewport_width < self.narrow_viewport_width {
            self.state.is_panel_open = false;
        }
        if self.state.selected_model_id == record.id {
            return None;
        }

        debug!(from = %self.state.selected_model_id, to = %record.id, "Model selected");
        self.state.selected_model_id = record.id.clone();
        Some(record)
    }

    pub fn toggle_panel(&mut self) {
        self.state.is_panel_open = !self.state.is_panel_open;
    }

    pub fn open_panel(&mut self) {
        self.state.is_panel_open = true;
    }

    pub fn close_panel(&mut self) {
        self.state.is_panel_open = false;
    }

    pub fn open_share_dialog(&mut self) {
        self.state.is_share_dialog_open = true;
    }

    pub fn close_share_dialog(&mut self) {
        self.state.is_share_dialog_open = false;
    }
}

/// Model id named by the `?model=` parameter of a page address
pub fn requested_model_id(page_url: &str) -> Option<String> {
    let url = Url::parse(page_url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == MODEL_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[model]]
id = "a"
name = "Alpha"
description = ""
src = "https://example.com/a.glb"
preview_image = ""

[[model]]
id = "b"
name = "Beta"
description = ""
src = "https://example.com/b.glb"
preview_image = ""
"#;

    fn shell(catalog: &Catalog) -> ShellController {
        ShellController::new(catalog, "https://archiview.app/?model=a", None, 1024.0)
    }

    #[test]
    fn test_initial_state() {
        let catalog = Catalog::from_toml(CATALOG).unwrap();
        let shell = shell(&catalog);
        assert_eq!(shell.state().selected_model_id, "a");
        assert!(shell.state().is_panel_open);
        assert!(!shell.state().is_share_dialog_open);
        assert_eq!(shell.share_url(), "https://archiview.app/?model=a");
    }

    #[test]
    fn test_requested_model() {
        let catalog = Catalog::from_toml(CATALOG).unwrap();
        let shell = ShellController::new(&catalog, "", Some("b"), 1024.0);
        assert_eq!(shell.selected(&catalog).unwrap().id, "b");

        let shell = ShellController::new(&catalog, "", Some("zzz"), 1024.0);
        assert_eq!(shell.state().selected_model_id, "a");
    }

    #[test]
    fn test_select_model() {
        let catalog = Catalog::from_toml(CATALOG).unwrap();
        let mut shell = shell(&catalog);

        assert_eq!(shell.select_model(&catalog, "b", 1920.0).unwrap().id, "b");
        assert!(shell.state().is_panel_open);
        assert!(shell.select_model(&catalog, "b", 1920.0).is_none());
        assert!(shell.select_model(&catalog, "nope", 1920.0).is_none());
        assert_eq!(shell.state().selected_model_id, "b");
    }

    #[test]
    fn test_narrow_viewport_closes_panel() {
        let catalog = Catalog::from_toml(CATALOG).unwrap();
        let mut shell = shell(&catalog);

        assert!(shell.select_model(&catalog, "a", 600.0).is_none());
        assert!(!shell.state().is_panel_open);

        shell.open_panel();
        assert!(shell.select_model(&catalog, "b", 1023.0).is_some());
        assert!(!shell.state().is_panel_open);

        shell.open_panel();
        shell.select_model(&catalog, "missing", 600.0);
        assert!(shell.state().is_panel_open);
    }

    #[test]
    fn test_toggles() {
        let catalog = Catalog::from_toml(CATALOG).unwrap();
        let mut shell = shell(&catalog);
        shell.toggle_panel();
        assert!(!shell.state().is_panel_open);
        shell.toggle_panel();
        assert!(shell.state().is_panel_open);
        shell.close_panel();
        assert!(!shell.state().is_panel_open);

        shell.open_share_dialog();
        assert!(shell.state().is_share_dialog_open);
        shell.close_share_dialog();
        assert!(!shell.state().is_share_dialog_open);
    }

    #[test]
    fn test_requested_model_id() {
        assert_eq!(
            requested_model_id("https://archiview.app/?model=bldg-002&x=1").as_deref(),
            Some("bldg-002")
        );
        assert_eq!(
            requested_model_id("http://192.168.1.20:8080/index.html?model=a%20b").as_deref(),
            Some("a b")
        );
        assert!(requested_model_id("https://archiview.app/?model=").is_none());
        assert!(requested_model_id("https://archiview.app/").is_none());
        assert!(requested_model_id("not a url").is_none());
    }
}
