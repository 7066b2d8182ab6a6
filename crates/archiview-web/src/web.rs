//! Browser interop: page address, downloads, AR navigation, visibility

use archiview_core::{ArLaunch, ArPhase, EventEmitter};

/// Progress of one AR hand-off, driven by page visibility and focus
///
/// Scene Viewer hides the page. Quick Look can cover it without hiding it,
/// which only shows as a window blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffStage {
    /// Platform viewer requested, page still showing
    Launched,
    /// Page hidden or covered by the platform viewer
    Away,
    /// Back on the page; the hand-off is over
    Returned,
}

impl HandoffStage {
    /// Next stage and the AR phase to report, if any
    ///
    /// `hidden` is true for a hidden document or a window blur, false for a
    /// visible document or a window focus.
    pub fn on_visibility(self, hidden: bool) -> (HandoffStage, Option<ArPhase>) {
        match (self, hidden) {
            (Self::Launched, true) => (Self::Away, Some(ArPhase::Presenting)),
            (Self::Away, false) => (Self::Returned, Some(ArPhase::NotPresenting)),
            (stage, _) => (stage, None),
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod js_interop {
    use super::*;
    use archiview_core::ViewerEvent;
    use std::cell::Cell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::{Blob, Url};

    pub fn page_url() -> String {
        web_sys::window()
            .and_then(|w| w.location().href().ok())
            .unwrap_or_default()
    }

    pub fn user_agent() -> String {
        web_sys::window()
            .and_then(|w| w.navigator().user_agent().ok())
            .unwrap_or_default()
    }

    pub fn reload_page() {
        if let Some(window) = web_sys::window() {
            if let Err(e) = window.location().reload() {
                tracing::warn!("Page reload failed: {:?}", e);
            }
        }
    }

    /// Offer `content` as a file download
    pub fn save_file(filename: &str, content: &[u8], mime_type: &str) {
        let window = match web_sys::window() {
            Some(w) => w,
            None => return,
        };
        let document = match window.document() {
            Some(d) => d,
            None => return,
        };

        let uint8_array = js_sys::Uint8Array::from(content);
        let array = js_sys::Array::new();
        array.push(&uint8_array.buffer());

        let blob_options = web_sys::BlobPropertyBag::new();
        blob_options.set_type(mime_type);

        let blob = match Blob::new_with_u8_array_sequence_and_options(&array, &blob_options) {
            Ok(b) => b,
            Err(_) => {
                tracing::warn!(filename, "Failed to create download blob");
                return;
            }
        };

        let url = match Url::create_object_url_with_blob(&blob) {
            Ok(u) => u,
            Err(_) => return,
        };

        let anchor = match document.create_element("a") {
            Ok(el) => el,
            Err(_) => return,
        };
        anchor.set_attribute("href", &url).ok();
        anchor.set_attribute("download", filename).ok();

        if let Some(body) = document.body() {
            body.append_child(&anchor).ok();
            if let Some(html_el) = anchor.dyn_ref::<web_sys::HtmlElement>() {
                html_el.click();
            }
            body.remove_child(&anchor).ok();
        }

        // Revoke after the browser has picked the download up
        let closure = Closure::wrap(Box::new(move || {
            Url::revoke_object_url(&url).ok();
        }) as Box<dyn FnMut()>);
        window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                1000,
            )
            .ok();
        closure.forget();
    }

    /// Leave the page for the platform AR viewer
    pub fn open_ar(launch: &ArLaunch) -> Result<(), String> {
        let window = web_sys::window().ok_or("No window")?;
        match launch {
            ArLaunch::SceneViewer { intent_url } => window
                .location()
                .set_href(intent_url)
                .map_err(|e| format!("Navigation failed: {:?}", e)),
            ArLaunch::QuickLook { usdz_url } => {
                let document = window.document().ok_or("No document")?;
                let anchor: web_sys::HtmlAnchorElement = document
                    .create_element("a")
                    .map_err(|_| "Failed to create anchor")?
                    .dyn_into()
                    .map_err(|_| "Anchor cast failed")?;
                anchor.set_rel("ar");
                anchor.set_href(usdz_url);
                // Quick Look only intercepts AR links that wrap an image
                let img = document
                    .create_element("img")
                    .map_err(|_| "Failed to create image")?;
                anchor.append_child(&img).ok();
                anchor.click();
                Ok(())
            }
            ArLaunch::Unsupported => Err("AR is not supported on this device".to_string()),
        }
    }

    /// Page visibility and focus listeners for one AR hand-off; removed on drop
    pub struct VisibilityGuard {
        window: web_sys::Window,
        document: web_sys::Document,
        closure: Closure<dyn FnMut(web_sys::Event)>,
        stage: Rc<Cell<HandoffStage>>,
        emitter: EventEmitter,
    }

    impl VisibilityGuard {
        pub fn install(emitter: EventEmitter) -> Option<Self> {
            let window = web_sys::window()?;
            let document = window.document()?;
            let stage = Rc::new(Cell::new(HandoffStage::Launched));

            let doc = document.clone();
            let shared = stage.clone();
            let event_emitter = emitter.clone();
            let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
                let hidden = match event.type_().as_str() {
                    "blur" => true,
                    "focus" => false,
                    _ => doc.visibility_state() == web_sys::VisibilityState::Hidden,
                };
                let (next, phase) = shared.get().on_visibility(hidden);
                shared.set(next);
                if let Some(phase) = phase {
                    event_emitter.emit(ViewerEvent::ArStatus(phase));
                }
            }) as Box<dyn FnMut(web_sys::Event)>);

            let callback = closure.as_ref().unchecked_ref();
            let installed = document
                .add_event_listener_with_callback("visibilitychange", callback)
                .and_then(|_| window.add_event_listener_with_callback("blur", callback))
                .and_then(|_| window.add_event_listener_with_callback("focus", callback));
            let guard = Self {
                window,
                document,
                closure,
                stage,
                emitter,
            };
            if let Err(e) = installed {
                tracing::warn!("Failed to watch page visibility: {:?}", e);
                return None;
            }
            Some(guard)
        }

        pub fn is_live(&self) -> bool {
            self.emitter.is_live()
        }

        pub fn stage(&self) -> HandoffStage {
            self.stage.get()
        }
    }

    impl Drop for VisibilityGuard {
        fn drop(&mut self) {
            let callback = self.closure.as_ref().unchecked_ref();
            self.document
                .remove_event_listener_with_callback("visibilitychange", callback)
                .ok();
            self.window
                .remove_event_listener_with_callback("blur", callback)
                .ok();
            self.window
                .remove_event_listener_with_callback("focus", callback)
                .ok();
        }
    }
}

// Non-WASM stand-ins
#[cfg(not(target_arch = "wasm32"))]
mod js_interop {
    use super::*;

    pub fn page_url() -> String {
        String::new()
    }

    pub fn user_agent() -> String {
        String::new()
    }

    pub fn reload_page() {
        tracing::warn!("Page reload is only available in the browser");
    }

    pub fn save_file(filename: &str, content: &[u8], _mime_type: &str) {
        tracing::warn!(
            filename,
            size = content.len(),
            "File download not supported on this platform"
        );
    }

    pub fn open_ar(_launch: &ArLaunch) -> Result<(), String> {
        Err("AR hand-off requires a browser".to_string())
    }

    pub struct VisibilityGuard {
        emitter: EventEmitter,
    }

    impl VisibilityGuard {
        pub fn install(emitter: EventEmitter) -> Option<Self> {
            Some(Self { emitter })
        }

        pub fn is_live(&self) -> bool {
            self.emitter.is_live()
        }

        pub fn stage(&self) -> HandoffStage {
            HandoffStage::Launched
        }
    }
}

pub use js_interop::{open_ar, page_url, reload_page, save_file, user_agent, VisibilityGuard};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handoff_round_trip() {
        let (stage, phase) = HandoffStage::Launched.on_visibility(true);
        assert_eq!((stage, phase), (HandoffStage::Away, Some(ArPhase::Presenting)));

        let (stage, phase) = stage.on_visibility(false);
        assert_eq!(
            (stage, phase),
            (HandoffStage::Returned, Some(ArPhase::NotPresenting))
        );

        // Later tab switches are not AR sessions
        assert_eq!(stage.on_visibility(true), (HandoffStage::Returned, None));
    }

    #[test]
    fn test_overlay_blur_then_focus_ends_handoff() {
        // Quick Look covers the page: blur, then focus when dismissed
        let (stage, phase) = HandoffStage::Launched.on_visibility(true);
        assert_eq!(phase, Some(ArPhase::Presenting));

        // visibilitychange and blur can both fire for one departure
        assert_eq!(stage.on_visibility(true), (HandoffStage::Away, None));

        let (stage, phase) = stage.on_visibility(false);
        assert_eq!(stage, HandoffStage::Returned);
        assert_eq!(phase, Some(ArPhase::NotPresenting));
        assert_eq!(stage.on_visibility(false), (HandoffStage::Returned, None));
    }

    #[test]
    fn test_visible_before_leaving_is_ignored() {
        assert_eq!(
            HandoffStage::Launched.on_visibility(false),
            (HandoffStage::Launched, None)
        );
    }
}
