//! Address bar over `window.location` and `history.replaceState`.

use wasm_bindgen::JsValue;

use crate::coordinator::AddressBar;

pub struct WindowAddressBar;

impl AddressBar for WindowAddressBar {
    fn fragment(&self) -> String {
        web_sys::window().and_then(|w| w.location().hash().ok()).unwrap_or_default()
    }

    fn replace_fragment(&self, fragment: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let location = window.location();
        let (Ok(path), Ok(search)) = (location.pathname(), location.search()) else {
            return;
        };
        let url = format!("{path}{search}{fragment}");
        let replaced = window
            .history()
            .and_then(|history| history.replace_state_with_url(&JsValue::NULL, "", Some(&url)));
        if let Err(e) = replaced {
            tracing::warn!(error = ?e, "could not rewrite address bar");
        }
    }
}
