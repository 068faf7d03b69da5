//! `window` event feeds: cross-origin `message` events and same-origin
//! `storage` events.

use serde_json::Value;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{MessageEvent, StorageEvent};

use crate::receiver::{MessageSource, MessageSubscription, RawMessageHandler};

/// Storage keys written by this crate share this prefix.
const KEY_PREFIX: &str = "@bytebank/";

/// Inbound `postMessage` traffic of the current window.
pub struct WindowMessages;

impl MessageSource for WindowMessages {
    fn subscribe(&self, handler: RawMessageHandler) -> MessageSubscription {
        let Some(window) = web_sys::window() else {
            return MessageSubscription::empty();
        };
        let callback = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let payload = js_to_json(&event.data());
            handler(&event.origin(), &payload);
        });
        if let Err(e) = window.add_event_listener_with_callback("message", callback.as_ref().unchecked_ref()) {
            tracing::warn!(error = ?e, "could not listen for sync messages");
            return MessageSubscription::empty();
        }
        MessageSubscription::new(move || {
            if let Err(e) = window.remove_event_listener_with_callback("message", callback.as_ref().unchecked_ref()) {
            tracing::debug!(error = ?e, "could not remove message listener");
        }
        })
    }
}

/// Call `on_change` whenever another context of this origin writes one of the
/// session keys or clears storage.
pub fn on_storage_change<F>(on_change: F) -> MessageSubscription
where
    F: Fn() + 'static,
{
    let Some(window) = web_sys::window() else {
        return MessageSubscription::empty();
    };
    let callback = Closure::<dyn FnMut(StorageEvent)>::new(move |event: StorageEvent| {
        let relevant = event.key().is_none_or(|key| key.starts_with(KEY_PREFIX));
        if relevant {
            on_change();
        }
    });
    if let Err(e) = window.add_event_listener_with_callback("storage", callback.as_ref().unchecked_ref()) {
        tracing::warn!(error = ?e, "could not listen for storage changes");
        return MessageSubscription::empty();
    }
    MessageSubscription::new(move || {
        if let Err(e) = window.remove_event_listener_with_callback("storage", callback.as_ref().unchecked_ref()) {
            tracing::debug!(error = ?e, "could not remove storage listener");
        }
    })
}

/// Structured-clone data to JSON. Anything not representable is `Null`.
fn js_to_json(value: &JsValue) -> Value {
    js_sys::JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or(Value::Null)
}
