//! Hidden-iframe sync channel.
//!
//! The iframe is appended to `<body>` with `display: none`, its `load` and
//! `error` events resolve a oneshot, and `close` detaches both handlers and
//! removes the element.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use uuid::Uuid;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen::closure::Closure;
use web_sys::HtmlIFrameElement;

use crate::config::Origin;
use crate::message::SyncMessage;
use crate::transport::{ChannelOpener, SyncChannel, TransportError};

pub struct IframeOpener;

impl ChannelOpener for IframeOpener {
    fn open(&self, url: &str) -> Result<Box<dyn SyncChannel>, TransportError> {
        let fail = |reason: &str| TransportError::Open { url: url.to_owned(), reason: reason.to_owned() };

        let document = web_sys::window().and_then(|w| w.document()).ok_or_else(|| fail("no document"))?;
        let body = document.body().ok_or_else(|| fail("no body"))?;
        let iframe: HtmlIFrameElement = document
            .create_element("iframe")
            .map_err(|_| fail("create_element failed"))?
            .dyn_into()
            .map_err(|_| fail("not an iframe"))?;

        iframe.set_id(&format!("bytebank-sync-{}", Uuid::new_v4()));
        if let Err(e) = hide(&iframe) {
            tracing::debug!(error = ?e, "could not hide sync iframe");
        }

        let (tx, rx) = oneshot::channel::<bool>();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let signal = |ok: bool| {
            let tx = Rc::clone(&tx);
            Closure::<dyn FnMut()>::new(move || {
                if let Some(tx) = tx.borrow_mut().take() {
                    if tx.send(ok).is_err() {
                        tracing::debug!("sync iframe settled after its channel was dropped");
                    }
                }
            })
        };
        let on_load = signal(true);
        let on_error = signal(false);
        iframe.set_onload(Some(on_load.as_ref().unchecked_ref()));
        iframe.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        iframe.set_src(url);

        body.append_child(&iframe).map_err(|_| fail("append_child failed"))?;
        tracing::debug!(%url, "sync iframe attached");

        Ok(Box::new(IframeChannel {
            iframe,
            url: url.to_owned(),
            ready: Some(rx),
            _on_load: on_load,
            _on_error: on_error,
            closed: false,
        }))
    }
}

fn hide(iframe: &HtmlIFrameElement) -> Result<(), JsValue> {
    let style = iframe.style();
    style.set_property("display", "none")?;
    style.set_property("position", "absolute")?;
    style.set_property("width", "0")?;
    style.set_property("height", "0")
}

struct IframeChannel {
    iframe: HtmlIFrameElement,
    url: String,
    ready: Option<oneshot::Receiver<bool>>,
    _on_load: Closure<dyn FnMut()>,
    _on_error: Closure<dyn FnMut()>,
    closed: bool,
}

#[async_trait::async_trait(?Send)]
impl SyncChannel for IframeChannel {
    async fn loaded(&mut self) -> Result<(), TransportError> {
        let Some(ready) = self.ready.take() else {
            return Ok(());
        };
        match ready.await {
            Ok(true) => Ok(()),
            _ => Err(TransportError::Load { url: self.url.clone() }),
        }
    }

    fn post(&self, message: &SyncMessage, target: &Origin) -> Result<(), TransportError> {
        let fail = |reason: String| TransportError::Post { origin: target.to_string(), reason };
        let window = self.iframe.content_window().ok_or_else(|| fail("iframe has no window".to_owned()))?;
        let json = serde_json::to_string(message).map_err(|e| fail(e.to_string()))?;
        let payload = js_sys::JSON::parse(&json).map_err(|e| fail(format!("{e:?}")))?;
        window.post_message(&payload, target.as_str()).map_err(|e| fail(format!("{e:?}")))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.iframe.set_onload(None);
        self.iframe.set_onerror(None);
        self.iframe.remove();
        tracing::debug!(url = %self.url, "sync iframe removed");
    }
}
