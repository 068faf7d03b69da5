//! In-memory stand-in for the browser: several origins in one process.
//!
//! Each hosted origin registers a page loader. Opening a channel to that
//! origin "loads" a fresh page with its own message window, exactly like a
//! disposable iframe; closing the channel unloads it. Origins marked
//! unresponsive never finish loading.
//!
//! Used by the scenario tests and by native tooling that wants to exercise a
//! full sender/receiver round trip without a browser.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde_json::Value;

use crate::config::Origin;
use crate::message::SyncMessage;
use crate::receiver::{MessageSource, MessageSubscription, RawMessageHandler};
use crate::transport::{ChannelOpener, SyncChannel, TransportError};

/// Boots a page on a freshly loaded window and returns what keeps it alive.
pub type PageLoader = Rc<dyn Fn(&LoopbackWindow) -> MessageSubscription>;

/// One record per posted message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostRecord {
    pub from: Origin,
    pub to: Origin,
    pub message: SyncMessage,
}

#[derive(Default)]
struct HubInner {
    pages: RefCell<BTreeMap<Origin, PageLoader>>,
    unresponsive: RefCell<BTreeSet<Origin>>,
    posts: RefCell<Vec<PostRecord>>,
    opened: Cell<usize>,
    closed: Cell<usize>,
}

#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Rc<HubInner>,
}

impl LoopbackHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `origin`'s receiver page with `loader`.
    pub fn host<F>(&self, origin: Origin, loader: F)
    where
        F: Fn(&LoopbackWindow) -> MessageSubscription + 'static,
    {
        self.inner.pages.borrow_mut().insert(origin, Rc::new(loader));
    }

    pub fn set_unresponsive(&self, origin: &Origin, unresponsive: bool) {
        let mut set = self.inner.unresponsive.borrow_mut();
        if unresponsive {
            set.insert(origin.clone());
        } else {
            set.remove(origin);
        }
    }

    /// Channel opener for pages running on `from`.
    #[must_use]
    pub fn opener(&self, from: Origin) -> LoopbackOpener {
        LoopbackOpener { hub: self.clone(), from }
    }

    #[must_use]
    pub fn posts(&self) -> Vec<PostRecord> {
        self.inner.posts.borrow().clone()
    }

    #[must_use]
    pub fn posts_from(&self, from: &Origin) -> Vec<PostRecord> {
        self.inner.posts.borrow().iter().filter(|p| &p.from == from).cloned().collect()
    }

    #[must_use]
    pub fn opened(&self) -> usize {
        self.inner.opened.get()
    }

    #[must_use]
    pub fn closed(&self) -> usize {
        self.inner.closed.get()
    }

    /// Channels opened and not yet torn down.
    #[must_use]
    pub fn open_channels(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }
}

/// Message window of one loaded page.
#[derive(Clone, Default)]
pub struct LoopbackWindow {
    handlers: Rc<RefCell<Vec<(u64, Rc<RawMessageHandler>)>>>,
    next_id: Rc<Cell<u64>>,
}

impl LoopbackWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch a message to every listener of this window.
    pub fn dispatch(&self, origin: &str, payload: &Value) {
        let handlers: Vec<Rc<RawMessageHandler>> = self.handlers.borrow().iter().map(|(_, h)| Rc::clone(h)).collect();
        for handler in handlers {
            (**handler)(origin, payload);
        }
    }
}

impl MessageSource for LoopbackWindow {
    fn subscribe(&self, handler: RawMessageHandler) -> MessageSubscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        let handlers = Rc::clone(&self.handlers);
        MessageSubscription::new(move || handlers.borrow_mut().retain(|(hid, _)| *hid != id))
    }
}

#[derive(Clone)]
pub struct LoopbackOpener {
    hub: LoopbackHub,
    from: Origin,
}

impl ChannelOpener for LoopbackOpener {
    fn open(&self, url: &str) -> Result<Box<dyn SyncChannel>, TransportError> {
        let target = Origin::parse(url)
            .ok_or_else(|| TransportError::Open { url: url.to_owned(), reason: "not an absolute url".to_owned() })?;
        let inner = &self.hub.inner;
        inner.opened.set(inner.opened.get() + 1);
        Ok(Box::new(LoopbackChannel {
            hub: self.hub.clone(),
            from: self.from.clone(),
            target,
            url: url.to_owned(),
            window: None,
            page: None,
            closed: false,
        }))
    }
}

struct LoopbackChannel {
    hub: LoopbackHub,
    from: Origin,
    target: Origin,
    url: String,
    window: Option<LoopbackWindow>,
    page: Option<MessageSubscription>,
    closed: bool,
}

#[async_trait::async_trait(?Send)]
impl SyncChannel for LoopbackChannel {
    async fn loaded(&mut self) -> Result<(), TransportError> {
        if self.hub.inner.unresponsive.borrow().contains(&self.target) {
            futures::future::pending::<()>().await;
        }
        let loader = self.hub.inner.pages.borrow().get(&self.target).cloned();
        let Some(loader) = loader else {
            return Err(TransportError::Load { url: self.url.clone() });
        };
        let window = LoopbackWindow::new();
        self.page = Some(loader(&window));
        self.window = Some(window);
        Ok(())
    }

    fn post(&self, message: &SyncMessage, target: &Origin) -> Result<(), TransportError> {
        let Some(window) = &self.window else {
            return Err(TransportError::Post { origin: target.to_string(), reason: "page not loaded".to_owned() });
        };
        self.hub.inner.posts.borrow_mut().push(PostRecord {
            from: self.from.clone(),
            to: target.clone(),
            message: message.clone(),
        });
        // A restricted post to the wrong origin is silently dropped.
        if target == &self.target {
            window.dispatch(self.from.as_str(), &message.to_value());
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.page.take();
        self.window.take();
        let inner = &self.hub.inner;
        inner.closed.set(inner.closed.get() + 1);
    }
}
