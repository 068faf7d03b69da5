//! Same-origin "session changed" fan-out.
//!
//! DESIGN
//! ======
//! The re-entrancy guard is a depth counter owned by one bus instance, not a
//! global. [`EventBus::external_scope`] raises it for exactly as long as the
//! returned scope lives, so the guard clears itself on every exit path and
//! two buses (two coordinators in one test) never see each other's guard.
//!
//! Listeners run synchronously inside `publish`, in subscription order. A
//! listener may subscribe or unsubscribe while being notified; the change
//! takes effect from the next publish.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::session::Session;

/// One notification: the new session (or `None` after sign-out) and whether
/// the change came from outside this context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: Option<Session>,
    pub external: bool,
}

type Listener = Rc<dyn Fn(&SessionEvent)>;

#[derive(Default)]
struct BusInner {
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_id: Cell<u64>,
    external_depth: Cell<u32>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify every listener. The event is marked external while an
    /// [`ExternalUpdateScope`] is alive.
    pub fn publish(&self, session: Option<Session>) {
        let event = SessionEvent { session, external: self.is_applying_external_update() };
        // Snapshot so listeners can (un)subscribe without a RefCell conflict.
        let listeners: Vec<Listener> = self.inner.listeners.borrow().iter().map(|(_, l)| Rc::clone(l)).collect();
        tracing::debug!(
            listeners = listeners.len(),
            external = event.external,
            signed_in = event.session.is_some(),
            "session event"
        );
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, Rc::new(listener)));
        Subscription { bus: Rc::downgrade(&self.inner), id: Some(id) }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// True while an update that originated elsewhere is being applied.
    #[must_use]
    pub fn is_applying_external_update(&self) -> bool {
        self.inner.external_depth.get() > 0
    }

    /// Engage the re-entrancy guard until the returned scope is dropped.
    pub(crate) fn external_scope(&self) -> ExternalUpdateScope {
        let depth = &self.inner.external_depth;
        depth.set(depth.get() + 1);
        ExternalUpdateScope { inner: Rc::clone(&self.inner) }
    }
}

/// Guard scope returned by [`EventBus::external_scope`].
pub(crate) struct ExternalUpdateScope {
    inner: Rc<BusInner>,
}

impl Drop for ExternalUpdateScope {
    fn drop(&mut self) {
        let depth = &self.inner.external_depth;
        depth.set(depth.get().saturating_sub(1));
    }
}

/// Handle returned by [`EventBus::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: Option<u64>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the listener registered for the lifetime of the bus.
    pub fn detach(mut self) {
        self.id = None;
    }

    fn remove(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(inner) = self.bus.upgrade() {
            inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
#[path = "bus_test.rs"]
mod tests;
