//! Receiver endpoint: the document a peer loads in its disposable channel.
//!
//! SYSTEM CONTEXT
//! ==============
//! The endpoint runs inside the receiving origin, so it can write that
//! origin's storage. It accepts exactly one sync message per load, records it
//! durably and stops. The app's own top-level page, if open, picks the change
//! up from storage on its next reconciliation.
//!
//! DESIGN
//! ======
//! The endpoint never sends anything. A message applied here can therefore
//! never turn into another outbound delivery.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::config::{AppKind, SyncConfig};
use crate::message::{InboundSync, SyncAction};
use crate::receiver::{MessageSource, MessageSubscription, Receiver};
use crate::store::{CoordinationFlag, KeyValueStorage, SessionStore};

/// What the endpoint did with its one message, and where a visible copy of
/// the page should go next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointOutcome {
    pub action: SyncAction,
    pub redirect_to: String,
}

struct EndpointInner {
    config: SyncConfig,
    store: SessionStore,
    receiver: Receiver,
    outcome: RefCell<Option<EndpointOutcome>>,
}

#[derive(Clone)]
pub struct ReceiverEndpoint {
    inner: Rc<EndpointInner>,
}

impl ReceiverEndpoint {
    pub fn new(config: SyncConfig, storage: Rc<dyn KeyValueStorage>) -> Self {
        let receiver = Receiver::from_config(&config);
        Self {
            inner: Rc::new(EndpointInner {
                config,
                store: SessionStore::new(storage),
                receiver,
                outcome: RefCell::new(None),
            }),
        }
    }

    #[must_use]
    pub fn outcome(&self) -> Option<EndpointOutcome> {
        self.inner.outcome.borrow().clone()
    }

    /// Screen and apply one raw message. Returns `None` when the message is
    /// rejected or a message was already handled by this load.
    pub fn handle(&self, origin: &str, payload: &Value) -> Option<EndpointOutcome> {
        if self.inner.outcome.borrow().is_some() {
            tracing::debug!(%origin, "receiver endpoint already handled a message");
            return None;
        }
        self.apply(self.inner.receiver.screen(origin, payload))
    }

    /// Listen on `source` until a message is handled.
    pub fn mount(&self, source: &dyn MessageSource) -> MessageSubscription {
        self.mount_with(source, |_| {})
    }

    /// Like [`Self::mount`], calling `on_handled` once with the outcome of the
    /// first valid message.
    pub fn mount_with<F>(&self, source: &dyn MessageSource, on_handled: F) -> MessageSubscription
    where
        F: Fn(&EndpointOutcome) + 'static,
    {
        let endpoint = self.clone();
        self.inner.receiver.listen(source, move |inbound| {
            if endpoint.inner.outcome.borrow().is_some() {
                return;
            }
            if let Some(outcome) = endpoint.apply(inbound) {
                on_handled(&outcome);
            }
        })
    }

    fn apply(&self, inbound: InboundSync) -> Option<EndpointOutcome> {
        let store = &self.inner.store;
        let action = match inbound {
            InboundSync::Login(auth) => {
                store.set_session(&auth);
                store.clear_flag(CoordinationFlag::ExternalLogoutObserved);
                store.clear_flag(CoordinationFlag::LocalLogoutInFlight);
                store.set_flag(CoordinationFlag::SyncCompleted);
                tracing::info!(account_id = %auth.session.account_id, "session received from peer");
                SyncAction::Login
            }
            InboundSync::Logout => {
                store.clear_all_user_data();
                store.clear_last_validation();
                if store.flag(CoordinationFlag::LocalLogoutInFlight) {
                    tracing::debug!("peer logout matches local logout in flight");
                } else {
                    store.set_flag(CoordinationFlag::ExternalLogoutObserved);
                }
                tracing::info!("logout received from peer");
                SyncAction::Logout
            }
            InboundSync::Invalid(_) => return None,
        };

        let outcome = EndpointOutcome { action, redirect_to: self.redirect_for(action) };
        *self.inner.outcome.borrow_mut() = Some(outcome.clone());
        Some(outcome)
    }

    fn redirect_for(&self, action: SyncAction) -> String {
        let config = &self.inner.config;
        match action {
            SyncAction::Login => {
                let app = config.current_app().unwrap_or(AppKind::Home);
                config.current.join(app.landing_path())
            }
            SyncAction::Logout => config.home.join("/"),
        }
    }
}

#[cfg(test)]
#[path = "endpoint_test.rs"]
mod tests;
