//! Inbound side of the cross-origin transport and the subsystem's only trust
//! boundary.
//!
//! SYSTEM CONTEXT
//! ==============
//! Any page can post a message to any window. A payload is acted on only when
//! its sender origin exactly matches one of the configured peer apps and its
//! shape decodes to a login or logout. Everything else is dropped and logged
//! at debug level; nothing is surfaced to the user.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::config::{Origin, SyncConfig};
use crate::message::{InboundSync, InvalidReason, decode_message};

/// Fixed set of origins accepted as message senders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowList {
    origins: BTreeSet<Origin>,
}

impl AllowList {
    pub fn new(origins: impl IntoIterator<Item = Origin>) -> Self {
        Self { origins: origins.into_iter().collect() }
    }

    /// Every configured app except the current one.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.allowed_origins())
    }

    /// Exact match against a sender origin as reported by the platform.
    ///
    /// The raw value must already be a serialized origin; anything carrying a
    /// path, a different case or trailing junk does not match.
    #[must_use]
    pub fn allows(&self, raw_origin: &str) -> bool {
        Origin::parse(raw_origin)
            .filter(|origin| origin.as_str() == raw_origin)
            .is_some_and(|origin| self.origins.contains(&origin))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Origin> {
        self.origins.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

/// Handle for a platform message listener. Dropping it removes the listener.
#[must_use = "dropping a subscription removes the listener"]
pub struct MessageSubscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl MessageSubscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// Subscription with nothing to remove.
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the listener for the lifetime of the page.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Raw `(sender origin, payload)` handler registered with a [`MessageSource`].
pub type RawMessageHandler = Box<dyn Fn(&str, &Value)>;

/// Platform feed of inbound cross-origin messages (`window` "message" events).
pub trait MessageSource {
    fn subscribe(&self, handler: RawMessageHandler) -> MessageSubscription;
}

#[derive(Clone, Debug)]
pub struct Receiver {
    allow: AllowList,
}

impl Receiver {
    #[must_use]
    pub fn new(allow: AllowList) -> Self {
        Self { allow }
    }

    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(AllowList::from_config(config))
    }

    #[must_use]
    pub fn allow_list(&self) -> &AllowList {
        &self.allow
    }

    /// Classify one inbound message. Origin is checked before the payload is
    /// looked at.
    #[must_use]
    pub fn screen(&self, origin: &str, payload: &Value) -> InboundSync {
        if !self.allow.allows(origin) {
            tracing::debug!(%origin, "dropping sync message from untrusted origin");
            return InboundSync::Invalid(InvalidReason::UntrustedOrigin);
        }
        let decoded = decode_message(payload);
        if let InboundSync::Invalid(reason) = &decoded {
            tracing::debug!(%origin, ?reason, "dropping malformed sync message");
        }
        decoded
    }

    /// Invoke `on_message` for every trusted, well-formed message from
    /// `source` until the returned subscription is dropped.
    pub fn listen<F>(&self, source: &dyn MessageSource, on_message: F) -> MessageSubscription
    where
        F: Fn(InboundSync) + 'static,
    {
        let receiver = self.clone();
        source.subscribe(Box::new(move |origin, payload| match receiver.screen(origin, payload) {
            InboundSync::Invalid(_) => {}
            accepted => on_message(accepted),
        }))
    }
}

#[cfg(test)]
#[path = "receiver_test.rs"]
mod tests;
