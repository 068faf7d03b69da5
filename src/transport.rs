//! Cross-origin sender: one-shot delivery of a sync message to a peer origin
//! that is not currently the top-level page.
//!
//! SYSTEM CONTEXT
//! ==============
//! The only primitive that reaches another origin's storage without a server
//! is a document of that origin. A delivery therefore opens a disposable
//! hidden channel (an iframe in the browser) on the peer's receiver path,
//! waits for it to load, posts the message restricted to the peer origin,
//! lets the receiver settle, and tears the channel down.
//!
//! DESIGN
//! ======
//! - The channel is held by a [`ChannelGuard`]; teardown happens in `Drop`, so
//!   success, error and timeout all close it.
//! - The whole attempt races an overall timeout and always resolves to a
//!   [`Delivery`]. Nothing here returns an error to the caller.
//! - At most one delivery per sender is in flight. A second call while one is
//!   pending joins it and resolves with the same outcome; its own message is
//!   not posted.
//!
//! Browser-specific pieces sit behind [`ChannelOpener`] and [`Timer`] so the
//! sequencing here runs under a paused tokio clock in tests.

use std::cell::RefCell;
use std::pin::pin;
use std::rc::Rc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{Either, LocalBoxFuture, Shared, select};

use crate::config::{Origin, SyncConfig, SyncTimings};
use crate::message::{SyncAction, SyncMessage};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not open sync channel to {url}: {reason}")]
    Open { url: String, reason: String },
    #[error("sync channel to {url} failed to load")]
    Load { url: String },
    #[error("could not post to {origin}: {reason}")]
    Post { origin: String, reason: String },
}

/// Outcome of one delivery. Never an error for the caller; only logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    TimedOut,
    Failed(String),
}

impl Delivery {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// A disposable document hosted by the peer origin.
#[async_trait::async_trait(?Send)]
pub trait SyncChannel {
    /// Resolve once the document has loaded.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Load`] when the document fails to load.
    async fn loaded(&mut self) -> Result<(), TransportError>;

    /// Post `message`, restricted so only `target` can receive it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Post`] when the document is gone.
    fn post(&self, message: &SyncMessage, target: &Origin) -> Result<(), TransportError>;

    /// Tear the document down. Must tolerate repeated calls.
    fn close(&mut self);
}

pub trait ChannelOpener {
    /// Start loading `url` in a fresh disposable channel.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Open`] when no channel can be created.
    fn open(&self, url: &str) -> Result<Box<dyn SyncChannel>, TransportError>;
}

#[async_trait::async_trait(?Send)]
pub trait Timer {
    async fn sleep(&self, duration: Duration);
}

/// Best-effort notification of one peer origin.
#[async_trait::async_trait(?Send)]
pub trait PeerLink {
    async fn send(&self, target: &Origin, message: SyncMessage) -> Delivery;
}

/// Closes the wrapped channel when dropped.
pub struct ChannelGuard {
    channel: Box<dyn SyncChannel>,
}

impl ChannelGuard {
    #[must_use]
    pub fn new(channel: Box<dyn SyncChannel>) -> Self {
        Self { channel }
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.channel.close();
    }
}

type PendingDelivery = Shared<LocalBoxFuture<'static, Delivery>>;

struct InFlight {
    action: SyncAction,
    delivery: PendingDelivery,
}

struct SenderInner {
    opener: Rc<dyn ChannelOpener>,
    timer: Rc<dyn Timer>,
    timings: SyncTimings,
    receiver_path: String,
    in_flight: RefCell<Option<InFlight>>,
}

/// [`PeerLink`] over disposable channels.
#[derive(Clone)]
pub struct FrameSender {
    inner: Rc<SenderInner>,
}

impl FrameSender {
    pub fn new(opener: Rc<dyn ChannelOpener>, timer: Rc<dyn Timer>, config: &SyncConfig) -> Self {
        Self {
            inner: Rc::new(SenderInner {
                opener,
                timer,
                timings: config.timings,
                receiver_path: config.receiver_path.clone(),
                in_flight: RefCell::new(None),
            }),
        }
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.inner.in_flight.borrow().is_some()
    }

    /// Action of the delivery currently in flight.
    #[must_use]
    pub fn in_flight_action(&self) -> Option<SyncAction> {
        self.inner.in_flight.borrow().as_ref().map(|pending| pending.action)
    }

    /// Deliver `message` to `target`'s receiver endpoint, or join the
    /// delivery already in flight.
    pub async fn deliver(&self, target: &Origin, message: SyncMessage) -> Delivery {
        let pending = self.inner.in_flight.borrow().as_ref().map(|p| (p.action, p.delivery.clone()));
        if let Some((joined, pending)) = pending {
            if joined == message.action {
                tracing::debug!(action = message.action.as_str(), %target, "sync delivery already in flight; joining it");
            } else {
                tracing::warn!(
                    action = message.action.as_str(),
                    in_flight = joined.as_str(),
                    %target,
                    "dropping sync message behind a different in-flight delivery; peer catches up on its next handoff"
                );
            }
            return pending.await;
        }

        let url = target.join(&self.inner.receiver_path);
        let action = message.action;
        let delivery = run_delivery(
            Rc::clone(&self.inner.opener),
            Rc::clone(&self.inner.timer),
            self.inner.timings,
            url,
            target.clone(),
            message,
        )
        .boxed_local()
        .shared();
        *self.inner.in_flight.borrow_mut() = Some(InFlight { action, delivery: delivery.clone() });
        let _clear = InFlightReset { inner: Rc::clone(&self.inner) };

        let outcome = delivery.await;
        match &outcome {
            Delivery::Delivered => tracing::debug!(action = action.as_str(), %target, "sync message delivered"),
            Delivery::TimedOut => tracing::warn!(
                action = action.as_str(),
                %target,
                timeout_ms = u64::try_from(self.inner.timings.overall_timeout.as_millis()).unwrap_or(u64::MAX),
                "sync delivery timed out"
            ),
            Delivery::Failed(reason) => {
                tracing::warn!(action = action.as_str(), %target, %reason, "sync delivery failed");
            }
        }
        outcome
    }
}

#[async_trait::async_trait(?Send)]
impl PeerLink for FrameSender {
    async fn send(&self, target: &Origin, message: SyncMessage) -> Delivery {
        self.deliver(target, message).await
    }
}

/// Clears the in-flight slot when the owning `deliver` call finishes or is
/// dropped.
struct InFlightReset {
    inner: Rc<SenderInner>,
}

impl Drop for InFlightReset {
    fn drop(&mut self) {
        self.inner.in_flight.borrow_mut().take();
    }
}

async fn run_delivery(
    opener: Rc<dyn ChannelOpener>,
    timer: Rc<dyn Timer>,
    timings: SyncTimings,
    url: String,
    target: Origin,
    message: SyncMessage,
) -> Delivery {
    let attempt = pin!(attempt_delivery(opener.as_ref(), timer.as_ref(), timings, &url, &target, &message));
    let deadline = timer.sleep(timings.overall_timeout);
    match select(attempt, deadline).await {
        Either::Left((Ok(()), _)) => Delivery::Delivered,
        Either::Left((Err(e), _)) => Delivery::Failed(e.to_string()),
        Either::Right(((), _)) => Delivery::TimedOut,
    }
}

async fn attempt_delivery(
    opener: &dyn ChannelOpener,
    timer: &dyn Timer,
    timings: SyncTimings,
    url: &str,
    target: &Origin,
    message: &SyncMessage,
) -> Result<(), TransportError> {
    let mut guard = ChannelGuard::new(opener.open(url)?);
    guard.channel.loaded().await?;
    timer.sleep(timings.init_delay).await;
    guard.channel.post(message, target)?;
    timer.sleep(timings.settle_delay).await;
    Ok(())
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
