//! # bytebank-sync
//!
//! Cross-origin session synchronization for the Bytebank app suite.
//!
//! The home, investments and cards apps each run on their own origin with
//! their own `localStorage` and their own in-memory state. This crate keeps
//! "who is signed in" consistent between them using only client-side
//! primitives: per-origin storage, a one-shot embedded document that relays a
//! `postMessage`, a same-origin event bus, and URL-fragment handoffs during
//! full-page navigation.
//!
//! SYSTEM CONTEXT
//! ==============
//! Leaves first: [`store`] and [`fragment`] have no internal dependencies,
//! [`transport`] and [`receiver`] move [`message`]s between origins, [`bus`]
//! fans out changes inside one page, [`container`] holds the in-memory
//! session, and [`coordinator`] composes all of them. Browser bindings live
//! in `browser` (feature `hydrate`); Leptos components live in [`ui`].

pub mod account;
pub mod bus;
pub mod config;
pub mod container;
pub mod coordinator;
pub mod endpoint;
pub mod fragment;
pub mod loopback;
pub mod message;
pub mod receiver;
pub mod session;
pub mod store;
pub mod transport;
pub mod ui;
pub mod validation;

#[cfg(feature = "hydrate")]
pub mod browser;

#[cfg(test)]
mod test_helpers;

pub use config::{AppKind, Origin, SyncConfig};
pub use container::{AuthState, SyncState};
pub use coordinator::{Coordinator, SyncBackends};
pub use message::{InboundSync, SyncAction, SyncMessage};
pub use session::{AuthSession, Session};

