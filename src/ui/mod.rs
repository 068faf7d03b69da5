//! Leptos bindings: the session provider every micro-frontend mounts at its
//! root, and the receiver page served at `/sync`.

pub mod provider;
pub mod sync_page;

pub use provider::{SessionSync, SessionSyncProvider, use_session_sync};
pub use sync_page::SyncEndpoint;
