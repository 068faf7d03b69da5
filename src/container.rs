//! In-memory session state read by the UI.
//!
//! Only the coordinator writes here; everything else gets a read-only
//! [`AuthState`] snapshot.

use std::cell::RefCell;
use std::rc::Rc;

use crate::session::Session;

/// Coordinator lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing reconciled yet.
    #[default]
    Unknown,
    SignedOut,
    SignedIn,
    /// Remote invalidation and peer notification still running.
    LoggingOut,
}

/// Snapshot of who is signed in, as rendered by the UI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
    pub session: Option<Session>,
    pub state: SyncState,
}

impl AuthState {
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state == SyncState::SignedIn && self.session.is_some()
    }

    /// True until the first reconciliation settles.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state == SyncState::Unknown
    }

    #[must_use]
    pub fn user_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_name.as_str())
    }
}

#[derive(Clone, Default)]
pub struct SessionContainer {
    inner: Rc<RefCell<AuthState>>,
}

impl SessionContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.inner.borrow().clone()
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.inner.borrow().session.clone()
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.inner.borrow().state
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.inner.borrow().is_logged_in()
    }

    pub(crate) fn set_signed_in(&self, session: Session) {
        *self.inner.borrow_mut() = AuthState { session: Some(session), state: SyncState::SignedIn };
    }

    pub(crate) fn set_signed_out(&self) {
        *self.inner.borrow_mut() = AuthState { session: None, state: SyncState::SignedOut };
    }

    pub(crate) fn set_logging_out(&self) {
        *self.inner.borrow_mut() = AuthState { session: None, state: SyncState::LoggingOut };
    }
}

#[cfg(test)]
#[path = "container_test.rs"]
mod tests;
