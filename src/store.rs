//! Per-origin durable storage of the session and coordination flags.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every app reads and writes its own `localStorage`. Nothing here crosses an
//! origin boundary; propagation is the transport's and the fragment codec's
//! job.
//!
//! ERROR HANDLING
//! ==============
//! The typed API is total. Backend or serialization failures are logged and
//! read back as "absent", so callers never branch on storage errors.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::session::{AuthSession, Session};

/// Storage keys, shared by every app of the suite.
pub mod keys {
    pub const USER_DATA: &str = "@bytebank/user-data";
    pub const AUTH_TOKEN: &str = "@bytebank/auth-token";
    pub const SHOW_BALANCE: &str = "@bytebank/show-balance";
    pub const THEME: &str = "@bytebank/theme";
    pub const LOCAL_LOGOUT: &str = "@bytebank/local-logout-in-flight";
    pub const EXTERNAL_LOGOUT: &str = "@bytebank/external-logout";
    pub const SYNC_COMPLETED: &str = "@bytebank/sync-completed";
    pub const LAST_TOKEN_VALIDATION: &str = "@bytebank/last-token-validation";
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error("storage {op} failed for {key}: {reason}")]
    Backend { op: &'static str, key: String, reason: String },
}

/// Raw string key/value backend (`localStorage` in the browser).
pub trait KeyValueStorage {
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns a [`StorageError`] when the backend rejects the write (quota,
    /// privacy mode).
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns a [`StorageError`] when the backend cannot be modified.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory backend. Clones share the same map, the way two contexts of one
/// origin share `localStorage`.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    items: Rc<RefCell<BTreeMap<String, String>>>,
    reject_writes: Rc<Cell<bool>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail, as a full or locked-down store would.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.set(reject);
    }

    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.items.borrow_mut().insert(key.to_owned(), value.to_owned());
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.raw(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.reject_writes.get() {
            return Err(StorageError::Backend { op: "set", key: key.to_owned(), reason: "quota exceeded".to_owned() });
        }
        self.insert_raw(key, value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

/// Independently addressable coordination flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinationFlag {
    /// This origin started a logout and is still notifying its peer.
    LocalLogoutInFlight,
    /// Another origin reported a logout this origin has not acted on yet.
    ExternalLogoutObserved,
    /// A handoff was consumed. Diagnostic only.
    SyncCompleted,
}

impl CoordinationFlag {
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::LocalLogoutInFlight => keys::LOCAL_LOGOUT,
            Self::ExternalLogoutObserved => keys::EXTERNAL_LOGOUT,
            Self::SyncCompleted => keys::SYNC_COMPLETED,
        }
    }
}

/// Snapshot of all coordination flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoordinationFlags {
    pub local_logout_in_flight: bool,
    pub external_logout_observed: bool,
    pub sync_completed: bool,
}

impl CoordinationFlags {
    /// Both logout flags set at once: a protocol error that must resolve to
    /// signed out.
    #[must_use]
    pub fn is_conflicting(self) -> bool {
        self.local_logout_in_flight && self.external_logout_observed
    }
}

/// What durable storage currently holds for the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoredSession {
    Absent,
    Complete(AuthSession),
    /// Token without profile, profile without token, or blank fields.
    Partial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// Typed, total view over a [`KeyValueStorage`] backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Rc<dyn KeyValueStorage>,
}

impl SessionStore {
    pub fn new(backend: Rc<dyn KeyValueStorage>) -> Self {
        Self { backend }
    }

    // =========================================================================
    // SESSION
    // =========================================================================

    #[must_use]
    pub fn stored_session(&self) -> StoredSession {
        let token = self.token();
        let profile = self.profile();
        match (token, profile) {
            (None, None) => StoredSession::Absent,
            (Some(token), Some(session)) => {
                let auth = AuthSession::new(token, session);
                if auth.is_complete() { StoredSession::Complete(auth) } else { StoredSession::Partial }
            }
            _ => StoredSession::Partial,
        }
    }

    /// The durable session, only when it is complete.
    #[must_use]
    pub fn session(&self) -> Option<AuthSession> {
        match self.stored_session() {
            StoredSession::Complete(auth) => Some(auth),
            StoredSession::Absent | StoredSession::Partial => None,
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.get_json::<String>(keys::AUTH_TOKEN)
    }

    #[must_use]
    pub fn profile(&self) -> Option<Session> {
        self.get_json::<Session>(keys::USER_DATA)
    }

    /// Persist token then profile.
    pub fn set_session(&self, auth: &AuthSession) {
        self.set_json(keys::AUTH_TOKEN, &auth.token);
        self.set_json(keys::USER_DATA, &auth.session);
    }

    pub fn clear_session(&self) {
        self.remove(keys::AUTH_TOKEN);
        self.remove(keys::USER_DATA);
    }

    /// Remove everything tied to the signed-in user: token, profile and the
    /// balance visibility preference.
    pub fn clear_all_user_data(&self) {
        self.clear_session();
        self.remove(keys::SHOW_BALANCE);
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some_and(|t| !t.is_empty())
    }

    // =========================================================================
    // FLAGS
    // =========================================================================

    #[must_use]
    pub fn flag(&self, flag: CoordinationFlag) -> bool {
        self.get_json::<bool>(flag.key()).unwrap_or(false)
    }

    pub fn set_flag(&self, flag: CoordinationFlag) {
        self.set_json(flag.key(), &true);
    }

    pub fn clear_flag(&self, flag: CoordinationFlag) {
        self.remove(flag.key());
    }

    /// Read and clear a flag in one step.
    pub fn take_flag(&self, flag: CoordinationFlag) -> bool {
        let set = self.flag(flag);
        if set {
            self.clear_flag(flag);
        }
        set
    }

    #[must_use]
    pub fn flags(&self) -> CoordinationFlags {
        CoordinationFlags {
            local_logout_in_flight: self.flag(CoordinationFlag::LocalLogoutInFlight),
            external_logout_observed: self.flag(CoordinationFlag::ExternalLogoutObserved),
            sync_completed: self.flag(CoordinationFlag::SyncCompleted),
        }
    }

    // =========================================================================
    // PREFERENCES
    // =========================================================================

    #[must_use]
    pub fn show_balance(&self) -> bool {
        self.get_json::<bool>(keys::SHOW_BALANCE).unwrap_or(true)
    }

    pub fn set_show_balance(&self, show: bool) {
        self.set_json(keys::SHOW_BALANCE, &show);
    }

    #[must_use]
    pub fn theme(&self) -> Option<Theme> {
        self.get_json::<Theme>(keys::THEME)
    }

    pub fn set_theme(&self, theme: Theme) {
        self.set_json(keys::THEME, &theme);
    }

    // =========================================================================
    // TOKEN VALIDATION CACHE
    // =========================================================================

    #[must_use]
    pub fn last_validation_ms(&self) -> Option<i64> {
        self.get_json::<i64>(keys::LAST_TOKEN_VALIDATION)
    }

    pub fn set_last_validation_ms(&self, at_ms: i64) {
        self.set_json(keys::LAST_TOKEN_VALIDATION, &at_ms);
    }

    pub fn clear_last_validation(&self) {
        self.remove(keys::LAST_TOKEN_VALIDATION);
    }

    // =========================================================================
    // RAW JSON ACCESS
    // =========================================================================

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get_item(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(%key, error = %e, "storage read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%key, error = %e, "discarding unreadable storage value");
                None
            }
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(%key, error = %e, "storage value not serializable");
                return;
            }
        };
        if let Err(e) = self.backend.set_item(key, &raw) {
            tracing::warn!(%key, error = %e, "storage write failed");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove_item(key) {
            tracing::warn!(%key, error = %e, "storage remove failed");
        }
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
