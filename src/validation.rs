//! Opportunistic server-side token validation with a short result cache.
//!
//! A successful check is remembered (as a timestamp in the origin's storage)
//! for the configured TTL, so navigating around the app does not hit the
//! account API on every action.

use std::rc::Rc;

use crate::account::{AccountApi, AccountError, RemoteUser};
use crate::store::SessionStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validation {
    /// A recent successful check is still fresh.
    Cached,
    Valid(Option<RemoteUser>),
    /// The server rejected the token; the session should end.
    Invalid,
    /// The server could not be asked. Treated as valid.
    Unreachable,
    /// No token stored; nothing to validate.
    NoSession,
}

impl Validation {
    /// True unless the server positively rejected the token.
    #[must_use]
    pub fn keeps_session(&self) -> bool {
        !matches!(self, Self::Invalid)
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    store: SessionStore,
    api: Rc<dyn AccountApi>,
    ttl_ms: i64,
}

impl TokenValidator {
    pub fn new(store: SessionStore, api: Rc<dyn AccountApi>, ttl_ms: i64) -> Self {
        Self { store, api, ttl_ms }
    }

    /// True when no successful check happened within the TTL before `now_ms`.
    #[must_use]
    pub fn needs_validation(&self, now_ms: i64) -> bool {
        match self.store.last_validation_ms() {
            Some(last) => {
                let elapsed = now_ms - last;
                !(0..self.ttl_ms).contains(&elapsed)
            }
            None => true,
        }
    }

    /// Validate unless a fresh result is cached. Network trouble keeps the
    /// session.
    pub async fn validate_cached(&self, now_ms: i64) -> Validation {
        let Some(token) = self.store.token() else {
            return Validation::NoSession;
        };
        if !self.needs_validation(now_ms) {
            return Validation::Cached;
        }
        match self.api.validate_token(&token).await {
            Ok(status) if status.valid => {
                self.store.set_last_validation_ms(now_ms);
                Validation::Valid(status.user)
            }
            Ok(_) | Err(AccountError::Unauthorized) => {
                self.store.clear_last_validation();
                tracing::info!("stored token rejected by account api");
                Validation::Invalid
            }
            Err(e) => {
                tracing::warn!(error = %e, "token validation skipped");
                Validation::Unreachable
            }
        }
    }

    /// Validate regardless of the cache. Any failure counts as invalid.
    pub async fn force_validate(&self, now_ms: i64) -> Validation {
        let Some(token) = self.store.token() else {
            return Validation::NoSession;
        };
        match self.api.validate_token(&token).await {
            Ok(status) if status.valid => {
                self.store.set_last_validation_ms(now_ms);
                Validation::Valid(status.user)
            }
            Ok(_) => {
                self.store.clear_last_validation();
                Validation::Invalid
            }
            Err(e) => {
                tracing::warn!(error = %e, "forced token validation failed");
                self.store.clear_last_validation();
                Validation::Invalid
            }
        }
    }

    pub fn clear(&self) {
        self.store.clear_last_validation();
    }
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
