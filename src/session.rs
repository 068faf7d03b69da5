//! Signed-in identity shared by every origin.
//!
//! SYSTEM CONTEXT
//! ==============
//! The same JSON shape is written to `localStorage`, carried in fragment
//! handoffs and posted in sync messages, so all apps can read what any one
//! of them wrote.

use serde::{Deserialize, Serialize};

/// Profile of the signed-in user.
///
/// A durable session is either absent or complete; see [`Session::is_complete`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "name", alias = "userName")]
    pub user_name: String,
    pub email: String,
    #[serde(rename = "accountId")]
    pub account_id: String,
}

impl Session {
    pub fn new(user_name: impl Into<String>, email: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self { user_name: user_name.into(), email: email.into(), account_id: account_id.into() }
    }

    /// True when every profile field is non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.user_name.trim().is_empty() && !self.email.trim().is_empty() && !self.account_id.trim().is_empty()
    }
}

/// A bearer token together with the profile it was issued for.
///
/// Serialized as `{ "token": ..., "userData": {...} }`, the payload format of
/// the `#auth=` fragment handoff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(rename = "userData")]
    pub session: Session,
}

impl AuthSession {
    pub fn new(token: impl Into<String>, session: Session) -> Self {
        Self { token: token.into(), session }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.token.trim().is_empty() && self.session.is_complete()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
