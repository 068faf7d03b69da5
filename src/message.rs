//! Sync message wire model and its tagged decoder.
//!
//! Wire shape (JSON, posted across origins):
//! `{ "action": "login" | "logout", "token"?: string, "userData"?: Session }`.
//!
//! Inbound payloads are untrusted. [`decode_message`] turns any JSON value
//! into an [`InboundSync`] variant so callers pattern-match instead of
//! probing optional fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{AuthSession, Session};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Login,
    Logout,
}

impl SyncAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }
}

/// Outbound message as posted to a peer origin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub action: SyncAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, rename = "userData", skip_serializing_if = "Option::is_none")]
    pub user_data: Option<Session>,
}

impl SyncMessage {
    #[must_use]
    pub fn login(auth: &AuthSession) -> Self {
        Self { action: SyncAction::Login, token: Some(auth.token.clone()), user_data: Some(auth.session.clone()) }
    }

    #[must_use]
    pub fn logout() -> Self {
        Self { action: SyncAction::Logout, token: None, user_data: None }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        // Plain strings and an enum tag always serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Why an inbound payload was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidReason {
    /// Sender origin is not a configured peer.
    UntrustedOrigin,
    NotAnObject,
    UnknownAction,
    /// `login` without a non-empty token and complete profile.
    MissingCredentials,
    /// `logout` carrying a token or profile.
    UnexpectedCredentials,
}

/// Decoded inbound sync payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundSync {
    Login(AuthSession),
    Logout,
    Invalid(InvalidReason),
}

impl InboundSync {
    #[must_use]
    pub fn action(&self) -> Option<SyncAction> {
        match self {
            Self::Login(_) => Some(SyncAction::Login),
            Self::Logout => Some(SyncAction::Logout),
            Self::Invalid(_) => None,
        }
    }
}

/// Classify an untrusted JSON payload. Never fails.
#[must_use]
pub fn decode_message(value: &Value) -> InboundSync {
    let Some(obj) = value.as_object() else {
        return InboundSync::Invalid(InvalidReason::NotAnObject);
    };

    let present = |key: &str| obj.get(key).is_some_and(|v| !v.is_null());

    match obj.get("action").and_then(Value::as_str) {
        Some("login") => {
            let token = obj.get("token").and_then(Value::as_str).unwrap_or_default();
            let session = obj
                .get("userData")
                .cloned()
                .and_then(|v| serde_json::from_value::<Session>(v).ok());
            match session {
                Some(session) => {
                    let auth = AuthSession::new(token, session);
                    if auth.is_complete() {
                        InboundSync::Login(auth)
                    } else {
                        InboundSync::Invalid(InvalidReason::MissingCredentials)
                    }
                }
                None => InboundSync::Invalid(InvalidReason::MissingCredentials),
            }
        }
        Some("logout") if present("token") || present("userData") => {
            InboundSync::Invalid(InvalidReason::UnexpectedCredentials)
        }
        Some("logout") => InboundSync::Logout,
        _ => InboundSync::Invalid(InvalidReason::UnknownAction),
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
