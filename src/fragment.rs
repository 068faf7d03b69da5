//! URL-fragment handoff codec.
//!
//! A full-page navigation between apps carries the session in the fragment,
//! which never reaches a server:
//!
//! - login: `#auth=<percent-encoded {"token":..,"userData":{..}}>`
//! - logout: `#logout=true`
//!
//! The older `#token=<enc>&user=<enc-json>` pair is still decoded. Fragments
//! may mix these parameters with unrelated application state (`&`-separated);
//! [`strip`] removes only the recognized parameters.
//!
//! ERROR HANDLING
//! ==============
//! Decoding is total: truncated, tampered or foreign fragments decode to
//! [`Handoff::None`].

use crate::session::{AuthSession, Session};

const AUTH_KEY: &str = "auth";
const TOKEN_KEY: &str = "token";
const USER_KEY: &str = "user";
const LOGOUT_KEY: &str = "logout";
const LOGOUT_VALUE: &str = "true";

/// Decoded fragment payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Handoff {
    Auth(AuthSession),
    Logout,
    None,
}

impl Handoff {
    #[must_use]
    pub fn kind(&self) -> Option<HandoffKind> {
        match self {
            Self::Auth(_) => Some(HandoffKind::Auth),
            Self::Logout => Some(HandoffKind::Logout),
            Self::None => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffKind {
    Auth,
    Logout,
}

impl HandoffKind {
    fn owns(self, key: &str, value: &str) -> bool {
        match self {
            Self::Auth => key == AUTH_KEY || key == TOKEN_KEY || key == USER_KEY,
            Self::Logout => key == LOGOUT_KEY && value == LOGOUT_VALUE,
        }
    }
}

/// Fragment (with leading `#`) carrying a login handoff.
#[must_use]
pub fn encode_auth(token: &str, session: &Session) -> String {
    let payload = AuthSession::new(token, session.clone());
    // Serializing a struct of plain strings cannot fail.
    let json = serde_json::to_string(&payload).unwrap_or_default();
    format!("#{AUTH_KEY}={}", urlencoding::encode(&json))
}

/// Fragment (with leading `#`) carrying a logout handoff.
#[must_use]
pub fn encode_logout() -> String {
    format!("#{LOGOUT_KEY}={LOGOUT_VALUE}")
}

/// `base` with any existing fragment replaced by a login handoff.
#[must_use]
pub fn auth_url(base: &str, token: &str, session: &Session) -> String {
    let (base, _) = split_url(base);
    format!("{base}{}", encode_auth(token, session))
}

/// `base` with any existing fragment replaced by a logout handoff.
#[must_use]
pub fn logout_url(base: &str) -> String {
    let (base, _) = split_url(base);
    format!("{base}{}", encode_logout())
}

/// Split a URL into everything before the fragment and the fragment itself
/// (including its `#`, or empty).
#[must_use]
pub fn split_url(url: &str) -> (&str, &str) {
    match url.find('#') {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    }
}

/// Decode a fragment, with or without its leading `#`.
#[must_use]
pub fn decode(fragment: &str) -> Handoff {
    let params = parse_params(fragment);

    if let Some(raw) = param(&params, AUTH_KEY) {
        if let Some(auth) = decode_auth_payload(raw) {
            return Handoff::Auth(auth);
        }
    }

    if let (Some(token), Some(user)) = (param(&params, TOKEN_KEY), param(&params, USER_KEY)) {
        if let Some(auth) = decode_legacy_pair(token, user) {
            return Handoff::Auth(auth);
        }
    }

    if params.iter().any(|(k, v)| HandoffKind::Logout.owns(k, v)) {
        return Handoff::Logout;
    }

    Handoff::None
}

/// Remove the parameters of `kind` from `fragment`, keeping everything else
/// in order. Returns the remaining fragment with its `#`, or an empty string.
#[must_use]
pub fn strip(fragment: &str, kind: HandoffKind) -> String {
    let body = fragment.strip_prefix('#').unwrap_or(fragment);
    let kept: Vec<&str> = body
        .split('&')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| {
            let (key, value) = segment.split_once('=').unwrap_or((*segment, ""));
            !kind.owns(key, value)
        })
        .collect();
    if kept.is_empty() { String::new() } else { format!("#{}", kept.join("&")) }
}

fn parse_params(fragment: &str) -> Vec<(&str, &str)> {
    let body = fragment.strip_prefix('#').unwrap_or(fragment);
    body.split('&')
        .filter_map(|segment| segment.split_once('='))
        .collect()
}

fn param<'a>(params: &[(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, v)| *k == key && !v.is_empty()).map(|(_, v)| *v)
}

fn decode_auth_payload(raw: &str) -> Option<AuthSession> {
    let json = urlencoding::decode(raw).ok()?;
    let auth: AuthSession = serde_json::from_str(&json).ok()?;
    auth.is_complete().then_some(auth)
}

fn decode_legacy_pair(token: &str, user: &str) -> Option<AuthSession> {
    let token = urlencoding::decode(token).ok()?;
    let user = urlencoding::decode(user).ok()?;
    let session: Session = serde_json::from_str(&user).ok()?;
    let auth = AuthSession::new(token.into_owned(), session);
    auth.is_complete().then_some(auth)
}

#[cfg(test)]
#[path = "fragment_test.rs"]
mod tests;
