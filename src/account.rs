//! Remote account API contract.
//!
//! The coordinator consumes the API only through [`AccountApi`]; the browser
//! build implements it over `gloo-net`, the CLI over `reqwest`, tests with
//! fakes. Response bodies are parsed here so every implementation agrees on
//! the wire format:
//!
//! - `POST /user`                 -> `{ result: { id, username, email } }`
//! - `POST /user/auth`            -> `{ result: { token } }`
//! - `GET  /account`              -> `{ result: { userInfo: { username, email }, account: [{ id }] } }`
//! - `POST /user/logout`          -> `{ message }`
//! - `GET  /user/validate-token`  -> `{ result: { valid, user? } }`
//!
//! Authenticated calls carry `Authorization: Bearer <token>`.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx responses become [`AccountError::Status`] (401 is split out as
//! [`AccountError::Unauthorized`]). [`AccountError::is_transient`] decides
//! whether a best-effort call is worth one retry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::Session;

pub const REGISTER_PATH: &str = "/user";
pub const LOGIN_PATH: &str = "/user/auth";
pub const ACCOUNT_PATH: &str = "/account";
pub const LOGOUT_PATH: &str = "/user/logout";
pub const VALIDATE_TOKEN_PATH: &str = "/user/validate-token";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("account api unreachable: {0}")]
    Network(String),
    #[error("account api returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("token rejected by account api")]
    Unauthorized,
    #[error("unexpected account api response: {0}")]
    Malformed(String),
}

impl AccountError {
    /// Network failures and server-side errors; a retry may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Unauthorized | Self::Malformed(_) => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Server verdict on a bearer token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenStatus {
    pub valid: bool,
    pub user: Option<RemoteUser>,
}

#[async_trait::async_trait(?Send)]
pub trait AccountApi {
    /// # Errors
    ///
    /// Any [`AccountError`]; a 4xx usually means the email is taken.
    async fn register(&self, request: &RegisterRequest) -> Result<RemoteUser, AccountError>;

    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// [`AccountError::Unauthorized`] on bad credentials.
    async fn login(&self, request: &LoginRequest) -> Result<String, AccountError>;

    /// Profile of the token's owner.
    ///
    /// # Errors
    ///
    /// Any [`AccountError`].
    async fn fetch_profile(&self, token: &str) -> Result<Session, AccountError>;

    /// Invalidate `token` server-side.
    ///
    /// # Errors
    ///
    /// Any [`AccountError`].
    async fn logout(&self, token: &str) -> Result<(), AccountError>;

    /// # Errors
    ///
    /// Any [`AccountError`]. A rejected token is `Ok` with `valid == false`.
    async fn validate_token(&self, token: &str) -> Result<TokenStatus, AccountError>;
}

#[must_use]
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

#[must_use]
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Map a non-2xx response to an error, preferring the body's `message`.
#[must_use]
pub fn error_from_status(status: u16, body: &Value) -> AccountError {
    if status == 401 {
        return AccountError::Unauthorized;
    }
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("request failed")
        .to_owned();
    AccountError::Status { status, message }
}

fn result_of(body: &Value) -> Result<&Value, AccountError> {
    body.get("result").ok_or_else(|| AccountError::Malformed("missing result".to_owned()))
}

fn non_empty_str<'a>(value: &'a Value, field: &str) -> Result<&'a str, AccountError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AccountError::Malformed(format!("missing {field}")))
}

/// # Errors
///
/// [`AccountError::Malformed`] when `result.token` is missing or blank.
pub fn parse_login_response(body: &Value) -> Result<String, AccountError> {
    non_empty_str(result_of(body)?, "token").map(str::to_owned)
}

/// # Errors
///
/// [`AccountError::Malformed`] when the body has no `result` object.
pub fn parse_register_response(body: &Value) -> Result<RemoteUser, AccountError> {
    serde_json::from_value(result_of(body)?.clone()).map_err(|e| AccountError::Malformed(e.to_string()))
}

/// Build the session profile from an account response.
///
/// # Errors
///
/// [`AccountError::Malformed`] when the user name, email or first account id
/// is missing. A profile is never filled with placeholders.
pub fn parse_account_response(body: &Value) -> Result<Session, AccountError> {
    let result = result_of(body)?;
    let info = result
        .get("userInfo")
        .ok_or_else(|| AccountError::Malformed("missing userInfo".to_owned()))?;
    let account = result
        .get("account")
        .and_then(Value::as_array)
        .and_then(|accounts| accounts.first())
        .ok_or_else(|| AccountError::Malformed("missing account".to_owned()))?;
    Ok(Session::new(non_empty_str(info, "username")?, non_empty_str(info, "email")?, non_empty_str(account, "id")?))
}

/// # Errors
///
/// [`AccountError::Malformed`] when `result.valid` is not a boolean.
pub fn parse_validation_response(body: &Value) -> Result<TokenStatus, AccountError> {
    let result = result_of(body)?;
    let valid = result
        .get("valid")
        .and_then(Value::as_bool)
        .ok_or_else(|| AccountError::Malformed("missing valid".to_owned()))?;
    let user = result
        .get("user")
        .filter(|u| u.is_object())
        .and_then(|u| serde_json::from_value::<RemoteUser>(u.clone()).ok());
    Ok(TokenStatus { valid, user })
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
