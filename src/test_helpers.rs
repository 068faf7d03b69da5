//! Fakes shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::account::{AccountApi, AccountError, LoginRequest, RegisterRequest, RemoteUser, TokenStatus};
use crate::config::{AppKind, Origin, SyncConfig};
use crate::message::SyncMessage;
use crate::session::{AuthSession, Session};
use crate::transport::{Delivery, PeerLink, Timer};

#[must_use]
pub fn profile() -> Session {
    Session::new("Ana Souza", "ana@bytebank.test", "acc-1")
}

#[must_use]
pub fn auth() -> AuthSession {
    AuthSession::new("t1", profile())
}

#[must_use]
pub fn config(app: AppKind) -> SyncConfig {
    SyncConfig::from_lookup("http://localhost:3000", |_| None).expect("default config").for_app(app)
}

pub struct TokioTimer;

#[async_trait::async_trait(?Send)]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// =========================================================================
// FakeAccountApi
// =========================================================================

/// Scripted account API. Unscripted calls succeed.
#[derive(Clone, Default)]
pub struct FakeAccountApi {
    calls: Rc<RefCell<Vec<String>>>,
    login: Rc<RefCell<VecDeque<Result<String, AccountError>>>>,
    logout: Rc<RefCell<VecDeque<Result<(), AccountError>>>>,
    validate: Rc<RefCell<VecDeque<Result<TokenStatus, AccountError>>>>,
}

impl FakeAccountApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_login(&self, result: Result<String, AccountError>) {
        self.login.borrow_mut().push_back(result);
    }

    pub fn script_logout(&self, result: Result<(), AccountError>) {
        self.logout.borrow_mut().push_back(result);
    }

    pub fn script_validate(&self, result: Result<TokenStatus, AccountError>) {
        self.validate.borrow_mut().push_back(result);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    #[must_use]
    pub fn count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_owned());
    }
}

#[async_trait::async_trait(?Send)]
impl AccountApi for FakeAccountApi {
    async fn register(&self, request: &RegisterRequest) -> Result<RemoteUser, AccountError> {
        self.record("register");
        Ok(RemoteUser { id: "u1".to_owned(), username: request.username.clone(), email: request.email.clone() })
    }

    async fn login(&self, _request: &LoginRequest) -> Result<String, AccountError> {
        self.record("login");
        self.login.borrow_mut().pop_front().unwrap_or_else(|| Ok("t1".to_owned()))
    }

    async fn fetch_profile(&self, _token: &str) -> Result<Session, AccountError> {
        self.record("fetch_profile");
        Ok(profile())
    }

    async fn logout(&self, _token: &str) -> Result<(), AccountError> {
        self.record("logout");
        self.logout.borrow_mut().pop_front().unwrap_or(Ok(()))
    }

    async fn validate_token(&self, _token: &str) -> Result<TokenStatus, AccountError> {
        self.record("validate_token");
        self.validate
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(TokenStatus { valid: true, user: None }))
    }
}

// =========================================================================
// RecordingLink
// =========================================================================

/// Peer link that records every send and resolves immediately.
#[derive(Clone)]
pub struct RecordingLink {
    sent: Rc<RefCell<Vec<(Origin, SyncMessage)>>>,
    outcome: Rc<RefCell<Delivery>>,
}

impl Default for RecordingLink {
    fn default() -> Self {
        Self { sent: Rc::default(), outcome: Rc::new(RefCell::new(Delivery::Delivered)) }
    }
}

impl RecordingLink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outcome(&self, outcome: Delivery) {
        *self.outcome.borrow_mut() = outcome;
    }

    #[must_use]
    pub fn sent(&self) -> Vec<(Origin, SyncMessage)> {
        self.sent.borrow().clone()
    }
}

#[async_trait::async_trait(?Send)]
impl PeerLink for RecordingLink {
    async fn send(&self, target: &Origin, message: SyncMessage) -> Delivery {
        self.sent.borrow_mut().push((target.clone(), message));
        self.outcome.borrow().clone()
    }
}
