//! Three apps of the suite wired through one in-memory loopback hub.
//!
//! Every app gets its own storage, address bar and coordinator, and hosts a
//! receiver endpoint that writes to that same storage. Deliveries go through
//! the real `FrameSender` over loopback channels, so timing and teardown
//! behave as they do with iframes.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use bytebank_sync::account::{AccountApi, AccountError, LoginRequest, RegisterRequest, RemoteUser, TokenStatus};
use bytebank_sync::coordinator::MemoryAddressBar;
use bytebank_sync::endpoint::ReceiverEndpoint;
use bytebank_sync::loopback::LoopbackHub;
use bytebank_sync::store::{MemoryStorage, SessionStore};
use bytebank_sync::transport::{FrameSender, Timer};
use bytebank_sync::{AppKind, AuthSession, Coordinator, Session, SyncBackends, SyncConfig};

pub struct TokioTimer;

#[async_trait::async_trait(?Send)]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub fn profile() -> Session {
    Session::new("Ana Souza", "ana@bytebank.test", "acc-1")
}

pub fn auth() -> AuthSession {
    AuthSession::new("t1", profile())
}

/// Account API that always accepts, except for scripted logout failures.
#[derive(Default)]
pub struct StubAccount {
    logout_results: RefCell<VecDeque<Result<(), AccountError>>>,
    logouts: Cell<usize>,
}

impl StubAccount {
    pub fn fail_next_logout(&self, error: AccountError) {
        self.logout_results.borrow_mut().push_back(Err(error));
    }

    pub fn logouts(&self) -> usize {
        self.logouts.get()
    }
}

#[async_trait::async_trait(?Send)]
impl AccountApi for StubAccount {
    async fn register(&self, request: &RegisterRequest) -> Result<RemoteUser, AccountError> {
        Ok(RemoteUser { id: "u1".into(), username: request.username.clone(), email: request.email.clone() })
    }

    async fn login(&self, _request: &LoginRequest) -> Result<String, AccountError> {
        Ok("t1".to_owned())
    }

    async fn fetch_profile(&self, _token: &str) -> Result<Session, AccountError> {
        Ok(profile())
    }

    async fn logout(&self, _token: &str) -> Result<(), AccountError> {
        self.logouts.set(self.logouts.get() + 1);
        self.logout_results.borrow_mut().pop_front().unwrap_or(Ok(()))
    }

    async fn validate_token(&self, _token: &str) -> Result<TokenStatus, AccountError> {
        Ok(TokenStatus { valid: true, user: None })
    }
}

pub struct App {
    pub kind: AppKind,
    pub config: SyncConfig,
    pub storage: MemoryStorage,
    pub address: MemoryAddressBar,
    pub account: Rc<StubAccount>,
    pub coordinator: Coordinator,
}

impl App {
    pub fn store(&self) -> SessionStore {
        SessionStore::new(Rc::new(self.storage.clone()))
    }

    /// Simulate a full page load at `url`: fresh in-memory state over the
    /// same storage.
    pub fn reload(&mut self, hub: &LoopbackHub, url: &str) {
        self.address.navigate(url);
        self.coordinator = coordinator(hub, &self.config, &self.storage, &self.address, &self.account);
    }
}

pub struct Suite {
    pub hub: LoopbackHub,
    pub home: App,
    pub investments: App,
    pub cards: App,
}

/// Route library logs to the test harness; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

impl Suite {
    pub fn new() -> Self {
        init_tracing();
        let hub = LoopbackHub::new();
        let base = SyncConfig::from_lookup("http://localhost:3000", |_| None).expect("default config");
        let home = app(&hub, &base, AppKind::Home);
        let investments = app(&hub, &base, AppKind::Investments);
        let cards = app(&hub, &base, AppKind::Cards);
        Self { hub, home, investments, cards }
    }
}

fn app(hub: &LoopbackHub, base: &SyncConfig, kind: AppKind) -> App {
    let config = base.for_app(kind);
    let storage = MemoryStorage::new();
    let address = MemoryAddressBar::new(config.current.join(kind.landing_path()));
    let account = Rc::new(StubAccount::default());

    let page_config = config.clone();
    let page_storage = storage.clone();
    hub.host(config.current.clone(), move |window| {
        ReceiverEndpoint::new(page_config.clone(), Rc::new(page_storage.clone())).mount(window)
    });

    let coordinator = coordinator(hub, &config, &storage, &address, &account);
    App { kind, config, storage, address, account, coordinator }
}

pub fn coordinator(
    hub: &LoopbackHub,
    config: &SyncConfig,
    storage: &MemoryStorage,
    address: &MemoryAddressBar,
    account: &Rc<StubAccount>,
) -> Coordinator {
    let link = FrameSender::new(Rc::new(hub.opener(config.current.clone())), Rc::new(TokioTimer), config);
    Coordinator::new(
        config.clone(),
        SyncBackends {
            storage: Rc::new(storage.clone()),
            account: Rc::clone(account) as Rc<dyn AccountApi>,
            link: Rc::new(link),
            address: Rc::new(address.clone()),
        },
    )
}
