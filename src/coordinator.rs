//! Synchronization coordinator: the one component that writes the session.
//!
//! SYSTEM CONTEXT
//! ==============
//! Each app instance owns one coordinator. It composes the durable store, the
//! fragment codec, the peer link, the event bus and the in-memory container,
//! and is the only place where a change of "who is signed in" is decided.
//!
//! ```text
//!   reconcile/refresh      sign_in/login         sign_out/revalidate
//!         |                     |                        |
//!   fragment -> store     store -> bus -> peer     store -> bus -> api -> peer
//!         |                     |                        |
//!         +--------> container + bus (UI reads) <--------+
//!                               ^
//!                    apply_inbound (guarded, never sends)
//! ```
//!
//! DESIGN
//! ======
//! - Only `sign_in`, `sign_out` and an expiring `revalidate` call the peer
//!   link. Inbound messages, handoffs and storage-derived changes run under the
//!   bus's external-update guard and never reach the sender; `notify_peer`
//!   also refuses to send while the guard is engaged.
//! - Every reconciliation re-reads durable storage instead of trusting the
//!   last message, so a delayed or reordered delivery heals on the next page
//!   load or refresh.
//!
//! ERROR HANDLING
//! ==============
//! Peer and remote-invalidation failures are logged and reported in the
//! return value; they never undo a local change. Only `login`/`register`
//! (before anything is written) and `sign_in` with an incomplete session
//! return `Err`.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::account::{AccountApi, AccountError, LoginRequest, RegisterRequest};
use crate::bus::EventBus;
use crate::config::SyncConfig;
use crate::container::{AuthState, SessionContainer, SyncState};
use crate::fragment::{self, Handoff, HandoffKind};
use crate::message::{InboundSync, SyncMessage};
use crate::receiver::{MessageSource, MessageSubscription, Receiver};
use crate::session::{AuthSession, Session};
use crate::store::{CoordinationFlag, KeyValueStorage, SessionStore, StoredSession};
use crate::transport::{Delivery, PeerLink};
use crate::validation::{TokenValidator, Validation};

// =============================================================================
// ADDRESS BAR
// =============================================================================

/// The current page URL's fragment.
pub trait AddressBar {
    /// Current fragment including its `#`, or an empty string.
    fn fragment(&self) -> String;

    /// Rewrite the fragment in place, without navigating or adding a history
    /// entry. An empty string removes it.
    fn replace_fragment(&self, fragment: &str);
}

/// Address bar backed by a plain string.
#[derive(Clone, Debug, Default)]
pub struct MemoryAddressBar {
    url: Rc<RefCell<String>>,
}

impl MemoryAddressBar {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: Rc::new(RefCell::new(url.into())) }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.url.borrow().clone()
    }

    pub fn navigate(&self, url: impl Into<String>) {
        *self.url.borrow_mut() = url.into();
    }
}

impl AddressBar for MemoryAddressBar {
    fn fragment(&self) -> String {
        fragment::split_url(&self.url.borrow()).1.to_owned()
    }

    fn replace_fragment(&self, fragment: &str) {
        let base = fragment::split_url(&self.url.borrow()).0.to_owned();
        *self.url.borrow_mut() = format!("{base}{fragment}");
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Platform services a coordinator runs on.
#[derive(Clone)]
pub struct SyncBackends {
    pub storage: Rc<dyn KeyValueStorage>,
    pub account: Rc<dyn AccountApi>,
    pub link: Rc<dyn PeerLink>,
    pub address: Rc<dyn AddressBar>,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("session is missing a token or profile field")]
    IncompleteSession,
    #[error("user name must not be blank")]
    BlankUserName,
    #[error("no user is signed in")]
    NotSignedIn,
    #[error(transparent)]
    Account(#[from] AccountError),
}

/// Which input decided a reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileSource {
    Fragment,
    /// Both logout flags were set; resolved to signed out.
    FlagConflict,
    ExternalLogout,
    /// A logout of this origin was cut short (page closed) and was finished.
    InterruptedLogout,
    Storage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    pub state: SyncState,
    pub source: ReconcileSource,
    /// A `syncCompleted` marker was found (and cleared). Diagnostic only.
    pub handoff_observed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteInvalidation {
    Confirmed,
    Failed(AccountError),
    /// No token to invalidate, or invalidation not attempted.
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignOutReport {
    pub remote: RemoteInvalidation,
    /// `None` when no peer is configured for this origin.
    pub peer: Option<Delivery>,
}

// =============================================================================
// COORDINATOR
// =============================================================================

struct CoordinatorInner {
    config: SyncConfig,
    store: SessionStore,
    bus: EventBus,
    container: SessionContainer,
    validator: TokenValidator,
    receiver: Receiver,
    account: Rc<dyn AccountApi>,
    link: Rc<dyn PeerLink>,
    address: Rc<dyn AddressBar>,
    logging_out: Cell<bool>,
}

#[derive(Clone)]
pub struct Coordinator {
    inner: Rc<CoordinatorInner>,
}

impl Coordinator {
    pub fn new(config: SyncConfig, backends: SyncBackends) -> Self {
        let store = SessionStore::new(backends.storage);
        let validator = TokenValidator::new(store.clone(), Rc::clone(&backends.account), config.validation_ttl_ms);
        let receiver = Receiver::from_config(&config);
        Self {
            inner: Rc::new(CoordinatorInner {
                config,
                store,
                bus: EventBus::new(),
                container: SessionContainer::new(),
                validator,
                receiver,
                account: backends.account,
                link: backends.link,
                address: backends.address,
                logging_out: Cell::new(false),
            }),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    #[must_use]
    pub fn container(&self) -> &SessionContainer {
        &self.inner.container
    }

    #[must_use]
    pub fn validator(&self) -> &TokenValidator {
        &self.inner.validator
    }

    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.inner.container.snapshot()
    }

    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.inner.container.session()
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.inner.container.state()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.inner.container.is_logged_in()
    }

    // =========================================================================
    // RECONCILIATION
    // =========================================================================

    /// Start-up reconciliation: fragment handoff first, then durable storage.
    pub fn reconcile(&self) -> Reconciliation {
        self.reconcile_from(true)
    }

    /// Re-derive state from durable storage alone, after another context of
    /// this origin changed it.
    pub fn refresh(&self) -> Reconciliation {
        self.reconcile_from(false)
    }

    fn reconcile_from(&self, read_fragment: bool) -> Reconciliation {
        let store = &self.inner.store;
        let handoff_observed = store.take_flag(CoordinationFlag::SyncCompleted);
        let flags = store.flags();
        let done = |state, source| Reconciliation { state, source, handoff_observed };

        if flags.is_conflicting() {
            tracing::warn!("both logout flags set; resolving to signed out");
            self.wipe_local();
            if read_fragment {
                self.strip_fragment(HandoffKind::Auth);
                self.strip_fragment(HandoffKind::Logout);
            }
            self.settle(None, true);
            return done(SyncState::SignedOut, ReconcileSource::FlagConflict);
        }

        if read_fragment {
            match fragment::decode(&self.inner.address.fragment()) {
                Handoff::Auth(auth) => {
                    store.set_session(&auth);
                    store.clear_flag(CoordinationFlag::ExternalLogoutObserved);
                    store.clear_flag(CoordinationFlag::LocalLogoutInFlight);
                    self.strip_fragment(HandoffKind::Auth);
                    tracing::info!(account_id = %auth.session.account_id, "session restored from handoff");
                    self.announce(Some(auth.session), true);
                    return done(SyncState::SignedIn, ReconcileSource::Fragment);
                }
                Handoff::Logout => {
                    self.wipe_local();
                    self.strip_fragment(HandoffKind::Logout);
                    tracing::info!("logout handoff applied");
                    self.announce(None, true);
                    return done(SyncState::SignedOut, ReconcileSource::Fragment);
                }
                Handoff::None => {}
            }
        }

        if flags.external_logout_observed {
            store.clear_all_user_data();
            self.inner.validator.clear();
            self.settle(None, true);
            store.clear_flag(CoordinationFlag::ExternalLogoutObserved);
            tracing::info!("applied logout observed from another origin");
            return done(SyncState::SignedOut, ReconcileSource::ExternalLogout);
        }

        if flags.local_logout_in_flight && !self.inner.logging_out.get() {
            store.clear_all_user_data();
            store.clear_flag(CoordinationFlag::LocalLogoutInFlight);
            self.settle(None, true);
            tracing::info!("finished interrupted logout");
            return done(SyncState::SignedOut, ReconcileSource::InterruptedLogout);
        }

        if self.inner.logging_out.get() {
            return done(SyncState::LoggingOut, ReconcileSource::Storage);
        }

        match store.stored_session() {
            StoredSession::Complete(auth) => {
                self.settle(Some(auth.session), true);
                done(SyncState::SignedIn, ReconcileSource::Storage)
            }
            StoredSession::Partial => {
                tracing::warn!("discarding partial stored session");
                store.clear_session();
                self.settle(None, true);
                done(SyncState::SignedOut, ReconcileSource::Storage)
            }
            StoredSession::Absent => {
                self.settle(None, true);
                done(SyncState::SignedOut, ReconcileSource::Storage)
            }
        }
    }

    // =========================================================================
    // SIGN IN
    // =========================================================================

    /// Persist and publish a session, then notify the peer.
    ///
    /// # Errors
    ///
    /// [`SyncError::IncompleteSession`] when the token or any profile field
    /// is blank. Nothing is written in that case.
    pub async fn sign_in(&self, auth: AuthSession) -> Result<Option<Delivery>, SyncError> {
        if !auth.is_complete() {
            return Err(SyncError::IncompleteSession);
        }
        let store = &self.inner.store;
        store.set_session(&auth);
        store.clear_flag(CoordinationFlag::ExternalLogoutObserved);
        tracing::info!(account_id = %auth.session.account_id, "signed in");
        self.announce(Some(auth.session.clone()), false);

        Ok(self.notify_peer(SyncMessage::login(&auth)).await)
    }

    /// Authenticate against the account API, fetch the profile and sign in.
    ///
    /// # Errors
    ///
    /// [`SyncError::Account`] when either API call fails; no state changes.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<Delivery>, SyncError> {
        let request = LoginRequest { email: email.to_owned(), password: password.to_owned() };
        let token = self.inner.account.login(&request).await?;
        let session = self.inner.account.fetch_profile(&token).await?;
        self.sign_in(AuthSession::new(token, session)).await
    }

    /// Create an account, then sign in with the same credentials.
    ///
    /// # Errors
    ///
    /// [`SyncError::Account`] when registration or the follow-up login fails.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Option<Delivery>, SyncError> {
        let request =
            RegisterRequest { username: username.to_owned(), email: email.to_owned(), password: password.to_owned() };
        let user = self.inner.account.register(&request).await?;
        tracing::info!(user_id = %user.id, "account registered");
        self.login(email, password).await
    }

    // =========================================================================
    // PROFILE
    // =========================================================================

    /// Rename the signed-in user in place. Same-origin only; the peer picks
    /// the new name up with the next login or handoff.
    ///
    /// # Errors
    ///
    /// [`SyncError::BlankUserName`] for a blank name and
    /// [`SyncError::NotSignedIn`] without a complete stored session.
    pub fn update_user_name(&self, user_name: &str) -> Result<Session, SyncError> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(SyncError::BlankUserName);
        }
        if self.inner.logging_out.get() {
            return Err(SyncError::NotSignedIn);
        }
        let Some(mut auth) = self.inner.store.session() else {
            return Err(SyncError::NotSignedIn);
        };
        auth.session.user_name = user_name.to_owned();
        self.inner.store.set_session(&auth);
        tracing::info!(account_id = %auth.session.account_id, "user name updated");
        self.announce(Some(auth.session.clone()), false);
        Ok(auth.session)
    }

    // =========================================================================
    // SIGN OUT
    // =========================================================================

    /// Clear locally, invalidate remotely (best effort, one retry), notify the
    /// peer, settle signed out.
    pub async fn sign_out(&self) -> SignOutReport {
        self.end_session(true).await
    }

    /// Check the stored token with the account API (cached). A rejected token
    /// ends the session locally and at the peer, without a remote logout.
    pub async fn revalidate(&self, now_ms: i64) -> Validation {
        let result = self.inner.validator.validate_cached(now_ms).await;
        if !result.keeps_session() {
            tracing::info!("session expired by account api");
            self.end_session(false).await;
        }
        result
    }

    async fn end_session(&self, invalidate_remotely: bool) -> SignOutReport {
        let store = &self.inner.store;
        self.inner.logging_out.set(true);
        store.clear_flag(CoordinationFlag::ExternalLogoutObserved);
        store.set_flag(CoordinationFlag::LocalLogoutInFlight);

        let token = store.token();
        store.clear_all_user_data();
        self.inner.validator.clear();
        self.inner.container.set_logging_out();
        self.inner.bus.publish(None);
        tracing::info!("signed out locally");

        let remote = match token {
            Some(token) if invalidate_remotely => self.invalidate_remotely(&token).await,
            _ => RemoteInvalidation::Skipped,
        };
        let peer = self.notify_peer(SyncMessage::logout()).await;

        store.clear_flag(CoordinationFlag::LocalLogoutInFlight);
        self.inner.logging_out.set(false);
        self.inner.container.set_signed_out();
        SignOutReport { remote, peer }
    }

    async fn invalidate_remotely(&self, token: &str) -> RemoteInvalidation {
        let account = &self.inner.account;
        match account.logout(token).await {
            Ok(()) => RemoteInvalidation::Confirmed,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "remote logout failed; retrying once");
                match account.logout(token).await {
                    Ok(()) => RemoteInvalidation::Confirmed,
                    Err(e) => {
                        tracing::warn!(error = %e, "remote logout failed again; token left to expire");
                        RemoteInvalidation::Failed(e)
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote logout rejected");
                RemoteInvalidation::Failed(e)
            }
        }
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Apply a screened peer message. Never sends anything.
    ///
    /// Returns the resulting state, or `None` when the message was ignored (an
    /// invalid message, or the echo of this origin's own logout).
    pub fn apply_inbound(&self, inbound: InboundSync) -> Option<SyncState> {
        let store = &self.inner.store;
        match inbound {
            InboundSync::Login(auth) => {
                let _guard = self.inner.bus.external_scope();
                store.set_session(&auth);
                store.clear_flag(CoordinationFlag::ExternalLogoutObserved);
                if !self.inner.logging_out.get() {
                    store.clear_flag(CoordinationFlag::LocalLogoutInFlight);
                }
                tracing::info!(account_id = %auth.session.account_id, "session received from peer");
                self.announce(Some(auth.session), true);
                Some(SyncState::SignedIn)
            }
            InboundSync::Logout => {
                if store.flag(CoordinationFlag::LocalLogoutInFlight) {
                    tracing::debug!("ignoring echo of own logout");
                    return None;
                }
                let _guard = self.inner.bus.external_scope();
                store.clear_all_user_data();
                self.inner.validator.clear();
                self.announce(None, true);
                store.clear_flag(CoordinationFlag::ExternalLogoutObserved);
                tracing::info!("logout received from peer");
                Some(SyncState::SignedOut)
            }
            InboundSync::Invalid(_) => None,
        }
    }

    /// Apply trusted messages arriving on `source` until the subscription is
    /// dropped.
    pub fn listen(&self, source: &dyn MessageSource) -> MessageSubscription {
        let weak: Weak<CoordinatorInner> = Rc::downgrade(&self.inner);
        self.inner.receiver.listen(source, move |inbound| {
            if let Some(inner) = weak.upgrade() {
                Coordinator { inner }.apply_inbound(inbound);
            }
        })
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// URL for navigating to another app: carries the session as an auth
    /// handoff when signed in, otherwise the bare target.
    #[must_use]
    pub fn handoff_url(&self, target: &str) -> String {
        match self.inner.store.session() {
            Some(auth) => fragment::auth_url(target, &auth.token, &auth.session),
            None => fragment::split_url(target).0.to_owned(),
        }
    }

    #[must_use]
    pub fn logout_url(&self, target: &str) -> String {
        fragment::logout_url(target)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn notify_peer(&self, message: SyncMessage) -> Option<Delivery> {
        if self.inner.bus.is_applying_external_update() {
            tracing::debug!(action = message.action.as_str(), "not forwarding during external update");
            return None;
        }
        let Some(peer) = self.inner.config.peer().cloned() else {
            tracing::debug!(action = message.action.as_str(), "no sync peer for this origin");
            return None;
        };
        let delivery = self.inner.link.send(&peer, message).await;
        if !delivery.is_delivered() {
            tracing::warn!(%peer, ?delivery, "peer not notified; it will catch up on its next reconciliation");
        }
        Some(delivery)
    }

    /// Clear session data and every logout flag.
    fn wipe_local(&self) {
        let store = &self.inner.store;
        store.clear_all_user_data();
        store.clear_flag(CoordinationFlag::LocalLogoutInFlight);
        store.clear_flag(CoordinationFlag::ExternalLogoutObserved);
        self.inner.validator.clear();
    }

    fn strip_fragment(&self, kind: HandoffKind) {
        let address = &self.inner.address;
        let current = address.fragment();
        let stripped = fragment::strip(&current, kind);
        if stripped != current {
            address.replace_fragment(&stripped);
        }
    }

    /// Update the container and always publish.
    fn announce(&self, session: Option<Session>, external: bool) {
        match &session {
            Some(s) => self.inner.container.set_signed_in(s.clone()),
            None => self.inner.container.set_signed_out(),
        }
        let _guard = external.then(|| self.inner.bus.external_scope());
        self.inner.bus.publish(session);
    }

    /// Update the container; publish only when something visible changed.
    fn settle(&self, session: Option<Session>, external: bool) {
        let before = self.inner.container.snapshot();
        let settled = matches!(before.state, SyncState::SignedIn | SyncState::SignedOut);
        let unchanged = settled && before.session == session;
        if unchanged {
            return;
        }
        self.announce(session, external);
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
