//! Session provider component.
//!
//! SYSTEM CONTEXT
//! ==============
//! Mounted once at the root of each micro-frontend. It owns the page's
//! [`Coordinator`], mirrors its container into an `RwSignal<AuthState>` that
//! components read through context, and wires the browser event feeds.
//!
//! DESIGN
//! ======
//! - The coordinator is `!Send`, so it lives in a local `StoredValue`; the
//!   context value is a `Copy` handle.
//! - The signal is refreshed from the container on every bus event and after
//!   each async operation completes. Logout settles to signed-out without a
//!   second bus event, so the explicit refresh is required there.
//! - On the server the provider renders its children with the loading state
//!   and never touches storage.

use leptos::prelude::*;
use leptos::reactive::owner::LocalStorage;

use crate::container::{AuthState, SyncState};
use crate::coordinator::Coordinator;

/// Context handle for the page's session.
#[derive(Clone, Copy)]
pub struct SessionSync {
    auth: RwSignal<AuthState>,
    coordinator: StoredValue<Option<Coordinator>, LocalStorage>,
}

impl SessionSync {
    #[must_use]
    pub fn new() -> Self {
        Self { auth: RwSignal::new(AuthState::default()), coordinator: StoredValue::new_local(None) }
    }

    /// Adopt `coordinator` and mirror every bus event into the signal.
    pub fn attach(&self, coordinator: Coordinator) {
        let container = coordinator.container().clone();
        let auth = self.auth;
        coordinator.bus().subscribe(move |_| auth.set(container.snapshot())).detach();
        self.coordinator.set_value(Some(coordinator));
        self.refresh_signal();
    }

    #[must_use]
    pub fn auth(&self) -> RwSignal<AuthState> {
        self.auth
    }

    #[must_use]
    pub fn coordinator(&self) -> Option<Coordinator> {
        self.coordinator.with_value(Clone::clone)
    }

    /// Copy the container into the signal.
    pub fn refresh_signal(&self) {
        if let Some(coordinator) = self.coordinator() {
            self.auth.set(coordinator.auth_state());
        }
    }

    /// Link to another app, carrying the session when signed in.
    #[must_use]
    pub fn handoff_url(&self, target: &str) -> String {
        self.coordinator().map_or_else(|| target.to_owned(), |c| c.handoff_url(target))
    }

    /// Sign in with credentials; `on_done` receives a user-facing error.
    pub fn login(&self, email: String, password: String, on_done: impl FnOnce(Result<(), String>) + 'static) {
        let Some(coordinator) = self.coordinator() else {
            on_done(Err("session sync unavailable".to_owned()));
            return;
        };
        let this = *self;
        run(async move {
            let result = coordinator.login(&email, &password).await.map(|_| ()).map_err(|e| e.to_string());
            this.refresh_signal();
            on_done(result);
        });
    }

    pub fn register(
        &self,
        username: String,
        email: String,
        password: String,
        on_done: impl FnOnce(Result<(), String>) + 'static,
    ) {
        let Some(coordinator) = self.coordinator() else {
            on_done(Err("session sync unavailable".to_owned()));
            return;
        };
        let this = *self;
        run(async move {
            let result =
                coordinator.register(&username, &email, &password).await.map(|_| ()).map_err(|e| e.to_string());
            this.refresh_signal();
            on_done(result);
        });
    }

    /// Rename the signed-in user; the error is user-facing.
    pub fn rename(&self, user_name: &str) -> Result<(), String> {
        let coordinator = self.coordinator().ok_or_else(|| "session sync unavailable".to_owned())?;
        coordinator.update_user_name(user_name).map(|_| ()).map_err(|e| e.to_string())
    }

    pub fn sign_out(&self) {
        let Some(coordinator) = self.coordinator() else {
            return;
        };
        let this = *self;
        run(async move {
            let report = coordinator.sign_out().await;
            tracing::debug!(?report, "sign-out finished");
            this.refresh_signal();
        });
    }
}

#[cfg(feature = "hydrate")]
fn run(fut: impl std::future::Future<Output = ()> + 'static) {
    leptos::task::spawn_local(fut);
}

#[cfg(not(feature = "hydrate"))]
fn run(fut: impl std::future::Future<Output = ()> + 'static) {
    drop(fut);
}

impl Default for SessionSync {
    fn default() -> Self {
        Self::new()
    }
}

/// Read the session handle provided by [`SessionSyncProvider`].
///
/// # Panics
///
/// Panics outside a [`SessionSyncProvider`].
#[must_use]
pub fn use_session_sync() -> SessionSync {
    expect_context::<SessionSync>()
}

#[component]
pub fn SessionSyncProvider(children: Children) -> impl IntoView {
    let sync = SessionSync::new();
    provide_context(sync);
    provide_context(sync.auth);

    #[cfg(feature = "hydrate")]
    start(sync);

    children()
}

/// Connect to the browser, reconcile once, and keep listening for the
/// lifetime of the page.
#[cfg(feature = "hydrate")]
fn start(sync: SessionSync) {
    use crate::browser::messages::{WindowMessages, on_storage_change};
    use crate::browser::{browser_config, connect, init_browser_logging, now_ms};

    init_browser_logging();

    let coordinator = match browser_config().and_then(connect) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            tracing::error!(error = %e, "session sync disabled");
            sync.auth.set(AuthState { session: None, state: SyncState::SignedOut });
            return;
        }
    };
    sync.attach(coordinator.clone());

    let outcome = coordinator.reconcile();
    tracing::info!(state = ?outcome.state, source = ?outcome.source, "session reconciled");
    sync.refresh_signal();

    coordinator.listen(&WindowMessages).detach();

    on_storage_change(move || {
        if let Some(coordinator) = sync.coordinator() {
            coordinator.refresh();
            sync.refresh_signal();
        }
    })
    .detach();

    if coordinator.is_logged_in() {
        leptos::task::spawn_local(async move {
            let verdict = coordinator.revalidate(now_ms()).await;
            tracing::debug!(?verdict, "startup token check");
            sync.refresh_signal();
        });
    }
}

/// Display name for headers; `None` while loading or signed out.
#[must_use]
pub fn display_name(state: &AuthState) -> Option<String> {
    match state.state {
        SyncState::SignedIn => state.user_name().map(str::to_owned),
        SyncState::Unknown | SyncState::SignedOut | SyncState::LoggingOut => None,
    }
}

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;
