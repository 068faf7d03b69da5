//! Receiver page served at `/sync` by every app.
//!
//! SYSTEM CONTEXT
//! ==============
//! A peer loads this page in a hidden iframe and posts one message to it.
//! The page applies the message to this origin's storage and then navigates
//! itself to the app's landing page (login) or to the home page (logout).
//! Opened directly by a user it only shows a waiting status.

use leptos::prelude::*;

use crate::endpoint::EndpointOutcome;
use crate::message::SyncAction;

/// Status line for the page.
#[must_use]
pub fn status_text(outcome: Option<&EndpointOutcome>) -> &'static str {
    match outcome.map(|o| o.action) {
        None => "Waiting for session sync...",
        Some(SyncAction::Login) => "Session received. Redirecting...",
        Some(SyncAction::Logout) => "Signed out. Redirecting...",
    }
}

#[component]
pub fn SyncEndpoint() -> impl IntoView {
    let outcome = RwSignal::new(None::<EndpointOutcome>);

    #[cfg(feature = "hydrate")]
    mount(outcome);

    view! {
        <div class="sync-endpoint" aria-live="polite">
            <p>{move || status_text(outcome.get().as_ref())}</p>
        </div>
    }
}

#[cfg(feature = "hydrate")]
fn mount(outcome: RwSignal<Option<EndpointOutcome>>) {
    use std::rc::Rc;

    use crate::browser::messages::WindowMessages;
    use crate::browser::storage::LocalStorage;
    use crate::browser::{browser_config, init_browser_logging};
    use crate::endpoint::ReceiverEndpoint;

    init_browser_logging();
    let config = match browser_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "sync endpoint disabled");
            return;
        }
    };
    let storage = match LocalStorage::open() {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!(error = %e, "sync endpoint has no storage");
            return;
        }
    };

    let endpoint = ReceiverEndpoint::new(config, Rc::new(storage));
    endpoint
        .mount_with(&WindowMessages, move |handled| {
            outcome.set(Some(handled.clone()));
            let Some(window) = web_sys::window() else {
                return;
            };
            if let Err(e) = window.location().set_href(&handled.redirect_to) {
                tracing::error!(error = ?e, to = %handled.redirect_to, "sync redirect failed");
            }
        })
        .detach();
}

#[cfg(test)]
#[path = "sync_page_test.rs"]
mod tests;
