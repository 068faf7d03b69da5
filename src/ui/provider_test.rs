use std::rc::Rc;

use leptos::prelude::*;

use super::*;
use crate::config::AppKind;
use crate::coordinator::{MemoryAddressBar, SyncBackends};
use crate::message::InboundSync;
use crate::store::MemoryStorage;
use crate::test_helpers::{FakeAccountApi, RecordingLink, auth, config, profile};

fn coordinator() -> Coordinator {
    Coordinator::new(
        config(AppKind::Investments),
        SyncBackends {
            storage: Rc::new(MemoryStorage::new()),
            account: Rc::new(FakeAccountApi::new()),
            link: Rc::new(RecordingLink::new()),
            address: Rc::new(MemoryAddressBar::new("http://localhost:3001/investments")),
        },
    )
}

#[test]
fn display_name_only_when_signed_in() {
    let signed_in = AuthState { session: Some(profile()), state: SyncState::SignedIn };
    assert_eq!(display_name(&signed_in).as_deref(), Some("Ana Souza"));

    let leaving = AuthState { session: None, state: SyncState::LoggingOut };
    assert_eq!(display_name(&leaving), None);
    assert_eq!(display_name(&AuthState::default()), None);
}

#[test]
fn detached_handle_links_without_fragment() {
    let sync = SessionSync::new();
    assert!(sync.coordinator().is_none());
    assert_eq!(sync.handoff_url("http://localhost:3002/cards"), "http://localhost:3002/cards");
    assert!(sync.auth().get_untracked().is_loading());
}

#[test]
fn attach_copies_current_state() {
    let sync = SessionSync::new();
    let coordinator = coordinator();
    coordinator.reconcile();
    sync.attach(coordinator);
    assert_eq!(sync.auth().get_untracked().state, SyncState::SignedOut);
}

#[tokio::test]
async fn signal_follows_sign_in_and_peer_logout() {
    let sync = SessionSync::new();
    let coordinator = coordinator();
    sync.attach(coordinator.clone());

    coordinator.sign_in(auth()).await.expect("sign in");
    let state = sync.auth().get_untracked();
    assert!(state.is_logged_in());
    assert_eq!(state.session, Some(profile()));
    assert!(sync.handoff_url("http://localhost:3000/").contains('#'));

    coordinator.apply_inbound(InboundSync::Logout);
    assert_eq!(sync.auth().get_untracked().state, SyncState::SignedOut);
}

#[test]
fn rename_updates_signal_through_coordinator() {
    let sync = SessionSync::new();
    assert!(sync.rename("Ana S.").is_err());

    let coordinator = coordinator();
    coordinator.store().set_session(&auth());
    coordinator.reconcile();
    sync.attach(coordinator.clone());

    assert_eq!(sync.rename(" "), Err("user name must not be blank".to_owned()));
    sync.rename("Ana S.").expect("rename");
    assert_eq!(display_name(&sync.auth().get_untracked()).as_deref(), Some("Ana S."));
    assert_eq!(coordinator.store().profile().map(|p| p.user_name).as_deref(), Some("Ana S."));
}
