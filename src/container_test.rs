use super::*;

#[test]
fn starts_unknown_and_loading() {
    let container = SessionContainer::new();
    let state = container.snapshot();
    assert_eq!(state.state, SyncState::Unknown);
    assert!(state.is_loading());
    assert!(!state.is_logged_in());
}

#[test]
fn signed_in_exposes_session() {
    let container = SessionContainer::new();
    container.set_signed_in(Session::new("Ana", "ana@bytebank.test", "acc-1"));
    assert!(container.is_logged_in());
    assert_eq!(container.snapshot().user_name(), Some("Ana"));
}

#[test]
fn logging_out_drops_session_immediately() {
    let container = SessionContainer::new();
    container.set_signed_in(Session::new("Ana", "ana@bytebank.test", "acc-1"));
    container.set_logging_out();
    assert_eq!(container.state(), SyncState::LoggingOut);
    assert!(container.session().is_none());
    assert!(!container.is_logged_in());
}

#[test]
fn clones_share_state() {
    let container = SessionContainer::new();
    let reader = container.clone();
    container.set_signed_out();
    assert_eq!(reader.state(), SyncState::SignedOut);
    assert!(!reader.snapshot().is_loading());
}
