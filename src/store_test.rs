use super::*;

fn store() -> (MemoryStorage, SessionStore) {
    let backend = MemoryStorage::new();
    let store = SessionStore::new(Rc::new(backend.clone()));
    (backend, store)
}

fn auth() -> AuthSession {
    AuthSession::new("t1", Session::new("Ana", "ana@bytebank.test", "acc-1"))
}

// =============================================================
// Session
// =============================================================

#[test]
fn empty_store_has_no_session() {
    let (_, store) = store();
    assert_eq!(store.stored_session(), StoredSession::Absent);
    assert!(store.session().is_none());
    assert!(!store.is_authenticated());
}

#[test]
fn set_session_round_trips_through_backend() {
    let (backend, store) = store();
    store.set_session(&auth());
    assert_eq!(store.session(), Some(auth()));
    assert_eq!(backend.raw(keys::AUTH_TOKEN).as_deref(), Some("\"t1\""));
    assert!(backend.raw(keys::USER_DATA).expect("user data").contains("\"accountId\":\"acc-1\""));
}

#[test]
fn token_without_profile_is_partial() {
    let (_, store) = store();
    store.set_session(&auth());
    store.clear_session();
    store.set_json(keys::AUTH_TOKEN, "t1");
    assert_eq!(store.stored_session(), StoredSession::Partial);
    assert!(store.session().is_none());
}

#[test]
fn blank_profile_fields_are_partial() {
    let (_, store) = store();
    store.set_session(&AuthSession::new("t1", Session::new("Ana", "", "acc-1")));
    assert_eq!(store.stored_session(), StoredSession::Partial);
}

#[test]
fn clear_all_user_data_removes_balance_preference() {
    let (backend, store) = store();
    store.set_session(&auth());
    store.set_show_balance(false);
    store.set_theme(Theme::Dark);
    store.clear_all_user_data();
    assert!(backend.raw(keys::AUTH_TOKEN).is_none());
    assert!(backend.raw(keys::USER_DATA).is_none());
    assert!(backend.raw(keys::SHOW_BALANCE).is_none());
    assert_eq!(store.theme(), Some(Theme::Dark));
}

// =============================================================
// Failure degradation
// =============================================================

#[test]
fn corrupt_json_reads_as_absent() {
    let (backend, store) = store();
    backend.insert_raw(keys::USER_DATA, "{not json");
    backend.insert_raw(keys::AUTH_TOKEN, "\"t1\"");
    assert!(store.profile().is_none());
    assert_eq!(store.stored_session(), StoredSession::Partial);
}

#[test]
fn rejected_writes_do_not_panic_and_leave_store_unchanged() {
    let (backend, store) = store();
    backend.set_reject_writes(true);
    store.set_session(&auth());
    store.set_flag(CoordinationFlag::SyncCompleted);
    assert!(store.session().is_none());
    assert!(!store.flag(CoordinationFlag::SyncCompleted));
}

// =============================================================
// Flags
// =============================================================

#[test]
fn flags_default_to_false() {
    let (_, store) = store();
    assert_eq!(store.flags(), CoordinationFlags::default());
}

#[test]
fn flags_are_independent() {
    let (_, store) = store();
    store.set_flag(CoordinationFlag::ExternalLogoutObserved);
    let flags = store.flags();
    assert!(flags.external_logout_observed);
    assert!(!flags.local_logout_in_flight);
    assert!(!flags.sync_completed);
    store.clear_flag(CoordinationFlag::ExternalLogoutObserved);
    assert!(!store.flag(CoordinationFlag::ExternalLogoutObserved));
}

#[test]
fn take_flag_clears_after_read() {
    let (_, store) = store();
    store.set_flag(CoordinationFlag::SyncCompleted);
    assert!(store.take_flag(CoordinationFlag::SyncCompleted));
    assert!(!store.take_flag(CoordinationFlag::SyncCompleted));
}

#[test]
fn both_logout_flags_conflict() {
    let flags = CoordinationFlags { local_logout_in_flight: true, external_logout_observed: true, sync_completed: false };
    assert!(flags.is_conflicting());
    assert!(!CoordinationFlags { external_logout_observed: false, ..flags }.is_conflicting());
}

#[test]
fn non_boolean_flag_value_reads_false() {
    let (backend, store) = store();
    backend.insert_raw(keys::EXTERNAL_LOGOUT, "\"yes\"");
    assert!(!store.flag(CoordinationFlag::ExternalLogoutObserved));
}

// =============================================================
// Preferences and validation cache
// =============================================================

#[test]
fn show_balance_defaults_to_true() {
    let (_, store) = store();
    assert!(store.show_balance());
    store.set_show_balance(false);
    assert!(!store.show_balance());
}

#[test]
fn validation_timestamp_round_trips() {
    let (_, store) = store();
    assert!(store.last_validation_ms().is_none());
    store.set_last_validation_ms(1_700_000_000_000);
    assert_eq!(store.last_validation_ms(), Some(1_700_000_000_000));
    store.clear_last_validation();
    assert!(store.last_validation_ms().is_none());
}
