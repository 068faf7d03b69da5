use super::*;
use std::collections::HashMap;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn origin_parse_keeps_scheme_host_and_port_only() {
    let origin = Origin::parse("http://localhost:3000/home?x=1#auth=abc").expect("origin");
    assert_eq!(origin.as_str(), "http://localhost:3000");
}

#[test]
fn origin_parse_drops_default_port() {
    let origin = Origin::parse("https://cards.bytebank.test:443/").expect("origin");
    assert_eq!(origin.as_str(), "https://cards.bytebank.test");
}

#[test]
fn origin_parse_rejects_relative_and_opaque_urls() {
    assert!(Origin::parse("/sync").is_none());
    assert!(Origin::parse("data:text/plain,hi").is_none());
    assert!(Origin::parse("").is_none());
}

#[test]
fn origin_join_handles_leading_slash() {
    let origin = Origin::parse("https://y.test").expect("origin");
    assert_eq!(origin.join("/sync"), "https://y.test/sync");
    assert_eq!(origin.join("sync"), "https://y.test/sync");
}

#[test]
fn from_lookup_uses_defaults() {
    let cfg = SyncConfig::from_lookup("http://localhost:3000", lookup(&[])).expect("config");
    assert_eq!(cfg.home.as_str(), DEFAULT_HOME_URL);
    assert_eq!(cfg.investments.as_str(), DEFAULT_INVESTMENTS_URL);
    assert_eq!(cfg.cards.as_str(), DEFAULT_CARDS_URL);
    assert_eq!(cfg.api_base_url, DEFAULT_API_URL);
    assert_eq!(cfg.receiver_path, "/sync");
    assert_eq!(cfg.timings, SyncTimings::default());
    assert_eq!(cfg.current_app(), Some(AppKind::Home));
}

#[test]
fn from_lookup_applies_overrides() {
    let cfg = SyncConfig::from_lookup(
        "https://invest.bytebank.test",
        lookup(&[
            (HOME_URL_VAR, "https://home.bytebank.test/"),
            (INVESTMENTS_URL_VAR, "https://invest.bytebank.test"),
            (API_URL_VAR, "https://api.bytebank.test/"),
            (SYNC_TIMEOUT_VAR, "2500"),
        ]),
    )
    .expect("config");
    assert_eq!(cfg.home.as_str(), "https://home.bytebank.test");
    assert_eq!(cfg.api_base_url, "https://api.bytebank.test");
    assert_eq!(cfg.timings.overall_timeout, Duration::from_millis(2500));
    assert_eq!(cfg.current_app(), Some(AppKind::Investments));
}

#[test]
fn from_lookup_ignores_unparsable_timeout() {
    let cfg = SyncConfig::from_lookup(DEFAULT_HOME_URL, lookup(&[(SYNC_TIMEOUT_VAR, "soon")])).expect("config");
    assert_eq!(cfg.timings.overall_timeout, Duration::from_millis(DEFAULT_SYNC_TIMEOUT_MS));
}

#[test]
fn from_lookup_rejects_bad_origin() {
    let err = SyncConfig::from_lookup(DEFAULT_HOME_URL, lookup(&[(CARDS_URL_VAR, "not a url")])).expect_err("bad origin");
    assert!(matches!(err, ConfigError::InvalidOrigin { var: CARDS_URL_VAR, .. }));
}

#[test]
fn peer_pairs_home_and_investments() {
    let cfg = SyncConfig::from_lookup(DEFAULT_HOME_URL, lookup(&[])).expect("config");
    assert_eq!(cfg.peer(), Some(&cfg.investments));
    let invest = cfg.for_app(AppKind::Investments);
    assert_eq!(invest.peer(), Some(&invest.home));
    let cards = cfg.for_app(AppKind::Cards);
    assert_eq!(cards.peer(), Some(&cards.home));
}

#[test]
fn peer_is_none_for_unknown_origin() {
    let cfg = SyncConfig::from_lookup("https://elsewhere.test", lookup(&[])).expect("config");
    assert_eq!(cfg.current_app(), None);
    assert_eq!(cfg.peer(), None);
}

#[test]
fn allowed_origins_exclude_current() {
    let cfg = SyncConfig::from_lookup(DEFAULT_INVESTMENTS_URL, lookup(&[])).expect("config");
    let allowed = cfg.allowed_origins();
    assert_eq!(allowed.len(), 2);
    assert!(allowed.contains(&cfg.home));
    assert!(allowed.contains(&cfg.cards));
    assert!(!allowed.contains(&cfg.investments));
}

#[test]
fn receiver_url_appends_path() {
    let cfg = SyncConfig::from_lookup(DEFAULT_HOME_URL, lookup(&[])).expect("config");
    assert_eq!(cfg.receiver_url(&cfg.investments), "http://localhost:3001/sync");
}
