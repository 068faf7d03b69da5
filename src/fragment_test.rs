use super::*;

fn profile() -> Session {
    Session::new("Ana Souza", "ana@bytebank.test", "acc-1")
}

#[test]
fn encode_auth_is_single_percent_encoded_param() {
    let fragment = encode_auth("t1", &profile());
    assert!(fragment.starts_with("#auth="));
    assert!(!fragment[1..].contains('#'));
    assert!(!fragment.contains('{'));
    assert!(!fragment.contains(' '));
}

#[test]
fn encoded_auth_decodes_to_same_session() {
    let fragment = encode_auth("t1", &profile());
    assert_eq!(decode(&fragment), Handoff::Auth(AuthSession::new("t1", profile())));
}

#[test]
fn encode_logout_marker() {
    assert_eq!(encode_logout(), "#logout=true");
    assert_eq!(decode("#logout=true"), Handoff::Logout);
}

#[test]
fn auth_url_replaces_existing_fragment() {
    let url = auth_url("https://y.test/investments#tab=2", "t1", &profile());
    assert!(url.starts_with("https://y.test/investments#auth="));
    assert!(!url.contains("tab=2"));
}

#[test]
fn logout_url_appends_marker() {
    assert_eq!(logout_url("https://home.test/home"), "https://home.test/home#logout=true");
}

#[test]
fn split_url_separates_fragment() {
    assert_eq!(split_url("https://y.test/a?b=1#c=2"), ("https://y.test/a?b=1", "#c=2"));
    assert_eq!(split_url("https://y.test"), ("https://y.test", ""));
}

// =============================================================
// Tolerant decoding
// =============================================================

#[test]
fn decode_empty_and_bare_hash() {
    assert_eq!(decode(""), Handoff::None);
    assert_eq!(decode("#"), Handoff::None);
}

#[test]
fn decode_without_leading_hash() {
    let fragment = encode_auth("t1", &profile());
    assert_eq!(decode(&fragment[1..]).kind(), Some(HandoffKind::Auth));
}

#[test]
fn decode_mixed_with_unrelated_state() {
    let fragment = format!("#tab=statement&{}&modal=open", &encode_auth("t1", &profile())[1..]);
    assert_eq!(decode(&fragment), Handoff::Auth(AuthSession::new("t1", profile())));
}

#[test]
fn decode_truncated_payload_is_none() {
    let fragment = encode_auth("t1", &profile());
    let truncated = &fragment[..fragment.len() / 2];
    assert_eq!(decode(truncated), Handoff::None);
}

#[test]
fn decode_invalid_percent_sequence_is_none() {
    assert_eq!(decode("#auth=%E0%A4%A"), Handoff::None);
    assert_eq!(decode("#auth=%FF%FE"), Handoff::None);
}

#[test]
fn decode_tampered_json_is_none() {
    let tampered = format!("#auth={}", urlencoding::encode(r#"{"token":"t1","userData":{"name":"Ana"}}"#));
    assert_eq!(decode(&tampered), Handoff::None);
}

#[test]
fn decode_rejects_blank_token() {
    let payload = format!("#auth={}", urlencoding::encode(&serde_json::to_string(&AuthSession::new("", profile())).expect("json")));
    assert_eq!(decode(&payload), Handoff::None);
}

#[test]
fn decode_ignores_similar_keys() {
    assert_eq!(decode("#xlogout=true"), Handoff::None);
    assert_eq!(decode("#logout=false"), Handoff::None);
    assert_eq!(decode("#preauth=abc"), Handoff::None);
}

#[test]
fn decode_legacy_token_user_pair() {
    let user = urlencoding::encode(r#"{"name":"Ana Souza","email":"ana@bytebank.test","accountId":"acc-1"}"#);
    let fragment = format!("#token=t1&user={user}");
    assert_eq!(decode(&fragment), Handoff::Auth(AuthSession::new("t1", profile())));
}

#[test]
fn decode_prefers_auth_over_logout() {
    let fragment = format!("{}&logout=true", encode_auth("t1", &profile()));
    assert_eq!(decode(&fragment).kind(), Some(HandoffKind::Auth));
}

#[test]
fn decode_garbage_never_panics() {
    for input in ["#&&&", "#=", "#auth=", "#auth", "##auth=%", "#logout", "\u{0}#\u{ffff}=%%"] {
        assert_eq!(decode(input), Handoff::None, "input {input:?}");
    }
}

// =============================================================
// Stripping
// =============================================================

#[test]
fn strip_auth_leaves_nothing() {
    assert_eq!(strip(&encode_auth("t1", &profile()), HandoffKind::Auth), "");
}

#[test]
fn strip_auth_preserves_unrelated_params_in_order() {
    let fragment = format!("#tab=statement&{}&modal=open", &encode_auth("t1", &profile())[1..]);
    assert_eq!(strip(&fragment, HandoffKind::Auth), "#tab=statement&modal=open");
}

#[test]
fn strip_auth_removes_legacy_pair() {
    assert_eq!(strip("#token=t1&user=%7B%7D&x=1", HandoffKind::Auth), "#x=1");
}

#[test]
fn strip_logout_only_touches_marker() {
    assert_eq!(strip("#logout=true&auth=abc", HandoffKind::Logout), "#auth=abc");
    assert_eq!(strip("#section", HandoffKind::Logout), "#section");
}
