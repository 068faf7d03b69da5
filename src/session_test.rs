use super::*;

fn sample() -> Session {
    Session::new("Ana", "ana@bytebank.test", "acc-1")
}

#[test]
fn session_complete_when_all_fields_present() {
    assert!(sample().is_complete());
}

#[test]
fn session_incomplete_when_any_field_blank() {
    let mut s = sample();
    s.account_id = "  ".to_owned();
    assert!(!s.is_complete());
    assert!(!Session::default().is_complete());
}

#[test]
fn session_serializes_with_original_field_names() {
    let json = serde_json::to_value(sample()).expect("serialize");
    assert_eq!(json, serde_json::json!({"name": "Ana", "email": "ana@bytebank.test", "accountId": "acc-1"}));
}

#[test]
fn session_accepts_user_name_alias() {
    let s: Session =
        serde_json::from_str(r#"{"userName":"Ana","email":"ana@bytebank.test","accountId":"acc-1"}"#).expect("parse");
    assert_eq!(s, sample());
}

#[test]
fn auth_session_requires_token() {
    assert!(AuthSession::new("t1", sample()).is_complete());
    assert!(!AuthSession::new("", sample()).is_complete());
    assert!(!AuthSession::new("t1", Session::default()).is_complete());
}

#[test]
fn auth_session_uses_user_data_key() {
    let json = serde_json::to_value(AuthSession::new("t1", sample())).expect("serialize");
    assert_eq!(json["token"], "t1");
    assert_eq!(json["userData"]["name"], "Ana");
}
