use super::*;
use serde_json::json;

fn auth() -> AuthSession {
    AuthSession::new("t1", Session::new("Ana", "ana@bytebank.test", "acc-1"))
}

#[test]
fn login_message_serializes_wire_shape() {
    assert_eq!(
        SyncMessage::login(&auth()).to_value(),
        json!({
            "action": "login",
            "token": "t1",
            "userData": {"name": "Ana", "email": "ana@bytebank.test", "accountId": "acc-1"}
        })
    );
}

#[test]
fn logout_message_omits_credentials() {
    assert_eq!(SyncMessage::logout().to_value(), json!({"action": "logout"}));
}

#[test]
fn decode_login() {
    let value = SyncMessage::login(&auth()).to_value();
    assert_eq!(decode_message(&value), InboundSync::Login(auth()));
}

#[test]
fn decode_logout() {
    assert_eq!(decode_message(&json!({"action": "logout"})), InboundSync::Logout);
    assert_eq!(decode_message(&json!({"action": "logout", "token": null})), InboundSync::Logout);
}

#[test]
fn decode_login_without_token_is_invalid() {
    let value = json!({"action": "login", "userData": {"name": "Ana", "email": "a@b", "accountId": "1"}});
    assert_eq!(decode_message(&value), InboundSync::Invalid(InvalidReason::MissingCredentials));
}

#[test]
fn decode_login_with_partial_profile_is_invalid() {
    let value = json!({"action": "login", "token": "t1", "userData": {"name": "Ana", "email": "", "accountId": "1"}});
    assert_eq!(decode_message(&value), InboundSync::Invalid(InvalidReason::MissingCredentials));
}

#[test]
fn decode_login_with_wrong_types_is_invalid() {
    let value = json!({"action": "login", "token": 42, "userData": "Ana"});
    assert_eq!(decode_message(&value), InboundSync::Invalid(InvalidReason::MissingCredentials));
}

#[test]
fn decode_logout_with_credentials_is_invalid() {
    let value = json!({"action": "logout", "token": "t1"});
    assert_eq!(decode_message(&value), InboundSync::Invalid(InvalidReason::UnexpectedCredentials));
}

#[test]
fn decode_unknown_action() {
    assert_eq!(decode_message(&json!({"action": "refresh"})), InboundSync::Invalid(InvalidReason::UnknownAction));
    assert_eq!(decode_message(&json!({"type": "login"})), InboundSync::Invalid(InvalidReason::UnknownAction));
    assert_eq!(decode_message(&json!({"action": 1})), InboundSync::Invalid(InvalidReason::UnknownAction));
}

#[test]
fn decode_non_object() {
    for value in [json!(null), json!("login"), json!([1, 2]), json!(true)] {
        assert_eq!(decode_message(&value), InboundSync::Invalid(InvalidReason::NotAnObject));
    }
}

#[test]
fn inbound_action_accessor() {
    assert_eq!(InboundSync::Login(auth()).action(), Some(SyncAction::Login));
    assert_eq!(InboundSync::Logout.action(), Some(SyncAction::Logout));
    assert_eq!(InboundSync::Invalid(InvalidReason::NotAnObject).action(), None);
}
