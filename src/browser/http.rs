//! Account API client over `gloo-net`.

use gloo_net::http::{Request, Response};
use serde_json::{Value, json};

use crate::account::{
    ACCOUNT_PATH, AccountApi, AccountError, LOGIN_PATH, LOGOUT_PATH, LoginRequest, REGISTER_PATH, RegisterRequest,
    RemoteUser, TokenStatus, VALIDATE_TOKEN_PATH, bearer, endpoint, error_from_status, parse_account_response,
    parse_login_response, parse_register_response, parse_validation_response,
};
use crate::session::Session;

pub struct HttpAccountApi {
    base_url: String,
}

impl HttpAccountApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }
}

fn network(err: &gloo_net::Error) -> AccountError {
    AccountError::Network(err.to_string())
}

async fn read(response: Response) -> Result<Value, AccountError> {
    let status = response.status();
    let ok = response.ok();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    if ok { Ok(body) } else { Err(error_from_status(status, &body)) }
}

#[async_trait::async_trait(?Send)]
impl AccountApi for HttpAccountApi {
    async fn register(&self, request: &RegisterRequest) -> Result<RemoteUser, AccountError> {
        let response = Request::post(&self.url(REGISTER_PATH))
            .json(request)
            .map_err(|e| network(&e))?
            .send()
            .await
            .map_err(|e| network(&e))?;
        parse_register_response(&read(response).await?)
    }

    async fn login(&self, request: &LoginRequest) -> Result<String, AccountError> {
        let response = Request::post(&self.url(LOGIN_PATH))
            .json(request)
            .map_err(|e| network(&e))?
            .send()
            .await
            .map_err(|e| network(&e))?;
        parse_login_response(&read(response).await?)
    }

    async fn fetch_profile(&self, token: &str) -> Result<Session, AccountError> {
        let response = Request::get(&self.url(ACCOUNT_PATH))
            .header("Authorization", &bearer(token))
            .send()
            .await
            .map_err(|e| network(&e))?;
        parse_account_response(&read(response).await?)
    }

    async fn logout(&self, token: &str) -> Result<(), AccountError> {
        let response = Request::post(&self.url(LOGOUT_PATH))
            .header("Authorization", &bearer(token))
            .json(&json!({}))
            .map_err(|e| network(&e))?
            .send()
            .await
            .map_err(|e| network(&e))?;
        read(response).await.map(|_| ())
    }

    async fn validate_token(&self, token: &str) -> Result<TokenStatus, AccountError> {
        let response = Request::get(&self.url(VALIDATE_TOKEN_PATH))
            .header("Authorization", &bearer(token))
            .send()
            .await
            .map_err(|e| network(&e))?;
        match read(response).await {
            Ok(body) => parse_validation_response(&body),
            Err(AccountError::Unauthorized) => Ok(TokenStatus { valid: false, user: None }),
            Err(e) => Err(e),
        }
    }
}
