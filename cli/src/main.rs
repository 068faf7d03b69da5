use bytebank_sync::account::{
    ACCOUNT_PATH, AccountApi, AccountError, LOGIN_PATH, LOGOUT_PATH, LoginRequest, REGISTER_PATH, RegisterRequest,
    RemoteUser, TokenStatus, VALIDATE_TOKEN_PATH, bearer, endpoint, error_from_status, parse_account_response,
    parse_login_response, parse_register_response, parse_validation_response,
};
use bytebank_sync::config::{ConfigError, DEFAULT_HOME_URL};
use bytebank_sync::fragment::{self, Handoff, HandoffKind};
use bytebank_sync::{AppKind, AuthSession, Session, SyncConfig};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("account api: {0}")]
    Account(#[from] AccountError),
    #[error("session is incomplete; token, name, email and account id are all required")]
    IncompleteSession,
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "bytebank-sync", about = "Build and inspect Bytebank session handoffs")]
struct Cli {
    /// Account API base URL; defaults to the suite configuration.
    #[arg(long, env = "BYTEBANK_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print `target` with an auth handoff fragment.
    AuthUrl {
        target: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        account_id: String,
    },
    /// Print `target` with a logout handoff fragment.
    LogoutUrl { target: String },
    /// Decode the handoff carried by a URL or bare fragment.
    Decode { input: String },
    /// Remove handoff parameters from a URL or bare fragment.
    Strip {
        input: String,
        #[arg(long, value_enum, default_value_t = StripKind::All)]
        kind: StripKind,
    },
    /// Log in against the account API and print an auth handoff URL.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BYTEBANK_PASSWORD")]
        password: String,
        /// Defaults to the investments landing page.
        #[arg(long)]
        target: Option<String>,
    },
    /// Check a token against the account API.
    Validate {
        #[arg(long, env = "BYTEBANK_TOKEN")]
        token: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StripKind {
    Auth,
    Logout,
    All,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let config = SyncConfig::from_env(DEFAULT_HOME_URL)?;
    let api_url = cli.api_url.unwrap_or_else(|| config.api_base_url.clone());

    match cli.command {
        Command::AuthUrl { target, token, name, email, account_id } => {
            println!("{}", build_auth_url(&target, AuthSession::new(token, Session::new(name, email, account_id)))?);
        }
        Command::LogoutUrl { target } => println!("{}", fragment::logout_url(&target)),
        Command::Decode { input } => print_json(&describe(&input))?,
        Command::Strip { input, kind } => println!("{}", strip_input(&input, kind)),
        Command::Login { email, password, target } => {
            let api = ReqwestAccountApi::new(api_url);
            let target = target.unwrap_or_else(|| config.investments.join(AppKind::Investments.landing_path()));
            let token = api.login(&LoginRequest { email, password }).await?;
            let session = api.fetch_profile(&token).await?;
            tracing::info!(account_id = %session.account_id, "logged in");
            println!("{}", build_auth_url(&target, AuthSession::new(token, session))?);
        }
        Command::Validate { token } => {
            let status = ReqwestAccountApi::new(api_url).validate_token(&token).await?;
            print_json(&json!({ "valid": status.valid, "user": status.user.map(|u| user_json(&u)) }))?;
        }
    }
    Ok(())
}

fn build_auth_url(target: &str, auth: AuthSession) -> Result<String, CliError> {
    if !auth.is_complete() {
        return Err(CliError::IncompleteSession);
    }
    Ok(fragment::auth_url(target, &auth.token, &auth.session))
}

/// `input` is a full URL or a bare `#...` fragment.
fn describe(input: &str) -> Value {
    match fragment::decode(fragment::split_url(input).1) {
        Handoff::Auth(auth) => json!({
            "kind": "auth",
            "token": auth.token,
            "session": serde_json::to_value(&auth.session).unwrap_or(Value::Null),
        }),
        Handoff::Logout => json!({ "kind": "logout" }),
        Handoff::None => json!({ "kind": "none" }),
    }
}

fn strip_input(input: &str, kind: StripKind) -> String {
    let (base, current) = fragment::split_url(input);
    let stripped = match kind {
        StripKind::Auth => fragment::strip(current, HandoffKind::Auth),
        StripKind::Logout => fragment::strip(current, HandoffKind::Logout),
        StripKind::All => fragment::strip(&fragment::strip(current, HandoffKind::Auth), HandoffKind::Logout),
    };
    format!("{base}{stripped}")
}

fn user_json(user: &RemoteUser) -> Value {
    json!({ "id": user.id, "username": user.username, "email": user.email })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

// =============================================================================
// ACCOUNT API OVER REQWEST
// =============================================================================

struct ReqwestAccountApi {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestAccountApi {
    fn new(base_url: String) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }

    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Value, AccountError> {
        let response = request.send().await.map_err(|e| AccountError::Network(e.to_string()))?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        if status.is_success() { Ok(body) } else { Err(error_from_status(status.as_u16(), &body)) }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(endpoint(&self.base_url, path))
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(endpoint(&self.base_url, path))
    }
}

#[async_trait::async_trait(?Send)]
impl AccountApi for ReqwestAccountApi {
    async fn register(&self, request: &RegisterRequest) -> Result<RemoteUser, AccountError> {
        parse_register_response(&self.call(self.post(REGISTER_PATH).json(request)).await?)
    }

    async fn login(&self, request: &LoginRequest) -> Result<String, AccountError> {
        parse_login_response(&self.call(self.post(LOGIN_PATH).json(request)).await?)
    }

    async fn fetch_profile(&self, token: &str) -> Result<Session, AccountError> {
        parse_account_response(&self.call(self.get(ACCOUNT_PATH).header("Authorization", bearer(token))).await?)
    }

    async fn logout(&self, token: &str) -> Result<(), AccountError> {
        let request = self.post(LOGOUT_PATH).header("Authorization", bearer(token)).json(&json!({}));
        self.call(request).await.map(|_| ())
    }

    async fn validate_token(&self, token: &str) -> Result<TokenStatus, AccountError> {
        match self.call(self.get(VALIDATE_TOKEN_PATH).header("Authorization", bearer(token))).await {
            Ok(body) => parse_validation_response(&body),
            Err(AccountError::Unauthorized) => Ok(TokenStatus { valid: false, user: None }),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
