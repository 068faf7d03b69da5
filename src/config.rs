//! Origin topology and timing configuration.
//!
//! DESIGN
//! ======
//! The set of peer origins is configuration, never data: the receiver's
//! allow-list and the sender's target are both derived from here, not from
//! anything an inbound message claims about itself.

use std::time::Duration;

use url::Url;

pub const DEFAULT_HOME_URL: &str = "http://localhost:3000";
pub const DEFAULT_INVESTMENTS_URL: &str = "http://localhost:3001";
pub const DEFAULT_CARDS_URL: &str = "http://localhost:3002";
pub const DEFAULT_API_URL: &str = "https://postech-finance-02-api.onrender.com";
pub const DEFAULT_RECEIVER_PATH: &str = "/sync";

pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_INIT_DELAY_MS: u64 = 1_000;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 3_000;
pub const DEFAULT_VALIDATION_TTL_MS: i64 = 5 * 60 * 1000;

pub const HOME_URL_VAR: &str = "BYTEBANK_HOME_URL";
pub const INVESTMENTS_URL_VAR: &str = "BYTEBANK_INVESTMENTS_URL";
pub const CARDS_URL_VAR: &str = "BYTEBANK_CARDS_URL";
pub const API_URL_VAR: &str = "BYTEBANK_API_URL";
pub const SYNC_TIMEOUT_VAR: &str = "BYTEBANK_SYNC_TIMEOUT_MS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid origin in {var}: {value:?}")]
    InvalidOrigin { var: &'static str, value: String },
}

/// Serialized origin (`scheme://host[:port]`), as reported by `MessageEvent.origin`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin(String);

impl Origin {
    /// Parse any absolute URL and keep only its origin.
    ///
    /// Returns `None` for relative or opaque URLs (`data:`, `file:` ...).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw.trim()).ok()?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return None;
        }
        Some(Self(origin.ascii_serialization()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute URL for `path` on this origin.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        if path.starts_with('/') { format!("{}{path}", self.0) } else { format!("{}/{path}", self.0) }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The independently deployed apps of the suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AppKind {
    Home,
    Investments,
    Cards,
}

impl AppKind {
    pub const ALL: [Self; 3] = [Self::Home, Self::Investments, Self::Cards];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Investments => "investments",
            Self::Cards => "cards",
        }
    }

    /// Page a freshly synchronized app lands on.
    #[must_use]
    pub fn landing_path(self) -> &'static str {
        match self {
            Self::Home => "/home",
            Self::Investments => "/investments",
            Self::Cards => "/",
        }
    }

    /// The app that receives this app's live sync messages.
    ///
    /// Home and investments mirror each other; cards reports to home.
    #[must_use]
    pub fn sync_peer(self) -> Self {
        match self {
            Self::Home => Self::Investments,
            Self::Investments | Self::Cards => Self::Home,
        }
    }
}

/// Timing budget of one cross-origin delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncTimings {
    /// Hard ceiling for the whole delivery, after which it resolves anyway.
    pub overall_timeout: Duration,
    /// Pause after the receiver document loads, letting its listener attach.
    pub init_delay: Duration,
    /// Pause after posting before the channel is torn down.
    pub settle_delay: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            overall_timeout: Duration::from_millis(DEFAULT_SYNC_TIMEOUT_MS),
            init_delay: Duration::from_millis(DEFAULT_INIT_DELAY_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    pub home: Origin,
    pub investments: Origin,
    pub cards: Origin,
    /// Origin of the app this instance runs in.
    pub current: Origin,
    pub receiver_path: String,
    pub api_base_url: String,
    pub timings: SyncTimings,
    pub validation_ttl_ms: i64,
}

impl SyncConfig {
    /// Build config from a variable lookup.
    ///
    /// Optional (defaults in parentheses):
    /// - `BYTEBANK_HOME_URL` (`http://localhost:3000`)
    /// - `BYTEBANK_INVESTMENTS_URL` (`http://localhost:3001`)
    /// - `BYTEBANK_CARDS_URL` (`http://localhost:3002`)
    /// - `BYTEBANK_API_URL` (the hosted account API)
    /// - `BYTEBANK_SYNC_TIMEOUT_MS` (10000)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOrigin`] when any app URL or `current`
    /// is not an absolute http(s)-style URL.
    pub fn from_lookup<F>(current: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let origin = |var: &'static str, default: &str| {
            let raw = lookup(var).unwrap_or_else(|| default.to_owned());
            Origin::parse(&raw).ok_or(ConfigError::InvalidOrigin { var, value: raw })
        };

        let home = origin(HOME_URL_VAR, DEFAULT_HOME_URL)?;
        let investments = origin(INVESTMENTS_URL_VAR, DEFAULT_INVESTMENTS_URL)?;
        let cards = origin(CARDS_URL_VAR, DEFAULT_CARDS_URL)?;
        let current =
            Origin::parse(current).ok_or_else(|| ConfigError::InvalidOrigin { var: "current", value: current.to_owned() })?;

        let api_base_url = lookup(API_URL_VAR)
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let timeout_ms = lookup(SYNC_TIMEOUT_VAR)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SYNC_TIMEOUT_MS);
        let timings = SyncTimings { overall_timeout: Duration::from_millis(timeout_ms), ..SyncTimings::default() };

        Ok(Self {
            home,
            investments,
            cards,
            current,
            receiver_path: DEFAULT_RECEIVER_PATH.to_owned(),
            api_base_url,
            timings,
            validation_ttl_ms: DEFAULT_VALIDATION_TTL_MS,
        })
    }

    /// Build config from process environment variables.
    ///
    /// # Errors
    ///
    /// See [`SyncConfig::from_lookup`].
    pub fn from_env(current: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(current, |key| std::env::var(key).ok())
    }

    /// Build config from variables baked in at compile time (browser builds).
    ///
    /// # Errors
    ///
    /// See [`SyncConfig::from_lookup`].
    pub fn from_build_env(current: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(current, |key| {
            let value = match key {
                HOME_URL_VAR => option_env!("BYTEBANK_HOME_URL"),
                INVESTMENTS_URL_VAR => option_env!("BYTEBANK_INVESTMENTS_URL"),
                CARDS_URL_VAR => option_env!("BYTEBANK_CARDS_URL"),
                API_URL_VAR => option_env!("BYTEBANK_API_URL"),
                SYNC_TIMEOUT_VAR => option_env!("BYTEBANK_SYNC_TIMEOUT_MS"),
                _ => None,
            };
            value.map(str::to_owned)
        })
    }

    #[must_use]
    pub fn origin_of(&self, app: AppKind) -> &Origin {
        match app {
            AppKind::Home => &self.home,
            AppKind::Investments => &self.investments,
            AppKind::Cards => &self.cards,
        }
    }

    /// Which configured app, if any, is served from `origin`.
    #[must_use]
    pub fn app_for(&self, origin: &Origin) -> Option<AppKind> {
        AppKind::ALL.into_iter().find(|app| self.origin_of(*app) == origin)
    }

    #[must_use]
    pub fn current_app(&self) -> Option<AppKind> {
        self.app_for(&self.current)
    }

    /// Origin that receives this app's live sync messages.
    ///
    /// `None` when the current origin is not one of the configured apps, in
    /// which case live sync is skipped entirely.
    #[must_use]
    pub fn peer(&self) -> Option<&Origin> {
        let app = self.current_app()?;
        let peer = self.origin_of(app.sync_peer());
        (peer != &self.current).then_some(peer)
    }

    /// Origins this app accepts sync messages from: every configured app
    /// except itself.
    #[must_use]
    pub fn allowed_origins(&self) -> Vec<Origin> {
        let mut origins: Vec<Origin> = AppKind::ALL
            .into_iter()
            .map(|app| self.origin_of(app).clone())
            .filter(|origin| origin != &self.current)
            .collect();
        origins.sort();
        origins.dedup();
        origins
    }

    /// URL of the receiver endpoint hosted by `origin`.
    #[must_use]
    pub fn receiver_url(&self, origin: &Origin) -> String {
        origin.join(&self.receiver_path)
    }

    /// Copy of this config as seen from another app of the suite.
    #[must_use]
    pub fn for_app(&self, app: AppKind) -> Self {
        Self { current: self.origin_of(app).clone(), ..self.clone() }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
