//! Browser bindings for the sync subsystem (feature `hydrate`).
//!
//! SYSTEM CONTEXT
//! ==============
//! Everything platform-specific lives here: `localStorage`, hidden iframes,
//! `window` message and storage events, `history.replaceState` and the
//! `gloo-net` account client. [`connect`] wires them into a
//! [`Coordinator`].

pub mod frame;
pub mod http;
pub mod location;
pub mod messages;
pub mod storage;

use std::rc::Rc;
use std::time::Duration;

use crate::config::{ConfigError, SyncConfig};
use crate::coordinator::{Coordinator, SyncBackends};
use crate::store::StorageError;
use crate::transport::{FrameSender, Timer};

use self::frame::IframeOpener;
use self::http::HttpAccountApi;
use self::location::WindowAddressBar;
use self::storage::LocalStorage;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("no browser window")]
    NoWindow,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Route `tracing` records (through their `log` facade) to the console and
/// report panics there.
pub fn init_browser_logging() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Debug).is_err() {
        tracing::debug!("console logger already installed");
    }
}

/// Milliseconds since the Unix epoch.
#[allow(clippy::cast_possible_truncation)]
pub fn now_ms() -> i64 {
    js_sys::Date::now() as i64
}

pub fn current_origin() -> Option<String> {
    web_sys::window()?.location().origin().ok()
}

/// [`Timer`] over `setTimeout`.
pub struct GlooTimer;

#[async_trait::async_trait(?Send)]
impl Timer for GlooTimer {
    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}

/// Config for the page's own origin, with build-time overrides.
///
/// # Errors
///
/// [`BrowserError::NoWindow`] outside a page, [`BrowserError::Config`] when a
/// baked-in origin does not parse.
pub fn browser_config() -> Result<SyncConfig, BrowserError> {
    let origin = current_origin().ok_or(BrowserError::NoWindow)?;
    Ok(SyncConfig::from_build_env(&origin)?)
}

/// Build a coordinator on the browser's backends.
///
/// # Errors
///
/// [`BrowserError::Storage`] when `localStorage` is blocked.
pub fn connect(config: SyncConfig) -> Result<Coordinator, BrowserError> {
    let storage = LocalStorage::open()?;
    let link = FrameSender::new(Rc::new(IframeOpener), Rc::new(GlooTimer), &config);
    let account = HttpAccountApi::new(config.api_base_url.clone());
    Ok(Coordinator::new(
        config,
        SyncBackends {
            storage: Rc::new(storage),
            account: Rc::new(account),
            link: Rc::new(link),
            address: Rc::new(WindowAddressBar),
        },
    ))
}
