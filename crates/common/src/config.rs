//! Monitor configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Marker left in sample credentials; a value containing it was never filled in.
pub const CREDENTIAL_PLACEHOLDER: &str = "在这里替换";

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds to sleep between passes.
    #[serde(default = "default_interval", alias = "interval_secs")]
    pub interval: u64,

    /// Location of the persisted history file.
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// Absolute price difference still treated as unchanged. 0 = exact.
    #[serde(default)]
    pub price_tolerance: f64,

    /// Prefix printed before prices in notifications.
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// Messaging endpoint credentials.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Page fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Products to watch, checked in this order every pass.
    #[serde(default)]
    pub products: Vec<ProductConfig>,
}

/// One watched product as written in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductConfig {
    /// Unique key used in the history file and in messages.
    pub name: String,
    pub url: String,
    /// Regex whose first capture group is the stock count.
    #[serde(default)]
    pub stock_pattern: Option<String>,
    /// Regex whose first capture group is the price.
    #[serde(default)]
    pub price_pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub chat_id: String,

    #[serde(default = "default_telegram_base_url")]
    pub api_base_url: String,

    /// Request timeout for `sendMessage`.
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

/// How product pages are retrieved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Headless Chromium; executes scripts and waits out challenge pages.
    Browser,
    /// Plain HTTP GET; no script execution.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_mode")]
    pub mode: FetchMode,

    /// Wait after navigation so challenge pages can resolve.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    /// Upper bound for navigation (browser) or the whole request (http).
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable; auto-detected when unset.
    #[serde(default)]
    pub chrome_bin: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    3600
}
fn default_history_path() -> PathBuf {
    PathBuf::from("monitor_data.json")
}
fn default_currency_symbol() -> String {
    "¥".into()
}

fn default_telegram_base_url() -> String {
    "https://api.telegram.org".into()
}
fn default_notify_timeout() -> u64 {
    10
}

fn default_fetch_mode() -> FetchMode {
    FetchMode::Browser
}
fn default_settle_delay() -> u64 {
    8
}
fn default_navigation_timeout() -> u64 {
    60
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".into()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base_url: default_telegram_base_url(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: default_fetch_mode(),
            settle_delay_secs: default_settle_delay(),
            navigation_timeout_secs: default_navigation_timeout(),
            headless: true,
            chrome_bin: None,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            history_path: default_history_path(),
            price_tolerance: 0.0,
            currency_symbol: default_currency_symbol(),
            telegram: TelegramConfig::default(),
            fetch: FetchConfig::default(),
            products: Vec::new(),
        }
    }
}
