//! Configuration types for price-relay

use crate::notify::TELEGRAM_API_URL;
use crate::source::{CoinGeckoConfig, Instrument, COINGECKO_API_URL};
use crate::telemetry::LogFormat;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable holding the Telegram bot token
pub const TELEGRAM_BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the Telegram chat id
pub const TELEGRAM_CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

/// Root configuration structure
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Upstream price source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Quote currency requested from upstream
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    /// `User-Agent` header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout; unset leaves the HTTP client default
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Pause inside a fetch after the upstream throttles us
    #[serde(default = "default_rate_limit_pause")]
    pub rate_limit_pause_secs: u64,

    #[serde(default = "default_instruments")]
    pub instruments: Vec<InstrumentConfig>,
}

/// One tracked instrument
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstrumentConfig {
    /// Upstream id, e.g. "bitcoin"
    pub id: String,
    /// Ticker symbol; defaults to the uppercased id
    #[serde(default)]
    pub symbol: Option<String>,
    /// Display name; defaults to the capitalized id
    #[serde(default)]
    pub name: Option<String>,
}

fn default_base_url() -> String {
    COINGECKO_API_URL.to_string()
}
fn default_vs_currency() -> String {
    "usd".to_string()
}
fn default_user_agent() -> String {
    "CryptoPriceTracker/1.0".to_string()
}
fn default_rate_limit_pause() -> u64 {
    10
}
fn default_instruments() -> Vec<InstrumentConfig> {
    Instrument::defaults()
        .into_iter()
        .map(|i| InstrumentConfig {
            id: i.id,
            symbol: Some(i.symbol),
            name: None,
        })
        .collect()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            vs_currency: default_vs_currency(),
            user_agent: default_user_agent(),
            request_timeout_secs: None,
            rate_limit_pause_secs: default_rate_limit_pause(),
            instruments: default_instruments(),
        }
    }
}

impl InstrumentConfig {
    pub fn to_instrument(&self) -> Instrument {
        let symbol = self
            .symbol
            .clone()
            .unwrap_or_else(|| self.id.to_uppercase());
        let instrument = Instrument::new(self.id.clone(), symbol);
        match &self.name {
            Some(name) => instrument.with_name(name.clone()),
            None => instrument,
        }
    }
}

impl SourceConfig {
    /// Instrument set, fixed for the process lifetime
    pub fn instruments(&self) -> Vec<Instrument> {
        self.instruments.iter().map(InstrumentConfig::to_instrument).collect()
    }

    pub fn client_config(&self) -> CoinGeckoConfig {
        CoinGeckoConfig {
            base_url: self.base_url.clone(),
            vs_currency: self.vs_currency.clone(),
            user_agent: self.user_agent.clone(),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            rate_limit_pause: Duration::from_secs(self.rate_limit_pause_secs),
        }
    }
}

/// Update loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between cycles
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    /// Seconds to wait before retrying a throttled fetch
    #[serde(default = "default_retry_pause")]
    pub retry_pause_secs: u64,

    /// Throttled fetches retried per cycle before using the cache
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_update_interval() -> u64 {
    60
}
fn default_retry_pause() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            retry_pause_secs: default_retry_pause(),
            max_retries: default_max_retries(),
        }
    }
}

/// WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path subscribers connect to
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Per-subscriber send timeout; slower subscribers are dropped
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_ws_path() -> String {
    "/ws/crypto-prices".to_string()
}
fn default_send_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ws_path: default_ws_path(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// Notification configuration
///
/// Telegram is enabled only when both token and chat id are present.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    #[serde(default)]
    pub telegram_chat_id: Option<String>,

    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_telegram_api_url() -> String {
    TELEGRAM_API_URL.to_string()
}
fn default_notify_timeout() -> u64 {
    10
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: None,
            telegram_chat_id: None,
            telegram_api_url: default_telegram_api_url(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus exporter port; 0 disables the exporter
    #[serde(default)]
    pub metrics_port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: 0,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply Telegram credentials from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply Telegram credentials from `lookup`; non-empty values win over the file
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = non_empty(TELEGRAM_BOT_TOKEN_ENV) {
            self.notify.telegram_bot_token = Some(token);
        }
        if let Some(chat_id) = non_empty(TELEGRAM_CHAT_ID_ENV) {
            self.notify.telegram_chat_id = Some(chat_id);
        }
        self
    }
}
