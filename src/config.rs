use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{DEFAULT_API_BASE, DEFAULT_WS_URL};

/// Default config file path.
pub const CONFIG_PATH: &str = "monitor.toml";

/// Environment override for the REST base URL.
pub const API_URL_ENV: &str = "ARBITROBOT_API_URL";

/// Environment override for the WebSocket URL.
pub const WS_URL_ENV: &str = "ARBITROBOT_WS_URL";

/// Top-level application config deserialized from `monitor.toml`.
///
/// Every field has a default, so a missing file or an empty table yields a
/// working local-development configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ws: WsConfig,
    #[serde(default)]
    pub paging: PagingConfig,
}

/// REST client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry budget for transient failures (timeouts, network errors, 5xx).
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Base retry delay; the n-th retry waits n times this.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// WebSocket feed client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    #[serde(default = "default_ws_url")]
    pub url: String,
    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Consecutive failed attempts tolerated before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Interval between keep-alive pings while the socket is open.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

/// Listing page sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE.to_owned()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_owned()
}

fn default_reconnect_interval_ms() -> u64 {
    5_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl WsConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl MonitorConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load config from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Apply `ARBITROBOT_API_URL` / `ARBITROBOT_WS_URL` overrides and
    /// validate that both URLs parse.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(base) = std::env::var(API_URL_ENV) {
            self.api.base_url = base;
        }
        if let Ok(ws) = std::env::var(WS_URL_ENV) {
            self.ws.url = ws;
        }
        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("invalid API base URL: {}", self.api.base_url))?;
        url::Url::parse(&self.ws.url)
            .with_context(|| format!("invalid WebSocket URL: {}", self.ws.url))?;
        Ok(())
    }
}
