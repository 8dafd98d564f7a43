use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding [`ClientConfig::base_url`].
pub const ENV_BASE_URL: &str = "IHUMAN_BASE_URL";
/// Environment variable overriding [`ClientConfig::api_key`].
pub const ENV_API_KEY: &str = "IHUMAN_API_KEY";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Constructor-time settings for an SDK client.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Static key sent as `X-API-Key` when no session token is held.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "d_30")]
    pub timeout_secs: u64,
    #[serde(default = "d_true")]
    pub auto_reconnect: bool,
    /// Extra attempts after the first failed HTTP request.
    #[serde(default = "d_3")]
    pub max_retries: u32,
    #[serde(default = "d_1000")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "d_3000")]
    pub reconnect_delay_ms: u64,
    /// `0` means reconnect forever.
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key: None,
            timeout_secs: d_30(),
            auto_reconnect: true,
            max_retries: d_3(),
            retry_base_delay_ms: d_1000(),
            reconnect_delay_ms: d_3000(),
            max_reconnect_attempts: 0,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Override `base_url` / `api_key` from `IHUMAN_BASE_URL` / `IHUMAN_API_KEY`.
    pub fn apply_env(mut self) -> Self {
        if let Some(url) = non_empty_env(ENV_BASE_URL) {
            tracing::debug!(base_url = %url, "base_url overridden from environment");
            self.base_url = url;
        }
        if let Some(key) = non_empty_env(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "http://localhost:5173".into()
}
fn d_30() -> u64 {
    30
}
fn d_true() -> bool {
    true
}
fn d_3() -> u32 {
    3
}
fn d_1000() -> u64 {
    1000
}
fn d_3000() -> u64 {
    3000
}
