//! Configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Full opflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpflowConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Grant negotiation timings.
    #[serde(default)]
    pub grant: GrantConfig,

    /// Payment execution settings.
    #[serde(default)]
    pub payments: PaymentsConfig,

    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantConfig {
    /// Pause after opening the authorization URL before polling starts.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Poll interval used when the server does not suggest one.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Overall polling budget.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Lifetime of the incoming payment created for each transfer.
    #[serde(default = "default_incoming_payment_expiry_secs")]
    pub incoming_payment_expiry_secs: u64,
    /// Upper bound on token rotations for a single call. Unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_token_rotations: Option<u32>,
    /// Number of outgoing payments fetched by the history listing.
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_settle_delay_ms() -> u64 {
    5_000
}
fn default_poll_interval_ms() -> u64 {
    3_000
}
fn default_poll_timeout_ms() -> u64 {
    10_000
}
fn default_incoming_payment_expiry_secs() -> u64 {
    15
}
fn default_history_page_size() -> u32 {
    10
}
fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl GrantConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            incoming_payment_expiry_secs: default_incoming_payment_expiry_secs(),
            max_token_rotations: None,
            history_page_size: default_history_page_size(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl OpflowConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: OpflowConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}
