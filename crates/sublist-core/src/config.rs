//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/sublist/config.toml)
//! 3. Environment variables (SUBLIST_* prefix)
//!
//! Environment variables take precedence over config file values.
//!
//! Provider credentials are never read from or written to the config file.
//! They come from `CM_API_KEY` and `CM_LIST_ID` only.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderError;

/// Environment variable prefix
const ENV_PREFIX: &str = "SUBLIST";

/// Environment variable holding the provider API key
pub const API_KEY_VAR: &str = "CM_API_KEY";

/// Environment variable holding the provider list id
pub const LIST_ID_VAR: &str = "CM_LIST_ID";

/// Default provider API root
pub const DEFAULT_API_BASE_URL: &str = "https://api.createsend.com/api/v3.3";

/// Provider credentials
///
/// The API key is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    list_id: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, list_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            list_id: list_id.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("list_id", &self.list_id)
            .finish()
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider API root, without trailing slash
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Reads per reconciliation session before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between reconciliation reads, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// HTTP request timeout, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log file for TUI mode (defaults to {data_local_dir}/sublist/debug.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Record usage metrics to the log
    #[serde(default = "default_metrics")]
    pub metrics: bool,

    #[serde(skip)]
    api_key: Option<String>,

    #[serde(skip)]
    list_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            max_attempts: default_max_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            log_file: None,
            metrics: default_metrics(),
            api_key: None,
            list_id: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SUBLIST_API_BASE_URL, SUBLIST_MAX_ATTEMPTS, ...)
    /// 2. Config file (~/.config/sublist/config.toml or SUBLIST_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load only what the file says, without environment overrides
    ///
    /// Used when editing the file so overrides are not written back.
    pub fn load_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_API_BASE_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.api_base_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_MAX_ATTEMPTS", ENV_PREFIX)) {
            if let Ok(n) = val.parse::<u32>() {
                self.max_attempts = n;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_POLL_INTERVAL_SECS", ENV_PREFIX)) {
            if let Ok(n) = val.parse::<u64>() {
                self.poll_interval_secs = n;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_REQUEST_TIMEOUT_SECS", ENV_PREFIX)) {
            if let Ok(n) = val.parse::<u64>() {
                self.request_timeout_secs = n;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        if let Ok(val) = std::env::var(format!("{}_METRICS", ENV_PREFIX)) {
            if let Ok(enabled) = val.parse::<bool>() {
                self.metrics = enabled;
            }
        }

        self.api_key = std::env::var(API_KEY_VAR).ok().filter(|v| !v.is_empty());
        self.list_id = std::env::var(LIST_ID_VAR).ok().filter(|v| !v.is_empty());
    }

    /// Provider credentials from the environment
    pub fn credentials(&self) -> Result<Credentials, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ProviderError::MissingCredentials(API_KEY_VAR))?;
        let list_id = self
            .list_id
            .as_ref()
            .ok_or(ProviderError::MissingCredentials(LIST_ID_VAR))?;
        Ok(Credentials::new(api_key.clone(), list_id.clone()))
    }

    /// Whether both credentials are present
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.list_id.is_some()
    }

    /// Delay between reconciliation reads
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Effective TUI log file path
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| default_data_dir().join("debug.log"))
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SUBLIST_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sublist")
            .join("config.toml")
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_max_attempts() -> u32 {
    20
}

fn default_poll_interval_secs() -> u64 {
    12
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_metrics() -> bool {
    true
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sublist")
}
