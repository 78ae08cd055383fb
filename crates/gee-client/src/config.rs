//! Client configuration loading and validation.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Default backend URL for local development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Default per-request timeout (GEE analyses are slow).
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the backend client, loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Retry settings as they appear in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ClientConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }
}
