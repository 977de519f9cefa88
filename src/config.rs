//! Configuration management for Keygate.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{KeygateError, Result};
use crate::ratelimit::{Credential, Dimension};

/// Main configuration for a Keygate host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeygateConfig {
    /// Shared store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Credential pool, in rotation order
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

/// Shared store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL. The in-process store is used when unset.
    #[serde(default)]
    pub redis_url: Option<String>,
}

/// Rate limiting configuration.
///
/// Window lengths are independent of the labels of the dimensions they
/// enforce: the request window defaults to 10 seconds even though its
/// ceiling is usually quoted per minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Prefix for every store key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Length of the short request-count window in seconds
    #[serde(default = "default_request_window")]
    pub request_window_secs: f64,

    /// Length of the per-minute unit window in seconds
    #[serde(default = "default_unit_minute_window")]
    pub unit_minute_window_secs: f64,

    /// Length of the per-day unit window in seconds
    #[serde(default = "default_unit_day_window")]
    pub unit_day_window_secs: f64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            request_window_secs: default_request_window(),
            unit_minute_window_secs: default_unit_minute_window(),
            unit_day_window_secs: default_unit_day_window(),
        }
    }
}

fn default_key_prefix() -> String {
    "rate_limit".to_string()
}

fn default_request_window() -> f64 {
    10.0
}

fn default_unit_minute_window() -> f64 {
    60.0
}

fn default_unit_day_window() -> f64 {
    86400.0
}

impl RateLimitingConfig {
    /// Window length in seconds for a dimension.
    pub fn window_secs(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Requests => self.request_window_secs,
            Dimension::UnitsPerMinute => self.unit_minute_window_secs,
            Dimension::UnitsPerDay => self.unit_day_window_secs,
        }
    }

    /// Store key for one credential's window.
    pub fn window_key(&self, credential_id: &str, dimension: Dimension) -> String {
        format!("{}:{}:{}", self.key_prefix, credential_id, dimension.key_suffix())
    }

    /// Store key for the shared rotation cursor.
    pub fn cursor_key(&self) -> String {
        format!("{}:key_index", self.key_prefix)
    }

    /// Check that every window length is a positive, finite number.
    pub fn validate(&self) -> Result<()> {
        for dimension in Dimension::ALL {
            let secs = self.window_secs(dimension);
            if !secs.is_finite() || secs <= 0.0 {
                return Err(KeygateError::Config(format!(
                    "window length for {} must be positive, got {}",
                    dimension, secs
                )));
            }
        }
        Ok(())
    }
}

impl KeygateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| KeygateError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from a file, then apply `KEYGATE__*` environment
    /// overrides (for example `KEYGATE__STORE__REDIS_URL`).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("KEYGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| KeygateError::Config(format!("Failed to load config: {}", e)))
    }
}
