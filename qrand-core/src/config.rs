//! Configuration management for qrand

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Entropy backend selection
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Operating-system entropy standing in for quantum hardware
    #[default]
    Simulated,
    /// Raw bytes from a QRNG appliance or gateway over HTTP(S)
    Http,
}

/// Library and CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QrandConfig {
    /// Which entropy backend to use
    #[serde(default)]
    pub backend: BackendKind,

    /// Bits produced per backend call
    #[serde(default = "default_channel_width")]
    pub channel_width: usize,

    /// Endpoint serving raw random bytes (http backend only)
    #[serde(default)]
    pub source_url: Option<String>,

    /// Key appended as the `api_key` query parameter (http backend only)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum attempts per batch request (1 disables retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Permit plain-HTTP source URLs
    #[serde(default)]
    pub allow_insecure_http: bool,

    /// Bits to cache before serving the first request
    #[serde(default)]
    pub prefill_bits: usize,
}

impl Default for QrandConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            channel_width: default_channel_width(),
            source_url: None,
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            allow_insecure_http: false,
            prefill_bits: 0,
        }
    }
}

impl QrandConfig {
    /// Load configuration from `QRAND_*` environment variables
    pub fn from_env() -> Result<Self> {
        let config: Self = envy::prefixed("QRAND_").from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with `QRAND_*` variables taking precedence
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: Self = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(::config::Environment::with_prefix("QRAND"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.channel_width == 0 || self.channel_width > crate::MAX_CHANNEL_WIDTH {
            return Err(Error::Config(format!(
                "channel_width must be between 1 and {}",
                crate::MAX_CHANNEL_WIDTH
            )));
        }

        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }

        if self.backend == BackendKind::Http {
            let raw = self.source_url.as_deref().ok_or_else(|| {
                Error::Config("source_url is required for the http backend".to_string())
            })?;
            let url = Url::parse(raw)
                .map_err(|e| Error::Config(format!("Invalid source_url '{}': {}", raw, e)))?;

            match url.scheme() {
                "https" => {}
                "http" if self.allow_insecure_http => {}
                "http" => {
                    return Err(Error::Config(
                        "source_url must use https (set allow_insecure_http to override)"
                            .to_string(),
                    ))
                }
                other => {
                    return Err(Error::Config(format!(
                        "Unsupported source_url scheme '{}'",
                        other
                    )))
                }
            }

            if self.request_timeout_ms == 0 {
                return Err(Error::Config("request_timeout_ms must be > 0".to_string()));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

// Default value functions
fn default_channel_width() -> usize {
    crate::DEFAULT_CHANNEL_WIDTH
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    100
}
