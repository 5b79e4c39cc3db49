//! HTTP entropy backend
//!
//! Fetches raw random bytes from a QRNG appliance or gateway and hands them
//! to the cache as fixed-width bit batches.

use crate::{
    bits::BitString, config::QrandConfig, retry::RetryPolicy, source::EntropySource, Error,
    Result,
};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Configuration for the HTTP entropy backend
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Endpoint serving raw random bytes
    pub base_url: Url,
    /// Bits per batch
    pub channel_width: usize,
    /// Optional key sent as the `api_key` query parameter
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Refuse plain-HTTP connections
    pub https_only: bool,
    /// Retry policy applied to each batch
    pub retry_policy: RetryPolicy,
}

impl HttpSourceConfig {
    pub fn new(base_url: Url, channel_width: usize) -> Self {
        Self {
            base_url,
            channel_width,
            api_key: None,
            timeout: Duration::from_secs(30),
            https_only: true,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn from_qrand_config(url: &str, config: &QrandConfig) -> Result<Self> {
        let base_url = Url::parse(url)
            .map_err(|e| Error::Config(format!("Invalid source_url '{}': {}", url, e)))?;
        Ok(Self {
            base_url,
            channel_width: config.channel_width,
            api_key: config.api_key.clone(),
            timeout: config.request_timeout(),
            https_only: !config.allow_insecure_http,
            retry_policy: RetryPolicy::from_config(config),
        })
    }

    /// Bytes needed to cover one batch
    pub fn bytes_per_batch(&self) -> usize {
        self.channel_width.div_ceil(8)
    }
}

/// Entropy source backed by an HTTP endpoint
pub struct HttpSource {
    client: Client,
    config: HttpSourceConfig,
}

impl HttpSource {
    /// Create a new source with configuration
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        if config.channel_width == 0 {
            return Err(Error::Config("channel_width must be > 0".to_string()));
        }

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .use_rustls_tls()
            .https_only(config.https_only)
            .build()
            .map_err(Error::Network)?;

        Ok(Self { client, config })
    }

    /// Fetch one batch without retry
    async fn fetch_once(&self) -> Result<BitString> {
        let url = self.build_request_url();

        debug!("Fetching {} bytes from {}", self.config.bytes_per_batch(), self.config.base_url);

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!("Failed to fetch from {}: {}", self.config.base_url, e);
            if e.is_timeout() {
                Error::Timeout
            } else if e.is_connect() {
                Error::BackendUnavailable(format!("cannot reach {}: {}", self.config.base_url, e))
            } else {
                Error::Network(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("HTTP error {}: {}", status, body);
            return Err(Error::BackendUnavailable(format!("HTTP {}: {}", status, body)));
        }

        let data = response.bytes().await.map_err(Error::Network)?;
        self.validate_response(&data)?;

        let mut bits = BitString::from_bytes(&data[..self.config.bytes_per_batch()]);
        bits.truncate(self.config.channel_width);

        debug!("Successfully fetched {} bits", bits.len());
        Ok(bits)
    }

    /// Build request URL with query parameters
    fn build_request_url(&self) -> Url {
        let mut url = self.config.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("bytes", &self.config.bytes_per_batch().to_string());
            if let Some(key) = &self.config.api_key {
                query.append_pair("api_key", key);
            }
        }
        url
    }

    /// Validate fetched data
    fn validate_response(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::Validation("Received empty response".to_string()));
        }

        let expected = self.config.bytes_per_batch();
        if data.len() < expected {
            return Err(Error::Validation(format!(
                "Received {} bytes, expected {}",
                data.len(),
                expected
            )));
        }
        if data.len() > expected {
            debug!("Received {} bytes, using the first {}", data.len(), expected);
        }

        if data.len() > 1 && data.iter().all(|&b| b == data[0]) {
            warn!("Warning: All bytes have the same value ({})", data[0]);
        }

        Ok(())
    }

    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }
}

impl EntropySource for HttpSource {
    fn channel_width(&self) -> usize {
        self.config.channel_width
    }

    #[instrument(skip(self), fields(channel_width = self.config.channel_width))]
    async fn request_batch(&self) -> Result<BitString> {
        self.config.retry_policy.execute(|| self.fetch_once()).await
    }
}
