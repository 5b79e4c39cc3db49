//! Entropy sources
//!
//! An entropy source answers a single question: "give me one batch of fresh
//! random bits". Every batch has the same width, the source's channel width.

use crate::{
    bits::BitString,
    config::{BackendKind, QrandConfig},
    fetcher::{HttpSource, HttpSourceConfig},
    Error, Result,
};
use rand::{rngs::OsRng, RngCore};
use std::future::Future;
use tracing::info;

/// A producer of independent, uniformly distributed bits
pub trait EntropySource: Send + Sync {
    /// Number of bits every batch carries
    fn channel_width(&self) -> usize;

    /// Produce one batch of exactly `channel_width()` fresh bits
    fn request_batch(&self) -> impl Future<Output = Result<BitString>> + Send;
}

/// Local stand-in for quantum hardware
///
/// Each channel yields one bit per batch. Bits come from the operating
/// system's entropy source, whole bytes at a time.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    channels: usize,
}

impl SimulatedSource {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl EntropySource for SimulatedSource {
    fn channel_width(&self) -> usize {
        self.channels
    }

    async fn request_batch(&self) -> Result<BitString> {
        let mut bytes = vec![0u8; self.channels.div_ceil(8)];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::BackendUnavailable(format!("OS entropy source failed: {}", e)))?;

        let mut bits = BitString::from_bytes(&bytes);
        bits.truncate(self.channels);
        Ok(bits)
    }
}

/// Backend chosen by configuration
pub enum Backend {
    Simulated(SimulatedSource),
    Http(HttpSource),
}

impl Backend {
    /// Build the backend named by the configuration
    pub fn from_config(config: &QrandConfig) -> Result<Self> {
        match config.backend {
            BackendKind::Simulated => {
                info!(channels = config.channel_width, "Using simulated entropy backend");
                Ok(Backend::Simulated(SimulatedSource::new(config.channel_width)))
            }
            BackendKind::Http => {
                let url = config.source_url.as_deref().ok_or_else(|| {
                    Error::Config("source_url is required for the http backend".to_string())
                })?;
                let http_config = HttpSourceConfig::from_qrand_config(url, config)?;
                info!(
                    url = %http_config.base_url,
                    channel_width = http_config.channel_width,
                    "Using HTTP entropy backend"
                );
                Ok(Backend::Http(HttpSource::new(http_config)?))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Simulated(_) => BackendKind::Simulated,
            Backend::Http(_) => BackendKind::Http,
        }
    }
}

impl EntropySource for Backend {
    fn channel_width(&self) -> usize {
        match self {
            Backend::Simulated(source) => source.channel_width(),
            Backend::Http(source) => source.channel_width(),
        }
    }

    async fn request_batch(&self) -> Result<BitString> {
        match self {
            Backend::Simulated(source) => source.request_batch().await,
            Backend::Http(source) => source.request_batch().await,
        }
    }
}
