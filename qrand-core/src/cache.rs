//! FIFO bit cache in front of an entropy source
//!
//! Backend calls are expensive, so the cache requests whole batches and
//! keeps whatever a caller did not consume for the next caller. Bits leave
//! the cache in exactly the order they arrived and are never served twice.

use crate::{bits::BitString, source::EntropySource, Error, Result};
use parking_lot::RwLock;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Counters describing cache traffic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Backend calls that returned a batch
    pub batches_requested: u64,
    /// Bits received from the backend
    pub bits_fetched: u64,
    /// Bits handed to callers
    pub bits_served: u64,
    /// Completed `take` calls
    pub takes: u64,
    /// `take`/`prefill` calls that had to reach the backend
    pub refills: u64,
    /// Bits thrown away by `drain`
    pub bits_discarded: u64,
}

/// Bit cache owning an entropy source
///
/// # Design
///
/// - The buffer sits behind an async mutex held for the whole
///   fill-then-pop sequence, so concurrent callers get disjoint bit ranges
/// - Refills request `ceil(need / channel_width)` batches
/// - Statistics live behind a separate `parking_lot::RwLock` and can be read
///   while a slow refill is in flight
pub struct BitCache<S> {
    source: S,
    channel_width: usize,
    bits: Mutex<VecDeque<bool>>,
    stats: RwLock<CacheStats>,
}

impl<S: EntropySource> BitCache<S> {
    /// Create an empty cache over `source`
    pub fn new(source: S) -> Result<Self> {
        let channel_width = source.channel_width();
        if channel_width == 0 {
            return Err(Error::Config(
                "entropy source reports a channel width of 0".to_string(),
            ));
        }

        Ok(Self {
            source,
            channel_width,
            bits: Mutex::new(VecDeque::new()),
            stats: RwLock::new(CacheStats::default()),
        })
    }

    /// Remove and return exactly `n` bits, refilling from the source as needed
    ///
    /// Either all `n` bits are returned or the call fails; on failure any
    /// batches fetched before the error stay cached.
    pub async fn take(&self, n: usize) -> Result<BitString> {
        if n == 0 {
            return Ok(BitString::new());
        }

        let mut bits = self.bits.lock().await;
        self.fill(&mut bits, n).await?;

        let taken: BitString = bits.drain(..n).collect();

        let mut stats = self.stats.write();
        stats.takes += 1;
        stats.bits_served += n as u64;

        Ok(taken)
    }

    /// Make sure at least `n` bits are cached without consuming any
    pub async fn prefill(&self, n: usize) -> Result<()> {
        let mut bits = self.bits.lock().await;
        self.fill(&mut bits, n).await
    }

    /// Discard every cached bit, returning how many were dropped
    pub async fn drain(&self) -> usize {
        let mut bits = self.bits.lock().await;
        let discarded = bits.len();
        bits.clear();

        if discarded > 0 {
            debug!(discarded, "Drained bit cache");
        }
        self.stats.write().bits_discarded += discarded as u64;
        discarded
    }

    /// Number of bits currently cached
    pub async fn buffered(&self) -> usize {
        self.bits.lock().await.len()
    }

    pub fn channel_width(&self) -> usize {
        self.channel_width
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }

    async fn fill(&self, bits: &mut VecDeque<bool>, n: usize) -> Result<()> {
        if bits.len() >= n {
            return Ok(());
        }

        let need = n - bits.len();
        let iterations = need.div_ceil(self.channel_width);
        debug!(
            need,
            iterations,
            channel_width = self.channel_width,
            "Refilling bit cache"
        );
        self.stats.write().refills += 1;

        for _ in 0..iterations {
            let batch = self.source.request_batch().await.map_err(|e| {
                warn!("Entropy batch request failed: {}", e);
                e
            })?;

            if batch.len() != self.channel_width {
                return Err(Error::Validation(format!(
                    "Entropy batch carried {} bits, expected {}",
                    batch.len(),
                    self.channel_width
                )));
            }

            bits.extend(batch);

            let mut stats = self.stats.write();
            stats.batches_requested += 1;
            stats.bits_fetched += self.channel_width as u64;
        }

        Ok(())
    }
}
