// SPDX-License-Identifier: MIT
//
// qrand: Quantum Random Values from Buffered Entropy
// Copyright (c) 2025 qrand Contributors

//! qrand Core Library
//!
//! Uniformly random bits, integers, floats, complex numbers and UUIDs backed
//! by an external, non-deterministic entropy source such as a quantum random
//! number generator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   take(n)   ┌──────────────┐  request_batch  ┌──────────────┐
//! │  QuantumRng  │ ──────────> │   BitCache   │ ──────────────> │ EntropySource│
//! │  (derive)    │ <────────── │   (FIFO)     │ <────────────── │  (backend)   │
//! └──────────────┘   n bits    └──────────────┘    W bits       └──────────────┘
//! ```
//!
//! - `source`: the `EntropySource` trait and the config-selected `Backend`
//! - `fetcher`: HTTP backend for QRNG appliances and gateways
//! - `cache`: FIFO bit cache that batches backend calls
//! - `derive`: rejection sampling and mantissa injection
//! - `complex`: rectangular and area-uniform polar complex sampling
//! - `config`: configuration loading and validation
//! - `retry`: backoff policy used by remote backends
//! - `error`: unified error types
//!
//! # Example
//!
//! ```no_run
//! use qrand_core::{QuantumRng, SimulatedSource};
//!
//! # async fn demo() -> qrand_core::Result<()> {
//! let rng = QuantumRng::from_source(SimulatedSource::new(8))?;
//! let die = rng.random_int(1, 6).await?;
//! let x = rng.random_unit_double().await?;
//! # Ok(())
//! # }
//! ```

pub mod bits;
pub mod cache;
pub mod complex;
pub mod config;
pub mod derive;
pub mod error;
pub mod fetcher;
pub mod retry;
pub mod source;

pub use bits::BitString;
pub use cache::{BitCache, CacheStats};
pub use complex::{ComplexPolar, ComplexRect};
pub use config::{BackendKind, QrandConfig};
pub use derive::QuantumRng;
pub use error::{Error, Result};
pub use source::{Backend, EntropySource, SimulatedSource};

pub use num_complex::Complex64;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bits per backend call, matching an 8-qubit register
pub const DEFAULT_CHANNEL_WIDTH: usize = 8;

/// Largest accepted channel width (64 KiB of bits per call)
pub const MAX_CHANNEL_WIDTH: usize = 65_536 * 8;
