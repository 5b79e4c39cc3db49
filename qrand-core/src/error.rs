// SPDX-License-Identifier: MIT
//
// qrand: Quantum Random Values from Buffered Entropy
// Copyright (c) 2025 qrand Contributors

//! Error types for qrand
//!
//! A single taxonomy shared by the cache, the value derivations and the
//! entropy backends, built with `thiserror`.

pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for qrand operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Range bounds are reversed or not finite
    #[error("Invalid range: min {min}, max {max}")]
    InvalidRange { min: String, max: String },

    /// The entropy source could not produce a batch
    #[error("Entropy backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Network communication failed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Backend returned data that does not match its contract
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,
}

impl Error {
    /// Build an `InvalidRange` error from any displayable bounds
    pub fn invalid_range(min: impl ToString, max: impl ToString) -> Self {
        Error::InvalidRange {
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Check if error is transient and retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Timeout | Error::BackendUnavailable(_)
        )
    }

    /// Check if error was caused by caller-supplied bounds
    pub fn is_invalid_range(&self) -> bool {
        matches!(self, Error::InvalidRange { .. })
    }
}

impl From<::config::ConfigError> for Error {
    fn from(e: ::config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<envy::Error> for Error {
    fn from(e: envy::Error) -> Self {
        Error::Config(format!("Failed to parse environment variables: {}", e))
    }
}
