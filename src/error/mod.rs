// src/error/mod.rs
//! Error taxonomy for the collector.

use thiserror::Error;

use crate::models::SourceId;

/// Error taxonomy for the trend-collection resilience layer.
///
/// Transient source-level failures (`TransportFailure`, `EmptyResult`,
/// `SourceUnavailable`) are absorbed inside the fallback loop and never
/// reach callers individually; only `ExhaustedSources` and configuration
/// errors surface.
#[derive(Debug, Clone, Error)]
pub enum CollectorError {
    /// Rate limit would be exceeded; resolved by waiting or by the caller
    /// choosing non-blocking probing
    #[error("Rate limit exceeded for {key}, retry in {wait_secs:.2}s")]
    RateLimitExceeded { key: String, wait_secs: f64 },

    /// Circuit breaker open or source flagged unavailable
    #[error("Source {0} unavailable: {1}")]
    SourceUnavailable(SourceId, String),

    /// Adapter raised a transport-level error
    #[error("Transport failure from {0}: {1}")]
    TransportFailure(SourceId, String),

    /// Adapter succeeded but returned nothing; treated as a soft failure
    #[error("Source {0} returned no data")]
    EmptyResult(SourceId),

    /// No usable cache entry at the requested freshness
    #[error("Cache miss for key {0}")]
    CacheMiss(String),

    /// Every source and the stale cache failed
    #[error("All sources exhausted: {0}")]
    ExhaustedSources(String),

    /// Misconfiguration; fails fast at call or construction time
    #[error("Config Error: {0}")]
    ConfigError(String),

    /// Invalid caller-supplied parameters
    #[error("Invalid Input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        CollectorError::InvalidInput(format!("JSON serialization error: {}", err))
    }
}

impl CollectorError {
    /// Determines if an error is recoverable by continuing the fallback loop
    /// or retrying later.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CollectorError::RateLimitExceeded { .. } => true, // resolves once tokens refill
            CollectorError::SourceUnavailable(..) => true,    // breaker recovers on its own
            CollectorError::TransportFailure(..) => true,
            CollectorError::EmptyResult(_) => true, // next source may have data
            CollectorError::CacheMiss(_) => true,
            CollectorError::ExhaustedSources(_) => false, // nothing left to try right now
            CollectorError::ConfigError(_) => false,      // config needs fixing
            CollectorError::InvalidInput(_) => false,
        }
    }

    /// Categorizes error for metrics and monitoring.
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            CollectorError::RateLimitExceeded { .. } => ErrorCategory::Backpressure,
            CollectorError::SourceUnavailable(..) => ErrorCategory::Source,
            CollectorError::TransportFailure(..) => ErrorCategory::Network,
            CollectorError::EmptyResult(_) => ErrorCategory::Data,
            CollectorError::CacheMiss(_) => ErrorCategory::Cache,
            CollectorError::ExhaustedSources(_) => ErrorCategory::Critical,
            CollectorError::ConfigError(_) => ErrorCategory::Configuration,
            CollectorError::InvalidInput(_) => ErrorCategory::Configuration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Backpressure,
    Source,
    Network,
    Data,
    Cache,
    Configuration,
    Critical,
}

pub type Result<T> = std::result::Result<T, CollectorError>;
