// src/sources/mod.rs
//! Source adapter boundary and per-source health tracking.
//!
//! The wire-level clients (official API, Creative Center scraper) live
//! outside this crate; they plug in through [`SourceAdapter`]. Only the
//! in-process emergency generator ships here.

pub mod emergency;

pub use emergency::EmergencyFallbackSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{CountryCode, DataType, NicheType, RawRecord, SourceId};

/// One data source in the fallback chain.
///
/// Transport errors surface as `Err`; an empty `Ok` is equally treated as a
/// failure signal by the orchestrator, which never interprets error
/// content beyond logging it.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn id(&self) -> SourceId;

    /// Endpoint category charged against the rate limiter for this
    /// operation. `None` exempts the source from rate limiting (the
    /// emergency generator does no network work).
    fn rate_limit_endpoint(&self, data_type: DataType) -> Option<String> {
        Some(data_type.as_str().to_string())
    }

    async fn fetch(
        &self,
        data_type: DataType,
        country: CountryCode,
        limit: usize,
        niche: Option<NicheType>,
    ) -> Result<Vec<RawRecord>>;
}

/// Coarse liveness record for one source.
///
/// Reporting-only: the circuit breaker is the gate that decides whether a
/// source may be called (see DESIGN.md on unifying the two signals).
#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub available: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl SourceHealth {
    pub fn new() -> Self {
        Self {
            available: true,
            last_success: None,
            consecutive_failures: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.available = true;
        self.last_success = Some(Utc::now());
        self.consecutive_failures = 0;
    }

    /// Count a failure; after `unavailable_after` consecutive failures the
    /// source is reported unavailable. Returns true when this call flipped
    /// the flag.
    pub fn record_failure(&mut self, unavailable_after: u32) -> bool {
        self.consecutive_failures += 1;
        if self.available && self.consecutive_failures >= unavailable_after {
            self.available = false;
            return true;
        }
        false
    }
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self::new()
    }
}
