//! Resilience layer for multi-source TikTok trend collection.
//!
//! Sits between callers and a set of independently unreliable data sources
//! (official API, Creative Center scraper, emergency generator) and
//! provides per-source rate limiting, circuit breaking, ordered fallback,
//! and a staleness-tolerant cache that can serve old data when every live
//! source is down.

pub mod breaker;
pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod models;
pub mod ratelimit;
pub mod sources;
pub mod utils;

// Re-export the surface most callers need.
pub use breaker::{BreakerState, CircuitBreaker};
pub use cache::{CacheEntry, CacheStore};
pub use config::{
    BreakerConfig, CacheConfig, Config, HealthConfig, OrchestratorConfig, RateLimitConfig,
    RateLimiterConfig,
};
pub use error::{CollectorError, Result};
pub use fallback::{FallbackOrchestrator, FallbackResult, FallbackStats};
pub use models::{CountryCode, DataType, NicheType, RawRecord, SourceId, TrendDirection};
pub use ratelimit::{RateLimiter, RateLimitStatus, RateLimiterSummary, TokenBucket};
pub use sources::{EmergencyFallbackSource, SourceAdapter, SourceHealth};
