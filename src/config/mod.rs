// src/config/mod.rs
//! Immutable configuration values for the resilience layer.
//!
//! The rate limiter, circuit breakers and cache are all constructed from
//! explicit config structs; `settings::Config` assembles them from the
//! environment for deployments that configure through `.env`.

pub mod settings;

pub use settings::Config;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::models::{CountryCode, DataType};

/// Rate limit for one country tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    /// Burst headroom; defaults to 2x RPM when unset (inherited tuning
    /// constant, configurable rather than invariant).
    pub burst_capacity: Option<u32>,
}

impl RateLimitConfig {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst_capacity: None,
        }
    }

    pub fn with_burst(requests_per_minute: u32, burst_capacity: u32) -> Self {
        Self {
            requests_per_minute,
            burst_capacity: Some(burst_capacity),
        }
    }

    pub fn burst_or_default(&self) -> u32 {
        self.burst_capacity
            .unwrap_or(self.requests_per_minute.saturating_mul(2))
    }
}

/// Default per-country tiers: TikTok's main markets get the high tier,
/// everything else the standard tier.
static DEFAULT_COUNTRY_LIMITS: Lazy<HashMap<CountryCode, RateLimitConfig>> = Lazy::new(|| {
    let mut limits = HashMap::new();
    for country in [
        CountryCode::US,
        CountryCode::BR,
        CountryCode::MX,
        CountryCode::ID,
    ] {
        limits.insert(country, RateLimitConfig::new(600));
    }
    for country in [
        CountryCode::UK,
        CountryCode::DE,
        CountryCode::FR,
        CountryCode::JP,
    ] {
        limits.insert(country, RateLimitConfig::new(300));
    }
    limits
});

/// Per-endpoint-category cost multipliers: cheaper categories above 1.0,
/// expensive ones below.
static DEFAULT_ENDPOINT_MULTIPLIERS: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    HashMap::from([
        (DataType::Hashtags.as_str().to_string(), 1.0),
        (DataType::Videos.as_str().to_string(), 0.8),
        (DataType::Creators.as_str().to_string(), 0.9),
        (DataType::Sounds.as_str().to_string(), 0.7),
        (DataType::Trends.as_str().to_string(), 1.2),
    ])
});

/// Full configuration for the rate limiter registry.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub country_limits: HashMap<CountryCode, RateLimitConfig>,
    pub default_limit: RateLimitConfig,
    pub endpoint_multipliers: HashMap<String, f64>,
    /// Optional process-wide bucket checked before any per-key bucket.
    pub global_limit: Option<RateLimitConfig>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            country_limits: DEFAULT_COUNTRY_LIMITS.clone(),
            default_limit: RateLimitConfig::new(300),
            endpoint_multipliers: DEFAULT_ENDPOINT_MULTIPLIERS.clone(),
            global_limit: None,
        }
    }
}

impl RateLimiterConfig {
    pub fn limit_for(&self, country: CountryCode) -> RateLimitConfig {
        self.country_limits
            .get(&country)
            .copied()
            .unwrap_or(self.default_limit)
    }

    pub fn multiplier_for(&self, endpoint: &str) -> f64 {
        self.endpoint_multipliers
            .get(endpoint)
            .copied()
            .unwrap_or(1.0)
    }
}

/// Circuit breaker tuning shared by all per-source breakers.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Cache tuning: per-data-type TTLs plus the stale-read ceiling.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: HashMap<DataType, u64>,
    /// Hard ceiling for stale-but-usable reads (last-resort fallback tier).
    pub max_cache_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: HashMap::from([
                (DataType::Hashtags, 3600),
                (DataType::Creators, 1800),
                (DataType::Sounds, 1800),
                (DataType::Trends, 900),
            ]),
            max_cache_age_secs: 24 * 3600,
        }
    }
}

impl CacheConfig {
    /// TTL for a data type; types without an explicit entry inherit the
    /// hashtag TTL.
    pub fn ttl_for(&self, data_type: DataType) -> u64 {
        self.ttl_secs
            .get(&data_type)
            .or_else(|| self.ttl_secs.get(&DataType::Hashtags))
            .copied()
            .unwrap_or(3600)
    }

    pub fn max_cache_age(&self) -> Duration {
        Duration::from_secs(self.max_cache_age_secs)
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub rate_limiter: RateLimiterConfig,
    pub breaker: BreakerConfig,
    pub cache: CacheConfig,
    pub health: HealthConfig,
}

/// Source health reporting thresholds.
#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    /// Consecutive failures after which a source is reported unavailable.
    pub unavailable_after: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            unavailable_after: 3,
        }
    }
}
