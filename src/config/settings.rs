// src/config/settings.rs
//! Environment (.env) configuration surface.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::config::{
    BreakerConfig, CacheConfig, HealthConfig, OrchestratorConfig, RateLimitConfig,
    RateLimiterConfig,
};
use crate::models::{CountryCode, DataType};

/// Environment-driven application configuration.
///
/// Every field has a working default so the layer can be constructed in
/// tests without any environment at all.
#[derive(Debug, Clone)]
pub struct Config {
    pub country_rate_limits: Option<HashMap<CountryCode, u32>>,
    pub default_requests_per_minute: u32,
    pub global_requests_per_minute: Option<u32>,
    pub breaker_failure_threshold: u32,
    pub breaker_recovery_timeout_secs: u64,
    pub cache_enabled: bool,
    pub cache_ttl_secs: Option<HashMap<DataType, u64>>,
    pub max_cache_age_secs: u64,
    pub source_unavailable_after: u32,
    pub log_level: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Config {
            country_rate_limits: env::var("COUNTRY_RATE_LIMITS").ok().map(|s| {
                s.split(',')
                    .filter_map(|part| {
                        let mut kv = part.split(':');
                        let country = kv.next()?.trim().parse::<CountryCode>().ok()?;
                        let rpm = kv.next()?.trim().parse::<u32>().ok()?;
                        Some((country, rpm))
                    })
                    .collect()
            }),
            default_requests_per_minute: env::var("DEFAULT_REQUESTS_PER_MINUTE")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            global_requests_per_minute: env::var("GLOBAL_REQUESTS_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok()),
            breaker_failure_threshold: env::var("BREAKER_FAILURE_THRESHOLD")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            breaker_recovery_timeout_secs: env::var("BREAKER_RECOVERY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            cache_enabled: env::var("CACHE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            cache_ttl_secs: env::var("CACHE_TTL_SECS").ok().map(|s| {
                s.split(',')
                    .filter_map(|part| {
                        let mut kv = part.split(':');
                        let data_type = match kv.next()?.trim() {
                            "hashtags" => DataType::Hashtags,
                            "videos" => DataType::Videos,
                            "creators" => DataType::Creators,
                            "sounds" => DataType::Sounds,
                            "trends" => DataType::Trends,
                            _ => return None,
                        };
                        let ttl = kv.next()?.trim().parse::<u64>().ok()?;
                        Some((data_type, ttl))
                    })
                    .collect()
            }),
            max_cache_age_secs: env::var("MAX_CACHE_AGE_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86400),
            source_unavailable_after: env::var("SOURCE_UNAVAILABLE_AFTER")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            log_level: env::var("LOG_LEVEL").ok(),
        }
    }

    /// Lower environment settings into the typed orchestrator configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut rate_limiter = RateLimiterConfig {
            default_limit: RateLimitConfig::new(self.default_requests_per_minute),
            global_limit: self.global_requests_per_minute.map(RateLimitConfig::new),
            ..RateLimiterConfig::default()
        };
        if let Some(overrides) = &self.country_rate_limits {
            for (country, rpm) in overrides {
                rate_limiter
                    .country_limits
                    .insert(*country, RateLimitConfig::new(*rpm));
            }
        }

        let mut cache = CacheConfig {
            enabled: self.cache_enabled,
            max_cache_age_secs: self.max_cache_age_secs,
            ..CacheConfig::default()
        };
        if let Some(ttls) = &self.cache_ttl_secs {
            for (data_type, ttl) in ttls {
                cache.ttl_secs.insert(*data_type, *ttl);
            }
        }

        OrchestratorConfig {
            rate_limiter,
            breaker: BreakerConfig {
                failure_threshold: self.breaker_failure_threshold,
                recovery_timeout: Duration::from_secs(self.breaker_recovery_timeout_secs),
            },
            cache,
            health: HealthConfig {
                unavailable_after: self.source_unavailable_after,
            },
        }
    }

    pub fn validate_and_log(&self) {
        log::info!("Trend collector configuration loaded: {:?}", self);
        if self.breaker_failure_threshold == 0 {
            log::error!("BREAKER_FAILURE_THRESHOLD must be at least 1");
        }
        if self.default_requests_per_minute == 0 {
            log::error!("DEFAULT_REQUESTS_PER_MINUTE must be at least 1");
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            country_rate_limits: None,
            default_requests_per_minute: 300,
            global_requests_per_minute: None,
            breaker_failure_threshold: 5,
            breaker_recovery_timeout_secs: 60,
            cache_enabled: true,
            cache_ttl_secs: None,
            max_cache_age_secs: 86400,
            source_unavailable_after: 3,
            log_level: None,
        }
    }
}
