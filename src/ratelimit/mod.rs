// src/ratelimit/mod.rs
//! Per-country, per-endpoint rate limiting over lazily created token
//! buckets, with an optional process-wide bucket gating everything.

pub mod bucket;

pub use bucket::TokenBucket;

use dashmap::DashMap;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{RateLimitConfig, RateLimiterConfig};
use crate::models::CountryCode;

#[derive(Debug, Default, Clone)]
struct KeyStats {
    requests: u64,
    rejections: u64,
    wait_time_secs: f64,
}

/// Registry of token buckets keyed by `country:endpoint`.
///
/// Buckets are created lazily from the country tier table multiplied by the
/// endpoint cost factor. When a global limit is configured it is evaluated
/// before the per-key bucket on every operation; a rejection there
/// short-circuits the per-key check.
pub struct RateLimiter {
    config: RwLock<RateLimiterConfig>,
    buckets: DashMap<String, Arc<TokenBucket>>,
    global_bucket: Option<Arc<TokenBucket>>,
    stats: DashMap<String, KeyStats>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let global_bucket = config.global_limit.map(|limit| {
            Arc::new(TokenBucket::new(
                limit.requests_per_minute as f64 / 60.0,
                limit.burst_or_default(),
            ))
        });

        info!(
            "RateLimiter initialized: {} country tiers, default {} req/min, global limit {}",
            config.country_limits.len(),
            config.default_limit.requests_per_minute,
            if global_bucket.is_some() { "on" } else { "off" }
        );

        Self {
            config: RwLock::new(config),
            buckets: DashMap::new(),
            global_bucket,
            stats: DashMap::new(),
        }
    }

    fn bucket_key(country: CountryCode, endpoint: &str) -> String {
        format!("{}:{}", country, endpoint)
    }

    fn get_or_create_bucket(&self, country: CountryCode, endpoint: &str) -> Arc<TokenBucket> {
        let key = Self::bucket_key(country, endpoint);
        if let Some(bucket) = self.buckets.get(&key) {
            return bucket.clone();
        }

        let (limit, multiplier) = {
            let config = self.config.read().expect("rate limiter config poisoned");
            (config.limit_for(country), config.multiplier_for(endpoint))
        };
        let effective_rpm = limit.requests_per_minute as f64 * multiplier;
        let capacity = limit.burst_or_default();

        let bucket = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(TokenBucket::new(effective_rpm / 60.0, capacity)))
            .clone();

        debug!(
            "Created bucket for {}: {:.1} req/min, capacity {}",
            key, effective_rpm, capacity
        );
        bucket
    }

    /// Non-blocking probe. Consumes tokens when allowed; on denial reports
    /// how long the caller would have to wait.
    pub async fn check_limit(
        &self,
        country: CountryCode,
        endpoint: &str,
        tokens: u32,
    ) -> (bool, f64) {
        if let Some(global) = &self.global_bucket {
            if !global.consume(tokens).await {
                let wait = global.time_until_available(tokens).await;
                return (false, wait.as_secs_f64());
            }
        }

        let bucket = self.get_or_create_bucket(country, endpoint);
        if !bucket.consume(tokens).await {
            let wait = bucket.time_until_available(tokens).await;
            return (false, wait.as_secs_f64());
        }

        (true, 0.0)
    }

    /// Blocking acquisition: awaits the global bucket first, then the
    /// per-key bucket, and records request/wait statistics for the key.
    pub async fn wait_if_needed(&self, country: CountryCode, endpoint: &str, tokens: u32) {
        let started = Instant::now();

        if let Some(global) = &self.global_bucket {
            global.wait_for_tokens(tokens).await;
        }

        let bucket = self.get_or_create_bucket(country, endpoint);
        bucket.wait_for_tokens(tokens).await;

        let waited = started.elapsed();
        let key = Self::bucket_key(country, endpoint);
        {
            let mut stats = self.stats.entry(key.clone()).or_default();
            stats.requests += 1;
            stats.wait_time_secs += waited.as_secs_f64();
        }

        if waited > Duration::from_millis(1) {
            debug!("Rate limited wait for {}: {:.2}s", key, waited.as_secs_f64());
        }
    }

    /// Unified acquisition. In blocking mode always succeeds (eventually);
    /// in non-blocking mode a denial bumps the key's rejection counter.
    pub async fn acquire(
        &self,
        country: CountryCode,
        endpoint: &str,
        tokens: u32,
        block: bool,
    ) -> bool {
        if block {
            self.wait_if_needed(country, endpoint, tokens).await;
            return true;
        }

        let (allowed, _) = self.check_limit(country, endpoint, tokens).await;
        if !allowed {
            let key = Self::bucket_key(country, endpoint);
            self.stats.entry(key).or_default().rejections += 1;
        }
        allowed
    }

    /// Snapshot of one key's bucket and counters.
    pub async fn get_status(&self, country: CountryCode, endpoint: &str) -> RateLimitStatus {
        let bucket = self.get_or_create_bucket(country, endpoint);
        let key = Self::bucket_key(country, endpoint);
        let stats = self
            .stats
            .get(&key)
            .map(|s| s.clone())
            .unwrap_or_default();

        let available = bucket.available_tokens().await;
        let capacity = bucket.capacity();

        RateLimitStatus {
            country: country.to_string(),
            endpoint: endpoint.to_string(),
            available_tokens: available,
            capacity,
            rate_per_minute: bucket.rate() * 60.0,
            time_until_available_secs: bucket.time_until_available(1).await.as_secs_f64(),
            requests_made: stats.requests,
            requests_rejected: stats.rejections,
            average_wait_time_secs: stats.wait_time_secs / stats.requests.max(1) as f64,
            utilization: (capacity.saturating_sub(available)) as f64 / capacity.max(1) as f64,
        }
    }

    /// Status for every bucket created so far, keyed by `country:endpoint`.
    pub async fn get_all_status(&self) -> HashMap<String, RateLimitStatus> {
        let keys: Vec<String> = self.buckets.iter().map(|e| e.key().clone()).collect();
        let mut statuses = HashMap::with_capacity(keys.len());
        for key in keys {
            let Some((country_str, endpoint)) = key.split_once(':') else {
                continue;
            };
            let Ok(country) = country_str.parse::<CountryCode>() else {
                continue;
            };
            statuses.insert(key.clone(), self.get_status(country, endpoint).await);
        }
        statuses
    }

    /// Replace a country's tier. Existing buckets for that country are
    /// discarded (not drained) so the next request rebuilds them under the
    /// new tier.
    pub fn update_limit(&self, country: CountryCode, new_limit: RateLimitConfig) {
        {
            let mut config = self.config.write().expect("rate limiter config poisoned");
            config.country_limits.insert(country, new_limit);
        }
        let prefix = format!("{}:", country);
        self.buckets.retain(|key, _| !key.starts_with(&prefix));
        info!(
            "Updated rate limit for {}: {} req/min",
            country, new_limit.requests_per_minute
        );
    }

    pub fn reset_stats(&self) {
        self.stats.clear();
        info!("Rate limiter statistics reset");
    }

    /// Aggregate counters across every key.
    pub fn get_stats_summary(&self) -> RateLimiterSummary {
        let mut total_requests = 0u64;
        let mut total_rejections = 0u64;
        let mut total_wait = 0.0f64;
        for entry in self.stats.iter() {
            total_requests += entry.requests;
            total_rejections += entry.rejections;
            total_wait += entry.wait_time_secs;
        }

        RateLimiterSummary {
            total_requests,
            total_rejections,
            rejection_rate: total_rejections as f64 / total_requests.max(1) as f64,
            total_wait_time_secs: total_wait,
            average_wait_time_secs: total_wait / total_requests.max(1) as f64,
            active_buckets: self.buckets.len(),
            global_limit_active: self.global_bucket.is_some(),
        }
    }

    pub fn cleanup(&self) {
        self.buckets.clear();
        self.stats.clear();
        info!("RateLimiter cleaned up");
    }
}

/// Introspection snapshot for one `country:endpoint` bucket.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub country: String,
    pub endpoint: String,
    pub available_tokens: u32,
    pub capacity: u32,
    pub rate_per_minute: f64,
    pub time_until_available_secs: f64,
    pub requests_made: u64,
    pub requests_rejected: u64,
    pub average_wait_time_secs: f64,
    pub utilization: f64,
}

/// Aggregate rate limiter statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterSummary {
    pub total_requests: u64,
    pub total_rejections: u64,
    pub rejection_rate: f64,
    pub total_wait_time_secs: f64,
    pub average_wait_time_secs: f64,
    pub active_buckets: usize,
    pub global_limit_active: bool,
}

impl fmt::Display for RateLimiterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests:{}, rejected:{} ({:.1}%), avg wait:{:.3}s, buckets:{}, global:{}",
            self.total_requests,
            self.total_rejections,
            self.rejection_rate * 100.0,
            self.average_wait_time_secs,
            self.active_buckets,
            self.global_limit_active
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use pretty_assertions::assert_eq;

    fn limiter_with_tier(country: CountryCode, rpm: u32) -> RateLimiter {
        let mut config = RateLimiterConfig::default();
        config.country_limits.insert(country, RateLimitConfig::new(rpm));
        RateLimiter::new(config)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_capacity_bounds_back_to_back_probes() {
        // 600 req/min tier with the default 2x burst: 1200 probes pass,
        // the 1201st within the same instant is denied with a wait hint.
        let limiter = limiter_with_tier(CountryCode::US, 600);

        for _ in 0..1200 {
            let (allowed, _) = limiter.check_limit(CountryCode::US, "hashtags", 1).await;
            assert!(allowed);
        }
        let (allowed, wait_secs) = limiter.check_limit(CountryCode::US, "hashtags", 1).await;
        assert!(!allowed);
        assert!(wait_secs > 0.0);
    }

    #[tokio::test]
    async fn endpoint_multiplier_scales_bucket_rate() {
        let limiter = limiter_with_tier(CountryCode::US, 600);
        let trends = limiter.get_status(CountryCode::US, "trends").await;
        let sounds = limiter.get_status(CountryCode::US, "sounds").await;
        assert!((trends.rate_per_minute - 720.0).abs() < 0.01);
        assert!((sounds.rate_per_minute - 420.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn global_bucket_is_checked_before_per_key() {
        let config = RateLimiterConfig {
            global_limit: Some(RateLimitConfig::with_burst(60, 2)),
            ..RateLimiterConfig::default()
        };
        let limiter = RateLimiter::new(config);

        // Different keys, same global bucket: the third probe hits the
        // global gate even though each per-key bucket is untouched.
        assert!(limiter.check_limit(CountryCode::US, "hashtags", 1).await.0);
        assert!(limiter.check_limit(CountryCode::DE, "sounds", 1).await.0);
        let (allowed, wait_secs) = limiter.check_limit(CountryCode::FR, "trends", 1).await;
        assert!(!allowed);
        assert!(wait_secs > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_acquire_waits_and_records_stats() {
        let mut config = RateLimiterConfig::default();
        config
            .country_limits
            .insert(CountryCode::US, RateLimitConfig::with_burst(60, 1));
        let limiter = RateLimiter::new(config);

        assert!(limiter.acquire(CountryCode::US, "hashtags", 1, true).await);
        // Bucket is now empty; the next blocking acquire must wait ~1s.
        let started = Instant::now();
        assert!(limiter.acquire(CountryCode::US, "hashtags", 1, true).await);
        assert!(started.elapsed() >= Duration::from_millis(900));

        let status = limiter.get_status(CountryCode::US, "hashtags").await;
        assert_eq!(status.requests_made, 2);
        assert!(status.average_wait_time_secs > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn non_blocking_denial_counts_rejection() {
        let mut config = RateLimiterConfig::default();
        config
            .country_limits
            .insert(CountryCode::US, RateLimitConfig::with_burst(60, 1));
        let limiter = RateLimiter::new(config);

        assert!(limiter.acquire(CountryCode::US, "hashtags", 1, false).await);
        assert!(!limiter.acquire(CountryCode::US, "hashtags", 1, false).await);

        let status = limiter.get_status(CountryCode::US, "hashtags").await;
        assert_eq!(status.requests_rejected, 1);
        let summary = limiter.get_stats_summary();
        assert_eq!(summary.total_rejections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn update_limit_discards_old_buckets() {
        let limiter = limiter_with_tier(CountryCode::US, 60);
        // Drain the old bucket completely.
        while limiter.check_limit(CountryCode::US, "hashtags", 1).await.0 {}

        limiter.update_limit(CountryCode::US, RateLimitConfig::new(600));

        // Rebuilt bucket starts full under the new tier.
        let status = limiter.get_status(CountryCode::US, "hashtags").await;
        assert_eq!(status.capacity, 1200);
        assert!(limiter.check_limit(CountryCode::US, "hashtags", 1).await.0);
    }

    #[tokio::test]
    async fn all_status_keys_round_trip() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        limiter.check_limit(CountryCode::US, "hashtags", 1).await;
        limiter.check_limit(CountryCode::JP, "sounds", 1).await;

        let statuses = limiter.get_all_status().await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses.contains_key("US:hashtags"));
        assert!(statuses.contains_key("JP:sounds"));
    }
}
