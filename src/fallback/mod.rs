// src/fallback/mod.rs
//! Fallback orchestration: cache-first reads, an ordered walk over the
//! source chain gated by circuit breakers and the rate limiter, and a
//! stale-cache tier when every live source is down.

use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::cache::CacheStore;
use crate::config::OrchestratorConfig;
use crate::error::{CollectorError, Result};
use crate::models::{CountryCode, DataType, NicheType, RawRecord, SourceId};
use crate::ratelimit::RateLimiter;
use crate::sources::{SourceAdapter, SourceHealth};

/// Outcome of one orchestrated fetch. Transient; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackResult {
    pub success: bool,
    pub data: Vec<RawRecord>,
    pub source: SourceId,
    pub duration_ms: f64,
    pub error_message: Option<String>,
    pub cache_hit: bool,
}

#[derive(Debug, Default)]
struct StatsInner {
    total_requests: u64,
    source_successes: HashMap<SourceId, u64>,
    cache_hits: u64,
    stale_cache_hits: u64,
    total_failures: u64,
}

/// Composes the resilience layer: per-request cache check, ordered source
/// walk honoring breakers and rate limits, health/stat bookkeeping, and
/// stale-cache last resort.
///
/// Owns every bucket, breaker and cache entry for the process lifetime;
/// adapters own their own network state and are only called, never mutated,
/// from here.
pub struct FallbackOrchestrator {
    sources: Vec<Arc<dyn SourceAdapter>>,
    breakers: HashMap<SourceId, CircuitBreaker>,
    health: HashMap<SourceId, Mutex<SourceHealth>>,
    rate_limiter: Arc<RateLimiter>,
    cache: CacheStore,
    config: OrchestratorConfig,
    stats: Mutex<StatsInner>,
}

impl FallbackOrchestrator {
    /// Build the orchestrator over an ordered source chain. The chain order
    /// is the default priority. Fails fast on an empty or duplicated chain.
    pub fn new(sources: Vec<Arc<dyn SourceAdapter>>, config: OrchestratorConfig) -> Result<Self> {
        if sources.is_empty() {
            return Err(CollectorError::ConfigError(
                "at least one source adapter is required".to_string(),
            ));
        }

        let mut breakers = HashMap::new();
        let mut health = HashMap::new();
        for source in &sources {
            let id = source.id();
            if id == SourceId::Cached {
                return Err(CollectorError::ConfigError(
                    "CACHED_DATA is not a registrable source".to_string(),
                ));
            }
            if breakers
                .insert(id, CircuitBreaker::new(id.as_str(), config.breaker))
                .is_some()
            {
                return Err(CollectorError::ConfigError(format!(
                    "duplicate source adapter: {}",
                    id
                )));
            }
            health.insert(id, Mutex::new(SourceHealth::new()));
        }

        info!(
            "FallbackOrchestrator initialized with {} sources: {}",
            sources.len(),
            sources
                .iter()
                .map(|s| s.id().to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(Self {
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limiter.clone())),
            cache: CacheStore::new(config.cache.enabled),
            breakers,
            health,
            sources,
            config,
            stats: Mutex::new(StatsInner::default()),
        })
    }

    /// Fetch trend data with fallback across the source chain.
    ///
    /// Only misconfiguration surfaces as `Err`; all source-level failures
    /// are absorbed and reported through the returned [`FallbackResult`].
    pub async fn get_trends(
        &self,
        data_type: DataType,
        country: CountryCode,
        limit: usize,
        niche: Option<NicheType>,
        source_priority: Option<&[SourceId]>,
    ) -> Result<FallbackResult> {
        if limit == 0 {
            return Err(CollectorError::InvalidInput(
                "limit must be at least 1".to_string(),
            ));
        }
        let chain = self.resolve_priority(source_priority)?;

        let started = std::time::Instant::now();
        {
            let mut stats = self.stats.lock().expect("stats poisoned");
            stats.total_requests += 1;
        }

        let cache_key = CacheStore::make_key(
            data_type,
            country,
            &[
                ("limit", Some(limit.to_string())),
                ("niche", niche.map(|n| n.to_string())),
            ],
        );

        // Fresh cache hit short-circuits everything.
        if let Some(entry) = self.cache.get(&cache_key) {
            let mut stats = self.stats.lock().expect("stats poisoned");
            stats.cache_hits += 1;
            return Ok(FallbackResult {
                success: true,
                data: entry.data,
                source: SourceId::Cached,
                duration_ms: elapsed_ms(started),
                error_message: None,
                cache_hit: true,
            });
        }

        let mut last_error: Option<String> = None;
        let mut last_attempted = chain.last().map(|s| s.id()).unwrap_or(SourceId::Cached);

        for source in &chain {
            let id = source.id();
            last_attempted = id;

            let breaker = &self.breakers[&id];
            if !breaker.call_allowed() {
                debug!(
                    "Skipping {} for {}/{}: circuit breaker {}",
                    id,
                    country,
                    data_type,
                    breaker.state().as_str()
                );
                last_error = Some(format!("{} unavailable (circuit breaker open)", id));
                continue;
            }

            if let Some(endpoint) = source.rate_limit_endpoint(data_type) {
                self.rate_limiter.wait_if_needed(country, &endpoint, 1).await;
            }

            let attempt_started = std::time::Instant::now();
            match source.fetch(data_type, country, limit, niche).await {
                Ok(data) if !data.is_empty() => {
                    self.record_source_success(id);
                    self.cache.put(
                        &cache_key,
                        data.clone(),
                        id,
                        self.config.cache.ttl_for(data_type),
                    );
                    info!(
                        "Fetched {} {} for {} from {} in {:.1}ms",
                        data.len(),
                        data_type,
                        country,
                        id,
                        elapsed_ms(attempt_started)
                    );
                    return Ok(FallbackResult {
                        success: true,
                        data,
                        source: id,
                        duration_ms: elapsed_ms(started),
                        error_message: None,
                        cache_hit: false,
                    });
                }
                Ok(_) => {
                    // An empty payload counts as a failure, same as a
                    // transport error.
                    let err = CollectorError::EmptyResult(id);
                    warn!("{} for {}/{}", err, country, data_type);
                    self.record_source_failure(id);
                    last_error = Some(err.to_string());
                }
                Err(err) => {
                    error!(
                        "Source {} failed for {}/{}: {}",
                        id, country, data_type, err
                    );
                    self.record_source_failure(id);
                    last_error = Some(err.to_string());
                }
            }
        }

        // Every live source failed: serve stale data if it is not too old.
        if let Some(entry) = self
            .cache
            .get_allow_expired(&cache_key, self.config.cache.max_cache_age())
        {
            let mut stats = self.stats.lock().expect("stats poisoned");
            stats.stale_cache_hits += 1;
            warn!(
                "All sources failed for {}/{}; serving stale cache ({}s old)",
                country,
                data_type,
                entry.age().as_secs()
            );
            return Ok(FallbackResult {
                success: true,
                data: entry.data,
                source: SourceId::Cached,
                duration_ms: elapsed_ms(started),
                error_message: None,
                cache_hit: true,
            });
        }

        {
            let mut stats = self.stats.lock().expect("stats poisoned");
            stats.total_failures += 1;
        }
        let message = last_error.unwrap_or_else(|| "all sources failed".to_string());
        error!(
            "All sources exhausted for {}/{}. Last error: {}",
            country, data_type, message
        );
        Ok(FallbackResult {
            success: false,
            data: Vec::new(),
            source: last_attempted,
            duration_ms: elapsed_ms(started),
            error_message: Some(message),
            cache_hit: false,
        })
    }

    /// Resolve the caller's priority override (or the registered order)
    /// into adapters, failing fast on a source we do not have.
    fn resolve_priority(
        &self,
        source_priority: Option<&[SourceId]>,
    ) -> Result<Vec<Arc<dyn SourceAdapter>>> {
        match source_priority {
            None => Ok(self.sources.clone()),
            Some([]) => Err(CollectorError::InvalidInput(
                "source priority override must not be empty".to_string(),
            )),
            Some(ids) => ids
                .iter()
                .map(|id| {
                    self.sources
                        .iter()
                        .find(|s| s.id() == *id)
                        .cloned()
                        .ok_or_else(|| {
                            CollectorError::ConfigError(format!(
                                "no adapter registered for source {}",
                                id
                            ))
                        })
                })
                .collect(),
        }
    }

    fn record_source_success(&self, id: SourceId) {
        if let Some(health) = self.health.get(&id) {
            health.lock().expect("health poisoned").record_success();
        }
        self.breakers[&id].record_success();
        let mut stats = self.stats.lock().expect("stats poisoned");
        *stats.source_successes.entry(id).or_insert(0) += 1;
    }

    fn record_source_failure(&self, id: SourceId) {
        if let Some(health) = self.health.get(&id) {
            let flipped = health
                .lock()
                .expect("health poisoned")
                .record_failure(self.config.health.unavailable_after);
            if flipped {
                warn!("Source {} reported unavailable after consecutive failures", id);
            }
        }
        self.breakers[&id].record_failure();
    }

    /// Operational snapshot: request counters, cache occupancy, and
    /// per-source health plus breaker state.
    pub fn get_stats(&self) -> FallbackStats {
        let stats = self.stats.lock().expect("stats poisoned");
        let total_successes: u64 = stats.source_successes.values().sum();

        let sources = self
            .health
            .iter()
            .map(|(id, health)| {
                let health = health.lock().expect("health poisoned").clone();
                let breaker = &self.breakers[id];
                (
                    id.to_string(),
                    SourceStatus {
                        health,
                        breaker_state: breaker.state(),
                        breaker_failures: breaker.failure_count(),
                    },
                )
            })
            .collect();

        FallbackStats {
            requests: RequestStats {
                total: stats.total_requests,
                source_successes: stats
                    .source_successes
                    .iter()
                    .map(|(id, count)| (id.to_string(), *count))
                    .collect(),
                cache_hits: stats.cache_hits,
                stale_cache_fallbacks: stats.stale_cache_hits,
                total_failures: stats.total_failures,
                success_rate: total_successes as f64 / stats.total_requests.max(1) as f64,
            },
            cache: CacheStats {
                entries: self.cache.len(),
                enabled: self.cache.is_enabled(),
            },
            sources,
        }
    }

    /// Clear cache entries, optionally only those older than the given age.
    pub fn clear_cache(&self, older_than: Option<Duration>) -> usize {
        self.cache.clear(older_than)
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().expect("stats poisoned") = StatsInner::default();
        for health in self.health.values() {
            *health.lock().expect("health poisoned") = SourceHealth::new();
        }
        info!("FallbackOrchestrator statistics reset");
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }
}

fn elapsed_ms(started: std::time::Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Request-level counters.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStats {
    pub total: u64,
    pub source_successes: HashMap<String, u64>,
    pub cache_hits: u64,
    pub stale_cache_fallbacks: u64,
    pub total_failures: u64,
    pub success_rate: f64,
}

/// Cache occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub enabled: bool,
}

/// Health and breaker view for one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub health: SourceHealth,
    pub breaker_state: BreakerState,
    pub breaker_failures: u32,
}

/// Full operational snapshot for external monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackStats {
    pub requests: RequestStats,
    pub cache: CacheStats,
    pub sources: HashMap<String, SourceStatus>,
}
