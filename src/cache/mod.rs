// src/cache/mod.rs
//! In-memory TTL cache for trend results, with an explicit stale-but-usable
//! read mode used as the last-resort fallback tier.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info};
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{CountryCode, DataType, RawRecord, SourceId};

/// One cached result set. Overwritten wholesale on every successful fetch
/// for its key, never partially updated.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Vec<RawRecord>,
    pub source: SourceId,
    pub ttl: Duration,
    stored_at: Instant,
    stored_at_utc: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.age() >= self.ttl
    }

    /// Wall-clock storage time, for reporting surfaces only.
    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at_utc
    }
}

/// Concurrent TTL-aware store of prior fetch results.
///
/// Reads race freely with other reads; each write replaces its key's entry
/// in one map operation, so concurrent writers never splice entries.
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    enabled: bool,
}

impl CacheStore {
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: DashMap::new(),
            enabled,
        }
    }

    /// Deterministic cache key: data type, country, then optional filters
    /// sorted by name, so identical logical requests always map to the same
    /// key regardless of argument order.
    pub fn make_key(
        data_type: DataType,
        country: CountryCode,
        params: &[(&str, Option<String>)],
    ) -> String {
        let mut parts = vec![data_type.to_string(), country.to_string()];
        let mut filters: Vec<(&str, &String)> = params
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (*name, v)))
            .collect();
        filters.sort_by_key(|(name, _)| *name);
        for (name, value) in filters {
            parts.push(format!("{}={}", name, value));
        }
        parts.join("|")
    }

    /// Fresh read: returns the entry only while it is younger than its TTL.
    /// The entry may still be physically present after expiry.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            debug!("Cache entry for {} expired ({}s old)", key, entry.age().as_secs());
            return None;
        }
        debug!("Cache hit for {}", key);
        Some(entry.clone())
    }

    /// Stale-but-usable read: ignores the TTL but enforces `max_age`.
    /// Only the exhausted-sources path should use this.
    pub fn get_allow_expired(&self, key: &str, max_age: Duration) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        let entry = self.entries.get(key)?;
        if entry.age() > max_age {
            debug!(
                "Cache entry for {} too old for stale fallback ({}s > {}s)",
                key,
                entry.age().as_secs(),
                max_age.as_secs()
            );
            return None;
        }
        Some(entry.clone())
    }

    /// Store a result set, replacing any existing entry for the key.
    /// Empty results are never cached.
    pub fn put(&self, key: &str, data: Vec<RawRecord>, source: SourceId, ttl_secs: u64) {
        if !self.enabled || data.is_empty() {
            return;
        }
        debug!("Caching {} records for {} (TTL {}s)", data.len(), key, ttl_secs);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                source,
                ttl: Duration::from_secs(ttl_secs),
                stored_at: Instant::now(),
                stored_at_utc: Utc::now(),
            },
        );
    }

    /// Remove all entries, or only those older than the given age.
    /// Returns the number of entries removed.
    pub fn clear(&self, older_than: Option<Duration>) -> usize {
        let removed = match older_than {
            None => {
                let count = self.entries.len();
                self.entries.clear();
                count
            }
            Some(age) => {
                let before = self.entries.len();
                self.entries.retain(|_, entry| entry.age() < age);
                before - self.entries.len()
            }
        };
        info!("Cleared {} cache entries", removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rows(n: usize) -> Vec<RawRecord> {
        (0..n).map(|i| json!({ "name": format!("#tag{}", i) })).collect()
    }

    #[test]
    fn key_is_order_independent_and_skips_empty_filters() {
        let a = CacheStore::make_key(
            DataType::Hashtags,
            CountryCode::US,
            &[("limit", Some("50".to_string())), ("niche", Some("BOOKTOK".to_string()))],
        );
        let b = CacheStore::make_key(
            DataType::Hashtags,
            CountryCode::US,
            &[("niche", Some("BOOKTOK".to_string())), ("limit", Some("50".to_string()))],
        );
        assert_eq!(a, b);
        assert_eq!(a, "hashtags|US|limit=50|niche=BOOKTOK");

        let no_niche = CacheStore::make_key(
            DataType::Hashtags,
            CountryCode::US,
            &[("limit", Some("50".to_string())), ("niche", None)],
        );
        assert_eq!(no_niche, "hashtags|US|limit=50");
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_round_trip() {
        let cache = CacheStore::new(true);
        cache.put("k", rows(2), SourceId::OfficialApi, 5);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get("k").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        // 6s old: expired for fresh reads, still usable for stale reads.
        assert!(cache.get("k").is_none());
        let stale = cache.get_allow_expired("k", Duration::from_secs(10)).unwrap();
        assert_eq!(stale.data.len(), 2);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cache.get_allow_expired("k", Duration::from_secs(10)).is_none());
    }

    #[test]
    fn empty_results_are_never_cached() {
        let cache = CacheStore::new(true);
        cache.put("k", vec![], SourceId::OfficialApi, 60);
        assert!(cache.is_empty());
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn put_replaces_wholesale() {
        let cache = CacheStore::new(true);
        cache.put("k", rows(5), SourceId::OfficialApi, 60);
        cache.put("k", rows(2), SourceId::CreativeCenter, 60);

        let entry = cache.get("k").unwrap();
        assert_eq!(entry.data.len(), 2);
        assert_eq!(entry.source, SourceId::CreativeCenter);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_respects_age_filter() {
        let cache = CacheStore::new(true);
        cache.put("old", rows(1), SourceId::OfficialApi, 3600);
        tokio::time::advance(Duration::from_secs(100)).await;
        cache.put("new", rows(1), SourceId::OfficialApi, 3600);

        assert_eq!(cache.clear(Some(Duration::from_secs(50))), 1);
        assert!(cache.get("new").is_some());
        assert_eq!(cache.clear(None), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn disabled_cache_is_inert() {
        let cache = CacheStore::new(false);
        cache.put("k", rows(3), SourceId::OfficialApi, 60);
        assert!(cache.get("k").is_none());
        assert!(cache
            .get_allow_expired("k", Duration::from_secs(3600))
            .is_none());
    }
}
