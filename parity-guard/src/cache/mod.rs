//! SQL result cache.
//!
//! Caches the *generated SQL* for a validation intent, never row results:
//! a hit skips template generation and LLM translation but always
//! re-executes, so reported numbers are as fresh as a miss. Entries expire
//! by TTL (checked lazily on lookup) and are evicted oldest-first when the
//! store exceeds its configured capacity.
//!
//! Any internal failure degrades to always-miss behavior with a warning;
//! the cache is never allowed to fail a validation.

mod fingerprint;

pub use fingerprint::{fingerprint_plan, fingerprint_request, CacheKey};

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ValidatorConfig;
use crate::core::ValidationPlan;
use crate::rules::SqlSet;

/// A resolved plan together with its generated SQL; the cached artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSql {
    /// The plan the SQL was generated for.
    pub plan: ValidationPlan,
    /// The generated statements.
    pub sql: SqlSet,
}

#[derive(Debug, Clone)]
struct Entry {
    planned: Vec<PlannedSql>,
    created_at: DateTime<Utc>,
    hit_count: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    /// Insertion order; front is the eviction candidate.
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Counters reported by [`SqlCache::stats`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the store.
    pub hits: u64,
    /// Lookups that fell through (including expiries).
    pub misses: u64,
    /// Entries removed by TTL expiry or capacity pressure.
    pub evictions: u64,
    /// Live entries.
    pub entry_count: usize,
}

impl CacheStats {
    /// Hit rate as a percentage of all lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

/// Fingerprinted, TTL-bounded store of generated SQL.
#[derive(Debug)]
pub struct SqlCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    max_entries: usize,
    enabled: bool,
}

impl SqlCache {
    /// Creates a cache sized per the validator configuration.
    pub fn new(config: &ValidatorConfig) -> Self {
        Self::with_settings(
            config.cache_ttl(),
            config.sql_cache_max_entries,
            config.enable_sql_cache,
        )
    }

    /// Creates a cache with explicit TTL and capacity.
    pub fn with_settings(ttl: Duration, max_entries: usize, enabled: bool) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            max_entries: max_entries.max(1),
            enabled,
        }
    }

    /// Whether the cache is consulted at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Looks up the SQL cached for a key; expired entries are evicted here
    /// and count as misses.
    pub fn lookup(&self, key: &CacheKey) -> Option<Vec<PlannedSql>> {
        self.lookup_at(key, Utc::now())
    }

    fn lookup_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Vec<PlannedSql>> {
        if !self.enabled {
            return None;
        }
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "SQL cache lock poisoned; treating lookup as a miss");
                return None;
            }
        };

        let expired = match state.entries.get(key.as_str()) {
            None => {
                state.misses += 1;
                return None;
            }
            Some(entry) => {
                let age = now.signed_duration_since(entry.created_at);
                age.num_milliseconds() >= self.ttl.as_millis() as i64
            }
        };

        if expired {
            debug!(key = key.short(), "cache entry expired");
            state.entries.remove(key.as_str());
            state.order.retain(|k| k != key.as_str());
            state.misses += 1;
            state.evictions += 1;
            return None;
        }

        state.hits += 1;
        if let Some(entry) = state.entries.get_mut(key.as_str()) {
            entry.hit_count += 1;
            debug!(key = key.short(), hits = entry.hit_count, "cache hit");
            Some(entry.planned.clone())
        } else {
            None
        }
    }

    /// Stores the SQL generated for a key, evicting the oldest entry first
    /// when the store is at capacity.
    pub fn store(&self, key: &CacheKey, planned: Vec<PlannedSql>) {
        self.store_at(key, planned, Utc::now());
    }

    fn store_at(&self, key: &CacheKey, planned: Vec<PlannedSql>, now: DateTime<Utc>) {
        if !self.enabled {
            return;
        }
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "SQL cache lock poisoned; dropping store");
                return;
            }
        };

        if state.entries.contains_key(key.as_str()) {
            state.order.retain(|k| k != key.as_str());
        } else if state.entries.len() >= self.max_entries {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                state.evictions += 1;
                debug!("cache at capacity; evicted oldest entry");
            }
        }

        state.order.push_back(key.as_str().to_string());
        state.entries.insert(
            key.as_str().to_string(),
            Entry {
                planned,
                created_at: now,
                hit_count: 0,
            },
        );
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        match self.state.lock() {
            Ok(state) => CacheStats {
                hits: state.hits,
                misses: state.misses,
                evictions: state.evictions,
                entry_count: state.entries.len(),
            },
            Err(e) => {
                warn!(error = %e, "SQL cache lock poisoned; reporting empty stats");
                CacheStats::default()
            }
        }
    }

    /// Empties the store and resets counters.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = CacheState::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PlanHints, RuleKind, TableRef, ValidationPlan};

    fn key(text: &str) -> CacheKey {
        fingerprint_request(text, &PlanHints::default())
    }

    fn planned(name: &str) -> Vec<PlannedSql> {
        let table: TableRef = format!("db.{name}").parse().unwrap();
        vec![PlannedSql {
            plan: ValidationPlan::new(RuleKind::RowCount, vec![table]),
            sql: vec![],
        }]
    }

    fn cache(ttl_secs: u64, max_entries: usize) -> SqlCache {
        SqlCache::with_settings(Duration::from_secs(ttl_secs), max_entries, true)
    }

    #[test]
    fn test_lookup_after_store() {
        let cache = cache(60, 10);
        let k = key("a");
        assert!(cache.lookup(&k).is_none());
        cache.store(&k, planned("a"));
        assert_eq!(cache.lookup(&k).unwrap(), planned("a"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ttl_expiry_is_a_miss() {
        let cache = cache(1, 10);
        let k = key("a");
        let t0 = Utc::now();
        cache.store_at(&k, planned("a"), t0);

        // Still valid just inside the window.
        assert!(cache
            .lookup_at(&k, t0 + chrono::Duration::milliseconds(900))
            .is_some());
        // Two seconds later the entry has expired and is evicted lazily.
        assert!(cache
            .lookup_at(&k, t0 + chrono::Duration::seconds(2))
            .is_none());

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let cache = cache(60, 2);
        let (k1, k2, k3) = (key("a"), key("b"), key("c"));
        cache.store(&k1, planned("a"));
        cache.store(&k2, planned("b"));
        cache.store(&k3, planned("c"));

        assert_eq!(cache.stats().entry_count, 2);
        assert!(cache.lookup(&k1).is_none());
        assert!(cache.lookup(&k2).is_some());
        assert!(cache.lookup(&k3).is_some());
    }

    #[test]
    fn test_hits_do_not_promote() {
        let cache = cache(60, 2);
        let (k1, k2, k3) = (key("a"), key("b"), key("c"));
        cache.store(&k1, planned("a"));
        cache.store(&k2, planned("b"));
        // Eviction order is creation order, so this hit must not save k1.
        assert!(cache.lookup(&k1).is_some());
        cache.store(&k3, planned("c"));

        assert!(cache.lookup(&k1).is_none());
        assert!(cache.lookup(&k2).is_some());
    }

    #[test]
    fn test_overwrite_does_not_grow_store() {
        let cache = cache(60, 2);
        let k = key("a");
        cache.store(&k, planned("a"));
        cache.store(&k, planned("b"));
        assert_eq!(cache.stats().entry_count, 1);
        assert_eq!(cache.lookup(&k).unwrap(), planned("b"));
    }

    #[test]
    fn test_clear_resets_everything() {
        let cache = cache(60, 10);
        let k = key("a");
        cache.store(&k, planned("a"));
        assert!(cache.lookup(&k).is_some());

        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_disabled_cache_never_stores() {
        let cache = SqlCache::with_settings(Duration::from_secs(60), 10, false);
        let k = key("a");
        cache.store(&k, planned("a"));
        assert!(cache.lookup(&k).is_none());
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[test]
    fn test_hit_rate_with_no_lookups() {
        let cache = cache(60, 10);
        assert_eq!(cache.stats().hit_rate(), 0.0);
    }
}
