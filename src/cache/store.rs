//! Cache Store Module
//!
//! Synchronous cache engine: ordered entry map, TTL expiry, score-based
//! eviction and memory pressure handling. `ObjectCache` wraps it for
//! concurrent async use.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::eviction::select_victims;
use crate::cache::{
    CacheEntry, CacheStats, JsonSizeEstimator, SetOptions, SizeEstimator, DEFAULT_TTL_STEP,
    MAX_ENTRIES_STEP, MIN_DEFAULT_TTL, MIN_MAX_ENTRIES,
};
use crate::config::CacheConfig;

// == Pressure Outcome ==
/// What a memory pressure check did to the cache bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureAction {
    /// Usage within bounds, nothing changed
    Unchanged,
    /// Usage above threshold, bounds tightened
    Tightened,
    /// Usage well below threshold, bounds stepped back toward configuration
    Relaxed,
}

// == Cache Store ==
/// Main cache storage with priority-weighted eviction and TTL support.
///
/// Entries are kept in insertion order. Replacing an existing key keeps its
/// original position.
pub struct CacheStore<V> {
    /// Key-value storage in insertion order
    entries: IndexMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
    estimator: Arc<dyn SizeEstimator<V>>,
    /// Current capacity, lowered under memory pressure
    max_entries: usize,
    /// Current default TTL, lowered under memory pressure
    default_ttl: Duration,
    configured_max_entries: usize,
    configured_default_ttl: Duration,
    memory_threshold_bytes: usize,
    restore_on_relief: bool,
}

impl<V: Serialize + 'static> CacheStore<V> {
    // == Constructor ==
    /// Creates a store that estimates sizes from the JSON encoding.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_estimator(config, Arc::new(JsonSizeEstimator::new()))
    }
}

impl<V> CacheStore<V> {
    /// Creates a store with a custom size estimator.
    pub fn with_estimator(config: &CacheConfig, estimator: Arc<dyn SizeEstimator<V>>) -> Self {
        Self {
            entries: IndexMap::new(),
            stats: CacheStats::new(),
            estimator,
            max_entries: config.max_entries,
            default_ttl: config.default_ttl,
            configured_max_entries: config.max_entries,
            configured_default_ttl: config.default_ttl,
            memory_threshold_bytes: config.memory_threshold_bytes,
            restore_on_relief: config.restore_on_relief,
        }
    }

    // == Set ==
    /// Stores a value, replacing any existing entry and its metadata.
    ///
    /// A missing or zero TTL falls back to the current default TTL. Capacity
    /// is enforced after insertion. Returns the keys evicted to make room.
    pub fn set(&mut self, key: String, value: V, options: &SetOptions) -> Vec<String> {
        let now = Instant::now();
        let ttl = options
            .ttl
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or(self.default_ttl);
        let size_bytes = self.estimator.estimate(&value);

        let entry = CacheEntry::new(
            value,
            ttl,
            options.priority,
            options.tags.clone(),
            size_bytes,
            now,
        );
        debug!(key = %key, size_bytes, ?ttl, "cache set");
        self.entries.insert(key, entry);

        self.evict_if_needed_at(now)
    }

    // == Get ==
    /// Retrieves a copy of the value for `key`.
    ///
    /// Expired entries are removed on access and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let now = Instant::now();
        let expired = match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.touch(now);
                let value = entry.value.clone();
                self.stats.record_hit();
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.shift_remove(key);
            debug!(key = %key, "cache entry expired on access");
        }
        self.stats.record_miss();
        None
    }

    /// Returns true if a live entry exists, without touching statistics.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(Instant::now()))
    }

    /// Borrows the entry for `key`, expired or not.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    // == Delete ==
    /// Removes an entry. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    // == Clear By Tags ==
    /// Removes every entry carrying at least one of `tags`.
    pub fn clear_by_tags(&mut self, tags: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.has_any_tag(tags));
        let removed = before - self.entries.len();
        debug!(removed, ?tags, "cleared entries by tag");
        removed
    }

    // == Clear ==
    /// Drops all entries. Statistics counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_occupancy(self.entries.len(), self.memory_usage());
        stats
    }

    pub(crate) fn record_prefetch(&mut self) {
        self.stats.record_prefetch();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - self.entries.len()
    }

    // == Evict If Needed ==
    /// Evicts the lowest-scoring entries until the store fits `max_entries`.
    pub fn evict_if_needed(&mut self) -> Vec<String> {
        self.evict_if_needed_at(Instant::now())
    }

    fn evict_if_needed_at(&mut self, now: Instant) -> Vec<String> {
        let excess = self.entries.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return Vec::new();
        }

        let victims = select_victims(self.entries.iter(), excess, now);
        for key in &victims {
            self.entries.shift_remove(key);
            self.stats.record_eviction();
        }
        debug!(count = victims.len(), "evicted cache entries");
        victims
    }

    // == Memory Usage ==
    /// Sums the estimated size of all entries.
    pub fn memory_usage(&self) -> usize {
        self.entries.values().map(|entry| entry.size_bytes).sum()
    }

    // == Optimize ==
    /// Tightens capacity and default TTL by one step each, never below their
    /// floors (or below an already smaller configured value), then evicts.
    pub fn optimize(&mut self) -> Vec<String> {
        let entries_floor = MIN_MAX_ENTRIES.min(self.max_entries);
        self.max_entries = self
            .max_entries
            .saturating_sub(MAX_ENTRIES_STEP)
            .max(entries_floor);

        let ttl_floor = MIN_DEFAULT_TTL.min(self.default_ttl);
        self.default_ttl = self
            .default_ttl
            .saturating_sub(DEFAULT_TTL_STEP)
            .max(ttl_floor);

        info!(
            max_entries = self.max_entries,
            default_ttl_secs = self.default_ttl.as_secs(),
            "cache bounds tightened"
        );
        self.evict_if_needed()
    }

    /// Steps bounds back toward the configured values by one decrement.
    fn relax(&mut self) -> bool {
        if !self.is_tightened() {
            return false;
        }
        self.max_entries = (self.max_entries + MAX_ENTRIES_STEP).min(self.configured_max_entries);
        self.default_ttl = (self.default_ttl + DEFAULT_TTL_STEP).min(self.configured_default_ttl);
        info!(
            max_entries = self.max_entries,
            default_ttl_secs = self.default_ttl.as_secs(),
            "cache bounds relaxed"
        );
        true
    }

    fn is_tightened(&self) -> bool {
        self.max_entries < self.configured_max_entries
            || self.default_ttl < self.configured_default_ttl
    }

    // == Memory Pressure ==
    /// Tightens bounds when usage exceeds the threshold. With relief enabled,
    /// usage at or below half the threshold steps bounds back up.
    pub fn check_memory_pressure(&mut self) -> PressureAction {
        let usage = self.memory_usage();
        if usage > self.memory_threshold_bytes {
            warn!(
                usage,
                threshold = self.memory_threshold_bytes,
                "cache memory pressure"
            );
            self.optimize();
            return PressureAction::Tightened;
        }

        if self.restore_on_relief && usage <= self.memory_threshold_bytes / 2 && self.relax() {
            return PressureAction::Relaxed;
        }
        PressureAction::Unchanged
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}
