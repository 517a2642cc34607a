//! Cache Statistics Module
//!
//! Tracks cache performance counters: hits, misses, evictions and prefetches.

use serde::Serialize;

// == Cache Stats ==
/// Process-lifetime counters plus a snapshot of the current occupancy.
///
/// Counters only grow; clearing cached data does not reset them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed retrievals (key absent or expired)
    pub misses: u64,
    /// Number of entries removed to respect capacity
    pub evictions: u64,
    /// Number of values inserted by the prefetch worker
    pub prefetches: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Sum of estimated entry sizes in bytes
    pub total_size_bytes: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates hits / max(1, hits + misses).
    pub fn hit_rate(&self) -> f64 {
        self.hits as f64 / (self.hits + self.misses).max(1) as f64
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_prefetch(&mut self) {
        self.prefetches += 1;
    }

    // == Update Occupancy ==
    /// Updates the entry count and total size.
    pub fn set_occupancy(&mut self, entries: usize, size_bytes: usize) {
        self.total_entries = entries;
        self.total_size_bytes = size_bytes;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.prefetches, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_all_hits() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        assert_eq!(stats.hit_rate(), 1.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_miss();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.25);
    }

    #[test]
    fn test_record_eviction_and_prefetch() {
        let mut stats = CacheStats::new();
        stats.record_eviction();
        stats.record_eviction();
        stats.record_prefetch();
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.prefetches, 1);
    }

    #[test]
    fn test_set_occupancy() {
        let mut stats = CacheStats::new();
        stats.set_occupancy(42, 1024);
        assert_eq!(stats.total_entries, 42);
        assert_eq!(stats.total_size_bytes, 1024);
    }
}
