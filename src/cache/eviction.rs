//! Eviction Scoring Module
//!
//! Scores entries by priority, access frequency and recency. Lower scores are
//! evicted first.

use tokio::time::Instant;

use crate::cache::{CacheEntry, Priority};

// == Scoring Constants ==
/// Multiplier applied to the priority weight
pub const PRIORITY_COEFFICIENT: f64 = 1000.0;
/// Multiplier applied to accesses per minute
pub const FREQUENCY_COEFFICIENT: f64 = 100.0;
/// Multiplier applied to minutes since last access
pub const RECENCY_COEFFICIENT: f64 = 1.0;

/// Weight of each priority level.
pub fn priority_weight(priority: Priority) -> f64 {
    match priority {
        Priority::High => 3.0,
        Priority::Normal => 2.0,
        Priority::Low => 1.0,
    }
}

// == Score ==
/// Computes the eviction score of an entry at `now`.
///
/// `accessesPerMinute` divides by at least one minute so that fresh entries
/// do not get an unbounded frequency boost.
pub fn score<V>(entry: &CacheEntry<V>, now: Instant) -> f64 {
    let minutes_idle = now
        .saturating_duration_since(entry.last_accessed_at)
        .as_secs_f64()
        / 60.0;
    let accesses_per_minute = entry.access_count as f64 / minutes_idle.max(1.0);

    priority_weight(entry.priority) * PRIORITY_COEFFICIENT
        + accesses_per_minute * FREQUENCY_COEFFICIENT
        + minutes_idle * RECENCY_COEFFICIENT
}

// == Select Victims ==
/// Picks the `excess` lowest-scoring keys.
///
/// `entries` must be in insertion order: the sort is stable, so among equal
/// scores the earliest inserted key is chosen first.
pub fn select_victims<'a, V, I>(entries: I, excess: usize, now: Instant) -> Vec<String>
where
    I: IntoIterator<Item = (&'a String, &'a CacheEntry<V>)>,
    V: 'a,
{
    if excess == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(&String, f64)> = entries
        .into_iter()
        .map(|(key, entry)| (key, score(entry, now)))
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));

    scored
        .into_iter()
        .take(excess)
        .map(|(key, _)| key.clone())
        .collect()
}
