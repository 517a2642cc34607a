//! Read Cache Module
//!
//! Bounded TTL cache of serialized values layered over the durable medium.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct ReadEntry {
    value: String,
    expires_at: Instant,
}

/// Serialized values with an expiry, capped at `capacity` entries.
#[derive(Debug)]
pub struct ReadCache {
    entries: HashMap<String, ReadEntry>,
    ttl: Duration,
    capacity: usize,
}

impl ReadCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity,
        }
    }

    /// Returns the value if present and unexpired; expired entries are dropped.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<String> {
        match self.entries.get(key) {
            Some(entry) if now <= entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts or overwrites `key`. A full cache first drops the entry
    /// closest to expiry.
    pub fn insert(&mut self, key: &str, value: String, now: Instant) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.oldest_key() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            key.to_string(),
            ReadEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    // == Purge Expired ==
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now <= entry.expires_at);
        before - self.entries.len()
    }

    // == Drop Oldest Half ==
    /// Removes the half of the entries with the earliest expiry (rounded up).
    pub fn drop_oldest_half(&mut self) -> usize {
        let mut by_expiry: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.expires_at, key.clone()))
            .collect();
        by_expiry.sort();

        let count = by_expiry.len().div_ceil(2);
        for (_, key) in by_expiry.into_iter().take(count) {
            self.entries.remove(&key);
        }
        count
    }

    // == Reclaim ==
    /// Quota recovery: purge expired entries, and if none were expired drop
    /// the oldest half.
    ///
    /// The medium's remaining space is not observable from here, so an empty
    /// purge is what counts as "still over capacity". Occupancy relative to
    /// `capacity` plays no part: a quota failure is about the medium, not
    /// about how full this cache is.
    pub fn reclaim(&mut self, now: Instant) -> usize {
        match self.purge_expired(now) {
            0 => self.drop_oldest_half(),
            purged => purged,
        }
    }

    fn oldest_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
