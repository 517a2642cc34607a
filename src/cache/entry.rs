//! Cache Entry Module
//!
//! Defines individual cache entries together with the options they are stored with.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

// == Priority ==
/// Eviction priority. Only affects which entries go first, never correctness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

// == Set Options ==
/// Per-entry options accepted by `set` and the loader helpers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    /// Entry lifetime; `None` or zero falls back to the store default
    pub ttl: Option<Duration>,
    pub priority: Priority,
    /// Tags used for bulk invalidation
    pub tags: HashSet<String>,
    /// Queue the key for a background refresh
    pub prefetch: bool,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a single tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Adds several tags at once.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }
}

// == Cache Entry ==
/// A single cached value with its eviction metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
    pub priority: Priority,
    pub tags: HashSet<String>,
    pub last_accessed_at: Instant,
    pub access_count: u64,
    /// Estimated serialized size, computed once at insertion
    pub size_bytes: usize,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a fresh entry that expires `ttl` after `now`.
    pub fn new(
        value: V,
        ttl: Duration,
        priority: Priority,
        tags: HashSet<String>,
        size_bytes: usize,
        now: Instant,
    ) -> Self {
        Self {
            value,
            expires_at: now + ttl,
            priority,
            tags,
            last_accessed_at: now,
            access_count: 0,
            size_bytes,
        }
    }

    // == Is Expired ==
    /// An entry is logically absent once `now` is strictly past its expiry.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self, now: Instant) {
        self.last_accessed_at = now;
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Returns true when the entry carries any of `tags`.
    pub fn has_any_tag(&self, tags: &HashSet<String>) -> bool {
        !self.tags.is_disjoint(tags)
    }

    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}
