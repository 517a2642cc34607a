//! Cache Module
//!
//! Volatile object cache with TTL expiration, priority-weighted eviction,
//! tag invalidation and background prefetching.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

mod entry;
pub mod eviction;
mod object_cache;
mod prefetch;
mod size;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, Priority, SetOptions};
pub use object_cache::ObjectCache;
pub use prefetch::PrefetchQueue;
pub use size::{JsonSizeEstimator, SizeEstimator};
pub use stats::CacheStats;
pub use store::{CacheStore, PressureAction};

// == Memory Pressure Constants ==
/// Capacity never shrinks below this under memory pressure
pub const MIN_MAX_ENTRIES: usize = 20;

/// Capacity reduction per pressure step
pub const MAX_ENTRIES_STEP: usize = 10;

/// Default TTL never shrinks below this under memory pressure
pub const MIN_DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default TTL reduction per pressure step
pub const DEFAULT_TTL_STEP: Duration = Duration::from_secs(5 * 60);

// == Prefetch Resolver ==
/// Loads the value for a key on behalf of the background prefetch worker.
///
/// Failures are logged by the worker and never reach cache callers.
#[async_trait]
pub trait PrefetchResolver<V>: Send + Sync {
    async fn resolve(&self, key: &str) -> anyhow::Result<V>;
}

#[async_trait]
impl<V, F, Fut> PrefetchResolver<V> for F
where
    V: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<V>> + Send,
{
    async fn resolve(&self, key: &str) -> anyhow::Result<V> {
        (self)(key.to_string()).await
    }
}
