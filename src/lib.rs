//! Adaptive Cache - in-process caching and write-coalescing persistence
//!
//! Two collaborating components:
//! - [`ObjectCache`]: volatile object cache with TTL, priority-weighted
//!   eviction, tag invalidation, loaders and background prefetching.
//! - [`DurableStore`]: read-through, write-coalescing wrapper over a durable
//!   key-value medium with quota-failure recovery.

pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod tasks;

pub use cache::{CacheStats, ObjectCache, Priority, PrefetchResolver, SetOptions};
pub use config::{CacheConfig, Config, StoreConfig};
pub use error::{CacheError, MediumError, Result};
pub use store::{DurableMedium, DurableStore, FileMedium, MemoryMedium, StoreStats};
