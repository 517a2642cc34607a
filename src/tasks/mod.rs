//! Background Tasks Module
//!
//! Contains the background loops owned by the cache and the durable store.
//!
//! # Tasks
//! - Expiry sweep: removes expired cache entries and checks memory pressure
//! - Prefetch worker: drains the prefetch queue, one key at a time
//! - Flusher: debounced batch writes of the durable store

mod cleanup;
mod flush;
mod prefetch;

pub use cleanup::spawn_sweep_task;
pub(crate) use flush::spawn_flush_task;
pub use prefetch::spawn_prefetch_worker;
