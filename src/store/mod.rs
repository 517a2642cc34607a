//! Store Module
//!
//! Write-coalescing durable key-value store with a read-through cache and
//! quota recovery.

mod durable;
mod medium;
mod read_cache;

pub use durable::{DurableStore, StoreStats};
pub(crate) use durable::StoreShared;
pub use medium::{DurableMedium, FileMedium, MemoryMedium};
pub use read_cache::ReadCache;
