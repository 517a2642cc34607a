//! Durable Store Module
//!
//! Write-coalescing wrapper over a [`DurableMedium`]: writes are visible
//! immediately through the read cache, batched in memory, and flushed after a
//! quiet period.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::PrefetchResolver;
use crate::config::StoreConfig;
use crate::error::{CacheError, MediumError, Result};
use crate::store::{DurableMedium, ReadCache};
use crate::tasks::spawn_flush_task;

// == Store Stats ==
/// Observability snapshot of the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Entries currently held by the read cache
    pub cache_size: usize,
    /// Writes waiting for the next flush
    pub pending_writes: usize,
    /// Pending writes that trigger a flush without waiting for the debounce
    pub batch_size: usize,
}

#[derive(Debug)]
struct StoreState {
    read_cache: ReadCache,
    /// Latest serialized value per key awaiting a flush, in first-write order
    pending: IndexMap<String, String>,
    /// Batch taken by a running flush, still readable until written
    in_flight: IndexMap<String, String>,
    /// Keys with a medium read in progress
    reads: HashMap<String, ReadTicket>,
}

#[derive(Debug, Default)]
struct ReadTicket {
    readers: usize,
    /// Bumped by every write or removal of the key
    generation: u64,
}

impl StoreState {
    fn begin_read(&mut self, key: &str) -> u64 {
        let ticket = self.reads.entry(key.to_string()).or_default();
        ticket.readers += 1;
        ticket.generation
    }

    /// Ends a medium read. Returns false when the key was written or removed
    /// while the read ran, in which case the fetched value must not be cached.
    fn finish_read(&mut self, key: &str, generation: u64) -> bool {
        let Some(ticket) = self.reads.get_mut(key) else {
            return false;
        };
        let current = ticket.generation == generation;
        ticket.readers -= 1;
        if ticket.readers == 0 {
            self.reads.remove(key);
        }
        current
    }

    fn invalidate_reads(&mut self, key: &str) {
        if let Some(ticket) = self.reads.get_mut(key) {
            ticket.generation += 1;
        }
    }
}

/// State shared between the store handle and its flusher task.
pub(crate) struct StoreShared<M> {
    medium: M,
    config: StoreConfig,
    state: Mutex<StoreState>,
    /// One flush at a time
    flush_lock: Mutex<()>,
    /// Signalled on every write; restarts the debounce window
    pub(crate) writes: Notify,
    /// Signalled when the batch is full; flushes without debounce
    pub(crate) batch_full: Notify,
}

impl<M: DurableMedium> StoreShared<M> {
    // == Flush ==
    /// Writes every pending value to the medium.
    ///
    /// Writes that hit the quota get one cleanup-and-retry. Values that still
    /// fail are dropped and the first such failure is returned once the rest
    /// of the batch has been attempted. A key removed while its write ran is
    /// deleted again afterwards and not counted as written.
    pub(crate) async fn flush_pending(&self) -> Result<usize> {
        let _flush = self.flush_lock.lock().await;

        let keys: Vec<String> = {
            let mut state = self.state.lock().await;
            let batch = std::mem::take(&mut state.pending);
            state.in_flight = batch;
            state.in_flight.keys().cloned().collect()
        };
        if keys.is_empty() {
            return Ok(0);
        }
        debug!(count = keys.len(), "flushing pending writes");

        let mut written = 0;
        let mut first_error = None;
        for key in keys {
            // Skipped if removed while the flush was running
            let Some(value) = self.state.lock().await.in_flight.get(&key).cloned() else {
                continue;
            };

            let result = self.write_with_recovery(&key, &value).await;
            let removed = self
                .state
                .lock()
                .await
                .in_flight
                .shift_remove(&key)
                .is_none();

            match result {
                Ok(()) if removed => {
                    // The removal's own delete may have reached the medium first
                    if let Err(e) = self.undo_removed_write(&key).await {
                        error!(key = %key, "Failed to delete removed key: {}", e);
                        first_error.get_or_insert(e);
                    }
                }
                Ok(()) => written += 1,
                Err(e) => {
                    error!(key = %key, "Dropping pending write: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    async fn undo_removed_write(&self, key: &str) -> Result<()> {
        self.medium.delete(key).await?;
        let mut state = self.state.lock().await;
        state.read_cache.remove(key);
        state.invalidate_reads(key);
        debug!(key = %key, "deleted key removed during flush");
        Ok(())
    }

    async fn write_with_recovery(&self, key: &str, value: &str) -> Result<()> {
        match self.medium.set(key, value).await {
            Err(MediumError::QuotaExceeded) => {}
            other => return other.map_err(CacheError::from),
        }

        let reclaimed = self
            .state
            .lock()
            .await
            .read_cache
            .reclaim(Instant::now());
        warn!(key = %key, reclaimed, "Quota exceeded, retrying write once after cleanup");

        match self.medium.set(key, value).await {
            Ok(()) => Ok(()),
            Err(MediumError::QuotaExceeded) => Err(CacheError::QuotaExceeded {
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

// == Durable Store ==
/// Write-coalescing, read-through store over a durable medium.
///
/// Cloning yields another handle to the same store. A debounced flusher task
/// runs from construction until [`DurableStore::shutdown`], which flushes
/// first so no acknowledged write is lost.
pub struct DurableStore<M> {
    shared: Arc<StoreShared<M>>,
    flusher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<M> Clone for DurableStore<M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            flusher: self.flusher.clone(),
        }
    }
}

impl<M: DurableMedium + 'static> DurableStore<M> {
    // == Constructor ==
    /// Creates the store and starts its flusher. Must be called within a
    /// tokio runtime.
    pub fn new(medium: M, config: StoreConfig) -> Self {
        let shared = Arc::new(StoreShared {
            medium,
            state: Mutex::new(StoreState {
                read_cache: ReadCache::new(config.read_ttl, config.read_cache_capacity),
                pending: IndexMap::new(),
                in_flight: IndexMap::new(),
                reads: HashMap::new(),
            }),
            flush_lock: Mutex::new(()),
            writes: Notify::new(),
            batch_full: Notify::new(),
            config,
        });
        let flusher = spawn_flush_task(shared.clone(), shared.config.debounce);

        Self {
            shared,
            flusher: Arc::new(Mutex::new(Some(flusher))),
        }
    }

    // == Set Item ==
    /// Serializes `value` and stages it for the next flush.
    ///
    /// The value is readable immediately. Serialization errors are returned
    /// and nothing is staged.
    pub async fn set_item<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let serialized = serde_json::to_string(value)?;

        let pending = {
            let mut state = self.shared.state.lock().await;
            state
                .read_cache
                .insert(key, serialized.clone(), Instant::now());
            state.pending.insert(key.to_string(), serialized);
            state.invalidate_reads(key);
            state.pending.len()
        };

        if pending >= self.shared.config.max_batch_size {
            self.shared.batch_full.notify_one();
        } else {
            self.shared.writes.notify_one();
        }
        Ok(())
    }

    // == Get Item ==
    /// Returns the serialized value for `key`.
    ///
    /// Looks in the read cache, then the unflushed writes, then the medium.
    /// A medium hit populates the read cache unless the key was written or
    /// removed while the read was in progress.
    pub async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let generation = {
            let mut state = self.shared.state.lock().await;
            if let Some(value) = state.read_cache.get(key, Instant::now()) {
                return Ok(Some(value));
            }
            if let Some(value) = state
                .pending
                .get(key)
                .or_else(|| state.in_flight.get(key))
            {
                return Ok(Some(value.clone()));
            }
            state.begin_read(key)
        };

        let fetched = self.shared.medium.get(key).await;

        let mut state = self.shared.state.lock().await;
        let current = state.finish_read(key, generation);
        let value = fetched?;
        match &value {
            Some(value) if current => {
                state.read_cache.insert(key, value.clone(), Instant::now());
            }
            Some(_) => debug!(key = %key, "discarding read overtaken by a write"),
            None => {}
        }
        Ok(value)
    }

    /// Reads `key` and deserializes it.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_item(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    // == Remove Item ==
    /// Drops any staged write and cached copy, then deletes from the medium
    /// right away.
    pub async fn remove_item(&self, key: &str) -> Result<()> {
        {
            let mut state = self.shared.state.lock().await;
            state.pending.shift_remove(key);
            state.in_flight.shift_remove(key);
            state.read_cache.remove(key);
            state.invalidate_reads(key);
        }
        self.shared.medium.delete(key).await?;
        debug!(key = %key, "removed item");
        Ok(())
    }

    // == Flush ==
    /// Writes all staged values now instead of waiting for the debounce.
    ///
    /// Returns the number of values written, or the first terminal failure.
    pub async fn flush(&self) -> Result<usize> {
        self.shared.flush_pending().await
    }

    // == Stats ==
    pub async fn get_cache_stats(&self) -> StoreStats {
        let state = self.shared.state.lock().await;
        StoreStats {
            cache_size: state.read_cache.len(),
            pending_writes: state.pending.len(),
            batch_size: self.shared.config.max_batch_size,
        }
    }

    // == Shutdown ==
    /// Flushes staged writes and stops the flusher.
    ///
    /// The flusher is stopped even when the final flush fails.
    pub async fn shutdown(&self) -> Result<usize> {
        let flushed = self.flush().await;
        if let Some(handle) = self.flusher.lock().await.take() {
            handle.abort();
        }
        info!("Durable store shut down");
        flushed
    }
}

// Lets an `ObjectCache` prefetch values persisted in this store.
#[async_trait]
impl<M, V> PrefetchResolver<V> for DurableStore<M>
where
    M: DurableMedium + 'static,
    V: DeserializeOwned + Send + 'static,
{
    async fn resolve(&self, key: &str) -> anyhow::Result<V> {
        self.get_json(key)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no stored value for key {key}"))
    }
}
