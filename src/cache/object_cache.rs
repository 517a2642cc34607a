//! Object Cache Module
//!
//! Concurrent async front of the cache store: loader helpers, prefetch
//! scheduling and background task ownership.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{
    CacheStats, CacheStore, PrefetchQueue, PrefetchResolver, PressureAction, SetOptions,
    SizeEstimator,
};
use crate::config::CacheConfig;
use crate::tasks::{spawn_prefetch_worker, spawn_sweep_task};

/// In-process object cache with TTL, priority eviction, tag invalidation and
/// background prefetching.
///
/// Cloning yields another handle to the same cache. Locks are never held
/// while a loader or resolver runs, so a loader's result can overwrite a
/// value set concurrently for the same key: the last `set` wins.
///
/// # Example
/// ```ignore
/// let cache = ObjectCache::new(CacheConfig::default());
/// cache.set("goals:42", goals, SetOptions::new().tag("goals")).await;
/// let goals = cache.get("goals:42").await;
/// cache.clear_by_tags(["goals"]).await;
/// ```
pub struct ObjectCache<V> {
    store: Arc<RwLock<CacheStore<V>>>,
    queue: Arc<Mutex<PrefetchQueue>>,
    resolver: Option<Arc<dyn PrefetchResolver<V>>>,
    prefetch_delay: Duration,
    sweep: Arc<Mutex<Option<JoinHandle<()>>>>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<V> Clone for ObjectCache<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            queue: self.queue.clone(),
            resolver: self.resolver.clone(),
            prefetch_delay: self.prefetch_delay,
            sweep: self.sweep.clone(),
            worker: self.worker.clone(),
        }
    }
}

impl<V> ObjectCache<V>
where
    V: Serialize + Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache sizing entries by their JSON encoding and starts the
    /// expiry sweep. Must be called within a tokio runtime.
    pub fn new(config: CacheConfig) -> Self {
        Self::from_store(CacheStore::new(&config), &config)
    }
}

impl<V> ObjectCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache with a custom size estimator and starts the expiry
    /// sweep. Must be called within a tokio runtime.
    pub fn with_estimator(config: CacheConfig, estimator: Arc<dyn SizeEstimator<V>>) -> Self {
        Self::from_store(CacheStore::with_estimator(&config, estimator), &config)
    }

    fn from_store(store: CacheStore<V>, config: &CacheConfig) -> Self {
        let store = Arc::new(RwLock::new(store));
        let sweep = spawn_sweep_task(store.clone(), config.sweep_interval);
        Self {
            store,
            queue: Arc::new(Mutex::new(PrefetchQueue::new())),
            resolver: None,
            prefetch_delay: config.prefetch_delay,
            sweep: Arc::new(Mutex::new(Some(sweep))),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Sets the resolver used by the prefetch worker.
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: PrefetchResolver<V> + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    // == Set ==
    /// Stores `value` under `key`, queueing a prefetch if requested.
    pub async fn set(&self, key: impl Into<String>, value: V, options: SetOptions) {
        let key = key.into();
        let prefetch = options.prefetch;
        let evicted = self.store.write().await.set(key.clone(), value, &options);
        if !evicted.is_empty() {
            debug!(?evicted, "evicted to make room for {}", key);
        }
        if prefetch {
            self.prefetch(&key).await;
        }
    }

    // == Get ==
    /// Returns a copy of the cached value, or `None` if absent or expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.store.write().await.get(key)
    }

    // == Delete ==
    /// Removes `key`. Returns whether it was present.
    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    // == Clear By Tags ==
    /// Removes every entry tagged with any of `tags`.
    pub async fn clear_by_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: HashSet<String> = tags.into_iter().map(Into::into).collect();
        self.store.write().await.clear_by_tags(&tags)
    }

    // == Clear ==
    /// Removes all entries and pending prefetches. Counters are kept.
    pub async fn clear(&self) {
        self.store.write().await.clear();
        self.queue.lock().await.clear();
        info!("Object cache cleared");
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    // == Lazy Load ==
    /// Returns the cached value, or runs `loader`, caches its result and
    /// returns it. Loader errors are returned as-is and nothing is cached.
    pub async fn lazy_load<F, Fut, E>(
        &self,
        key: &str,
        loader: F,
        options: SetOptions,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = loader().await?;
        self.set(key, value.clone(), options).await;
        Ok(value)
    }

    // == Batch Load ==
    /// Resolves `keys` from the cache and loads the rest with one call to
    /// `loader`.
    ///
    /// The loader receives only the keys that missed, and is skipped when
    /// none did. Keys it leaves out are absent from the result; keys it
    /// returns that were not requested are ignored.
    pub async fn batch_load<K, F, Fut, E>(
        &self,
        keys: &[K],
        loader: F,
        options: SetOptions,
    ) -> Result<HashMap<String, V>, E>
    where
        K: AsRef<str>,
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Result<HashMap<String, V>, E>>,
    {
        let mut results = HashMap::with_capacity(keys.len());
        let mut missing: Vec<String> = Vec::new();
        {
            let mut store = self.store.write().await;
            for key in keys {
                let key = key.as_ref();
                match store.get(key) {
                    Some(value) => {
                        results.insert(key.to_string(), value);
                    }
                    None if !missing.iter().any(|k| k == key) => missing.push(key.to_string()),
                    None => {}
                }
            }
        }

        if missing.is_empty() {
            return Ok(results);
        }

        let requested: HashSet<String> = missing.iter().cloned().collect();
        let loaded = loader(missing).await?;
        for (key, value) in loaded {
            if !requested.contains(&key) {
                debug!(key = %key, "ignoring unrequested key from batch loader");
                continue;
            }
            self.set(key.clone(), value.clone(), options.clone()).await;
            results.insert(key, value);
        }
        Ok(results)
    }

    // == Prefetch ==
    /// Queues `key` for a background load and starts the worker if idle.
    ///
    /// Without a resolver the request is dropped.
    pub async fn prefetch(&self, key: &str) {
        let Some(resolver) = self.resolver.clone() else {
            debug!(key = %key, "no prefetch resolver configured, skipping");
            return;
        };

        let start = {
            let mut queue = self.queue.lock().await;
            queue.push(key);
            queue.try_start_drain()
        };
        if start {
            let handle = spawn_prefetch_worker(
                self.store.clone(),
                self.queue.clone(),
                resolver,
                self.prefetch_delay,
            );
            *self.worker.lock().await = Some(handle);
        }
    }

    /// Keys waiting for the prefetch worker.
    pub async fn pending_prefetches(&self) -> usize {
        self.queue.lock().await.len()
    }

    // == Memory Pressure ==
    /// Sum of the estimated sizes of all entries.
    pub async fn memory_usage(&self) -> usize {
        self.store.read().await.memory_usage()
    }

    /// Tightens capacity and default TTL by one step and evicts.
    pub async fn optimize_cache(&self) -> Vec<String> {
        self.store.write().await.optimize()
    }

    /// Compares usage to the threshold and adjusts bounds.
    pub async fn check_memory_pressure(&self) -> PressureAction {
        self.store.write().await.check_memory_pressure()
    }

    // == Shutdown ==
    /// Stops the expiry sweep and any running prefetch worker.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.sweep.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.worker.lock().await.take() {
            handle.abort();
        }
        let mut queue = self.queue.lock().await;
        queue.clear();
        // An aborted worker never releases its claim
        queue.next_or_finish();
        info!("Object cache shut down");
    }
}
