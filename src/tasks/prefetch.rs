//! Prefetch Worker
//!
//! Drains the prefetch queue one key at a time, inserting resolved values
//! into the cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheStore, PrefetchQueue, PrefetchResolver, SetOptions};

/// Spawns the drain loop for `queue`.
///
/// The caller must have claimed the drain with
/// [`PrefetchQueue::try_start_drain`]; the loop releases the claim when it
/// finds the queue empty. Resolver failures are logged and skipped.
pub fn spawn_prefetch_worker<V>(
    store: Arc<RwLock<CacheStore<V>>>,
    queue: Arc<Mutex<PrefetchQueue>>,
    resolver: Arc<dyn PrefetchResolver<V>>,
    delay: Duration,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let Some(key) = queue.lock().await.next_or_finish() else {
                debug!("Prefetch queue drained");
                break;
            };

            match resolver.resolve(&key).await {
                Ok(value) => {
                    let mut guard = store.write().await;
                    guard.set(key.clone(), value, &SetOptions::default());
                    guard.record_prefetch();
                    debug!(key = %key, "prefetched");
                }
                Err(e) => warn!(key = %key, "Prefetch failed: {:#}", e),
            }

            tokio::time::sleep(delay).await;
        }
    })
}
