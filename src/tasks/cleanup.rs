//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries and
//! reacts to memory pressure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheStore, PressureAction};

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// Each tick also runs a memory pressure check, so bounds tighten (or relax)
/// without waiting for a write.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted by `ObjectCache::shutdown`.
///
/// # Example
/// ```ignore
/// let store = Arc::new(RwLock::new(CacheStore::<String>::new(&CacheConfig::default())));
/// let sweep = spawn_sweep_task(store.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// sweep.abort();
/// ```
pub fn spawn_sweep_task<V>(store: Arc<RwLock<CacheStore<V>>>, interval: Duration) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let (removed, pressure) = {
                let mut guard = store.write().await;
                let removed = guard.cleanup_expired();
                (removed, guard.check_memory_pressure())
            };

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
            if pressure != PressureAction::Unchanged {
                debug!(?pressure, "Expiry sweep adjusted cache bounds");
            }
        }
    })
}
