//! Debounced Flush Task
//!
//! Background task that flushes the durable store's pending writes once
//! writes have gone quiet for the debounce window.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::store::{DurableMedium, StoreShared};

/// Spawns the single flusher of a durable store.
///
/// Every write restarts the `debounce` window; the flush runs once the window
/// elapses with no further writes, or immediately when the batch fills up.
/// Failures are logged since no caller is waiting on a timer-driven flush.
pub(crate) fn spawn_flush_task<M>(shared: Arc<StoreShared<M>>, debounce: Duration) -> JoinHandle<()>
where
    M: DurableMedium + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting flush task with debounce of {} ms",
            debounce.as_millis()
        );

        loop {
            let mut urgent = tokio::select! {
                _ = shared.writes.notified() => false,
                _ = shared.batch_full.notified() => true,
            };

            while !urgent {
                tokio::select! {
                    _ = shared.writes.notified() => {}
                    _ = shared.batch_full.notified() => urgent = true,
                    _ = tokio::time::sleep(debounce) => break,
                }
            }

            match shared.flush_pending().await {
                Ok(0) => {}
                Ok(written) => debug!("Flush task wrote {} values", written),
                Err(e) => error!("Flush task failed: {}", e),
            }
        }
    })
}
