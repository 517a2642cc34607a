//! Adaptive Cache daemon
//!
//! Runs an object cache that prefetches from a file-backed durable store,
//! reports statistics periodically and flushes pending writes on shutdown.

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adaptive_cache::{Config, DurableStore, FileMedium, ObjectCache};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the file medium and durable store
/// 4. Create the object cache with the store as prefetch resolver
/// 5. Log statistics until SIGINT/SIGTERM
/// 6. Shut down both components, flushing pending writes
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adaptive_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Adaptive Cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, default_ttl={}s, sweep_interval={}s, debounce={}ms, data_dir={}",
        config.cache.max_entries,
        config.cache.default_ttl.as_secs(),
        config.cache.sweep_interval.as_secs(),
        config.store.debounce.as_millis(),
        config.data_dir.display()
    );

    let medium = FileMedium::open(&config.data_dir, config.quota_bytes)
        .await
        .with_context(|| format!("opening data dir {}", config.data_dir.display()))?;
    let store = DurableStore::new(medium, config.store.clone());
    let cache: ObjectCache<serde_json::Value> =
        ObjectCache::new(config.cache.clone()).with_resolver(store.clone());
    info!("Cache and durable store initialized");

    let mut ticker = tokio::time::interval(STATS_INTERVAL);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let stats = cache.stats().await;
                let store_stats = store.get_cache_stats().await;
                info!(
                    "Stats: entries={}, bytes={}, hit_rate={:.2}, evictions={}, prefetches={}, pending_writes={}",
                    stats.total_entries,
                    stats.total_size_bytes,
                    stats.hit_rate(),
                    stats.evictions,
                    stats.prefetches,
                    store_stats.pending_writes
                );
            }
        }
    }

    cache.shutdown().await;
    match store.shutdown().await {
        Ok(written) => info!("Flushed {} pending writes", written),
        Err(e) => error!("Final flush failed: {}", e),
    }

    info!("Shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
