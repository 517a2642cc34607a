//! Configuration Module
//!
//! Handles loading and managing cache layer configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Parses an environment variable, falling back to `default` when it is
/// missing or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// == Object Cache Config ==
/// Parameters for the volatile object cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries before eviction kicks in
    pub max_entries: usize,
    /// TTL applied to entries set without an explicit TTL
    pub default_ttl: Duration,
    /// Interval between background expiry sweeps
    pub sweep_interval: Duration,
    /// Pause between two prefetch resolutions
    pub prefetch_delay: Duration,
    /// Estimated size above which bounds are tightened
    pub memory_threshold_bytes: usize,
    /// Step bounds back toward configured values once pressure subsides
    pub restore_on_relief: bool,
}

impl CacheConfig {
    /// Loads cache parameters from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum entries (default: 100)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 1800)
    /// - `CACHE_SWEEP_INTERVAL` - Expiry sweep interval in seconds (default: 300)
    /// - `CACHE_PREFETCH_DELAY_MS` - Delay between prefetches (default: 100)
    /// - `CACHE_MEMORY_THRESHOLD` - Memory pressure threshold in bytes (default: 10 MiB)
    /// - `CACHE_RESTORE_ON_RELIEF` - Restore bounds after pressure (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.max_entries),
            default_ttl: Duration::from_secs(env_or(
                "CACHE_DEFAULT_TTL",
                defaults.default_ttl.as_secs(),
            )),
            sweep_interval: Duration::from_secs(env_or(
                "CACHE_SWEEP_INTERVAL",
                defaults.sweep_interval.as_secs(),
            )),
            prefetch_delay: Duration::from_millis(env_or(
                "CACHE_PREFETCH_DELAY_MS",
                defaults.prefetch_delay.as_millis() as u64,
            )),
            memory_threshold_bytes: env_or(
                "CACHE_MEMORY_THRESHOLD",
                defaults.memory_threshold_bytes,
            ),
            restore_on_relief: env_or("CACHE_RESTORE_ON_RELIEF", defaults.restore_on_relief),
        }
    }

    /// Sets the entry capacity.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Sets the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the memory pressure threshold.
    pub fn with_memory_threshold(mut self, bytes: usize) -> Self {
        self.memory_threshold_bytes = bytes;
        self
    }

    /// Sets the delay between prefetch resolutions.
    pub fn with_prefetch_delay(mut self, delay: Duration) -> Self {
        self.prefetch_delay = delay;
        self
    }

    /// Sets the expiry sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            default_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            prefetch_delay: Duration::from_millis(100),
            memory_threshold_bytes: 10 * 1024 * 1024,
            restore_on_relief: true,
        }
    }
}

// == Durable Store Config ==
/// Parameters for the write-coalescing durable store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Quiet period after the last write before a batch is flushed
    pub debounce: Duration,
    /// Lifetime of read cache entries
    pub read_ttl: Duration,
    /// Pending writes that force an immediate flush
    pub max_batch_size: usize,
    /// Maximum read cache entries
    pub read_cache_capacity: usize,
}

impl StoreConfig {
    /// Loads store parameters from environment variables.
    ///
    /// # Environment Variables
    /// - `STORE_DEBOUNCE_MS` - Debounce window (default: 100)
    /// - `STORE_READ_TTL` - Read cache TTL in seconds (default: 300)
    /// - `STORE_BATCH_SIZE` - Pending writes forcing a flush (default: 50)
    /// - `STORE_READ_CACHE_CAPACITY` - Read cache entries (default: 500)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            debounce: Duration::from_millis(env_or(
                "STORE_DEBOUNCE_MS",
                defaults.debounce.as_millis() as u64,
            )),
            read_ttl: Duration::from_secs(env_or("STORE_READ_TTL", defaults.read_ttl.as_secs())),
            max_batch_size: env_or("STORE_BATCH_SIZE", defaults.max_batch_size),
            read_cache_capacity: env_or(
                "STORE_READ_CACHE_CAPACITY",
                defaults.read_cache_capacity,
            ),
        }
    }

    /// Sets the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the read cache TTL.
    pub fn with_read_ttl(mut self, ttl: Duration) -> Self {
        self.read_ttl = ttl;
        self
    }

    /// Sets the batch size that triggers an early flush.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Sets the read cache capacity.
    pub fn with_read_cache_capacity(mut self, capacity: usize) -> Self {
        self.read_cache_capacity = capacity;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            read_ttl: Duration::from_secs(5 * 60),
            max_batch_size: 50,
            read_cache_capacity: 500,
        }
    }
}

// == Top-level Config ==
/// Complete configuration for the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cache: CacheConfig,
    pub store: StoreConfig,
    /// Directory backing the file medium
    pub data_dir: PathBuf,
    /// Byte quota of the file medium
    pub quota_bytes: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Besides the cache and store variables this reads `DATA_DIR`
    /// (default: `./data`) and `STORE_QUOTA_BYTES` (default: 5 MiB).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache: CacheConfig::from_env(),
            store: StoreConfig::from_env(),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            quota_bytes: env_or("STORE_QUOTA_BYTES", defaults.quota_bytes),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            data_dir: PathBuf::from("./data"),
            quota_bytes: 5 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(1800));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.cache.memory_threshold_bytes, 10 * 1024 * 1024);
        assert_eq!(config.store.debounce, Duration::from_millis(100));
        assert_eq!(config.store.max_batch_size, 50);
    }

    #[test]
    fn test_config_from_env_overrides_and_fallbacks() {
        env::set_var("CACHE_MAX_ENTRIES", "42");
        env::set_var("STORE_DEBOUNCE_MS", "not-a-number");
        env::remove_var("CACHE_DEFAULT_TTL");

        let config = Config::from_env();
        assert_eq!(config.cache.max_entries, 42);
        assert_eq!(config.store.debounce, Duration::from_millis(100));
        assert_eq!(config.cache.default_ttl, Duration::from_secs(1800));

        env::remove_var("CACHE_MAX_ENTRIES");
        env::remove_var("STORE_DEBOUNCE_MS");
    }

    #[test]
    fn test_builder_setters() {
        let config = CacheConfig::default()
            .with_max_entries(5)
            .with_default_ttl(Duration::from_secs(60))
            .with_sweep_interval(Duration::from_secs(10))
            .with_prefetch_delay(Duration::ZERO);
        assert_eq!(config.max_entries, 5);
        assert_eq!(config.default_ttl, Duration::from_secs(60));
        assert_eq!(config.sweep_interval, Duration::from_secs(10));
        assert_eq!(config.prefetch_delay, Duration::ZERO);

        let store = StoreConfig::default()
            .with_read_ttl(Duration::from_secs(30))
            .with_read_cache_capacity(8);
        assert_eq!(store.read_ttl, Duration::from_secs(30));
        assert_eq!(store.read_cache_capacity, 8);
    }
}
