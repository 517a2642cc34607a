//! Integration Tests for the Durable Store
//!
//! Drives write coalescing, debounce timing, read visibility and quota
//! recovery through the public API.

use std::sync::Arc;
use std::time::Duration;

use adaptive_cache::{
    CacheError, DurableMedium, DurableStore, FileMedium, MediumError, MemoryMedium, StoreConfig,
};
use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

// == Helper Functions ==

fn create_store(config: StoreConfig) -> (DurableStore<Arc<MemoryMedium>>, Arc<MemoryMedium>) {
    let medium = Arc::new(MemoryMedium::new());
    (DurableStore::new(medium.clone(), config), medium)
}

fn pair(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Medium whose reads and writes take `MEDIUM_LATENCY`; deletes are instant.
struct SlowMedium {
    inner: MemoryMedium,
}

const MEDIUM_LATENCY: Duration = Duration::from_millis(50);

#[async_trait]
impl DurableMedium for SlowMedium {
    async fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        tokio::time::sleep(MEDIUM_LATENCY).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        tokio::time::sleep(MEDIUM_LATENCY).await;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), MediumError> {
        self.inner.delete(key).await
    }
}

async fn create_slow_store(config: StoreConfig) -> (DurableStore<Arc<SlowMedium>>, Arc<SlowMedium>) {
    let medium = Arc::new(SlowMedium {
        inner: MemoryMedium::new(),
    });
    medium.inner.set("x", "\"old\"").await.unwrap();
    (DurableStore::new(medium.clone(), config), medium)
}

// == Write Coalescing ==

#[tokio::test(start_paused = true)]
async fn test_rapid_writes_collapse_to_one() {
    let (store, medium) = create_store(StoreConfig::default());

    for v in 1..=5 {
        store.set_item("x", &v).await.unwrap();
    }
    assert!(medium.writes().await.is_empty(), "nothing written inside the window");

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(medium.writes().await, vec![pair("x", "5")]);
}

#[tokio::test(start_paused = true)]
async fn test_each_write_restarts_debounce() {
    let (store, medium) = create_store(StoreConfig::default());

    store.set_item("a", &1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    store.set_item("b", &2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(medium.writes().await.is_empty(), "window restarted by second write");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(medium.writes().await, vec![pair("a", "1"), pair("b", "2")]);
}

#[tokio::test(start_paused = true)]
async fn test_full_batch_flushes_without_debounce() {
    let config = StoreConfig::default()
        .with_debounce(Duration::from_secs(60))
        .with_max_batch_size(3);
    let (store, medium) = create_store(config);

    for key in ["a", "b", "c"] {
        store.set_item(key, key).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(medium.writes().await.len(), 3);
    assert_eq!(store.get_cache_stats().await.pending_writes, 0);
}

// == Read Visibility ==

#[tokio::test(start_paused = true)]
async fn test_read_your_write_before_flush() {
    let (store, medium) = create_store(StoreConfig::default());

    store.set_item("session", "abc").await.unwrap();

    assert_eq!(
        store.get_item("session").await.unwrap(),
        Some("\"abc\"".to_string())
    );
    assert!(medium.writes().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stats_report_batch_state() {
    let config = StoreConfig::default().with_max_batch_size(10);
    let (store, _medium) = create_store(config);

    store.set_item("a", &1).await.unwrap();
    store.set_item("b", &2).await.unwrap();

    let stats = store.get_cache_stats().await;
    assert_eq!(stats.cache_size, 2);
    assert_eq!(stats.pending_writes, 2);
    assert_eq!(stats.batch_size, 10);
}

// == Quota Recovery ==

#[tokio::test(start_paused = true)]
async fn test_single_quota_failure_recovers() {
    let (store, medium) = create_store(StoreConfig::default());
    medium.fail_next_writes(1).await;

    store.set_item("x", &42).await.unwrap();
    let written = assert_ok!(store.flush().await);

    assert_eq!(written, 1);
    assert_eq!(medium.writes().await, vec![pair("x", "42")]);
}

#[tokio::test(start_paused = true)]
async fn test_double_quota_failure_is_terminal() {
    let (store, medium) = create_store(StoreConfig::default());
    medium.fail_next_writes(3).await;

    store.set_item("x", &42).await.unwrap();
    let err = assert_err!(store.flush().await);
    assert!(matches!(err, CacheError::QuotaExceeded { ref key } if key == "x"));

    // No further automatic retry: the third injected failure is still armed
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(medium.writes().await.is_empty());
    assert_eq!(store.get_cache_stats().await.pending_writes, 0);

    store.set_item("y", &1).await.unwrap();
    assert_ok!(store.flush().await);
    assert_eq!(medium.writes().await, vec![pair("y", "1")]);
}

#[tokio::test(start_paused = true)]
async fn test_quota_recovery_trims_read_cache() {
    let (store, medium) = create_store(StoreConfig::default());
    for i in 0..4 {
        store.set_item(&format!("k{i}"), &i).await.unwrap();
    }
    assert_ok!(store.flush().await);
    assert_eq!(store.get_cache_stats().await.cache_size, 4);

    medium.fail_next_writes(1).await;
    store.set_item("k4", &4).await.unwrap();
    assert_ok!(store.flush().await);

    // Nothing was expired, so the oldest half of five entries went
    assert_eq!(store.get_cache_stats().await.cache_size, 2);
}

#[tokio::test(start_paused = true)]
async fn test_real_quota_exhaustion_surfaces() {
    let medium = Arc::new(MemoryMedium::with_quota(16));
    let store = DurableStore::new(medium.clone(), StoreConfig::default());

    store.set_item("big", &"x".repeat(64)).await.unwrap();

    assert!(matches!(
        store.flush().await,
        Err(CacheError::QuotaExceeded { .. })
    ));
    assert_eq!(medium.used_bytes().await, 0);
}

// == Overlapping Operations ==

#[tokio::test(start_paused = true)]
async fn test_write_during_medium_read_is_not_overwritten() {
    let (store, _medium) = create_slow_store(StoreConfig::default()).await;

    let reader = tokio::spawn({
        let store = store.clone();
        async move { store.get_item("x").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    store.set_item("x", "new").await.unwrap();
    assert_ok!(reader.await.unwrap());

    assert_eq!(
        store.get_item("x").await.unwrap(),
        Some("\"new\"".to_string())
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        store.get_item("x").await.unwrap(),
        Some("\"new\"".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_remove_during_medium_read_stays_removed() {
    let (store, medium) = create_slow_store(StoreConfig::default()).await;

    let reader = tokio::spawn({
        let store = store.clone();
        async move { store.get_item("x").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    store.remove_item("x").await.unwrap();
    assert_ok!(reader.await.unwrap());

    assert_eq!(store.get_cache_stats().await.cache_size, 0);
    assert_eq!(store.get_item("x").await.unwrap(), None);
    assert_eq!(medium.inner.get("x").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_remove_during_flush_is_durable() {
    let config = StoreConfig::default().with_debounce(Duration::from_secs(60));
    let (store, medium) = create_slow_store(config).await;
    store.set_item("x", "v").await.unwrap();

    let flush = tokio::spawn({
        let store = store.clone();
        async move { store.flush().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The delete lands while the flush is still inside the medium write
    store.remove_item("x").await.unwrap();
    let written = assert_ok!(flush.await.unwrap());

    assert_eq!(written, 0);
    assert_eq!(medium.inner.get("x").await.unwrap(), None);
    assert_eq!(store.get_item("x").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_write_after_remove_during_flush_survives() {
    let config = StoreConfig::default().with_debounce(Duration::from_secs(60));
    let (store, medium) = create_slow_store(config).await;
    store.set_item("x", "v1").await.unwrap();

    let flush = tokio::spawn({
        let store = store.clone();
        async move { store.flush().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    store.remove_item("x").await.unwrap();
    store.set_item("x", "v2").await.unwrap();
    assert_ok!(flush.await.unwrap());
    assert_ok!(store.flush().await);

    assert_eq!(
        medium.inner.get("x").await.unwrap(),
        Some("\"v2\"".to_string())
    );
}

// == Shutdown ==

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_pending_writes() {
    let config = StoreConfig::default().with_debounce(Duration::from_secs(3600));
    let (store, medium) = create_store(config);

    store.set_item("draft", "unsaved text").await.unwrap();
    let written = store.shutdown().await.unwrap();

    assert_eq!(written, 1);
    assert_eq!(medium.writes().await.len(), 1);
}

#[tokio::test]
async fn test_file_medium_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let medium = FileMedium::open(dir.path(), 4096).await.unwrap();
    let store = DurableStore::new(medium, StoreConfig::default());
    store.set_item("queued:1", &vec!["like", "post"]).await.unwrap();
    store.shutdown().await.unwrap();

    let medium = FileMedium::open(dir.path(), 4096).await.unwrap();
    let reopened = DurableStore::new(medium, StoreConfig::default());
    let actions: Option<Vec<String>> = reopened.get_json("queued:1").await.unwrap();

    assert_eq!(actions, Some(vec!["like".to_string(), "post".to_string()]));
    reopened.shutdown().await.unwrap();
}
