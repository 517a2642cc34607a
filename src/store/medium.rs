//! Durable Medium Module
//!
//! The key-value primitive the durable store persists to, plus an in-memory
//! and a file-backed implementation. Both enforce a byte quota and report
//! exhaustion as [`MediumError::QuotaExceeded`].

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{MediumError, Result};

/// Backing store for `DurableStore`.
#[async_trait]
pub trait DurableMedium: Send + Sync {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, MediumError>;

    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), MediumError>;

    async fn delete(&self, key: &str) -> std::result::Result<(), MediumError>;
}

#[async_trait]
impl<T: DurableMedium + ?Sized> DurableMedium for Arc<T> {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, MediumError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), MediumError> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), MediumError> {
        (**self).delete(key).await
    }
}

// == Memory Medium ==
#[derive(Debug, Default)]
struct MemoryState {
    data: HashMap<String, String>,
    /// Successful writes in order
    writes: Vec<(String, String)>,
    /// Upcoming writes that fail with a quota error regardless of usage
    forced_quota_failures: usize,
}

/// In-process medium with an optional byte quota.
///
/// Usage counts key and value bytes. Quota failures can also be injected
/// to simulate a medium that is full for reasons outside this process.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    state: Mutex<MemoryState>,
    quota_bytes: Option<usize>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            state: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Makes the next `count` writes fail with a quota error.
    pub async fn fail_next_writes(&self, count: usize) {
        self.state.lock().await.forced_quota_failures = count;
    }

    /// Successful writes so far, oldest first.
    pub async fn writes(&self) -> Vec<(String, String)> {
        self.state.lock().await.writes.clone()
    }

    pub async fn used_bytes(&self) -> usize {
        let state = self.state.lock().await;
        state.data.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

#[async_trait]
impl DurableMedium for MemoryMedium {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, MediumError> {
        Ok(self.state.lock().await.data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), MediumError> {
        let mut state = self.state.lock().await;
        if state.forced_quota_failures > 0 {
            state.forced_quota_failures -= 1;
            return Err(MediumError::QuotaExceeded);
        }

        if let Some(quota) = self.quota_bytes {
            let others: usize = state
                .data
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(MediumError::QuotaExceeded);
            }
        }

        state.data.insert(key.to_string(), value.to_string());
        state.writes.push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), MediumError> {
        self.state.lock().await.data.remove(key);
        Ok(())
    }
}

// == File Medium ==
/// Stores one file per key under a directory, with a byte quota over the
/// directory's total size.
///
/// File names are the hex encoding of the key, so any key is a safe path.
#[derive(Debug)]
pub struct FileMedium {
    dir: PathBuf,
    quota_bytes: u64,
    /// Serializes writers so quota checks see a stable directory
    write_lock: Mutex<()>,
}

impl FileMedium {
    /// Opens (creating if needed) a medium rooted at `dir`.
    pub async fn open(dir: impl AsRef<Path>, quota_bytes: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), quota_bytes, "file medium opened");
        Ok(Self {
            dir,
            quota_bytes,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key)))
    }

    /// Total bytes on disk, excluding `skip`.
    async fn usage_excluding(&self, skip: &Path) -> std::io::Result<u64> {
        let mut total = 0;
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            if item.path() == skip {
                continue;
            }
            total += item.metadata().await?.len();
        }
        Ok(total)
    }
}

fn backend(err: std::io::Error) -> MediumError {
    MediumError::Backend(err.to_string())
}

#[async_trait]
impl DurableMedium for FileMedium {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, MediumError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(backend(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), MediumError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(key);

        let used = self.usage_excluding(&path).await.map_err(backend)?;
        if used + value.len() as u64 > self.quota_bytes {
            return Err(MediumError::QuotaExceeded);
        }

        // Write-then-rename keeps a crashed write from truncating the old value
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).await.map_err(backend)?;
        fs::rename(&tmp, &path).await.map_err(backend)
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), MediumError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(backend(e)),
        }
    }
}
