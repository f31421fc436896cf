//! In-memory storage area.
//!
//! Backs tests and browserless harnesses. Carries the hooks the cache
//! test-suite needs: a write counter (to observe no-op fast paths), failure
//! injection (to exercise the degrade-to-miss contract), and a quota
//! override (to exercise near-quota eviction).

use crate::{StorageArea, StorageUsage};
use async_trait::async_trait;
use scanmark_core::StorageError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

/// Default quota matching a browser local storage area (10 MiB).
pub const DEFAULT_QUOTA_BYTES: u64 = 10 * 1024 * 1024;

/// In-memory [`StorageArea`] implementation.
#[derive(Debug, Default)]
pub struct MemoryArea {
    entries: RwLock<BTreeMap<String, serde_json::Value>>,
    writes: AtomicU64,
    failing: AtomicBool,
    quota_override: AtomicU64,
}

impl MemoryArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating operations (`set`/`remove`) attempted so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every operation fail with [`StorageError::Unavailable`] until
    /// reset. Models a torn-down extension context.
    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Override the reported quota. Zero means the 10 MiB default.
    pub fn set_quota(&self, quota_bytes: u64) {
        self.quota_override.store(quota_bytes, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "storage area offline".to_string(),
            });
        }
        Ok(())
    }

    fn read_entries(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, serde_json::Value>>, StorageError>
    {
        self.entries.read().map_err(|_| StorageError::Unavailable {
            reason: "storage lock poisoned".to_string(),
        })
    }

    fn write_entries(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, serde_json::Value>>, StorageError>
    {
        self.entries.write().map_err(|_| StorageError::Unavailable {
            reason: "storage lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl StorageArea for MemoryArea {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        self.check_available()?;
        Ok(self.read_entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.write_entries()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.write_entries()?.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check_available()?;
        Ok(self.read_entries()?.keys().cloned().collect())
    }

    async fn usage(&self) -> Result<StorageUsage, StorageError> {
        self.check_available()?;
        let used_bytes: u64 = {
            let entries = self.read_entries()?;
            entries
                .iter()
                .map(|(k, v)| (k.len() + v.to_string().len()) as u64)
                .sum()
        };
        let quota = match self.quota_override.load(Ordering::SeqCst) {
            0 => DEFAULT_QUOTA_BYTES,
            q => q,
        };
        Ok(StorageUsage {
            used_bytes,
            quota_bytes: quota,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
