//! Scanmark Storage - Persistence Capability
//!
//! Defines the key-value storage abstraction the cache layer is built on.
//! In the extension this is backed by the browser's local storage area; this
//! crate ships an in-memory implementation for tests, diagnostics harnesses,
//! and any embedding without a browser runtime.
//!
//! The capability is injected into the cache layer, never imported globally,
//! so every cache component is constructible without a live browser.

use async_trait::async_trait;
use scanmark_core::StorageError;
use serde::{Deserialize, Serialize};

pub mod memory;

pub use memory::MemoryArea;

/// Usage accounting reported by a storage area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub quota_bytes: u64,
}

/// Asynchronous key-value persistence capability.
///
/// Values are JSON documents, mirroring what browser extension storage
/// actually holds. Implementations must be safe to share across the
/// background writer and read-only consumer contexts.
#[async_trait]
pub trait StorageArea: Send + Sync {
    /// Read the value under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;

    /// Remove the value under `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently present, sorted.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Current usage accounting.
    async fn usage(&self) -> Result<StorageUsage, StorageError>;
}
