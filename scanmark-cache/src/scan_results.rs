//! Ancillary caches: per-page scan results and the legacy flat name list.
//!
//! Both are independent of the multi-platform store and much shorter-lived.
//! Expiry is enforced on read: a stale or malformed entry is removed from
//! storage and reported as absent. Failures degrade to a miss like
//! everywhere else in this subsystem.

use crate::keys;
use chrono::Utc;
use scanmark_core::Timestamp;
use scanmark_storage::StorageArea;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Scan results are only reused within the same browsing session of a page.
pub const SCAN_RESULT_TTL_SECS: i64 = 5 * 60;

/// The legacy flat name list tolerates the same staleness as a full snapshot.
pub const LEGACY_NAME_TTL_SECS: i64 = 60 * 60;

/// One page's scan results. `results` is opaque to the cache: the
/// observables, entities, and CVEs the scanner found, in its own shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResultEntry {
    pub url: String,
    pub timestamp: Timestamp,
    pub results: serde_json::Value,
}

/// Per-URL scan-result cache. One entry per URL, most recent write wins.
pub struct ScanResultCache<A: StorageArea> {
    storage: Arc<A>,
}

impl<A: StorageArea> ScanResultCache<A> {
    pub fn new(storage: Arc<A>) -> Self {
        Self { storage }
    }

    /// Cache `results` for `url` at the current time.
    pub async fn put(&self, url: &str, results: serde_json::Value) {
        let entry = ScanResultEntry {
            url: url.to_string(),
            timestamp: Utc::now(),
            results,
        };
        let key = keys::scan_result_key(url);
        match serde_json::to_value(&entry) {
            Ok(value) => {
                if let Err(e) = self.storage.set(&key, value).await {
                    warn!(url, error = %e, "scan result write failed, dropped");
                }
            }
            Err(e) => warn!(url, error = %e, "scan result serialization failed, dropped"),
        }
    }

    /// The cached entry for `url`, if younger than the TTL.
    pub async fn get(&self, url: &str) -> Option<ScanResultEntry> {
        self.get_as_of(url, Utc::now()).await
    }

    /// Clock-injected form of [`Self::get`]. Evicts the entry when it is
    /// past the TTL or unreadable.
    pub async fn get_as_of(&self, url: &str, now: Timestamp) -> Option<ScanResultEntry> {
        let key = keys::scan_result_key(url);
        let value = match self.storage.get(&key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(url, error = %e, "scan result read failed, treating as miss");
                return None;
            }
        };
        let entry: ScanResultEntry = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(url, error = %e, "malformed scan result, evicting");
                self.evict(&key, url).await;
                return None;
            }
        };
        if (now - entry.timestamp).num_seconds() > SCAN_RESULT_TTL_SECS {
            self.evict(&key, url).await;
            return None;
        }
        Some(entry)
    }

    async fn evict(&self, key: &str, url: &str) {
        if let Err(e) = self.storage.remove(key).await {
            warn!(url, error = %e, "scan result eviction failed");
        }
    }
}

/// The single-entry legacy flat name cache, superseded by the multi-platform
/// store but kept for backward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyNameEntry {
    pub timestamp: Timestamp,
    pub names: Vec<String>,
}

pub struct LegacyNameCache<A: StorageArea> {
    storage: Arc<A>,
}

impl<A: StorageArea> LegacyNameCache<A> {
    pub fn new(storage: Arc<A>) -> Self {
        Self { storage }
    }

    pub async fn put(&self, names: Vec<String>) {
        let entry = LegacyNameEntry {
            timestamp: Utc::now(),
            names,
        };
        match serde_json::to_value(&entry) {
            Ok(value) => {
                if let Err(e) = self.storage.set(keys::LEGACY_NAME_CACHE_KEY, value).await {
                    warn!(error = %e, "legacy name cache write failed, dropped");
                }
            }
            Err(e) => warn!(error = %e, "legacy name cache serialization failed, dropped"),
        }
    }

    pub async fn get(&self) -> Option<Vec<String>> {
        self.get_as_of(Utc::now()).await
    }

    pub async fn get_as_of(&self, now: Timestamp) -> Option<Vec<String>> {
        let value = match self.storage.get(keys::LEGACY_NAME_CACHE_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "legacy name cache read failed, treating as miss");
                return None;
            }
        };
        let entry: LegacyNameEntry = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "malformed legacy name cache, evicting");
                let _ = self.storage.remove(keys::LEGACY_NAME_CACHE_KEY).await;
                return None;
            }
        };
        if (now - entry.timestamp).num_seconds() > LEGACY_NAME_TTL_SECS {
            let _ = self.storage.remove(keys::LEGACY_NAME_CACHE_KEY).await;
            return None;
        }
        Some(entry.names)
    }
}

// =============================================================================
// TESTS
// =============================================================================
