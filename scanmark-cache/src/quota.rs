//! Storage quota monitoring and the derived-data eviction path.
//!
//! Everything under the cache subsystem's keys is reconstructible from the
//! external platforms, so the near-quota response is to clear all of it.
//! Platform connection settings are not ours and are never touched.

use crate::keys;
use scanmark_storage::StorageArea;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Usage above this percentage flags a near-quota condition.
pub const NEAR_QUOTA_THRESHOLD_PCT: f64 = 90.0;

/// Usage report for diagnostics and the options UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub used_bytes: u64,
    pub quota_bytes: u64,
    pub percentage: f64,
}

/// Reports storage usage and drives the clear-everything-derived eviction.
pub struct QuotaMonitor<A: StorageArea> {
    storage: Arc<A>,
}

impl<A: StorageArea> QuotaMonitor<A> {
    pub fn new(storage: Arc<A>) -> Self {
        Self { storage }
    }

    /// Current usage. Errors degrade to a zero report rather than failing.
    pub async fn usage(&self) -> QuotaUsage {
        match self.storage.usage().await {
            Ok(usage) => {
                let percentage = if usage.quota_bytes == 0 {
                    0.0
                } else {
                    usage.used_bytes as f64 / usage.quota_bytes as f64 * 100.0
                };
                QuotaUsage {
                    used_bytes: usage.used_bytes,
                    quota_bytes: usage.quota_bytes,
                    percentage,
                }
            }
            Err(e) => {
                warn!(error = %e, "usage query failed, reporting zero");
                QuotaUsage::default()
            }
        }
    }

    /// True when usage is at or past the near-quota threshold.
    pub async fn is_near_quota(&self) -> bool {
        self.usage().await.percentage >= NEAR_QUOTA_THRESHOLD_PCT
    }

    /// Remove every derived, reconstructible entry: both family stores, the
    /// legacy name cache, and all scan results. Returns how many entries
    /// were removed. Idempotent. Never touches settings.
    pub async fn clear_all_derived_caches(&self) -> usize {
        let all_keys = match self.storage.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "key enumeration failed, nothing cleared");
                return 0;
            }
        };

        let mut removed = 0;
        for key in all_keys.iter().filter(|k| is_derived_key(k)) {
            match self.storage.remove(key).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(key, error = %e, "derived cache removal failed"),
            }
        }
        removed
    }
}

/// Whether `key` belongs to the cache subsystem (and is safe to evict).
fn is_derived_key(key: &str) -> bool {
    key == keys::OCTI_STORE_KEY
        || key == keys::OAEV_STORE_KEY
        || key == keys::LEGACY_NAME_CACHE_KEY
        || key.starts_with(keys::SCAN_RESULT_PREFIX)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use scanmark_storage::MemoryArea;
    use serde_json::json;

    #[tokio::test]
    async fn test_usage_reports_percentage() {
        let storage = Arc::new(MemoryArea::new());
        storage.set_quota(1000);
        storage.set("k", json!("0123456789012345678901234567890123456789")).await.unwrap();

        let monitor = QuotaMonitor::new(Arc::clone(&storage));
        let usage = monitor.usage().await;
        assert!(usage.used_bytes > 0);
        assert_eq!(usage.quota_bytes, 1000);
        assert!((usage.percentage - usage.used_bytes as f64 / 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_usage_errors_degrade_to_zero() {
        let storage = Arc::new(MemoryArea::new());
        storage.fail_all(true);
        let monitor = QuotaMonitor::new(Arc::clone(&storage));
        let usage = monitor.usage().await;
        assert_eq!(usage.used_bytes, 0);
        assert_eq!(usage.percentage, 0.0);
        assert!(!monitor.is_near_quota().await);
    }

    #[tokio::test]
    async fn test_near_quota_threshold() {
        let storage = Arc::new(MemoryArea::new());
        let monitor = QuotaMonitor::new(Arc::clone(&storage));

        // ~10%: not near quota.
        storage.set("k", json!("x".repeat(97))).await.unwrap();
        storage.set_quota(1000);
        assert!(!monitor.is_near_quota().await);

        // >=90%: near quota.
        storage.set_quota(100);
        assert!(monitor.is_near_quota().await);
    }

    #[tokio::test]
    async fn test_clear_all_derived_caches_spares_settings() {
        let storage = Arc::new(MemoryArea::new());
        storage.set(keys::OCTI_STORE_KEY, json!({"platforms": {}})).await.unwrap();
        storage.set(keys::OAEV_STORE_KEY, json!({"platforms": {}})).await.unwrap();
        storage.set(keys::LEGACY_NAME_CACHE_KEY, json!({"names": []})).await.unwrap();
        storage
            .set(&keys::scan_result_key("https://example.org"), json!({}))
            .await
            .unwrap();
        storage
            .set("platform_connections", json!([{"id": "p1"}]))
            .await
            .unwrap();

        let monitor = QuotaMonitor::new(Arc::clone(&storage));
        let removed = monitor.clear_all_derived_caches().await;
        assert_eq!(removed, 4);
        assert_eq!(storage.keys().await.unwrap(), vec!["platform_connections"]);

        // Idempotent: a second sweep finds nothing.
        assert_eq!(monitor.clear_all_derived_caches().await, 0);
    }
}
