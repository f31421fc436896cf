//! Scanmark Cache - Multi-Platform Entity Cache
//!
//! Stores, refreshes, indexes, and evicts per-platform catalog snapshots so
//! page scanning can match text offline, without a network round-trip per
//! scan.
//!
//! # Design Philosophy
//!
//! The cache is a pure optimization, never a correctness dependency. Every
//! failure mode degrades toward a cache miss: unreadable or malformed stores
//! read as empty, failed writes are logged and repaired by the next
//! successful refresh, and unknown entity types are counted no-ops.
//!
//! # Tenant Isolation
//!
//! Each configured platform connection (tenant) owns one snapshot per
//! family. The two catalog families share one generic [`CacheManager`],
//! parameterized by their [`EntitySchema`]; their stores live under separate
//! storage keys and never mix.
//!
//! # Freshness
//!
//! Staleness is explicit and two-tier: a 1-hour hard TTL after which a
//! snapshot is unusable, and a 30-minute soft TTL after which it is served
//! while a background refresh is scheduled. See [`freshness`].
//!
//! # Example
//!
//! ```ignore
//! let storage = Arc::new(MemoryArea::new());
//! let octi: CacheManager<OctiEntityType, _> = CacheManager::new(Arc::clone(&storage));
//!
//! octi.replace_type_partition("p1", OctiEntityType::Malware, records).await;
//! if octi.should_refresh("p1").await {
//!     // schedule a background refresh, keep serving the snapshot
//! }
//! let index = octi.name_index().await;
//! if let Some(hit) = index.lookup("emotet") {
//!     // highlight it
//! }
//! ```

pub mod freshness;
pub mod index;
pub mod keys;
pub mod manager;
pub mod quota;
pub mod scan_results;

pub use index::{IndexEntry, NameIndex, MIN_KEY_LEN};
pub use manager::{CacheManager, FamilyStats, UpsertOutcome};
pub use quota::{QuotaMonitor, QuotaUsage, NEAR_QUOTA_THRESHOLD_PCT};
pub use scan_results::{
    LegacyNameCache, LegacyNameEntry, ScanResultCache, ScanResultEntry, LEGACY_NAME_TTL_SECS,
    SCAN_RESULT_TTL_SECS,
};

pub use scanmark_core::{
    CatalogFamily, EntityRecord, EntitySchema, MultiPlatformStore, NewEntity, OaevEntityType,
    OctiEntityType, PlatformCache, PlatformId, Timestamp,
};
