//! Scanmark Core - Entity Cache Data Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! The cache manager, index builder, and storage capability live in the
//! `scanmark-cache` and `scanmark-storage` crates.

use chrono::{DateTime, Utc};

pub mod entities;
pub mod error;
pub mod schema;

pub use entities::{EntityRecord, MultiPlatformStore, NewEntity, PlatformCache};
pub use error::{CacheError, ScanmarkResult, StorageError};
pub use schema::{CatalogFamily, EntitySchema, OaevEntityType, OctiEntityType};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Identifier of a configured platform connection (a tenant). Opaque,
/// assigned by the settings layer when a connection is added.
pub type PlatformId = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
