//! Error types for Scanmark cache operations.
//!
//! The cache layer has no fatal errors: read failures degrade to a cache
//! miss and write failures are logged and absorbed (the cache is a pure
//! optimization, never a correctness dependency). These types exist at the
//! storage-capability boundary, where failures are still concrete.

use thiserror::Error;

/// Persistence-capability errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Malformed stored data under {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Master error type for Scanmark operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for Scanmark operations.
pub type ScanmarkResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
