//! Two-tier freshness policy.
//!
//! A snapshot has two horizons: a hard TTL measured from `created_at`, past
//! which it is unusable and must be treated as absent, and a soft TTL
//! measured from `last_refreshed_at`, past which it is still served but a
//! background refresh should be scheduled (stale-while-revalidate).
//!
//! The predicates are pure functions of `(cache, now)` so callers and tests
//! own the clock. An expired snapshot always reports "should refresh", even
//! when an incremental refresh bumped `last_refreshed_at` on a snapshot past
//! its hard horizon.

use scanmark_core::{EntitySchema, PlatformCache, Timestamp};

/// Hard expiry horizon: past this, the snapshot is unusable.
pub const HARD_TTL_SECS: i64 = 60 * 60;

/// Soft refresh horizon: past this, serve the snapshot but schedule a refresh.
pub const SOFT_TTL_SECS: i64 = 30 * 60;

/// True if the snapshot is past its hard TTL at `now`.
pub fn is_expired_at<S: EntitySchema>(cache: &PlatformCache<S>, now: Timestamp) -> bool {
    (now - cache.created_at).num_seconds() > HARD_TTL_SECS
}

/// True if the snapshot is past its soft TTL at `now`. An expired snapshot
/// always needs a refresh.
pub fn should_refresh_at<S: EntitySchema>(cache: &PlatformCache<S>, now: Timestamp) -> bool {
    (now - cache.last_refreshed_at).num_seconds() > SOFT_TTL_SECS || is_expired_at(cache, now)
}

// =============================================================================
// TESTS
// =============================================================================
