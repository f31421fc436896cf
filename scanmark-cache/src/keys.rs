//! Persisted key layout.
//!
//! One storage entry per family holds that family's whole store; one entry
//! per scanned URL holds that page's scan results; one entry holds the
//! legacy flat name cache. Scan-result keys embed a reversible hex encoding
//! of the URL so eviction can enumerate them by prefix and diagnostics can
//! recover the URL without a side table.

use scanmark_core::CatalogFamily;

/// Storage key for the threat-intelligence family store.
pub const OCTI_STORE_KEY: &str = "octi_entity_cache_store";

/// Storage key for the adversary-emulation family store.
pub const OAEV_STORE_KEY: &str = "oaev_entity_cache_store";

/// Storage key for the legacy flat entity-name cache.
pub const LEGACY_NAME_CACHE_KEY: &str = "entity_name_cache";

/// Prefix for per-URL scan-result entries.
pub const SCAN_RESULT_PREFIX: &str = "scan_result_";

/// Storage key for a family's whole store.
pub fn store_key(family: CatalogFamily) -> &'static str {
    match family {
        CatalogFamily::Octi => OCTI_STORE_KEY,
        CatalogFamily::Oaev => OAEV_STORE_KEY,
    }
}

/// Storage key for one page's scan results.
pub fn scan_result_key(url: &str) -> String {
    format!("{SCAN_RESULT_PREFIX}{}", hex::encode(url))
}

/// Recover the URL from a scan-result key.
///
/// Returns `None` if the key lacks the prefix, the hex payload is invalid,
/// or the decoded bytes are not UTF-8.
pub fn scan_result_url(key: &str) -> Option<String> {
    let encoded = key.strip_prefix(SCAN_RESULT_PREFIX)?;
    let bytes = hex::decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

// =============================================================================
// TESTS
// =============================================================================
