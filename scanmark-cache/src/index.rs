//! Case-insensitive name index derived from a family store.
//!
//! The scanning layer matches page text against this index offline, so it
//! must be cheap to probe and conservative about what it registers: keys
//! shorter than four characters and generic dictionary-ish aliases would
//! match arbitrary page substrings and are filtered out at build time.
//!
//! On key collision the later-registered record wins. Build order is
//! deterministic (tenants and partitions iterate in `BTreeMap` order,
//! records in partition order), so the winner is stable across rebuilds of
//! the same store. Cross-platform duplicate names stay independent entries
//! and simply collide under this rule.

use once_cell::sync::Lazy;
use scanmark_core::{EntityRecord, EntitySchema, MultiPlatformStore, PlatformId};
use std::collections::{HashMap, HashSet};

/// Keys shorter than this never enter the index (2-3 letter acronyms match
/// everywhere).
pub const MIN_KEY_LEN: usize = 4;

/// Generic words that are common false-positive aliases.
static GENERIC_TERMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "test", "tests", "demo", "example", "sample", "unknown", "admin", "user",
        "default", "generic", "internal", "other", "none", "data", "windows",
        "linux", "update", "system",
    ]
    .into_iter()
    .collect()
});

/// One resolvable index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry<S: EntitySchema> {
    /// Tenant the record came from.
    pub platform_id: PlatformId,
    /// The record's type within the family schema.
    pub kind: S,
    /// The full cached record.
    pub record: EntityRecord,
    /// The alias or external id that produced this key; `None` when the key
    /// is the record's display name.
    pub matched_alias: Option<String>,
}

/// Lowercase string to record lookup across every tenant of one family.
#[derive(Debug, Clone)]
pub struct NameIndex<S: EntitySchema> {
    entries: HashMap<String, IndexEntry<S>>,
}

impl<S: EntitySchema> NameIndex<S> {
    /// Derive the index from a family store.
    pub fn build(store: &MultiPlatformStore<S>) -> Self {
        let mut index = Self {
            entries: HashMap::new(),
        };
        for (platform_id, cache) in &store.platforms {
            for (kind, records) in &cache.entities {
                for record in records {
                    index.register(platform_id, *kind, record, &record.name, None);
                    for alias in &record.aliases {
                        index.register(platform_id, *kind, record, alias, Some(alias.clone()));
                    }
                    if kind.carries_external_id() {
                        if let Some(external_id) = &record.external_id {
                            index.register(
                                platform_id,
                                *kind,
                                record,
                                external_id,
                                Some(external_id.clone()),
                            );
                        }
                    }
                }
            }
        }
        index
    }

    fn register(
        &mut self,
        platform_id: &str,
        kind: S,
        record: &EntityRecord,
        key: &str,
        matched_alias: Option<String>,
    ) {
        let key = key.trim().to_lowercase();
        if key.chars().count() < MIN_KEY_LEN || GENERIC_TERMS.contains(key.as_str()) {
            return;
        }
        self.entries.insert(
            key,
            IndexEntry {
                platform_id: platform_id.to_string(),
                kind,
                record: record.clone(),
                matched_alias,
            },
        );
    }

    /// Resolve a candidate string from page text. Case-insensitive.
    pub fn lookup(&self, candidate: &str) -> Option<&IndexEntry<S>> {
        self.entries.get(&candidate.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every registered key, for diagnostics.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

// =============================================================================
// TESTS
// =============================================================================
