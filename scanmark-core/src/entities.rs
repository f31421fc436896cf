//! Cached entity records and the per-platform / multi-platform stores.

use crate::schema::EntitySchema;
use crate::{PlatformId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// RECORDS
// ============================================================================

/// The atomic cached unit: one catalog entity, already normalized from the
/// platform's wire shape by the sync layer. The cache never sees raw
/// per-source field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Stable identifier, unique within its type partition on one platform.
    pub id: String,
    /// Display name. Never empty.
    pub name: String,
    /// Alternate names, in catalog order. May be empty.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Platform-external identifier (e.g. an ATT&CK technique id). Only
    /// populated for types that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Denormalized back-reference to the owning platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<PlatformId>,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aliases: Vec::new(),
            external_id: None,
            platform_id: None,
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// Wire shape for a single incremental upsert from the sync layer. The type
/// arrives as the platform's raw tag; the cache manager resolves it against
/// the family schema and drops records whose tag is outside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Raw entity-type tag as the platform emitted it.
    pub type_tag: String,
}

impl NewEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aliases: Vec::new(),
            external_id: None,
            type_tag: type_tag.into(),
        }
    }

    /// Convert into a stored record owned by `platform_id`.
    pub fn into_record(self, platform_id: &str) -> EntityRecord {
        EntityRecord {
            id: self.id,
            name: self.name,
            aliases: self.aliases,
            external_id: self.external_id,
            platform_id: Some(platform_id.to_string()),
        }
    }
}

// ============================================================================
// PER-PLATFORM CACHE
// ============================================================================

/// One platform's full catalog snapshot.
///
/// Holds one type partition per schema type from construction; partitions
/// are never absent, only empty. Invariant: `created_at <= last_refreshed_at`.
/// Mutators preserve it by clamping in [`Self::touch_refreshed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PlatformCache<S: EntitySchema> {
    pub platform_id: PlatformId,
    /// Set once, at creation. Drives hard expiry.
    pub created_at: Timestamp,
    /// Bumped on every successful bulk write. Drives soft refresh.
    pub last_refreshed_at: Timestamp,
    /// One partition per schema type.
    pub entities: BTreeMap<S, Vec<EntityRecord>>,
}

impl<S: EntitySchema> PlatformCache<S> {
    /// Create an empty snapshot with every partition present.
    pub fn new(platform_id: impl Into<PlatformId>) -> Self {
        Self::new_at(platform_id, Utc::now())
    }

    /// Create an empty snapshot with explicit timestamps (tests and
    /// deserialization paths).
    pub fn new_at(platform_id: impl Into<PlatformId>, now: Timestamp) -> Self {
        let entities = S::all().iter().map(|t| (*t, Vec::new())).collect();
        Self {
            platform_id: platform_id.into(),
            created_at: now,
            last_refreshed_at: now,
            entities,
        }
    }

    /// The partition for `kind`. Always present for schema types.
    pub fn partition(&self, kind: S) -> &[EntityRecord] {
        self.entities.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable partition access, restoring a missing partition if a
    /// malformed stored payload dropped it.
    pub fn partition_mut(&mut self, kind: S) -> &mut Vec<EntityRecord> {
        self.entities.entry(kind).or_default()
    }

    /// Record a successful bulk write, keeping `created_at <= last_refreshed_at`.
    pub fn touch_refreshed(&mut self, now: Timestamp) {
        self.last_refreshed_at = now.max(self.created_at);
    }

    /// Total records across all partitions.
    pub fn total_entities(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    /// Per-type record counts, including empty partitions.
    pub fn counts_by_type(&self) -> BTreeMap<S, usize> {
        self.entities.iter().map(|(t, v)| (*t, v.len())).collect()
    }
}

// ============================================================================
// MULTI-PLATFORM STORE
// ============================================================================

/// The top-level persisted structure for one family: platform id to snapshot.
///
/// Replaced wholesale on every persisted write. A `BTreeMap` keeps tenant
/// iteration deterministic, which the legacy first-tenant accessor and the
/// index builder's collision order both rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MultiPlatformStore<S: EntitySchema> {
    #[serde(default = "BTreeMap::new")]
    pub platforms: BTreeMap<PlatformId, PlatformCache<S>>,
}

impl<S: EntitySchema> Default for MultiPlatformStore<S> {
    fn default() -> Self {
        Self {
            platforms: BTreeMap::new(),
        }
    }
}

impl<S: EntitySchema> MultiPlatformStore<S> {
    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// The deterministic first tenant, for legacy single-platform call sites.
    pub fn first(&self) -> Option<&PlatformCache<S>> {
        self.platforms.values().next()
    }

    /// Get-or-create the snapshot for `platform_id`.
    pub fn entry(&mut self, platform_id: &str) -> &mut PlatformCache<S> {
        self.platforms
            .entry(platform_id.to_string())
            .or_insert_with(|| PlatformCache::new(platform_id))
    }
}

// =============================================================================
// TESTS
// =============================================================================
