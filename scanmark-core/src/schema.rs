//! Catalog families and their closed entity-type enumerations.
//!
//! Two catalog families exist with identical cache mechanics but different
//! type taxonomies. The cache manager is generic over [`EntitySchema`] so
//! both families share one implementation.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

// ============================================================================
// FAMILIES
// ============================================================================

/// Discriminator for the two cache families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogFamily {
    /// Threat-intelligence catalog (threat actors, malware, ATT&CK, ...).
    Octi,
    /// Adversary-emulation catalog (assets, teams, findings, ...).
    Oaev,
}

impl CatalogFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Octi => "octi",
            Self::Oaev => "oaev",
        }
    }
}

impl fmt::Display for CatalogFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SCHEMA TRAIT
// ============================================================================

/// A closed enumeration of entity types for one catalog family.
///
/// The bounds make schema types usable as `BTreeMap` keys in the persisted
/// store (JSON object keys via the unit-variant serde representation) and
/// freely copyable across the cache layer.
pub trait EntitySchema:
    Copy
    + Clone
    + fmt::Debug
    + PartialEq
    + Eq
    + PartialOrd
    + Ord
    + Hash
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The family this schema belongs to.
    const FAMILY: CatalogFamily;

    /// Every type in the schema, in declaration order.
    fn all() -> &'static [Self];

    /// Wire tag for this type, as the platform emits it.
    fn as_str(&self) -> &'static str;

    /// Resolve a wire tag. `None` when the tag is outside the schema.
    fn from_tag(tag: &str) -> Option<Self>;

    /// Whether records of this type carry a platform-external identifier
    /// (e.g. an ATT&CK technique id) worth indexing alongside the name.
    fn carries_external_id(&self) -> bool;
}

// ============================================================================
// OCTI SCHEMA (threat intelligence)
// ============================================================================

/// Entity types in the threat-intelligence family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OctiEntityType {
    #[serde(rename = "Threat-Actor-Group")]
    ThreatActorGroup,
    #[serde(rename = "Threat-Actor-Individual")]
    ThreatActorIndividual,
    #[serde(rename = "Intrusion-Set")]
    IntrusionSet,
    Campaign,
    Incident,
    Malware,
    #[serde(rename = "Attack-Pattern")]
    AttackPattern,
    Sector,
    Organization,
    Individual,
    Event,
    Country,
    Region,
    City,
    #[serde(rename = "Administrative-Area")]
    AdministrativeArea,
    Position,
    Tool,
    Narrative,
    Channel,
    System,
}

impl OctiEntityType {
    const ALL: [Self; 20] = [
        Self::ThreatActorGroup,
        Self::ThreatActorIndividual,
        Self::IntrusionSet,
        Self::Campaign,
        Self::Incident,
        Self::Malware,
        Self::AttackPattern,
        Self::Sector,
        Self::Organization,
        Self::Individual,
        Self::Event,
        Self::Country,
        Self::Region,
        Self::City,
        Self::AdministrativeArea,
        Self::Position,
        Self::Tool,
        Self::Narrative,
        Self::Channel,
        Self::System,
    ];
}

impl EntitySchema for OctiEntityType {
    const FAMILY: CatalogFamily = CatalogFamily::Octi;

    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::ThreatActorGroup => "Threat-Actor-Group",
            Self::ThreatActorIndividual => "Threat-Actor-Individual",
            Self::IntrusionSet => "Intrusion-Set",
            Self::Campaign => "Campaign",
            Self::Incident => "Incident",
            Self::Malware => "Malware",
            Self::AttackPattern => "Attack-Pattern",
            Self::Sector => "Sector",
            Self::Organization => "Organization",
            Self::Individual => "Individual",
            Self::Event => "Event",
            Self::Country => "Country",
            Self::Region => "Region",
            Self::City => "City",
            Self::AdministrativeArea => "Administrative-Area",
            Self::Position => "Position",
            Self::Tool => "Tool",
            Self::Narrative => "Narrative",
            Self::Channel => "Channel",
            Self::System => "System",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == tag)
    }

    fn carries_external_id(&self) -> bool {
        matches!(self, Self::AttackPattern)
    }
}

impl fmt::Display for OctiEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// OAEV SCHEMA (adversary emulation)
// ============================================================================

/// Entity types in the adversary-emulation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OaevEntityType {
    Asset,
    AssetGroup,
    Team,
    Player,
    AttackPattern,
    Finding,
}

impl OaevEntityType {
    const ALL: [Self; 6] = [
        Self::Asset,
        Self::AssetGroup,
        Self::Team,
        Self::Player,
        Self::AttackPattern,
        Self::Finding,
    ];
}

impl EntitySchema for OaevEntityType {
    const FAMILY: CatalogFamily = CatalogFamily::Oaev;

    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "Asset",
            Self::AssetGroup => "AssetGroup",
            Self::Team => "Team",
            Self::Player => "Player",
            Self::AttackPattern => "AttackPattern",
            Self::Finding => "Finding",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == tag)
    }

    fn carries_external_id(&self) -> bool {
        matches!(self, Self::AttackPattern)
    }
}

impl fmt::Display for OaevEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TESTS
// =============================================================================
