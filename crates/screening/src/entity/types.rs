use crate::types::DataOrigin;
use chrono::{DateTime, Utc};
use screening_core::TenantId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Person,
    Organization,
    Address,
}

/// Identifier kinds attached to an entity. `canonical_identifiers` on
/// `Entity` also carries pseudo-identifiers (`FULL_NAME`, `DOB`, `ADDRESS`)
/// used for fuzzy matching alongside the exact-match kinds below.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierKind {
    Ssn,
    Ein,
    Passport,
    DriversLicense,
    NationalId,
    FullName,
    Dob,
    Address,
    Other(String),
}

impl IdentifierKind {
    /// Exact-match identifiers trigger dedup-on-write and cross-entity
    /// merge (spec §4.2); pseudo-identifiers only feed fuzzy scoring.
    pub fn is_exact_match_kind(&self) -> bool {
        matches!(
            self,
            IdentifierKind::Ssn
                | IdentifierKind::Ein
                | IdentifierKind::Passport
                | IdentifierKind::DriversLicense
                | IdentifierKind::NationalId
        )
    }
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierKind::Other(s) => write!(f, "OTHER_{}", s.to_uppercase()),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Canonical person/organization/address record. `canonical_identifiers`
/// values are encrypted at rest by the repository (`EncryptionService`);
/// in memory they are plaintext so matching logic can read them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub tenant_id: Option<TenantId>,
    pub data_origin: DataOrigin,
    pub canonical_identifiers: HashMap<IdentifierKind, String>,
    /// Set when this entity lost a merge; readers should follow to the
    /// surviving entity instead.
    pub superseded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(entity_type: EntityType, tenant_id: Option<TenantId>, data_origin: DataOrigin) -> Self {
        debug_assert!(
            !(data_origin == DataOrigin::CustomerProvided && tenant_id.is_none()),
            "customer-provided entities must carry a tenant_id"
        );
        Self {
            id: Uuid::now_v7(),
            entity_type,
            tenant_id,
            data_origin,
            canonical_identifiers: HashMap::new(),
            superseded_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_identifier(mut self, kind: IdentifierKind, value: impl Into<String>) -> Self {
        self.canonical_identifiers.insert(kind, value.into());
        self
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }
}

/// Append-only fact attached to an entity. Never mutated: a superseding
/// value is added as a new `Identifier` with `superseded = false` and the
/// old row is flagged `superseded = true` by the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    pub entity_id: Uuid,
    pub kind: IdentifierKind,
    pub value: String,
    pub confidence: f64,
    pub source: String,
    pub discovered_at: DateTime<Utc>,
    pub superseded: bool,
}

impl Identifier {
    pub fn new(entity_id: Uuid, kind: IdentifierKind, value: impl Into<String>, source: impl Into<String>, confidence: f64) -> Self {
        Self {
            entity_id,
            kind,
            value: value.into(),
            confidence,
            source: source.into(),
            discovered_at: Utc::now(),
            superseded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Ownership,
    Financial,
    Business,
    Political,
    Family,
    Legal,
    Employment,
    Social,
    Educational,
}

/// Directed edge; the connection analyzer (risk pipeline) walks the graph
/// in both directions for neighbor discovery regardless of edge direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRelation {
    pub from_id: Uuid,
    pub to_id: Uuid,
    pub relation_type: RelationType,
    pub confidence: f64,
    pub current: bool,
    pub discovered_at: DateTime<Utc>,
}

/// Point-in-time versioned snapshot. Only the monitoring scheduler and the
/// screening orchestrator create new versions; versions are monotone per
/// entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityProfile {
    pub entity_id: Uuid,
    pub version: i64,
    pub trigger: String,
    pub findings_blob: serde_json::Value,
    pub risk_score: f64,
    pub created_at: DateTime<Utc>,
}
