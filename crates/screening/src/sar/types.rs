//! SAR (Search-Assess-Refine) in-memory investigation data model (spec §3).
//! Owned exclusively by one SAR orchestrator task per screening; no other
//! task writes to a `KnowledgeBase`.

use crate::types::{CheckType, CompletionReason, InformationType, Severity};
use chrono::{DateTime, Utc};
use screening_core::TenantId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    Initial,
    Enriched,
    GapFill,
    Refinement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    Success,
    Failed,
    Timeout,
    RateLimited,
    NoProvider,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SarPhaseStep {
    Search,
    Assess,
    Refine,
}

/// A single atom of accumulated knowledge. Append-only within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub fact_type: String,
    pub value: serde_json::Value,
    pub source_provider: String,
    pub confidence: f64,
    pub iteration: u32,
    pub corroborated: bool,
}

/// `InformationType -> facts accumulated across iterations`. Owned by one
/// SAR orchestrator task per spec §5's shared-resource policy.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    facts: HashMap<InformationType, Vec<Fact>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fact(&mut self, info_type: InformationType, fact: Fact) {
        self.facts.entry(info_type).or_default().push(fact);
    }

    pub fn facts_for(&self, info_type: InformationType) -> &[Fact] {
        self.facts.get(&info_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_facts(&self) -> impl Iterator<Item = (&InformationType, &Fact)> {
        self.facts.iter().flat_map(|(t, facts)| facts.iter().map(move |f| (t, f)))
    }

    /// Distinct fact-type groups (`fact_type` strings) that have corroborating
    /// evidence from at least two distinct source providers.
    pub fn corroborated_group_fraction(&self, info_type: InformationType) -> f64 {
        let facts = self.facts_for(info_type);
        if facts.is_empty() {
            return 0.0;
        }
        let mut by_type: HashMap<&str, std::collections::HashSet<&str>> = HashMap::new();
        for fact in facts {
            by_type
                .entry(fact.fact_type.as_str())
                .or_default()
                .insert(fact.source_provider.as_str());
        }
        let corroborated = by_type.values().filter(|providers| providers.len() >= 2).count();
        corroborated as f64 / by_type.len() as f64
    }

    pub fn distinct_providers(&self, info_type: InformationType) -> usize {
        self.facts_for(info_type)
            .iter()
            .map(|f| f.source_provider.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub id: Uuid,
    pub info_type: InformationType,
    pub query_type: QueryType,
    pub provider_id: String,
    pub check_type: CheckType,
    pub params: serde_json::Value,
    pub priority: u8,
    pub parent_id: Option<Uuid>,
}

impl SearchQuery {
    pub fn initial(info_type: InformationType, provider_id: impl Into<String>, check_type: CheckType, params: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            info_type,
            query_type: QueryType::Initial,
            provider_id: provider_id.into(),
            check_type,
            params,
            priority: 5,
            parent_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub query_id: Uuid,
    pub status: QueryStatus,
    pub normalized_data: serde_json::Value,
    pub findings_count: usize,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub cache_hit: bool,
    pub error: Option<String>,
}

mod duration_millis {
    use serde::{Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InconsistencyKind {
    DateMinor,
    EmploymentGapHidden,
    CredentialInflation,
    AddressMismatch,
    NameVariant,
    TimelineImpossible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inconsistency {
    pub kind: InconsistencyKind,
    pub description: String,
    pub info_type: InformationType,
    pub severity_hint: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    pub info_type: InformationType,
    pub expected_fact_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredEntity {
    pub name: String,
    pub relation_hint: String,
    pub source_provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub category: String,
    pub sub_category: Option<String>,
    pub severity: Severity,
    pub confidence: f64,
    pub relevance_to_role: f64,
    pub summary: String,
    pub details: serde_json::Value,
    pub corroborated: bool,
    pub sources: Vec<String>,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarIterationState {
    pub iteration: u32,
    pub phase: SarPhaseStep,
    pub queries_executed: usize,
    pub new_facts: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarTypeState {
    pub info_type: InformationType,
    pub iterations: Vec<SarIterationState>,
    pub completion_reason: Option<CompletionReason>,
}

impl SarTypeState {
    pub fn new(info_type: InformationType) -> Self {
        Self { info_type, iterations: Vec::new(), completion_reason: None }
    }

    pub fn current_confidence(&self) -> f64 {
        self.iterations.last().map(|i| i.confidence).unwrap_or(0.0)
    }

    pub fn iteration_count(&self) -> u32 {
        self.iterations.len() as u32
    }
}

/// Expected fact counts per `InformationType` (spec §4.5), used by the
/// confidence scorer's completeness factor.
pub fn expected_facts_for(info_type: InformationType) -> usize {
    match info_type {
        InformationType::Identity => 5,
        InformationType::Employment => 3,
        InformationType::Education => 3,
        InformationType::Financial => 2,
        InformationType::DigitalFootprint => 2,
        InformationType::NetworkDepth2 => 2,
        InformationType::NetworkDepth3 => 3,
        InformationType::Licenses => 2,
        InformationType::Reconciliation => 5,
        _ => 1,
    }
}

pub fn is_foundation_type(info_type: InformationType) -> bool {
    matches!(info_type, InformationType::Identity | InformationType::Employment | InformationType::Education)
}

pub struct ExecutionSummary {
    pub success_rate: f64,
    pub cache_hits: usize,
    pub providers_used: Vec<String>,
    pub status_counts: HashMap<QueryStatus, usize>,
}

/// Tag carried by planner/executor output identifying the owning tenant,
/// mirrored from the ambient `RequestContext` rather than re-read from it on
/// every call inside the loop.
#[derive(Debug, Clone, Copy)]
pub struct SarRunTenant(pub Option<TenantId>);
