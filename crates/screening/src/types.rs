//! Domain types shared across entity resolution, compliance, routing, the
//! SAR loop, risk pipeline, orchestrator, and monitoring. `CheckType` itself
//! (the fourteen information types) lives in `screening_core` since it is
//! also carried on the ambient `RequestContext`.
use serde::{Deserialize, Serialize};

pub use screening_core::CheckType;
pub use screening_core::CheckType as InformationType;

/// Whether a datum was purchased from an external provider (and therefore
/// safe to share across tenants) or supplied by/about a specific tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataOrigin {
    PaidExternal,
    CustomerProvided,
}

/// STANDARD uses CORE providers only; ENHANCED uses CORE + PREMIUM and
/// unlocks Enhanced-only checks, D3 search, and lower match thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceTier {
    Standard,
    Enhanced,
}

/// How far the investigation reaches into the subject's network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchDegree {
    D1,
    D2,
    D3,
}

/// Drives the Role-Relevance Matrix (risk pipeline) and default vigilance
/// level assignment (monitoring).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleCategory {
    Standard,
    Contractor,
    Government,
    Security,
    Executive,
    Financial,
    Healthcare,
    Education,
    Transportation,
}

/// Ongoing monitoring cadence. V0 means no recurring checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VigilanceLevel {
    V0,
    V1,
    V2,
    V3,
}

impl VigilanceLevel {
    /// Re-check interval in days; `None` for V0 (one-shot only).
    pub fn interval_days(self) -> Option<i64> {
        match self {
            VigilanceLevel::V0 => None,
            VigilanceLevel::V1 => Some(365),
            VigilanceLevel::V2 => Some(30),
            VigilanceLevel::V3 => Some(15),
        }
    }
}

/// Why a SAR type (or an entire screening) stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionReason {
    ConfidenceMet,
    MaxIterations,
    DiminishingReturns,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn bump(self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }

    pub fn base_score(self) -> f64 {
        match self {
            Severity::Low => 10.0,
            Severity::Medium => 25.0,
            Severity::High => 50.0,
            Severity::Critical => 75.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score > 75.0 {
            RiskLevel::Critical
        } else if score > 50.0 {
            RiskLevel::High
        } else if score > 25.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Proceed,
    ProceedWithCaution,
    ReviewRequired,
    DoNotProceed,
}

impl Recommendation {
    pub fn from_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Recommendation::Proceed,
            RiskLevel::Moderate => Recommendation::ProceedWithCaution,
            RiskLevel::High => Recommendation::ReviewRequired,
            RiskLevel::Critical => Recommendation::DoNotProceed,
        }
    }
}
