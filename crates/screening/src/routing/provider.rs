//! Provider plug-in contract (spec §6). Concrete adapters (Sterling,
//! Checkr, OFAC, ...) are external collaborators; this crate only defines
//! the trait and the normalized result shape the rest of the routing layer
//! and the SAR Assessor consume.

use crate::types::{CheckType, ServiceTier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderCategory {
    Core,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One `(check_type, locale-set, cost_tier)` capability a provider declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapability {
    pub check_type: CheckType,
    pub locales: Vec<String>,
    pub cost_tier: CostTier,
    pub cost_per_call: f64,
}

impl ProviderCapability {
    pub fn covers_locale(&self, locale: &str) -> bool {
        self.locales.iter().any(|l| l == locale || l == "*")
    }
}

/// Static descriptor the registry selects against. Reliability is a
/// [0,1] score from historical success rate, used as the tiebreaker after
/// cost tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub category: ProviderCategory,
    pub capabilities: Vec<ProviderCapability>,
    pub reliability: f64,
}

impl ProviderDescriptor {
    pub fn capability_for(&self, check_type: CheckType, locale: &str) -> Option<&ProviderCapability> {
        self.capabilities
            .iter()
            .find(|c| c.check_type == check_type && c.covers_locale(locale))
    }

    pub fn permitted_for_tier(&self, tier: ServiceTier) -> bool {
        match tier {
            ServiceTier::Standard => self.category == ProviderCategory::Core,
            ServiceTier::Enhanced => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub error: Option<String>,
}

/// Normalized result returned by a provider adapter. `normalized_data` is
/// the sole input the SAR Assessor inspects; `raw_response` is encrypted at
/// rest by the cache and never parsed outside the originating adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider_id: String,
    pub check_type: CheckType,
    pub locale: String,
    pub success: bool,
    pub normalized_data: serde_json::Value,
    pub raw_response: Option<serde_json::Value>,
    pub cost_incurred: f64,
    pub duration: Duration,
}

/// Extra, query-specific parameters the Planner derived from the subject or
/// from accumulated knowledge-base facts (e.g. counties, known aliases).
pub type ProviderExtras = serde_json::Value;

#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &str;

    async fn execute_check(
        &self,
        check_type: CheckType,
        subject: &serde_json::Value,
        locale: &str,
        extras: &ProviderExtras,
    ) -> screening_core::error::Result<ProviderResult>;

    async fn health_check(&self) -> ProviderHealth;
}
