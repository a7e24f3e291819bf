//! Compares two successive `EntityProfile` snapshots for the same entity to
//! find what a recheck actually turned up -- a risk-score swing and any
//! finding categories present now that weren't present before. Profiles
//! only carry a compact `findings_blob` (category/severity counts, not the
//! full finding objects -- see `ScreeningOrchestrator::run`'s
//! `ReportGeneration` phase), so the diff works at that granularity.

use crate::entity::types::EntityProfile;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ProfileDelta {
    pub entity_id: uuid::Uuid,
    pub risk_score_before: f64,
    pub risk_score_after: f64,
    pub risk_delta: f64,
    pub new_finding_categories: Vec<String>,
    pub resolved_finding_categories: Vec<String>,
}

impl ProfileDelta {
    pub fn has_material_change(&self) -> bool {
        !self.new_finding_categories.is_empty() || self.risk_delta.abs() >= 1.0
    }
}

pub struct DeltaDetector;

impl DeltaDetector {
    pub fn diff(previous: &EntityProfile, current: &EntityProfile) -> ProfileDelta {
        let before = categories_of(previous);
        let after = categories_of(current);

        let new_finding_categories: Vec<String> = after.difference(&before).cloned().collect();
        let resolved_finding_categories: Vec<String> = before.difference(&after).cloned().collect();

        ProfileDelta {
            entity_id: current.entity_id,
            risk_score_before: previous.risk_score,
            risk_score_after: current.risk_score,
            risk_delta: current.risk_score - previous.risk_score,
            new_finding_categories,
            resolved_finding_categories,
        }
    }
}

fn categories_of(profile: &EntityProfile) -> HashSet<String> {
    profile
        .findings_blob
        .get("categories")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn profile(risk_score: f64, categories: &[&str]) -> EntityProfile {
        EntityProfile {
            entity_id: Uuid::now_v7(),
            version: 1,
            trigger: "screening".to_string(),
            findings_blob: json!({ "categories": categories }),
            risk_score,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn new_category_is_reported() {
        let previous = profile(10.0, &["FINANCIAL"]);
        let current = profile(15.0, &["FINANCIAL", "CRIMINAL"]);
        let delta = DeltaDetector::diff(&previous, &current);

        assert_eq!(delta.new_finding_categories, vec!["CRIMINAL".to_string()]);
        assert!(delta.resolved_finding_categories.is_empty());
        assert!(delta.has_material_change());
    }

    #[test]
    fn identical_profiles_have_no_material_change() {
        let previous = profile(20.0, &["FINANCIAL"]);
        let mut current = profile(20.3, &["FINANCIAL"]);
        current.entity_id = previous.entity_id;
        let delta = DeltaDetector::diff(&previous, &current);

        assert!(!delta.has_material_change());
    }
}
