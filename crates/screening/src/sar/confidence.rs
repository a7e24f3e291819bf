//! Composite confidence scorer (spec §4.5): five weighted factors, with
//! Foundation types using a higher threshold and contributing 1.5x weight
//! to the aggregate confidence across types.

use super::types::{expected_facts_for, is_foundation_type, ExecutionSummary, KnowledgeBase};
use crate::types::InformationType;

const COMPLETENESS_WEIGHT: f64 = 0.30;
const CORROBORATION_WEIGHT: f64 = 0.25;
const QUERY_SUCCESS_WEIGHT: f64 = 0.20;
const FACT_CONFIDENCE_WEIGHT: f64 = 0.15;
const SOURCE_DIVERSITY_WEIGHT: f64 = 0.10;

const FOUNDATION_TYPE_WEIGHT: f64 = 1.5;

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceFactors {
    pub completeness: f64,
    pub corroboration: f64,
    pub query_success: f64,
    pub fact_confidence: f64,
    pub source_diversity: f64,
}

impl ConfidenceFactors {
    pub fn composite(&self) -> f64 {
        self.completeness * COMPLETENESS_WEIGHT
            + self.corroboration * CORROBORATION_WEIGHT
            + self.query_success * QUERY_SUCCESS_WEIGHT
            + self.fact_confidence * FACT_CONFIDENCE_WEIGHT
            + self.source_diversity * SOURCE_DIVERSITY_WEIGHT
    }
}

pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// `threshold + 0.05` for Foundation types (Identity, Employment,
    /// Education); the base threshold otherwise.
    pub fn threshold_for(info_type: InformationType, base_threshold: f64) -> f64 {
        if is_foundation_type(info_type) {
            base_threshold + 0.05
        } else {
            base_threshold
        }
    }

    /// Type weight used when aggregating confidence across all types into
    /// a single screening-level number.
    pub fn type_weight(info_type: InformationType) -> f64 {
        if is_foundation_type(info_type) {
            FOUNDATION_TYPE_WEIGHT
        } else {
            1.0
        }
    }

    pub fn score(info_type: InformationType, kb: &KnowledgeBase, summary: &ExecutionSummary) -> ConfidenceFactors {
        let facts = kb.facts_for(info_type);
        let expected = expected_facts_for(info_type) as f64;

        let completeness = (facts.len() as f64 / expected).min(1.0);
        let corroboration = kb.corroborated_group_fraction(info_type);
        let query_success = summary.success_rate;
        let fact_confidence = if facts.is_empty() {
            0.0
        } else {
            facts.iter().map(|f| f.confidence).sum::<f64>() / facts.len() as f64
        };
        let source_diversity = (kb.distinct_providers(info_type) as f64 / 3.0).min(1.0);

        ConfidenceFactors { completeness, corroboration, query_success, fact_confidence, source_diversity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sar::types::{Fact, QueryStatus};
    use std::collections::HashMap;

    fn summary(success_rate: f64) -> ExecutionSummary {
        ExecutionSummary { success_rate, cache_hits: 0, providers_used: Vec::new(), status_counts: HashMap::new() }
    }

    #[test]
    fn empty_knowledge_base_scores_zero_completeness_and_fact_confidence() {
        let kb = KnowledgeBase::new();
        let factors = ConfidenceScorer::score(InformationType::Criminal, &kb, &summary(0.0));
        assert_eq!(factors.completeness, 0.0);
        assert_eq!(factors.fact_confidence, 0.0);
        assert_eq!(factors.composite(), 0.0);
    }

    #[test]
    fn foundation_type_uses_raised_threshold() {
        assert_eq!(ConfidenceScorer::threshold_for(InformationType::Identity, 0.85), 0.90);
        assert_eq!(ConfidenceScorer::threshold_for(InformationType::Criminal, 0.85), 0.85);
    }

    #[test]
    fn completeness_caps_at_one_even_with_excess_facts() {
        let mut kb = KnowledgeBase::new();
        for i in 0..10 {
            kb.add_fact(
                InformationType::Financial,
                Fact {
                    fact_type: "bankruptcy_filing".to_string(),
                    value: serde_json::json!(i),
                    source_provider: "p1".to_string(),
                    confidence: 0.9,
                    iteration: 1,
                    corroborated: false,
                },
            );
        }
        let factors = ConfidenceScorer::score(InformationType::Financial, &kb, &summary(1.0));
        assert_eq!(factors.completeness, 1.0);
    }

    #[test]
    fn status_map_compiles_with_hashable_status() {
        let mut m: HashMap<QueryStatus, usize> = HashMap::new();
        m.insert(QueryStatus::Success, 1);
        assert_eq!(m[&QueryStatus::Success], 1);
    }
}
