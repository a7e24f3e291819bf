//! Finding extraction (spec §4.5): rule-based over accumulated facts, with
//! an optional AI classifier capability that is always revalidated against
//! rule-derived keyword evidence before being trusted.

use super::types::{Fact, Finding};
use crate::types::{InformationType, Severity};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

/// Minimum confidence an AI-proposed category/sub-category must carry,
/// *alongside* rule-derived keyword evidence, to be kept rather than
/// reclassified by rules alone.
pub const MIN_VALIDATION_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct ClassificationProposal {
    pub category: String,
    pub sub_category: Option<String>,
    pub confidence: f64,
}

/// AI-adapter capability (spec §9): zero required implementations. Rule
/// fallback is authoritative, so a `NullAdapter` that always defers to
/// rules is a complete, correct configuration.
#[async_trait]
pub trait ClassifierAdapter: Send + Sync {
    async fn classify(&self, fact: &Fact) -> Option<ClassificationProposal>;
}

pub struct NullAdapter;

#[async_trait]
impl ClassifierAdapter for NullAdapter {
    async fn classify(&self, _fact: &Fact) -> Option<ClassificationProposal> {
        None
    }
}

/// Rule table: fact_type substrings to (category, sub_category, severity).
/// Intentionally small and explicit rather than a generic keyword engine --
/// the risk pipeline's `classifier.rs` owns the full keyword-family table
/// used for severity/role-relevance; this extractor only needs enough to
/// seed each Finding's initial shape.
fn rule_for_fact_type(fact_type: &str) -> Option<(&'static str, &'static str, Severity)> {
    match fact_type {
        "criminal_record" => Some(("CRIMINAL", "CRIMINAL_RECORD", Severity::Medium)),
        "bankruptcy_filing" => Some(("FINANCIAL", "FINANCIAL_BANKRUPTCY", Severity::Medium)),
        "sanctions_hit" => Some(("REGULATORY", "REGULATORY_SANCTIONS", Severity::Critical)),
        "pep_match" => Some(("REGULATORY", "REGULATORY_PEP", Severity::High)),
        "adverse_media" => Some(("REPUTATION", "REPUTATION_ADVERSE_MEDIA", Severity::Low)),
        _ => None,
    }
}

pub struct FindingExtractor<'a> {
    pub adapter: &'a dyn ClassifierAdapter,
}

impl<'a> FindingExtractor<'a> {
    pub fn new(adapter: &'a dyn ClassifierAdapter) -> Self {
        Self { adapter }
    }

    pub async fn extract(&self, info_type: InformationType, facts: &[Fact]) -> Vec<Finding> {
        let mut findings = Vec::new();

        for fact in facts {
            let Some((category, sub_category, rule_severity)) = rule_for_fact_type(&fact.fact_type) else {
                continue;
            };

            let proposal = self.adapter.classify(fact).await;
            let (final_category, final_sub_category) = match &proposal {
                Some(p) if p.confidence >= MIN_VALIDATION_CONFIDENCE => (p.category.clone(), p.sub_category.clone()),
                _ => (category.to_string(), Some(sub_category.to_string())),
            };

            findings.push(Finding {
                id: Uuid::now_v7(),
                category: final_category,
                sub_category: final_sub_category,
                severity: rule_severity,
                confidence: fact.confidence,
                relevance_to_role: 0.0,
                summary: format!("{} reported for {:?} via {}", fact.fact_type, info_type, fact.source_provider),
                details: fact.value.clone(),
                corroborated: fact.corroborated,
                sources: vec![fact.source_provider.clone()],
                discovered_at: Utc::now(),
            });
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(fact_type: &str) -> Fact {
        Fact {
            fact_type: fact_type.to_string(),
            value: serde_json::json!({"type": "felony"}),
            source_provider: "p1".to_string(),
            confidence: 0.9,
            iteration: 1,
            corroborated: false,
        }
    }

    #[tokio::test]
    async fn unrecognized_fact_types_produce_no_finding() {
        let adapter = NullAdapter;
        let extractor = FindingExtractor::new(&adapter);
        let findings = extractor.extract(InformationType::Identity, &[fact("full_name")]).await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn recognized_fact_type_produces_rule_based_finding() {
        let adapter = NullAdapter;
        let extractor = FindingExtractor::new(&adapter);
        let findings = extractor.extract(InformationType::Criminal, &[fact("criminal_record")]).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "CRIMINAL");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    struct LowConfidenceAdapter;
    #[async_trait]
    impl ClassifierAdapter for LowConfidenceAdapter {
        async fn classify(&self, _fact: &Fact) -> Option<ClassificationProposal> {
            Some(ClassificationProposal { category: "WRONG".to_string(), sub_category: None, confidence: 0.3 })
        }
    }

    #[tokio::test]
    async fn low_confidence_ai_proposal_is_reclassified_by_rules() {
        let adapter = LowConfidenceAdapter;
        let extractor = FindingExtractor::new(&adapter);
        let findings = extractor.extract(InformationType::Criminal, &[fact("criminal_record")]).await;
        assert_eq!(findings[0].category, "CRIMINAL");
    }
}
