//! Assessor (spec §4.5): turns executor output into facts, inconsistencies,
//! gaps, and (for Network types) discovered entities.

use super::types::{
    DiscoveredEntity, Fact, Gap, Inconsistency, InconsistencyKind, KnowledgeBase, QueryResult, QueryStatus, SearchQuery,
};
use crate::types::{InformationType, Severity};
use chrono::{Duration, Utc};

pub struct AssessmentOutput {
    pub facts: Vec<Fact>,
    pub inconsistencies: Vec<Inconsistency>,
    pub gaps: Vec<Gap>,
    pub discovered_entities: Vec<DiscoveredEntity>,
}

/// Fact types a well-formed result is expected to contribute, per
/// `InformationType`; drives gap detection (distinct from the confidence
/// scorer's expected *count*, this is the expected *shape*).
fn expected_fact_types(info_type: InformationType) -> &'static [&'static str] {
    match info_type {
        InformationType::Identity => &["full_name", "dob", "ssn_last4", "address", "phone"],
        InformationType::Employment => &["employer", "title", "dates"],
        InformationType::Education => &["institution", "degree", "dates"],
        InformationType::Criminal => &["county_check"],
        _ => &[],
    }
}

pub struct Assessor;

impl Assessor {
    pub fn assess(
        &self,
        info_type: InformationType,
        iteration: u32,
        results: &[(SearchQuery, QueryResult)],
        kb: &KnowledgeBase,
    ) -> AssessmentOutput {
        let mut facts = Vec::new();
        let mut discovered_entities = Vec::new();

        for (query, result) in results {
            if result.status != QueryStatus::Success {
                continue;
            }
            if let serde_json::Value::Object(map) = &result.normalized_data {
                for (key, value) in map {
                    facts.push(Fact {
                        fact_type: key.clone(),
                        value: value.clone(),
                        source_provider: query.provider_id.clone(),
                        confidence: value
                            .get("confidence")
                            .and_then(|v| v.as_f64())
                            .unwrap_or(0.85),
                        iteration,
                        corroborated: false,
                    });
                }
                if matches!(info_type, InformationType::NetworkDepth2 | InformationType::NetworkDepth3) {
                    if let Some(associates) = map.get("associates").and_then(|v| v.as_array()) {
                        for assoc in associates {
                            if let Some(name) = assoc.get("name").and_then(|v| v.as_str()) {
                                discovered_entities.push(DiscoveredEntity {
                                    name: name.to_string(),
                                    relation_hint: assoc
                                        .get("relation")
                                        .and_then(|v| v.as_str())
                                        .unwrap_or("associate")
                                        .to_string(),
                                    source_provider: query.provider_id.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }

        let inconsistencies = Self::detect_inconsistencies(info_type, &facts, kb);
        let gaps = Self::detect_gaps(info_type, &facts, kb);

        AssessmentOutput { facts, inconsistencies, gaps, discovered_entities }
    }

    fn detect_inconsistencies(info_type: InformationType, new_facts: &[Fact], kb: &KnowledgeBase) -> Vec<Inconsistency> {
        let mut out = Vec::new();

        if info_type == InformationType::Employment {
            let existing_dates: Vec<&Fact> = kb.facts_for(InformationType::Employment).iter().filter(|f| f.fact_type == "dates").collect();
            let new_dates: Vec<&Fact> = new_facts.iter().filter(|f| f.fact_type == "dates").collect();
            if !existing_dates.is_empty() && !new_dates.is_empty() {
                for new in &new_dates {
                    let conflicting = existing_dates.iter().any(|e| e.value != new.value);
                    if conflicting {
                        out.push(Inconsistency {
                            kind: InconsistencyKind::EmploymentGapHidden,
                            description: "employment dates conflict across sources".to_string(),
                            info_type,
                            severity_hint: Severity::Medium,
                        });
                    }
                }
            }
        }

        if info_type == InformationType::Education {
            let has_degree_inflation = new_facts.iter().any(|f| {
                f.fact_type == "degree"
                    && kb.facts_for(InformationType::Education).iter().any(|e| e.fact_type == "degree" && e.value != f.value)
            });
            if has_degree_inflation {
                out.push(Inconsistency {
                    kind: InconsistencyKind::CredentialInflation,
                    description: "claimed degree does not match institution records".to_string(),
                    info_type,
                    severity_hint: Severity::High,
                });
            }
        }

        out
    }

    fn detect_gaps(info_type: InformationType, new_facts: &[Fact], kb: &KnowledgeBase) -> Vec<Gap> {
        let have: std::collections::HashSet<&str> = kb
            .facts_for(info_type)
            .iter()
            .chain(new_facts.iter())
            .map(|f| f.fact_type.as_str())
            .collect();

        expected_fact_types(info_type)
            .iter()
            .filter(|expected| !have.contains(*expected))
            .map(|expected| Gap {
                info_type,
                expected_fact_type: expected.to_string(),
                reason: format!("no fact of type '{}' reported by any provider", expected),
            })
            .collect()
    }
}

/// A finding `discovered_at` within this window counts as "recent" for the
/// severity calculator's recency adjustment (spec §4.6).
pub fn is_recent(discovered_at: chrono::DateTime<Utc>) -> bool {
    Utc::now() - discovered_at < Duration::days(365)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sar::types::{QueryStatus, SearchQuery};
    use crate::types::CheckType;

    fn success_result(query: SearchQuery, data: serde_json::Value) -> (SearchQuery, QueryResult) {
        let result = QueryResult {
            query_id: query.id,
            status: QueryStatus::Success,
            normalized_data: data,
            findings_count: 0,
            duration: std::time::Duration::from_millis(1),
            cache_hit: false,
            error: None,
        };
        (query, result)
    }

    #[test]
    fn extracts_one_fact_per_object_key() {
        let query = SearchQuery::initial(InformationType::Identity, "p1", CheckType::Identity, serde_json::json!({}));
        let result = success_result(query, serde_json::json!({"full_name": "Jane Doe", "dob": "1985-03-15"}));
        let assessor = Assessor;
        let output = assessor.assess(InformationType::Identity, 1, &[result], &KnowledgeBase::new());
        assert_eq!(output.facts.len(), 2);
    }

    #[test]
    fn missing_expected_fact_types_become_gaps() {
        let query = SearchQuery::initial(InformationType::Identity, "p1", CheckType::Identity, serde_json::json!({}));
        let result = success_result(query, serde_json::json!({"full_name": "Jane Doe"}));
        let assessor = Assessor;
        let output = assessor.assess(InformationType::Identity, 1, &[result], &KnowledgeBase::new());
        assert!(output.gaps.iter().any(|g| g.expected_fact_type == "dob"));
    }

    #[test]
    fn network_queries_surface_discovered_entities() {
        let query = SearchQuery::initial(InformationType::NetworkDepth2, "p1", CheckType::NetworkDepth2, serde_json::json!({}));
        let result = success_result(
            query,
            serde_json::json!({"associates": [{"name": "John Roe", "relation": "business_partner"}]}),
        );
        let assessor = Assessor;
        let output = assessor.assess(InformationType::NetworkDepth2, 1, &[result], &KnowledgeBase::new());
        assert_eq!(output.discovered_entities.len(), 1);
        assert_eq!(output.discovered_entities[0].name, "John Roe");
    }
}
