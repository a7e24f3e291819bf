//! Planner (spec §4.5): derives the next iteration's `SearchQuery` batch for
//! one `InformationType` from the subject and the accumulated `KnowledgeBase`.

use super::types::{Gap, KnowledgeBase, QueryType, SearchQuery};
use crate::entity::SubjectIdentifiers;
use crate::routing::{CircuitBreakerRegistry, ProviderRegistry};
use crate::types::{CheckType, InformationType, ServiceTier};

pub struct PlanResult {
    pub queries: Vec<SearchQuery>,
    pub skipped_reason: Option<String>,
}

pub struct Planner<'a> {
    pub registry: &'a ProviderRegistry,
    pub breakers: &'a CircuitBreakerRegistry,
}

impl<'a> Planner<'a> {
    /// `InformationType` and `CheckType` share members 1:1 in this system,
    /// so the planner queries providers under the same tag it plans for.
    fn check_type_for(info_type: InformationType) -> CheckType {
        info_type
    }

    pub fn plan(
        &self,
        info_type: InformationType,
        iteration: u32,
        subject: &SubjectIdentifiers,
        locale: &str,
        tier: ServiceTier,
        kb: &KnowledgeBase,
        gaps: &[Gap],
    ) -> PlanResult {
        let check_type = Self::check_type_for(info_type);
        let candidates = self.registry.select(check_type, locale, tier, self.breakers);

        if candidates.is_empty() && iteration == 1 {
            return PlanResult { queries: Vec::new(), skipped_reason: Some("no provider available".to_string()) };
        }

        let mut queries = Vec::new();
        let mut seen_providers = std::collections::HashSet::new();

        if iteration == 1 {
            for descriptor in &candidates {
                if !seen_providers.insert(descriptor.id.clone()) {
                    continue;
                }
                queries.push(SearchQuery::initial(info_type, descriptor.id.clone(), check_type, subject.to_query_params()));
            }
        } else {
            let enrichment = Self::enrichment_params(info_type, kb);
            for descriptor in &candidates {
                if !seen_providers.insert(descriptor.id.clone()) {
                    continue;
                }
                let mut query = SearchQuery::initial(info_type, descriptor.id.clone(), check_type, enrichment.clone());
                query.query_type = QueryType::Enriched;
                queries.push(query);
            }
            for gap in gaps {
                let mut query = SearchQuery::initial(
                    info_type,
                    candidates.first().map(|d| d.id.clone()).unwrap_or_default(),
                    check_type,
                    serde_json::json!({ "gap_fill_for": gap.expected_fact_type }),
                );
                query.query_type = QueryType::GapFill;
                queries.push(query);
            }
        }

        PlanResult { queries, skipped_reason: None }
    }

    /// Cross-type enrichment (spec §4.5): Criminal queries gain counties
    /// from Identity's address facts; AdverseMedia gains known entities and
    /// locations; Network queries gain discovered associates.
    fn enrichment_params(info_type: InformationType, kb: &KnowledgeBase) -> serde_json::Value {
        match info_type {
            InformationType::Criminal | InformationType::Civil => {
                let counties: Vec<_> = kb
                    .facts_for(InformationType::Identity)
                    .iter()
                    .filter(|f| f.fact_type == "address")
                    .map(|f| f.value.clone())
                    .collect();
                serde_json::json!({ "counties": counties })
            }
            InformationType::AdverseMedia => {
                let entities: Vec<_> = kb.all_facts().map(|(_, f)| f.value.clone()).collect();
                serde_json::json!({ "known_entities": entities })
            }
            InformationType::NetworkDepth2 | InformationType::NetworkDepth3 => {
                let associates: Vec<_> = kb
                    .facts_for(InformationType::NetworkDepth2)
                    .iter()
                    .filter(|f| f.fact_type == "associate")
                    .map(|f| f.value.clone())
                    .collect();
                serde_json::json!({ "known_associates": associates })
            }
            _ => serde_json::json!({}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{ProviderCapability, ProviderCategory, ProviderDescriptor};
    use screening_core::config::BreakerConfig;

    fn subject() -> SubjectIdentifiers {
        SubjectIdentifiers {
            full_name: "Jane Doe".to_string(),
            dob: chrono::NaiveDate::from_ymd_opt(1985, 3, 15),
            address: Some("1 Main St".to_string()),
            exact: Default::default(),
            aliases: vec![],
        }
    }

    #[test]
    fn no_provider_on_first_iteration_is_skipped_with_reason() {
        let registry = ProviderRegistry::new();
        let breakers = CircuitBreakerRegistry::new(BreakerConfig::default());
        let planner = Planner { registry: &registry, breakers: &breakers };
        let result = planner.plan(
            InformationType::Criminal,
            1,
            &subject(),
            "US",
            ServiceTier::Standard,
            &KnowledgeBase::new(),
            &[],
        );
        assert!(result.queries.is_empty());
        assert!(result.skipped_reason.is_some());
    }

    #[test]
    fn initial_iteration_dedupes_by_provider() {
        let registry = ProviderRegistry::new();
        registry.register(ProviderDescriptor {
            id: "p1".to_string(),
            category: ProviderCategory::Core,
            reliability: 0.9,
            capabilities: vec![ProviderCapability {
                check_type: InformationType::Criminal,
                locales: vec!["US".to_string()],
                cost_tier: crate::routing::provider::CostTier::Low,
                cost_per_call: 1.0,
            }],
        });
        let breakers = CircuitBreakerRegistry::new(BreakerConfig::default());
        let planner = Planner { registry: &registry, breakers: &breakers };
        let result = planner.plan(
            InformationType::Criminal,
            1,
            &subject(),
            "US",
            ServiceTier::Standard,
            &KnowledgeBase::new(),
            &[],
        );
        assert_eq!(result.queries.len(), 1);
        assert_eq!(result.queries[0].provider_id, "p1");
    }
}
