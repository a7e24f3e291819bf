//! The Search-Assess-Refine loop (spec §4.5): one `SarInvestigator` per
//! screening, running Planner -> Executor -> Assessor -> ConfidenceScorer ->
//! IterationController per `InformationType`, grouped into the five phases
//! of spec §4.5's phase table. The `KnowledgeBase` is owned exclusively by
//! this struct for the lifetime of one screening; nothing else writes to it.

pub mod assessor;
pub mod checkpoint;
pub mod confidence;
pub mod controller;
pub mod executor;
pub mod finding_extractor;
pub mod phases;
pub mod planner;
pub mod types;

pub use assessor::{Assessor, AssessmentOutput};
pub use checkpoint::{CheckpointStore, TypeCheckpoint};
pub use confidence::{ConfidenceFactors, ConfidenceScorer};
pub use controller::{ControllerDecision, IterationController};
pub use executor::Executor;
pub use finding_extractor::{ClassifierAdapter, FindingExtractor, NullAdapter};
pub use phases::{Phase, PhaseInput, PhaseOutput};
pub use planner::{PlanResult, Planner};
pub use types::{
    DiscoveredEntity, ExecutionSummary, Fact, Finding, Gap, Inconsistency, InconsistencyKind, KnowledgeBase, QueryResult,
    QueryStatus, QueryType, SarIterationState, SarPhaseStep, SarTypeState, SearchQuery,
};

use crate::entity::SubjectIdentifiers;
use crate::routing::{CircuitBreakerRegistry, ProviderRegistry, RequestRouter, RoutingServices};
use crate::types::{CompletionReason, InformationType, ServiceTier};
use screening_core::config::{Config, SarConfig};
use screening_core::TenantId;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of running one `InformationType`'s full SAR loop to completion.
pub struct TypeOutcome {
    pub info_type: InformationType,
    pub state: SarTypeState,
    pub findings: Vec<Finding>,
    pub inconsistencies: Vec<Inconsistency>,
    pub discovered_entities: Vec<DiscoveredEntity>,
}

/// Outcome of running every type in one `Phase`.
pub struct PhaseRunOutcome {
    pub phase_output: PhaseOutput,
    pub type_outcomes: Vec<TypeOutcome>,
}

/// Outcome of a full investigation across all five phases.
pub struct InvestigationOutcome {
    pub knowledge_base: KnowledgeBase,
    pub type_outcomes: Vec<TypeOutcome>,
    pub findings: Vec<Finding>,
    pub inconsistencies: Vec<Inconsistency>,
    pub discovered_entities: Vec<DiscoveredEntity>,
    pub halted: bool,
    pub halt_reason: Option<String>,
}

pub struct SarInvestigator {
    registry: Arc<ProviderRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    router: RequestRouter,
    classifier: Arc<dyn ClassifierAdapter>,
    config: SarConfig,
    max_concurrent_queries: usize,
    checkpoints: CheckpointStore,
}

impl SarInvestigator {
    pub fn new(services: &RoutingServices, app_config: &Config, classifier: Arc<dyn ClassifierAdapter>) -> Self {
        Self {
            registry: services.registry.clone(),
            breakers: services.breakers.clone(),
            router: services.router(app_config),
            classifier,
            config: app_config.sar.clone(),
            max_concurrent_queries: app_config.provider.max_concurrent_queries,
            checkpoints: CheckpointStore::new(),
        }
    }

    fn controller(&self) -> IterationController {
        IterationController {
            base_confidence_threshold: self.config.confidence_threshold,
            max_iterations: self.config.max_iterations_per_type,
            foundation_max_iterations: self.config.foundation_max_iterations,
            min_gain_threshold: self.config.min_gain_threshold,
        }
    }

    /// Runs one `InformationType` to completion: iterate plan -> execute ->
    /// assess -> score -> decide, accumulating into `kb`, until the
    /// controller reports `Complete`.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_type(
        &self,
        info_type: InformationType,
        subject: &SubjectIdentifiers,
        locale: &str,
        tier: ServiceTier,
        tenant_id: Option<TenantId>,
        entity_id: Uuid,
        kb: &mut KnowledgeBase,
    ) -> TypeOutcome {
        let planner = Planner { registry: &self.registry, breakers: &self.breakers };
        let executor = Executor { router: &self.router, max_concurrent: self.max_concurrent_queries };
        let controller = self.controller();

        let mut state = SarTypeState::new(info_type);
        let mut all_findings = Vec::new();
        let mut all_inconsistencies = Vec::new();
        let mut all_discovered_entities = Vec::new();
        let mut gaps: Vec<Gap> = Vec::new();
        let mut consecutive_low_gain = 0u32;
        let mut iteration = 1u32;

        loop {
            let plan = planner.plan(info_type, iteration, subject, locale, tier, kb, &gaps);

            if plan.queries.is_empty() {
                state.completion_reason = Some(if plan.skipped_reason.is_some() {
                    CompletionReason::Skipped
                } else {
                    CompletionReason::ConfidenceMet
                });
                break;
            }

            let facts_before = kb.facts_for(info_type).len();
            let (results, summary) = executor.execute(entity_id, plan.queries, locale, tier, tenant_id).await;

            let assessment = Assessor.assess(info_type, iteration, &results, kb);
            let new_facts = assessment.facts.len();
            for fact in assessment.facts {
                kb.add_fact(info_type, fact);
            }
            gaps = assessment.gaps;
            all_inconsistencies.extend(assessment.inconsistencies);
            all_discovered_entities.extend(assessment.discovered_entities);

            let factors = ConfidenceScorer::score(info_type, kb, &summary);
            let confidence = factors.composite();

            state.iterations.push(SarIterationState {
                iteration,
                phase: SarPhaseStep::Assess,
                queries_executed: results.len(),
                new_facts,
                confidence,
            });

            let decision = controller.decide(info_type, iteration, confidence, new_facts, facts_before, consecutive_low_gain);

            let information_gain = new_facts as f64 / (facts_before as f64 + 1.0);
            if information_gain < self.config.min_gain_threshold {
                consecutive_low_gain += 1;
            } else {
                consecutive_low_gain = 0;
            }

            match decision {
                ControllerDecision::Complete(reason) => {
                    state.completion_reason = Some(reason);
                    break;
                }
                ControllerDecision::Continue => {
                    iteration += 1;
                }
            }
        }

        let extractor = FindingExtractor::new(self.classifier.as_ref());
        all_findings.extend(extractor.extract(info_type, kb.facts_for(info_type)).await);

        self.checkpoints.record(TypeCheckpoint {
            info_type,
            state: state.clone(),
            facts: kb.facts_for(info_type).to_vec(),
            recorded_at: chrono::Utc::now(),
        });

        TypeOutcome {
            info_type,
            state,
            findings: all_findings,
            inconsistencies: all_inconsistencies,
            discovered_entities: all_discovered_entities,
        }
    }

    /// Runs every runnable type of a phase, in the order the phase table
    /// specifies (sequential phases already list their types in dependency
    /// order; parallel phases have no such ordering constraint, so running
    /// them one after another inside this single investigator task, rather
    /// than truly concurrently, still upholds the single-writer rule on
    /// `KnowledgeBase` without an extra lock).
    pub async fn run_phase(
        &self,
        phase: Phase,
        subject: &SubjectIdentifiers,
        locale: &str,
        tier: ServiceTier,
        tenant_id: Option<TenantId>,
        entity_id: Uuid,
        kb: &mut KnowledgeBase,
    ) -> PhaseRunOutcome {
        let input = PhaseInput { phase, locale, enhanced_tier: tier == ServiceTier::Enhanced };
        let (runnable, skipped) = phases::runnable_types(&input);

        let mut type_outcomes = Vec::new();
        let mut halted = false;
        let mut halt_reason = None;

        for info_type in runnable {
            let outcome = self.run_type(info_type, subject, locale, tier, tenant_id, entity_id, kb).await;

            let halts = matches!(
                outcome.state.completion_reason,
                Some(CompletionReason::Skipped) | Some(CompletionReason::MaxIterations) | Some(CompletionReason::Error)
            );
            if phase.is_required(info_type) && halts {
                halted = true;
                halt_reason = Some(format!(
                    "required type {:?} ended via {:?} without reaching confidence",
                    info_type, outcome.state.completion_reason
                ));
                type_outcomes.push(outcome);
                break;
            }

            type_outcomes.push(outcome);
        }

        PhaseRunOutcome {
            phase_output: PhaseOutput {
                phase,
                completed_types: type_outcomes.iter().map(|o| o.info_type).collect(),
                skipped_types: skipped,
                halted,
                halt_reason: halt_reason.clone(),
            },
            type_outcomes,
        }
    }

    /// Runs the full five-phase investigation, honoring each phase's
    /// required-type halt semantics (spec §4.5).
    #[allow(clippy::too_many_arguments)]
    pub async fn run_investigation(
        &self,
        subject: &SubjectIdentifiers,
        locale: &str,
        tier: ServiceTier,
        tenant_id: Option<TenantId>,
        entity_id: Uuid,
    ) -> InvestigationOutcome {
        let mut kb = KnowledgeBase::new();
        let mut type_outcomes = Vec::new();
        let mut findings = Vec::new();
        let mut inconsistencies = Vec::new();
        let mut discovered_entities = Vec::new();
        let mut halted = false;
        let mut halt_reason = None;

        for phase in Phase::ORDER {
            let run = self.run_phase(phase, subject, locale, tier, tenant_id, entity_id, &mut kb).await;
            for outcome in &run.type_outcomes {
                findings.extend(outcome.findings.clone());
                inconsistencies.extend(outcome.inconsistencies.clone());
                discovered_entities.extend(outcome.discovered_entities.clone());
            }
            type_outcomes.extend(run.type_outcomes);

            if run.phase_output.halted {
                halted = true;
                halt_reason = run.phase_output.halt_reason;
                break;
            }
        }

        InvestigationOutcome { knowledge_base: kb, type_outcomes, findings, inconsistencies, discovered_entities, halted, halt_reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{ProviderCapability, ProviderCategory, ProviderDescriptor, ProviderHealth, ProviderResult};
    use crate::types::CheckType;
    use async_trait::async_trait;
    use chrono::Utc;

    struct AlwaysOk;

    #[async_trait]
    impl crate::routing::Provider for AlwaysOk {
        fn id(&self) -> &str {
            "p1"
        }

        async fn execute_check(
            &self,
            check_type: CheckType,
            _subject: &serde_json::Value,
            locale: &str,
            _extras: &serde_json::Value,
        ) -> screening_core::error::Result<ProviderResult> {
            Ok(ProviderResult {
                provider_id: "p1".to_string(),
                check_type,
                locale: locale.to_string(),
                success: true,
                normalized_data: serde_json::json!({"full_name": "Jane Doe", "dob": "1985-03-15", "ssn_last4": "1234", "address": "1 Main St", "phone": "555-0100"}),
                raw_response: None,
                cost_incurred: 1.0,
                duration: std::time::Duration::from_millis(1),
            })
        }

        async fn health_check(&self) -> ProviderHealth {
            ProviderHealth { status: crate::routing::provider::HealthStatus::Healthy, last_check: Utc::now(), error: None }
        }
    }

    fn subject() -> SubjectIdentifiers {
        SubjectIdentifiers {
            full_name: "Jane Doe".to_string(),
            dob: chrono::NaiveDate::from_ymd_opt(1985, 3, 15),
            address: Some("1 Main St".to_string()),
            exact: Default::default(),
            aliases: vec![],
        }
    }

    fn test_config() -> Config {
        Config::default()
    }

    fn investigator() -> SarInvestigator {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(ProviderDescriptor {
            id: "p1".to_string(),
            category: ProviderCategory::Core,
            reliability: 0.9,
            capabilities: vec![ProviderCapability {
                check_type: InformationType::Identity,
                locales: vec!["US".to_string()],
                cost_tier: crate::routing::provider::CostTier::Low,
                cost_per_call: 1.0,
            }],
        });

        let app_config = test_config();
        let services = RoutingServices {
            registry: registry.clone(),
            breakers: Arc::new(CircuitBreakerRegistry::new(app_config.breaker.clone())),
            rate_limiter: Arc::new(crate::routing::RateLimiterRegistry::new(crate::routing::RateLimiterConfig {
                tokens_per_second: 1000.0,
                max_tokens: 1000.0,
            })),
            cache: Arc::new(crate::routing::ResponseCache::new()),
            cost: Arc::new(crate::routing::CostService::new(app_config.budget.clone())),
        };

        let mut investigator = SarInvestigator::new(&services, &app_config, Arc::new(NullAdapter));
        investigator.router = investigator.router.with_provider(Arc::new(AlwaysOk));
        investigator
    }

    #[tokio::test]
    async fn identity_type_converges_and_produces_no_criminal_findings() {
        let investigator = investigator();
        let mut kb = KnowledgeBase::new();
        let outcome = investigator
            .run_type(InformationType::Identity, &subject(), "US", ServiceTier::Standard, None, Uuid::now_v7(), &mut kb)
            .await;

        assert!(outcome.state.completion_reason.is_some());
        assert!(outcome.findings.is_empty());
        assert!(!kb.facts_for(InformationType::Identity).is_empty());
    }

    #[tokio::test]
    async fn foundation_phase_runs_identity_employment_education_in_order() {
        let investigator = investigator();
        let mut kb = KnowledgeBase::new();
        let run = investigator
            .run_phase(Phase::Foundation, &subject(), "US", ServiceTier::Standard, None, Uuid::now_v7(), &mut kb)
            .await;

        assert_eq!(run.phase_output.completed_types[0], InformationType::Identity);
        assert_eq!(run.type_outcomes.len(), 3);
    }
}
