//! Screening orchestrator (spec §4, §9): sequences validation, compliance,
//! consent, investigation, risk analysis, and report generation for one
//! screening request. Each phase is recorded independently so a blocked or
//! failed screening still carries a full account of what ran before it
//! stopped, rather than collapsing to a single top-level error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use screening_core::audit::{AuditEvent, AuditLogger, EventSeverity, EventType};
use screening_core::{Config, TenantId};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::compile::{CompiledResult, ResultCompiler};
use crate::compliance::ComplianceEngine;
use crate::entity::repository::EntityRepository;
use crate::entity::resolver::{EntityResolver, MatchOutcome, SubjectIdentifiers};
use crate::entity::types::{Entity, EntityProfile, EntityType, IdentifierKind};
use crate::risk::{
    AnomalyDetector, Classifier, ConnectionAnalyzer, ConnectionGraph, GraphConnectionSummary, PatternRecognizer, RiskScorer,
    ScoredFinding,
};
use crate::routing::RoutingServices;
use crate::sar::{ClassifierAdapter, InvestigationOutcome, NullAdapter, Phase, SarInvestigator, TypeOutcome};
use crate::types::{CheckType, DataOrigin, RoleCategory, SearchDegree, ServiceTier};
use screening_core::error::Result;
use tokio_util::sync::CancellationToken;

/// One screening's input. `requested_checks` is whatever the caller asked
/// for; the orchestrator narrows it to what compliance actually permits
/// before running the investigation. `cancellation` is checked at phase
/// boundaries around the expensive part of the run (entity resolution,
/// the SAR loop, risk scoring); a request with none set runs to completion
/// regardless of how long the investigation takes.
#[derive(Debug, Clone)]
pub struct ScreeningRequest {
    pub tenant_id: TenantId,
    pub correlation_id: Uuid,
    pub subject: SubjectIdentifiers,
    pub role: RoleCategory,
    pub locale: String,
    pub tier: ServiceTier,
    pub search_degree: SearchDegree,
    pub requested_checks: Vec<CheckType>,
    pub consent_token: Option<String>,
    pub cancellation: Option<CancellationToken>,
}

impl ScreeningRequest {
    /// All fourteen information types, in phase order -- the default when a
    /// caller wants a full screening rather than a narrower subset.
    pub fn all_check_types() -> Vec<CheckType> {
        Phase::ORDER.iter().flat_map(|phase| phase.types().iter().copied()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorPhase {
    Validation,
    Compliance,
    Consent,
    Investigation,
    RiskAnalysis,
    ReportGeneration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseStatus {
    Completed,
    Blocked,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseRecord {
    pub phase: OrchestratorPhase,
    pub status: PhaseStatus,
    pub duration_ms: u64,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreeningStatus {
    Completed,
    Blocked,
    Failed,
}

/// Outcome of one `ScreeningOrchestrator::run` call -- this is the shape the
/// intake shim hands back to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningResult {
    pub screening_id: Uuid,
    pub entity_id: Option<Uuid>,
    pub status: ScreeningStatus,
    pub phases: Vec<PhaseRecord>,
    pub blocked_checks: Vec<(CheckType, String)>,
    pub compiled_result: Option<CompiledResult>,
    pub error: Option<String>,
}

/// Drives one screening end to end. Holds no per-request state itself --
/// everything that varies across calls lives on `ScreeningRequest` or the
/// accumulating `ScreeningResult`, so one orchestrator instance safely
/// serves concurrent requests for different tenants.
pub struct ScreeningOrchestrator<R: EntityRepository> {
    repo: Arc<R>,
    compliance: ComplianceEngine,
    services: RoutingServices,
    config: Config,
    classifier_adapter: Arc<dyn ClassifierAdapter>,
    audit: AuditLogger,
}

impl<R: EntityRepository> ScreeningOrchestrator<R> {
    pub fn new(
        repo: Arc<R>,
        compliance: ComplianceEngine,
        services: RoutingServices,
        config: Config,
        audit: AuditLogger,
    ) -> Self {
        Self { repo, compliance, services, config, classifier_adapter: Arc::new(NullAdapter), audit }
    }

    pub fn with_classifier_adapter(mut self, adapter: Arc<dyn ClassifierAdapter>) -> Self {
        self.classifier_adapter = adapter;
        self
    }

    pub async fn run(&self, request: ScreeningRequest) -> ScreeningResult {
        let screening_id = Uuid::now_v7();
        let mut phases = Vec::new();

        self.audit
            .update_context(|ctx| {
                ctx.tenant_id = Some(request.tenant_id.0);
                ctx.correlation_id = Some(request.correlation_id);
            })
            .await;

        let _ = self
            .audit
            .log_screening_lifecycle(EventType::ScreeningStarted, request.tenant_id.0, request.correlation_id, screening_id)
            .await;

        // -- Validation --------------------------------------------------
        let started = Instant::now();
        if let Err(err) = self.compliance.validate_service_config(request.tier, request.search_degree, &request.requested_checks)
        {
            phases.push(PhaseRecord {
                phase: OrchestratorPhase::Validation,
                status: PhaseStatus::Failed,
                duration_ms: elapsed_ms(started),
                detail: Some(err.message.clone()),
            });
            return self.failed_result(screening_id, phases, Vec::new(), err.message);
        }
        phases.push(PhaseRecord {
            phase: OrchestratorPhase::Validation,
            status: PhaseStatus::Completed,
            duration_ms: elapsed_ms(started),
            detail: None,
        });

        // -- Compliance ----------------------------------------------------
        let started = Instant::now();
        let mut permitted_checks = Vec::new();
        let mut blocked_checks = Vec::new();
        let mut consent_required = false;

        for &check_type in &request.requested_checks {
            let decision = self.compliance.evaluate(&request.locale, check_type, request.role, request.tier);
            let reason = decision.block_reason.clone().unwrap_or_else(|| "not permitted".to_string());
            let _ = self
                .audit
                .log_compliance_decision(
                    request.tenant_id.0,
                    request.correlation_id,
                    &check_type.to_string(),
                    decision.permitted,
                    &reason,
                )
                .await;

            if decision.permitted {
                consent_required = consent_required || decision.requires_consent;
                permitted_checks.push(check_type);
            } else {
                blocked_checks.push((check_type, reason));
            }
        }

        if permitted_checks.is_empty() {
            phases.push(PhaseRecord {
                phase: OrchestratorPhase::Compliance,
                status: PhaseStatus::Blocked,
                duration_ms: elapsed_ms(started),
                detail: Some("no requested check is permitted for this locale/role/tier".to_string()),
            });
            return ScreeningResult {
                screening_id,
                entity_id: None,
                status: ScreeningStatus::Blocked,
                phases,
                blocked_checks,
                compiled_result: None,
                error: None,
            };
        }
        phases.push(PhaseRecord {
            phase: OrchestratorPhase::Compliance,
            status: PhaseStatus::Completed,
            duration_ms: elapsed_ms(started),
            detail: Some(format!("{} of {} checks permitted", permitted_checks.len(), request.requested_checks.len())),
        });

        // -- Consent ---------------------------------------------------
        let started = Instant::now();
        if consent_required && request.consent_token.is_none() {
            phases.push(PhaseRecord {
                phase: OrchestratorPhase::Consent,
                status: PhaseStatus::Blocked,
                duration_ms: elapsed_ms(started),
                detail: Some("subject consent is required but was not supplied".to_string()),
            });
            return ScreeningResult {
                screening_id,
                entity_id: None,
                status: ScreeningStatus::Blocked,
                phases,
                blocked_checks,
                compiled_result: None,
                error: None,
            };
        }
        if consent_required {
            let event = AuditEvent::builder(EventType::ConsentRecorded, request.correlation_id)
                .tenant_id(request.tenant_id.0)
                .resource("screening", screening_id)
                .build();
            let _ = self.audit.log_event(event).await;
        }
        phases.push(PhaseRecord {
            phase: OrchestratorPhase::Consent,
            status: PhaseStatus::Completed,
            duration_ms: elapsed_ms(started),
            detail: None,
        });

        // -- Investigation -----------------------------------------------
        let started = Instant::now();
        if let Some(result) = self.check_cancelled(&request, screening_id, &mut phases, OrchestratorPhase::Investigation, started, blocked_checks.clone())
        {
            return result;
        }
        let entity_id = match self.resolve_entity(&request).await {
            Ok(id) => id,
            Err(err) => {
                phases.push(PhaseRecord {
                    phase: OrchestratorPhase::Investigation,
                    status: PhaseStatus::Failed,
                    duration_ms: elapsed_ms(started),
                    detail: Some(err.message.clone()),
                });
                return self.failed_result(screening_id, phases, blocked_checks, err.message);
            }
        };

        let investigator = SarInvestigator::new(&self.services, &self.config, self.classifier_adapter.clone());
        let outcome = investigator
            .run_investigation(&request.subject, &request.locale, request.tier, Some(request.tenant_id), entity_id)
            .await;
        let outcome = filter_to_permitted(outcome, &permitted_checks);

        phases.push(PhaseRecord {
            phase: OrchestratorPhase::Investigation,
            status: PhaseStatus::Completed,
            duration_ms: elapsed_ms(started),
            detail: Some(format!("{} findings across {} types", outcome.findings.len(), outcome.type_outcomes.len())),
        });

        // -- Risk analysis -------------------------------------------------
        let started = Instant::now();
        if let Some(result) = self.check_cancelled(&request, screening_id, &mut phases, OrchestratorPhase::RiskAnalysis, started, blocked_checks.clone())
        {
            return result;
        }
        let classified: Vec<(crate::risk::Category, f64)> = outcome
            .findings
            .iter()
            .map(|finding| {
                let text = format!("{} {}", finding.summary, finding.details);
                let result = Classifier::classify(&text, None, request.role);
                (result.category, result.role_relevance)
            })
            .collect();
        let scored_findings: Vec<ScoredFinding> = outcome
            .findings
            .iter()
            .zip(classified.iter())
            .map(|(finding, (category, role_relevance))| ScoredFinding { finding, category: *category, role_relevance: *role_relevance })
            .collect();

        let overall_risk = RiskScorer::score(&scored_findings);
        let pattern_summary = PatternRecognizer::analyze(&outcome.findings);
        let anomaly_summary = AnomalyDetector::analyze(&outcome.inconsistencies);
        let connection_summary = self.build_connection_summary(entity_id).await;

        phases.push(PhaseRecord {
            phase: OrchestratorPhase::RiskAnalysis,
            status: PhaseStatus::Completed,
            duration_ms: elapsed_ms(started),
            detail: Some(format!("overall risk {:.1} ({:?})", overall_risk.overall_score, overall_risk.level)),
        });

        // -- Report generation ---------------------------------------------
        let started = Instant::now();
        let compiled = ResultCompiler::compile(
            screening_id,
            entity_id,
            &outcome,
            overall_risk,
            pattern_summary,
            anomaly_summary,
            connection_summary,
        );

        let version = self.next_profile_version(entity_id).await;
        let categories: Vec<&String> = compiled.findings_summary.by_category.keys().collect();
        let profile = EntityProfile {
            entity_id,
            version,
            trigger: "screening".to_string(),
            findings_blob: json!({
                "screening_id": screening_id,
                "finding_count": compiled.findings.len(),
                "categories": categories,
            }),
            risk_score: compiled.overall_risk.overall_score,
            created_at: chrono::Utc::now(),
        };
        if let Err(err) = self.repo.add_profile(profile).await {
            phases.push(PhaseRecord {
                phase: OrchestratorPhase::ReportGeneration,
                status: PhaseStatus::Failed,
                duration_ms: elapsed_ms(started),
                detail: Some(err.message.clone()),
            });
            return self.failed_result(screening_id, phases, blocked_checks, err.message);
        }

        phases.push(PhaseRecord {
            phase: OrchestratorPhase::ReportGeneration,
            status: PhaseStatus::Completed,
            duration_ms: elapsed_ms(started),
            detail: None,
        });

        let _ = self
            .audit
            .log_screening_lifecycle(EventType::ScreeningCompleted, request.tenant_id.0, request.correlation_id, screening_id)
            .await;

        compiled.to_screening_result(phases, blocked_checks)
    }

    /// Resolves the subject to a canonical entity id, creating one if no
    /// existing entity matches closely enough. A fuzzy match that lands in
    /// the `PendingReview` band is never auto-merged -- a new entity is
    /// created and flagged for manual review instead, since merging on a
    /// 0.70-0.85 confidence match risks conflating two different people.
    async fn resolve_entity(&self, request: &ScreeningRequest) -> Result<Uuid> {
        let resolver = EntityResolver::new(self.repo.as_ref());

        let mut entity_id = match resolver.resolve(&request.subject, request.tier).await? {
            MatchOutcome::MatchExisting { entity_id, .. } => entity_id,
            MatchOutcome::PendingReview { entity_id: candidate_id, score } => {
                let entity = Entity::new(EntityType::Person, Some(request.tenant_id), DataOrigin::CustomerProvided);
                let id = entity.id;
                self.repo.insert(entity).await?;
                let event = AuditEvent::builder(EventType::EntityCreated, request.correlation_id)
                    .tenant_id(request.tenant_id.0)
                    .severity(EventSeverity::Warning)
                    .resource("entity", id)
                    .data(json!({ "pending_review_candidate": candidate_id, "match_score": score }))
                    .build();
                let _ = self.audit.log_event(event).await;
                id
            }
            MatchOutcome::CreateNew => {
                let entity = Entity::new(EntityType::Person, Some(request.tenant_id), DataOrigin::CustomerProvided);
                let id = entity.id;
                self.repo.insert(entity).await?;
                let event = AuditEvent::builder(EventType::EntityCreated, request.correlation_id)
                    .tenant_id(request.tenant_id.0)
                    .resource("entity", id)
                    .build();
                let _ = self.audit.log_event(event).await;
                id
            }
        };

        for (kind, value) in subject_identifiers(&request.subject) {
            let survivor = resolver.add_identifier_with_merge(entity_id, kind, &value, "screening_request", 1.0).await?;
            if survivor != entity_id {
                let _ = self
                    .audit
                    .log_entity_merged(request.tenant_id.0, request.correlation_id, survivor, entity_id)
                    .await;
                entity_id = survivor;
            }
        }

        Ok(entity_id)
    }

    /// Builds the graph risk-propagation summary from the entity's recorded
    /// relations, sourcing each neighbor's risk score from its latest
    /// profile (0.0 if it has never been screened).
    async fn build_connection_summary(&self, entity_id: Uuid) -> Option<GraphConnectionSummary> {
        let subject = self.repo.get(entity_id).await.ok()??;
        let relations = self.repo.relations_for(entity_id).await.ok()?;
        if relations.is_empty() {
            return None;
        }

        let mut graph = ConnectionGraph::new();
        graph.add_entity(subject);

        let mut neighbor_risk_scores = HashMap::new();
        for relation in &relations {
            let neighbor_id = if relation.from_id == entity_id { relation.to_id } else { relation.from_id };
            if let Ok(Some(neighbor)) = self.repo.get(neighbor_id).await {
                graph.add_entity(neighbor);
            }
            if let Ok(Some(profile)) = self.repo.latest_profile(neighbor_id).await {
                neighbor_risk_scores.insert(neighbor_id, profile.risk_score);
            }
        }
        for relation in relations {
            graph.add_relation(relation);
        }

        ConnectionAnalyzer::analyze(&graph, entity_id, &neighbor_risk_scores)
    }

    async fn next_profile_version(&self, entity_id: Uuid) -> i64 {
        match self.repo.latest_profile(entity_id).await {
            Ok(Some(profile)) => profile.version + 1,
            _ => 1,
        }
    }

    /// Returns `Some(result)` if the caller's token has fired, recording a
    /// failed phase at the checked boundary. Callers that pass no token
    /// never see a `Some` here.
    fn check_cancelled(
        &self,
        request: &ScreeningRequest,
        screening_id: Uuid,
        phases: &mut Vec<PhaseRecord>,
        phase: OrchestratorPhase,
        started: Instant,
        blocked_checks: Vec<(CheckType, String)>,
    ) -> Option<ScreeningResult> {
        let cancelled = request.cancellation.as_ref().map(CancellationToken::is_cancelled).unwrap_or(false);
        if !cancelled {
            return None;
        }
        phases.push(PhaseRecord {
            phase,
            status: PhaseStatus::Failed,
            duration_ms: elapsed_ms(started),
            detail: Some("screening cancelled".to_string()),
        });
        Some(self.failed_result(screening_id, phases.clone(), blocked_checks, "screening cancelled".to_string()))
    }

    fn failed_result(
        &self,
        screening_id: Uuid,
        phases: Vec<PhaseRecord>,
        blocked_checks: Vec<(CheckType, String)>,
        error: String,
    ) -> ScreeningResult {
        ScreeningResult {
            screening_id,
            entity_id: None,
            status: ScreeningStatus::Failed,
            phases,
            blocked_checks,
            compiled_result: None,
            error: Some(error),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn subject_identifiers(subject: &SubjectIdentifiers) -> Vec<(IdentifierKind, String)> {
    let mut out: Vec<(IdentifierKind, String)> = subject.exact.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    out.push((IdentifierKind::FullName, subject.full_name.clone()));
    if let Some(dob) = subject.dob {
        out.push((IdentifierKind::Dob, dob.to_string()));
    }
    if let Some(address) = &subject.address {
        out.push((IdentifierKind::Address, address.clone()));
    }
    out
}

/// Drops every `TypeOutcome` whose check type compliance didn't permit.
/// `SarInvestigator::run_investigation` always runs the full fourteen-type
/// sweep -- filtering happens here rather than inside the SAR loop itself,
/// so the loop's own tests keep exercising the unconditional path.
fn filter_to_permitted(outcome: InvestigationOutcome, permitted: &[CheckType]) -> InvestigationOutcome {
    let surviving: Vec<TypeOutcome> =
        outcome.type_outcomes.into_iter().filter(|type_outcome| permitted.contains(&type_outcome.info_type)).collect();

    let findings = surviving.iter().flat_map(|t| t.findings.clone()).collect();
    let inconsistencies = surviving.iter().flat_map(|t| t.inconsistencies.clone()).collect();
    let discovered_entities = surviving.iter().flat_map(|t| t.discovered_entities.clone()).collect();

    InvestigationOutcome {
        knowledge_base: outcome.knowledge_base,
        type_outcomes: surviving,
        findings,
        inconsistencies,
        discovered_entities,
        halted: outcome.halted,
        halt_reason: outcome.halt_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::repository::InMemoryEntityRepository;
    use crate::compliance::ComplianceRule;
    use async_trait::async_trait;
    use screening_core::audit::traits::BackendHealth;
    use screening_core::audit::{AuditBackend, AuditFilter};
    use screening_core::error::ErrorMetrics;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryAuditBackend {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditBackend for InMemoryAuditBackend {
        async fn store_event(&self, event: &AuditEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        async fn retrieve_events(&self, _filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
            Ok(self.events.lock().unwrap().clone())
        }

        async fn count_events(&self, _filter: &AuditFilter) -> Result<u64> {
            Ok(self.events.lock().unwrap().len() as u64)
        }

        async fn health_check(&self) -> Result<BackendHealth> {
            Ok(BackendHealth { is_healthy: true, message: None, last_write: None, events_stored_today: None })
        }

        async fn cleanup_old_events(&self, _older_than: chrono::DateTime<chrono::Utc>) -> Result<u64> {
            Ok(0)
        }
    }

    fn test_config() -> Config {
        Config::default()
    }

    fn test_audit() -> AuditLogger {
        AuditLogger::new(Arc::new(InMemoryAuditBackend::default()), Arc::new(ErrorMetrics::new()))
    }

    fn test_services(config: &Config) -> RoutingServices {
        RoutingServices::new(config)
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

    fn request(tenant_id: TenantId, requested_checks: Vec<CheckType>, consent_token: Option<String>) -> ScreeningRequest {
        ScreeningRequest {
            tenant_id,
            correlation_id: Uuid::now_v7(),
            subject: subject(),
            role: RoleCategory::Standard,
            locale: "US".to_string(),
            tier: ServiceTier::Standard,
            search_degree: SearchDegree::D1,
            requested_checks,
            consent_token,
            cancellation: None,
        }
    }

    fn orchestrator(compliance: ComplianceEngine) -> ScreeningOrchestrator<InMemoryEntityRepository> {
        let config = test_config();
        let services = test_services(&config);
        ScreeningOrchestrator::new(Arc::new(InMemoryEntityRepository::new()), compliance, services, config, test_audit())
    }

    #[tokio::test]
    async fn fully_permitted_screening_without_consent_requirement_completes() {
        let compliance = ComplianceEngine::new(vec![ComplianceRule::new("US", CheckType::Employment, true)]);
        let orchestrator = orchestrator(compliance);
        let result = orchestrator.run(request(TenantId::new(), vec![CheckType::Employment], None)).await;

        assert_eq!(result.status, ScreeningStatus::Completed);
        assert!(result.entity_id.is_some());
        assert!(result.compiled_result.is_some());
        assert!(result.blocked_checks.is_empty());
    }

    #[tokio::test]
    async fn screening_with_no_permitted_checks_is_blocked() {
        let compliance = ComplianceEngine::new(vec![
            ComplianceRule::new("US", CheckType::Financial, false).blocked_because("not permitted in this locale"),
        ]);
        let orchestrator = orchestrator(compliance);
        let result = orchestrator.run(request(TenantId::new(), vec![CheckType::Financial], None)).await;

        assert_eq!(result.status, ScreeningStatus::Blocked);
        assert_eq!(result.blocked_checks.len(), 1);
        assert!(result.entity_id.is_none());
    }

    #[tokio::test]
    async fn consent_required_but_missing_blocks_before_investigation() {
        let compliance = ComplianceEngine::new(vec![]);
        let orchestrator = orchestrator(compliance);
        let result = orchestrator.run(request(TenantId::new(), vec![CheckType::Criminal], None)).await;

        assert_eq!(result.status, ScreeningStatus::Blocked);
        let consent_phase = result.phases.iter().find(|p| p.phase == OrchestratorPhase::Consent).unwrap();
        assert_eq!(consent_phase.status, PhaseStatus::Blocked);
    }

    #[tokio::test]
    async fn a_fired_token_stops_the_run_before_investigation() {
        let compliance = ComplianceEngine::new(vec![ComplianceRule::new("US", CheckType::Employment, true)]);
        let orchestrator = orchestrator(compliance);
        let mut req = request(TenantId::new(), vec![CheckType::Employment], None);
        let token = CancellationToken::new();
        token.cancel();
        req.cancellation = Some(token);
        let result = orchestrator.run(req).await;

        assert_eq!(result.status, ScreeningStatus::Failed);
        assert!(result.compiled_result.is_none());
        let investigation_phase = result.phases.iter().find(|p| p.phase == OrchestratorPhase::Investigation).unwrap();
        assert_eq!(investigation_phase.status, PhaseStatus::Failed);
    }

    #[tokio::test]
    async fn an_unfired_token_never_blocks_a_run() {
        let compliance = ComplianceEngine::new(vec![ComplianceRule::new("US", CheckType::Employment, true)]);
        let orchestrator = orchestrator(compliance);
        let mut req = request(TenantId::new(), vec![CheckType::Employment], None);
        req.cancellation = Some(CancellationToken::new());
        let result = orchestrator.run(req).await;

        assert_eq!(result.status, ScreeningStatus::Completed);
    }

    #[tokio::test]
    async fn d3_on_standard_tier_fails_validation_before_any_other_phase() {
        let compliance = ComplianceEngine::new(vec![]);
        let orchestrator = orchestrator(compliance);
        let mut req = request(TenantId::new(), vec![CheckType::Identity], None);
        req.search_degree = SearchDegree::D3;
        let result = orchestrator.run(req).await;

        assert_eq!(result.status, ScreeningStatus::Failed);
        assert_eq!(result.phases.len(), 1);
        assert_eq!(result.phases[0].phase, OrchestratorPhase::Validation);
    }
}
