//! Result compiler (spec §4.8): turns one investigation's raw SAR output and
//! the risk pipeline's scoring artifacts into the compact, screening-facing
//! `CompiledResult` a report renderer actually consumes -- counts, a short
//! narrative, and a confidence-filtered finding list, not the full internal
//! SAR state (iteration-by-iteration facts, every query attempted).

use crate::risk::{AnomalySummary, GraphConnectionSummary, PatternSummary, RiskScoreResult};
use crate::sar::{Finding, InvestigationOutcome};
use crate::types::{CompletionReason, InformationType, RiskLevel, Severity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Findings below this confidence never reach a compiled result -- they stay
/// visible in the knowledge base for audit/debugging but aren't actionable
/// enough to report on.
const MIN_FINDING_CONFIDENCE: f64 = 0.5;

/// Per-category cap on how many findings `FindingsSummary::top_findings`
/// carries; the full (filtered) list is still available on `CompiledResult`.
const TOP_FINDINGS_PER_CATEGORY: usize = 5;

/// Sub-categories (see `risk::classifier::KEYWORD_FAMILIES`) that count
/// toward the connection summary's PEP / sanctions / shell-company tallies.
const PEP_SUB_CATEGORIES: &[&str] = &["REGULATORY_PEP", "NETWORK_PEP_ASSOCIATION"];
const SANCTIONS_SUB_CATEGORIES: &[&str] = &["REGULATORY_SANCTIONS", "NETWORK_SANCTIONED_ENTITY_LINK"];
const SHELL_COMPANY_SUB_CATEGORIES: &[&str] = &["NETWORK_SHELL_COMPANY"];

#[derive(Debug, Clone, Serialize)]
pub struct FindingsSummary {
    pub total: usize,
    pub by_category: HashMap<String, usize>,
    pub by_severity: HashMap<Severity, usize>,
    /// Top `TOP_FINDINGS_PER_CATEGORY` findings per category, most severe
    /// (then most recent) first.
    pub top_findings: HashMap<String, Vec<Finding>>,
    pub narrative: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeSummary {
    pub info_type: InformationType,
    pub iterations: u32,
    pub queries_executed: usize,
    pub confidence: f64,
    pub completion_reason: Option<CompletionReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestigationSummary {
    pub per_type: Vec<TypeSummary>,
    pub halted: bool,
    pub halt_reason: Option<String>,
}

/// Distinct from `risk::connection::ConnectionSummary` (the graph-walk
/// output keyed by subject/contributions): this is the report-facing rollup
/// of what the network phases turned up.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub discovered_d2_entities: usize,
    pub discovered_d3_entities: usize,
    pub pep_hits: usize,
    pub sanctions_hits: usize,
    pub shell_company_markers: usize,
    pub max_propagated_risk: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledResult {
    pub screening_id: Uuid,
    pub entity_id: Uuid,
    pub overall_risk: RiskScoreResult,
    pub findings_summary: FindingsSummary,
    pub investigation_summary: InvestigationSummary,
    pub connection_summary: ConnectionSummary,
    pub pattern_summary: PatternSummary,
    pub anomaly_summary: AnomalySummary,
    pub findings: Vec<Finding>,
    pub compiled_at: DateTime<Utc>,
}

impl CompiledResult {
    /// Wraps a compiled result in the envelope the orchestrator hands back
    /// to callers, pairing it with the phase trail accumulated on the way
    /// here. A completed compile always yields `ScreeningStatus::Completed`;
    /// callers that fail or get blocked before compilation build
    /// `ScreeningResult` directly instead of going through this path.
    pub fn to_screening_result(
        self,
        phases: Vec<crate::orchestrator::PhaseRecord>,
        blocked_checks: Vec<(InformationType, String)>,
    ) -> crate::orchestrator::ScreeningResult {
        crate::orchestrator::ScreeningResult {
            screening_id: self.screening_id,
            entity_id: Some(self.entity_id),
            status: crate::orchestrator::ScreeningStatus::Completed,
            phases,
            blocked_checks,
            compiled_result: Some(self),
            error: None,
        }
    }
}

pub struct ResultCompiler;

impl ResultCompiler {
    #[allow(clippy::too_many_arguments)]
    pub fn compile(
        screening_id: Uuid,
        entity_id: Uuid,
        outcome: &InvestigationOutcome,
        overall_risk: RiskScoreResult,
        pattern_summary: PatternSummary,
        anomaly_summary: AnomalySummary,
        connection: Option<GraphConnectionSummary>,
    ) -> CompiledResult {
        let findings: Vec<Finding> =
            outcome.findings.iter().filter(|f| f.confidence >= MIN_FINDING_CONFIDENCE).cloned().collect();

        let findings_summary = Self::summarize_findings(&findings, &overall_risk);
        let investigation_summary = Self::summarize_investigation(outcome);
        let connection_summary = Self::summarize_connections(outcome, &findings, connection.as_ref());

        CompiledResult {
            screening_id,
            entity_id,
            overall_risk,
            findings_summary,
            investigation_summary,
            connection_summary,
            pattern_summary,
            anomaly_summary,
            findings,
            compiled_at: Utc::now(),
        }
    }

    fn summarize_findings(findings: &[Finding], risk: &RiskScoreResult) -> FindingsSummary {
        let mut by_category: HashMap<String, usize> = HashMap::new();
        let mut by_severity: HashMap<Severity, usize> = HashMap::new();
        let mut grouped: HashMap<String, Vec<Finding>> = HashMap::new();

        for finding in findings {
            *by_category.entry(finding.category.clone()).or_insert(0) += 1;
            *by_severity.entry(finding.severity).or_insert(0) += 1;
            grouped.entry(finding.category.clone()).or_default().push(finding.clone());
        }

        let mut top_findings = HashMap::new();
        for (category, mut group) in grouped {
            group.sort_by(|a, b| (b.severity as u8, b.discovered_at).cmp(&(a.severity as u8, a.discovered_at)));
            group.truncate(TOP_FINDINGS_PER_CATEGORY);
            top_findings.insert(category, group);
        }

        let critical_count = by_severity.get(&Severity::Critical).copied().unwrap_or(0);
        let high_count = by_severity.get(&Severity::High).copied().unwrap_or(0);
        let narrative = if findings.is_empty() {
            "No reportable findings; subject screened clean.".to_string()
        } else {
            format!(
                "{} finding(s) across {} categor{} ({} critical, {} high). Overall risk: {:?} ({}).",
                findings.len(),
                by_category.len(),
                if by_category.len() == 1 { "y" } else { "ies" },
                critical_count,
                high_count,
                risk.level,
                risk_level_label(risk.level),
            )
        };

        FindingsSummary { total: findings.len(), by_category, by_severity, top_findings, narrative }
    }

    fn summarize_investigation(outcome: &InvestigationOutcome) -> InvestigationSummary {
        let per_type = outcome
            .type_outcomes
            .iter()
            .map(|t| TypeSummary {
                info_type: t.info_type,
                iterations: t.state.iteration_count(),
                queries_executed: t.state.iterations.iter().map(|i| i.queries_executed).sum(),
                confidence: t.state.current_confidence(),
                completion_reason: t.state.completion_reason,
            })
            .collect();

        InvestigationSummary { per_type, halted: outcome.halted, halt_reason: outcome.halt_reason.clone() }
    }

    fn summarize_connections(
        outcome: &InvestigationOutcome,
        findings: &[Finding],
        connection: Option<&GraphConnectionSummary>,
    ) -> ConnectionSummary {
        let discovered_d2_entities = outcome
            .type_outcomes
            .iter()
            .filter(|t| t.info_type == InformationType::NetworkDepth2)
            .map(|t| t.discovered_entities.len())
            .sum();
        let discovered_d3_entities = outcome
            .type_outcomes
            .iter()
            .filter(|t| t.info_type == InformationType::NetworkDepth3)
            .map(|t| t.discovered_entities.len())
            .sum();

        let has_sub_category = |names: &[&str]| {
            findings
                .iter()
                .filter(|f| f.sub_category.as_deref().map(|s| names.contains(&s)).unwrap_or(false))
                .count()
        };

        ConnectionSummary {
            discovered_d2_entities,
            discovered_d3_entities,
            pep_hits: has_sub_category(PEP_SUB_CATEGORIES),
            sanctions_hits: has_sub_category(SANCTIONS_SUB_CATEGORIES),
            shell_company_markers: has_sub_category(SHELL_COMPANY_SUB_CATEGORIES),
            max_propagated_risk: connection.map(|c| c.aggregated_risk).unwrap_or(0.0),
        }
    }
}

fn risk_level_label(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "proceed",
        RiskLevel::Moderate => "proceed with caution",
        RiskLevel::High => "review required",
        RiskLevel::Critical => "do not proceed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{AnomalyDetector, CategoryScore, PatternRecognizer};
    use crate::sar::{KnowledgeBase, SarTypeState, TypeOutcome};
    use crate::types::Recommendation;
    use serde_json::json;

    fn finding(category: &str, severity: Severity, confidence: f64) -> Finding {
        Finding {
            id: Uuid::now_v7(),
            category: category.to_string(),
            sub_category: None,
            severity,
            confidence,
            relevance_to_role: 1.0,
            summary: "a finding".to_string(),
            details: json!({}),
            corroborated: false,
            sources: vec!["provider_a".to_string()],
            discovered_at: Utc::now(),
        }
    }

    fn empty_outcome(findings: Vec<Finding>) -> InvestigationOutcome {
        let mut state = SarTypeState::new(InformationType::Criminal);
        state.completion_reason = Some(CompletionReason::ConfidenceMet);
        InvestigationOutcome {
            knowledge_base: KnowledgeBase::new(),
            type_outcomes: vec![TypeOutcome {
                info_type: InformationType::Criminal,
                state,
                findings: findings.clone(),
                inconsistencies: vec![],
                discovered_entities: vec![],
            }],
            findings,
            inconsistencies: vec![],
            discovered_entities: vec![],
            halted: false,
            halt_reason: None,
        }
    }

    fn empty_risk() -> RiskScoreResult {
        RiskScoreResult {
            overall_score: 0.0,
            category_scores: Vec::<CategoryScore>::new(),
            level: RiskLevel::Low,
            recommendation: Recommendation::Proceed,
        }
    }

    #[test]
    fn low_confidence_findings_are_excluded_from_compiled_result() {
        let findings = vec![finding("CRIMINAL", Severity::High, 0.3), finding("CRIMINAL", Severity::High, 0.9)];
        let outcome = empty_outcome(findings);
        let result = ResultCompiler::compile(
            Uuid::now_v7(),
            Uuid::now_v7(),
            &outcome,
            empty_risk(),
            PatternRecognizer::analyze(&outcome.findings),
            AnomalyDetector::analyze(&[]),
            None,
        );
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings_summary.total, 1);
    }

    #[test]
    fn empty_findings_produce_clean_narrative() {
        let outcome = empty_outcome(vec![]);
        let result = ResultCompiler::compile(
            Uuid::now_v7(),
            Uuid::now_v7(),
            &outcome,
            empty_risk(),
            PatternRecognizer::analyze(&[]),
            AnomalyDetector::analyze(&[]),
            None,
        );
        assert!(result.findings_summary.narrative.contains("clean"));
    }

    #[test]
    fn investigation_summary_carries_one_entry_per_type() {
        let outcome = empty_outcome(vec![]);
        let result = ResultCompiler::compile(
            Uuid::now_v7(),
            Uuid::now_v7(),
            &outcome,
            empty_risk(),
            PatternRecognizer::analyze(&[]),
            AnomalyDetector::analyze(&[]),
            None,
        );
        assert_eq!(result.investigation_summary.per_type.len(), 1);
        assert_eq!(result.investigation_summary.per_type[0].info_type, InformationType::Criminal);
    }
}
