//! Anomaly detector (spec §4.6): turns the SAR loop's raw `Inconsistency`
//! list into a single deception score in `[0,1]`. A handful of unrelated
//! date typos is noise; the same handful all understating the subject's
//! disadvantage, or spread across independent information domains, or
//! repeating verbatim, is signal -- hence three multipliers rather than a
//! flat count.

use crate::sar::{Inconsistency, InconsistencyKind};
use crate::types::Severity;
use serde::Serialize;
use std::collections::HashSet;

const DIRECTIONAL_BIAS_MULTIPLIER: f64 = 1.2;
const CROSS_DOMAIN_MULTIPLIER: f64 = 1.15;
const SYSTEMATIC_MULTIPLIER: f64 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeceptionLevel {
    None,
    Low,
    Moderate,
    High,
    Critical,
}

impl DeceptionLevel {
    fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            DeceptionLevel::Critical
        } else if score >= 0.5 {
            DeceptionLevel::High
        } else if score >= 0.3 {
            DeceptionLevel::Moderate
        } else if score >= 0.1 {
            DeceptionLevel::Low
        } else {
            DeceptionLevel::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalySignal {
    /// Every inconsistency understates something disadvantageous to the
    /// subject (a hidden gap, an inflated credential) rather than being
    /// evenly mixed with neutral or subject-unfavorable discrepancies.
    DirectionalBias { favorable_count: usize, total: usize },
    /// Inconsistencies appear in three or more distinct information types.
    CrossDomain { domains: usize },
    /// The same inconsistency kind recurs three or more times.
    Systematic { kind: InconsistencyKind, count: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalySummary {
    pub deception_score: f64,
    pub level: DeceptionLevel,
    pub signals: Vec<AnomalySignal>,
}

/// Kinds that favor the subject by concealing something, as opposed to
/// neutral discrepancies like minor date transpositions.
fn favors_subject(kind: InconsistencyKind) -> bool {
    matches!(
        kind,
        InconsistencyKind::EmploymentGapHidden | InconsistencyKind::CredentialInflation | InconsistencyKind::TimelineImpossible
    )
}

/// Per-inconsistency contribution to the base score before multipliers,
/// chosen so two or three Medium-severity inconsistencies alone land in the
/// LOW band and a cluster of High/Critical ones can reach HIGH without help
/// from the multipliers.
fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 0.04,
        Severity::Medium => 0.08,
        Severity::High => 0.15,
        Severity::Critical => 0.25,
    }
}

pub struct AnomalyDetector;

impl AnomalyDetector {
    pub fn analyze(inconsistencies: &[Inconsistency]) -> AnomalySummary {
        if inconsistencies.is_empty() {
            return AnomalySummary { deception_score: 0.0, level: DeceptionLevel::None, signals: Vec::new() };
        }

        let base: f64 = inconsistencies.iter().map(|i| severity_weight(i.severity_hint)).sum();

        let mut signals = Vec::new();
        let mut multiplier = 1.0;

        let favorable_count = inconsistencies.iter().filter(|i| favors_subject(i.kind)).count();
        if favorable_count == inconsistencies.len() && inconsistencies.len() >= 2 {
            multiplier *= DIRECTIONAL_BIAS_MULTIPLIER;
            signals.push(AnomalySignal::DirectionalBias { favorable_count, total: inconsistencies.len() });
        }

        let domains: HashSet<_> = inconsistencies.iter().map(|i| i.info_type).collect();
        if domains.len() >= 3 {
            multiplier *= CROSS_DOMAIN_MULTIPLIER;
            signals.push(AnomalySignal::CrossDomain { domains: domains.len() });
        }

        let mut by_kind: std::collections::HashMap<InconsistencyKind, usize> = std::collections::HashMap::new();
        for i in inconsistencies {
            *by_kind.entry(i.kind).or_insert(0) += 1;
        }
        for (kind, count) in by_kind {
            if count >= 3 {
                multiplier *= SYSTEMATIC_MULTIPLIER;
                signals.push(AnomalySignal::Systematic { kind, count });
            }
        }

        let deception_score = (base * multiplier).min(1.0);
        let level = DeceptionLevel::from_score(deception_score);

        AnomalySummary { deception_score, level, signals }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InformationType;

    fn inconsistency(kind: InconsistencyKind, info_type: InformationType, severity: Severity) -> Inconsistency {
        Inconsistency { kind, description: "test".to_string(), info_type, severity_hint: severity }
    }

    #[test]
    fn no_inconsistencies_means_no_deception_signal() {
        let summary = AnomalyDetector::analyze(&[]);
        assert_eq!(summary.level, DeceptionLevel::None);
        assert_eq!(summary.deception_score, 0.0);
    }

    #[test]
    fn all_subject_favorable_inconsistencies_trigger_directional_bias() {
        let inconsistencies = vec![
            inconsistency(InconsistencyKind::EmploymentGapHidden, InformationType::Employment, Severity::Medium),
            inconsistency(InconsistencyKind::CredentialInflation, InformationType::Education, Severity::Medium),
        ];
        let summary = AnomalyDetector::analyze(&inconsistencies);
        assert!(summary.signals.iter().any(|s| matches!(s, AnomalySignal::DirectionalBias { .. })));
    }

    #[test]
    fn mixed_favorable_and_neutral_inconsistencies_do_not_trigger_directional_bias() {
        let inconsistencies = vec![
            inconsistency(InconsistencyKind::EmploymentGapHidden, InformationType::Employment, Severity::Medium),
            inconsistency(InconsistencyKind::DateMinor, InformationType::Identity, Severity::Low),
        ];
        let summary = AnomalyDetector::analyze(&inconsistencies);
        assert!(!summary.signals.iter().any(|s| matches!(s, AnomalySignal::DirectionalBias { .. })));
    }

    #[test]
    fn repeated_kind_three_times_is_systematic_and_cross_domain() {
        let inconsistencies = vec![
            inconsistency(InconsistencyKind::AddressMismatch, InformationType::Identity, Severity::Low),
            inconsistency(InconsistencyKind::AddressMismatch, InformationType::Employment, Severity::Low),
            inconsistency(InconsistencyKind::AddressMismatch, InformationType::Financial, Severity::Low),
        ];
        let summary = AnomalyDetector::analyze(&inconsistencies);
        assert!(summary.signals.iter().any(|s| matches!(s, AnomalySignal::Systematic { count: 3, .. })));
        assert!(summary.signals.iter().any(|s| matches!(s, AnomalySignal::CrossDomain { .. })));
    }

    #[test]
    fn deception_score_never_exceeds_one() {
        let inconsistencies: Vec<_> = (0..10)
            .map(|_| inconsistency(InconsistencyKind::CredentialInflation, InformationType::Education, Severity::Critical))
            .collect();
        let summary = AnomalyDetector::analyze(&inconsistencies);
        assert!(summary.deception_score <= 1.0);
        assert_eq!(summary.level, DeceptionLevel::Critical);
    }
}
