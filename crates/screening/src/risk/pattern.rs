//! Pattern recognizer (spec §4.6): looks across a subject's findings for
//! shapes that a single finding can't show on its own -- severity escalating
//! release over release, or several findings clustering in a short window.

use crate::sar::Finding;
use crate::types::Severity;
use chrono::Duration;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternSignal {
    /// Findings within the same category got more severe as they got more
    /// recent (oldest-to-newest severity is non-decreasing and increases at
    /// least once).
    EscalatingSeverity { category: String, from: Severity, to: Severity },
    /// Three or more findings discovered within a 30-day window.
    BurstActivity { window_days: i64, count: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternSummary {
    pub signals: Vec<PatternSignal>,
}

const BURST_WINDOW_DAYS: i64 = 30;
const BURST_MIN_COUNT: usize = 3;

pub struct PatternRecognizer;

impl PatternRecognizer {
    pub fn analyze(findings: &[Finding]) -> PatternSummary {
        let mut signals = Vec::new();
        signals.extend(Self::escalation_signals(findings));
        if let Some(burst) = Self::burst_signal(findings) {
            signals.push(burst);
        }
        PatternSummary { signals }
    }

    fn escalation_signals(findings: &[Finding]) -> Vec<PatternSignal> {
        let mut by_category: std::collections::HashMap<&str, Vec<&Finding>> = std::collections::HashMap::new();
        for f in findings {
            by_category.entry(f.category.as_str()).or_default().push(f);
        }

        let mut signals = Vec::new();
        for (category, mut group) in by_category {
            if group.len() < 2 {
                continue;
            }
            group.sort_by_key(|f| f.discovered_at);
            let first = group.first().unwrap().severity;
            let last = group.last().unwrap().severity;
            let non_decreasing = group.windows(2).all(|w| w[1].severity as u8 >= w[0].severity as u8);
            if non_decreasing && (last as u8) > (first as u8) {
                signals.push(PatternSignal::EscalatingSeverity {
                    category: category.to_string(),
                    from: first,
                    to: last,
                });
            }
        }
        signals
    }

    fn burst_signal(findings: &[Finding]) -> Option<PatternSignal> {
        if findings.len() < BURST_MIN_COUNT {
            return None;
        }
        let mut dates: Vec<_> = findings.iter().map(|f| f.discovered_at).collect();
        dates.sort();

        for window in dates.windows(BURST_MIN_COUNT) {
            let span = window[window.len() - 1] - window[0];
            if span <= Duration::days(BURST_WINDOW_DAYS) {
                return Some(PatternSignal::BurstActivity { window_days: BURST_WINDOW_DAYS, count: dates.len() });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn finding(category: &str, severity: Severity, days_ago: i64) -> Finding {
        Finding {
            id: Uuid::now_v7(),
            category: category.to_string(),
            sub_category: None,
            severity,
            confidence: 0.9,
            relevance_to_role: 1.0,
            summary: "finding".to_string(),
            details: json!({}),
            corroborated: true,
            sources: vec!["provider_a".to_string()],
            discovered_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn increasing_severity_over_time_is_flagged_as_escalation() {
        let findings = vec![
            finding("CRIMINAL", Severity::Low, 400),
            finding("CRIMINAL", Severity::Medium, 200),
            finding("CRIMINAL", Severity::High, 10),
        ];
        let summary = PatternRecognizer::analyze(&findings);
        assert!(summary
            .signals
            .iter()
            .any(|s| matches!(s, PatternSignal::EscalatingSeverity { category, .. } if category == "CRIMINAL")));
    }

    #[test]
    fn three_findings_within_30_days_is_a_burst() {
        let findings =
            vec![finding("FINANCIAL", Severity::Low, 20), finding("FINANCIAL", Severity::Low, 10), finding("REGULATORY", Severity::Low, 1)];
        let summary = PatternRecognizer::analyze(&findings);
        assert!(summary.signals.iter().any(|s| matches!(s, PatternSignal::BurstActivity { .. })));
    }

    #[test]
    fn sparse_unrelated_findings_produce_no_signals() {
        let findings = vec![finding("CRIMINAL", Severity::Low, 900), finding("FINANCIAL", Severity::Medium, 5)];
        let summary = PatternRecognizer::analyze(&findings);
        assert!(summary.signals.is_empty());
    }
}
