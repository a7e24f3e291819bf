//! Composite risk scorer (spec §4.6): a per-finding formula
//! (`base_severity * recency_factor * confidence * corroboration * relevance`),
//! summed per category (capped at 100) and then combined into an overall
//! weighted mean, from which `RiskLevel`/`Recommendation` follow via the
//! existing lookup tables in `crate::types`.

use super::classifier::Category;
use crate::sar::Finding;
use crate::types::{Recommendation, RiskLevel};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;

/// Category weights in the overall mean. Categories not listed take 1.0
/// (this covers FINANCIAL and BEHAVIORAL).
const CATEGORY_WEIGHTS: &[(Category, f64)] = &[
    (Category::Criminal, 1.5),
    (Category::Regulatory, 1.3),
    (Category::Verification, 1.2),
    (Category::Network, 0.9),
    (Category::Reputation, 0.8),
];

const DEFAULT_CATEGORY_WEIGHT: f64 = 1.0;

fn category_weight(category: Category) -> f64 {
    CATEGORY_WEIGHTS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, w)| *w)
        .unwrap_or(DEFAULT_CATEGORY_WEIGHT)
}

/// Discrete age buckets, not a continuous decay -- a finding from 13 months
/// ago and one from 35 months ago are both "1-3 years" as far as the score
/// is concerned.
fn recency_factor(discovered_at: chrono::DateTime<Utc>) -> f64 {
    let age_years = (Utc::now() - discovered_at).num_days() as f64 / 365.25;
    if age_years <= 1.0 {
        1.0
    } else if age_years <= 3.0 {
        0.9
    } else if age_years <= 7.0 {
        0.7
    } else {
        0.5
    }
}

fn corroboration_factor(corroborated: bool) -> f64 {
    if corroborated { 1.2 } else { 1.0 }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryScore {
    pub category: Category,
    pub score: f64,
    pub finding_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskScoreResult {
    pub overall_score: f64,
    pub category_scores: Vec<CategoryScore>,
    pub level: RiskLevel,
    pub recommendation: Recommendation,
}

/// One finding paired with the category/relevance `Classifier` assigned it --
/// the scorer never re-derives classification, only consumes it.
pub struct ScoredFinding<'a> {
    pub finding: &'a Finding,
    pub category: Category,
    pub role_relevance: f64,
}

pub struct RiskScorer;

impl RiskScorer {
    /// `base_severity * recency * confidence * corroboration * relevance`.
    pub fn score_finding(scored: &ScoredFinding) -> f64 {
        let base = scored.finding.severity.base_score();
        let recency = recency_factor(scored.finding.discovered_at);
        let confidence = scored.finding.confidence.clamp(0.0, 1.0);
        let corroboration = corroboration_factor(scored.finding.corroborated);
        let relevance = scored.role_relevance.clamp(0.0, 1.0);

        base * recency * confidence * corroboration * relevance
    }

    /// Per-category score is `min(100, sum of finding scores)` -- several
    /// moderate findings in one category can outweigh a single severe one,
    /// which is the point: a category score is about volume of evidence,
    /// not just its worst member.
    pub fn score(findings: &[ScoredFinding]) -> RiskScoreResult {
        let mut by_category: HashMap<Category, Vec<f64>> = HashMap::new();

        for scored in findings {
            by_category.entry(scored.category).or_default().push(Self::score_finding(scored));
        }

        let mut category_scores: Vec<CategoryScore> = by_category
            .iter()
            .map(|(category, scores)| CategoryScore {
                category: *category,
                score: scores.iter().sum::<f64>().min(100.0),
                finding_count: scores.len(),
            })
            .collect();
        category_scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());

        let (weighted_sum, weight_sum) = category_scores.iter().fold((0.0, 0.0), |(sum, weight), cs| {
            let w = category_weight(cs.category);
            (sum + cs.score * w, weight + w)
        });

        let overall_score = if weight_sum > 0.0 { weighted_sum / weight_sum } else { 0.0 };
        let level = RiskLevel::from_score(overall_score);
        let recommendation = Recommendation::from_level(level);

        RiskScoreResult { overall_score, category_scores, level, recommendation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use chrono::Duration;
    use serde_json::json;
    use uuid::Uuid;

    fn finding(severity: Severity, confidence: f64, corroborated: bool, age_days: i64) -> Finding {
        Finding {
            id: Uuid::now_v7(),
            category: "CRIMINAL".to_string(),
            sub_category: None,
            severity,
            confidence,
            relevance_to_role: 1.0,
            summary: "test finding".to_string(),
            details: json!({}),
            corroborated,
            sources: vec!["provider_a".to_string()],
            discovered_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn fresh_corroborated_critical_finding_scores_above_base() {
        let f = finding(Severity::Critical, 1.0, true, 0);
        let scored = ScoredFinding { finding: &f, category: Category::Criminal, role_relevance: 1.0 };
        let score = RiskScorer::score_finding(&scored);
        assert!((score - 90.0).abs() < 0.01);
    }

    #[test]
    fn uncorroborated_low_confidence_finding_scores_lower_than_fresh() {
        let f = finding(Severity::Critical, 0.5, false, 0);
        let scored = ScoredFinding { finding: &f, category: Category::Criminal, role_relevance: 1.0 };
        let score = RiskScorer::score_finding(&scored);
        assert!(score < 75.0 * 0.5 * 1.2);
    }

    #[test]
    fn category_score_sums_rather_than_averages_findings() {
        let a = finding(Severity::Medium, 1.0, false, 0);
        let b = finding(Severity::Medium, 1.0, false, 0);
        let findings = vec![
            ScoredFinding { finding: &a, category: Category::Financial, role_relevance: 1.0 },
            ScoredFinding { finding: &b, category: Category::Financial, role_relevance: 1.0 },
        ];
        let result = RiskScorer::score(&findings);
        let financial = result.category_scores.iter().find(|c| c.category == Category::Financial).unwrap();
        assert!((financial.score - 50.0).abs() < 0.01);
    }

    #[test]
    fn overall_score_weights_criminal_above_reputation() {
        let criminal = finding(Severity::High, 1.0, true, 0);
        let reputation = finding(Severity::High, 1.0, true, 0);
        let findings = vec![
            ScoredFinding { finding: &criminal, category: Category::Criminal, role_relevance: 1.0 },
            ScoredFinding { finding: &reputation, category: Category::Reputation, role_relevance: 1.0 },
        ];
        let result = RiskScorer::score(&findings);
        let criminal_score = result.category_scores.iter().find(|c| c.category == Category::Criminal).unwrap().score;
        assert!(result.overall_score < criminal_score);
        assert!(result.overall_score > 0.0);
    }

    #[test]
    fn empty_findings_score_zero_and_low_risk() {
        let result = RiskScorer::score(&[]);
        assert_eq!(result.overall_score, 0.0);
        assert_eq!(result.level, RiskLevel::Low);
    }
}
