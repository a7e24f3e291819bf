//! Severity calculator (spec §4.6): first-applicable-rule over an explicit
//! pattern table, falling back to a sub-category default and finally a
//! config default of MEDIUM, then role-alignment and recency adjustments
//! (each +1 level, capped at CRITICAL). Emits a `SeverityDecision` so the
//! reasoning is itself an audit artifact, not just the final value.

use super::classifier::Category;
use crate::types::{RoleCategory, Severity};
use chrono::{DateTime, Utc};

/// `(pattern substring, severity)`, checked in order against the finding's
/// summary/details text; the first match wins.
const PATTERN_RULES: &[(&str, Severity)] = &[
    ("felony conviction", Severity::Critical),
    ("sexual assault", Severity::Critical),
    ("sex offense", Severity::Critical),
    ("homicide", Severity::Critical),
    ("murder", Severity::Critical),
    ("terrorism", Severity::Critical),
    ("sanctions match", Severity::Critical),
    ("money laundering", Severity::Critical),
    ("child abuse", Severity::Critical),
    ("fraud conviction", Severity::High),
    ("embezzlement", Severity::High),
    ("domestic violence", Severity::High),
    ("weapons charge", Severity::High),
    ("armed robbery", Severity::High),
    ("identity theft", Severity::High),
    ("pep match", Severity::High),
    ("driving under the influence", Severity::Medium),
    ("dui", Severity::Medium),
    ("misdemeanor", Severity::Medium),
    ("civil judgment", Severity::Medium),
    ("bankruptcy filing", Severity::Medium),
    ("tax lien", Severity::Medium),
    ("credential inflation", Severity::Medium),
    ("workplace misconduct", Severity::Medium),
    ("employment gap", Severity::Low),
    ("minor traffic violation", Severity::Low),
    ("parking violation", Severity::Low),
    ("social media post", Severity::Low),
    ("outdated address", Severity::Low),
];

/// Sub-category default severities (rule table's fallback #2), keyed by the
/// exact sub-category strings `Classifier` produces.
fn sub_category_default(sub_category: &str) -> Option<Severity> {
    match sub_category {
        "CRIMINAL_FELONY" | "CRIMINAL_VIOLENT" | "CRIMINAL_DRUG" => Some(Severity::Critical),
        "CRIMINAL_FRAUD" | "CRIMINAL_MISDEMEANOR" | "CRIMINAL_RECORD" => Some(Severity::High),
        "FINANCIAL_BANKRUPTCY" | "FINANCIAL_FRAUD" | "FINANCIAL_JUDGMENT" | "FINANCIAL_TAX_LIEN" => {
            Some(Severity::Medium)
        }
        "FINANCIAL_FORECLOSURE" => Some(Severity::Low),
        "REGULATORY_SANCTIONS" | "REGULATORY_DEBARMENT" => Some(Severity::Critical),
        "REGULATORY_PEP" | "REGULATORY_LICENSE_REVOKED" | "REGULATORY_WATCHLIST" => Some(Severity::High),
        "REPUTATION_ADVERSE_MEDIA" | "REPUTATION_LITIGATION" | "REPUTATION_DEFAMATION" => Some(Severity::Low),
        "REPUTATION_SOCIAL_MEDIA" => Some(Severity::Low),
        "VERIFICATION_CREDENTIAL_INFLATION" | "VERIFICATION_IDENTITY_MISMATCH" => Some(Severity::Medium),
        "VERIFICATION_EMPLOYMENT_GAP" | "VERIFICATION_EDUCATION_DISCREPANCY" => Some(Severity::Low),
        "BEHAVIORAL_TERMINATION_FOR_CAUSE" | "BEHAVIORAL_WORKPLACE_MISCONDUCT" | "BEHAVIORAL_HARASSMENT_COMPLAINT" => {
            Some(Severity::Medium)
        }
        "NETWORK_SANCTIONED_ENTITY_LINK" | "NETWORK_SHELL_COMPANY" => Some(Severity::High),
        "NETWORK_PEP_ASSOCIATION" | "NETWORK_UNDISCLOSED_RELATIONSHIP" => Some(Severity::Medium),
        _ => None,
    }
}

/// Pre-declared role-alignment pairs: a finding in this category, for a
/// subject in this role, is considered more consequential than the rule
/// table alone would indicate.
fn is_role_aligned(category: Category, role: RoleCategory) -> bool {
    matches!(
        (category, role),
        (Category::Criminal, RoleCategory::Government)
            | (Category::Criminal, RoleCategory::Security)
            | (Category::Financial, RoleCategory::Financial)
            | (Category::Regulatory, RoleCategory::Government)
            | (Category::Regulatory, RoleCategory::Financial)
            | (Category::Network, RoleCategory::Security)
            | (Category::Verification, RoleCategory::Education)
            | (Category::Verification, RoleCategory::Healthcare)
    )
}

#[derive(Debug, Clone)]
pub struct SeverityDecision {
    pub initial_severity: Severity,
    pub matched_rule: Option<String>,
    pub adjustments: Vec<String>,
    pub final_severity: Severity,
}

pub struct SeverityCalculator;

impl SeverityCalculator {
    pub fn calculate(
        text: &str,
        sub_category: Option<&str>,
        category: Category,
        role: RoleCategory,
        discovered_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SeverityDecision {
        let lowered = text.to_lowercase();

        let (initial, matched_rule) = PATTERN_RULES
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern))
            .map(|(pattern, severity)| (*severity, Some(pattern.to_string())))
            .or_else(|| sub_category.and_then(sub_category_default).map(|s| (s, None)))
            .unwrap_or((Severity::Medium, None));

        let mut severity = initial;
        let mut adjustments = Vec::new();

        if is_role_aligned(category, role) {
            severity = severity.bump();
            adjustments.push(format!("role_alignment:{:?}x{:?}", category, role));
        }

        if (now - discovered_at).num_days() <= 365 {
            severity = severity.bump();
            adjustments.push("recency:within_365_days".to_string());
        }

        SeverityDecision { initial_severity: initial, matched_rule, adjustments, final_severity: severity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn felony_conviction_pattern_rule_is_critical() {
        let now = Utc::now();
        let decision = SeverityCalculator::calculate(
            "felony conviction for grand theft",
            Some("CRIMINAL_FELONY"),
            Category::Criminal,
            RoleCategory::Standard,
            now - Duration::days(2000),
            now,
        );
        assert_eq!(decision.initial_severity, Severity::Critical);
        assert_eq!(decision.final_severity, Severity::Critical);
    }

    #[test]
    fn role_alignment_and_recency_each_bump_one_level() {
        let now = Utc::now();
        let decision = SeverityCalculator::calculate(
            "civil judgment entered against subject",
            Some("FINANCIAL_JUDGMENT"),
            Category::Financial,
            RoleCategory::Financial,
            now - Duration::days(10),
            now,
        );
        assert_eq!(decision.initial_severity, Severity::Medium);
        assert_eq!(decision.final_severity, Severity::Critical);
        assert_eq!(decision.adjustments.len(), 2);
    }

    #[test]
    fn no_rule_or_sub_category_match_defaults_to_medium() {
        let now = Utc::now();
        let decision = SeverityCalculator::calculate(
            "unremarkable finding",
            None,
            Category::Behavioral,
            RoleCategory::Standard,
            now - Duration::days(2000),
            now,
        );
        assert_eq!(decision.initial_severity, Severity::Medium);
        assert!(decision.matched_rule.is_none());
    }
}
