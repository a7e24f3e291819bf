//! Finding classifier (spec §4.6): keyword families map finding text to a
//! fixed category set plus 30+ sub-categories, and a Role-Relevance Matrix
//! scores each `(category, role)` pair in `[0,1]`. An AI-proposed category is
//! accepted only when rule-derived keyword evidence agrees with it; the rule
//! path is always computed and is authoritative on disagreement.

use crate::types::RoleCategory;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Criminal,
    Financial,
    Regulatory,
    Reputation,
    Verification,
    Behavioral,
    Network,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One AI-proposed or rule-proposed classification to reconcile.
#[derive(Debug, Clone)]
pub struct ClassificationProposal {
    pub category: Category,
    pub sub_category: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub original_category: Option<Category>,
    pub original_sub_category: Option<String>,
    pub category: Category,
    pub sub_category: Option<String>,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
    pub role_relevance: f64,
    pub was_reclassified: bool,
}

/// `(keyword substring, category, sub_category)`. Matching is
/// case-insensitive substring search over the finding's summary/details
/// text; the first match by table order wins the rule-derived category.
const KEYWORD_FAMILIES: &[(&str, Category, &str)] = &[
    ("felony", Category::Criminal, "CRIMINAL_FELONY"),
    ("misdemeanor", Category::Criminal, "CRIMINAL_MISDEMEANOR"),
    ("assault", Category::Criminal, "CRIMINAL_VIOLENT"),
    ("violent", Category::Criminal, "CRIMINAL_VIOLENT"),
    ("narcotics", Category::Criminal, "CRIMINAL_DRUG"),
    ("drug", Category::Criminal, "CRIMINAL_DRUG"),
    ("criminal fraud", Category::Criminal, "CRIMINAL_FRAUD"),
    ("embezzlement", Category::Criminal, "CRIMINAL_FRAUD"),
    ("criminal_record", Category::Criminal, "CRIMINAL_RECORD"),
    ("bankruptcy", Category::Financial, "FINANCIAL_BANKRUPTCY"),
    ("tax lien", Category::Financial, "FINANCIAL_TAX_LIEN"),
    ("financial fraud", Category::Financial, "FINANCIAL_FRAUD"),
    ("judgment", Category::Financial, "FINANCIAL_JUDGMENT"),
    ("foreclosure", Category::Financial, "FINANCIAL_FORECLOSURE"),
    ("politically exposed", Category::Regulatory, "REGULATORY_PEP"),
    ("pep_match", Category::Regulatory, "REGULATORY_PEP"),
    ("sanction", Category::Regulatory, "REGULATORY_SANCTIONS"),
    ("license revoked", Category::Regulatory, "REGULATORY_LICENSE_REVOKED"),
    ("debarred", Category::Regulatory, "REGULATORY_DEBARMENT"),
    ("debarment", Category::Regulatory, "REGULATORY_DEBARMENT"),
    ("watchlist", Category::Regulatory, "REGULATORY_WATCHLIST"),
    ("adverse media", Category::Reputation, "REPUTATION_ADVERSE_MEDIA"),
    ("adverse_media", Category::Reputation, "REPUTATION_ADVERSE_MEDIA"),
    ("litigation", Category::Reputation, "REPUTATION_LITIGATION"),
    ("lawsuit", Category::Reputation, "REPUTATION_LITIGATION"),
    ("social media", Category::Reputation, "REPUTATION_SOCIAL_MEDIA"),
    ("defamation", Category::Reputation, "REPUTATION_DEFAMATION"),
    ("employment gap", Category::Verification, "VERIFICATION_EMPLOYMENT_GAP"),
    ("credential inflation", Category::Verification, "VERIFICATION_CREDENTIAL_INFLATION"),
    ("identity mismatch", Category::Verification, "VERIFICATION_IDENTITY_MISMATCH"),
    ("education discrepancy", Category::Verification, "VERIFICATION_EDUCATION_DISCREPANCY"),
    ("terminated for cause", Category::Behavioral, "BEHAVIORAL_TERMINATION_FOR_CAUSE"),
    ("workplace misconduct", Category::Behavioral, "BEHAVIORAL_WORKPLACE_MISCONDUCT"),
    ("harassment", Category::Behavioral, "BEHAVIORAL_HARASSMENT_COMPLAINT"),
    ("shell company", Category::Network, "NETWORK_SHELL_COMPANY"),
    ("pep association", Category::Network, "NETWORK_PEP_ASSOCIATION"),
    ("sanctioned entity", Category::Network, "NETWORK_SANCTIONED_ENTITY_LINK"),
    ("undisclosed relationship", Category::Network, "NETWORK_UNDISCLOSED_RELATIONSHIP"),
];

/// `(category, role) -> [0,1]` relevance weight used by the risk scorer's
/// per-finding formula. Categories not special-cased for a role fall back to
/// the category's baseline.
pub struct RoleRelevanceMatrix;

impl RoleRelevanceMatrix {
    pub fn relevance(category: Category, role: RoleCategory) -> f64 {
        use Category::*;
        use RoleCategory::*;

        match (category, role) {
            (Criminal, Government) | (Criminal, Security) => 1.0,
            (Criminal, Healthcare) | (Criminal, Transportation) => 0.9,
            (Criminal, Executive) | (Criminal, Financial) => 0.8,
            (Criminal, Standard) => 0.7,

            (Financial, Financial) => 1.0,
            (Financial, Executive) => 0.9,
            (Financial, Government) => 0.8,

            (Regulatory, Financial) | (Regulatory, Government) => 1.0,
            (Regulatory, Executive) => 0.9,

            (Reputation, Executive) => 0.9,
            (Reputation, Government) => 0.8,

            (Verification, Education) | (Verification, Healthcare) => 0.9,

            (Behavioral, Healthcare) | (Behavioral, Education) => 0.8,

            (Network, Government) | (Network, Security) => 0.9,
            (Network, Financial) => 0.8,

            _ => category.baseline_relevance(),
        }
    }
}

impl Category {
    fn baseline_relevance(self) -> f64 {
        match self {
            Category::Criminal => 0.7,
            Category::Financial => 0.6,
            Category::Regulatory => 0.7,
            Category::Reputation => 0.5,
            Category::Verification => 0.6,
            Category::Behavioral => 0.5,
            Category::Network => 0.6,
        }
    }
}

pub struct Classifier;

impl Classifier {
    /// Rule-derived classification from free text (a finding's
    /// `summary`/`details` concatenated). Returns `None` if no keyword
    /// family matches.
    pub fn classify_by_rules(text: &str) -> Option<(Category, &'static str, Vec<String>)> {
        let lowered = text.to_lowercase();
        let mut matched = Vec::new();
        let mut result: Option<(Category, &'static str)> = None;

        for (keyword, category, sub_category) in KEYWORD_FAMILIES {
            if lowered.contains(keyword) {
                matched.push(keyword.to_string());
                if result.is_none() {
                    result = Some((*category, sub_category));
                }
            }
        }

        result.map(|(category, sub_category)| (category, sub_category, matched))
    }

    /// Reconciles an optional AI proposal against rule-derived keyword
    /// evidence (spec §4.5's "AI label kept only when rule-derived keyword
    /// evidence is present with confidence >= min_validation_confidence").
    pub fn classify(
        text: &str,
        ai_proposal: Option<ClassificationProposal>,
        role: RoleCategory,
    ) -> ClassificationResult {
        const MIN_VALIDATION_CONFIDENCE: f64 = 0.7;

        let rule_result = Self::classify_by_rules(text);

        let (final_category, final_sub_category, confidence, matched_keywords) = match (&ai_proposal, &rule_result) {
            (Some(proposal), Some((rule_category, rule_sub, keywords)))
                if proposal.confidence >= MIN_VALIDATION_CONFIDENCE && proposal.category == *rule_category =>
            {
                (proposal.category, proposal.sub_category.clone(), proposal.confidence, keywords.clone())
            }
            (_, Some((rule_category, rule_sub, keywords))) => {
                (*rule_category, Some(rule_sub.to_string()), 0.6, keywords.clone())
            }
            (Some(proposal), None) => (proposal.category, proposal.sub_category.clone(), proposal.confidence, Vec::new()),
            (None, None) => (Category::Behavioral, None, 0.0, Vec::new()),
        };

        let was_reclassified = ai_proposal
            .as_ref()
            .map(|p| p.category != final_category || p.sub_category != final_sub_category)
            .unwrap_or(false);

        ClassificationResult {
            original_category: ai_proposal.as_ref().map(|p| p.category),
            original_sub_category: ai_proposal.and_then(|p| p.sub_category),
            category: final_category,
            sub_category: final_sub_category,
            confidence,
            matched_keywords,
            role_relevance: RoleRelevanceMatrix::relevance(final_category, role),
            was_reclassified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn felony_keyword_maps_to_criminal_felony() {
        let (category, sub, keywords) = Classifier::classify_by_rules("felony conviction on record").unwrap();
        assert_eq!(category, Category::Criminal);
        assert_eq!(sub, "CRIMINAL_FELONY");
        assert!(keywords.contains(&"felony".to_string()));
    }

    #[test]
    fn unmatched_text_has_no_rule_classification() {
        assert!(Classifier::classify_by_rules("unremarkable employment history").is_none());
    }

    #[test]
    fn criminal_is_maximally_relevant_to_government_role() {
        assert_eq!(RoleRelevanceMatrix::relevance(Category::Criminal, RoleCategory::Government), 1.0);
        assert_eq!(RoleRelevanceMatrix::relevance(Category::Criminal, RoleCategory::Standard), 0.7);
    }

    #[test]
    fn low_confidence_ai_proposal_disagreeing_with_rules_is_reclassified() {
        let result = Classifier::classify(
            "felony conviction for theft",
            Some(ClassificationProposal { category: Category::Reputation, sub_category: None, confidence: 0.9 }),
            RoleCategory::Standard,
        );
        assert_eq!(result.category, Category::Criminal);
        assert!(result.was_reclassified);
    }

    #[test]
    fn agreeing_ai_proposal_above_threshold_is_kept() {
        let result = Classifier::classify(
            "felony conviction for theft",
            Some(ClassificationProposal {
                category: Category::Criminal,
                sub_category: Some("CRIMINAL_THEFT".to_string()),
                confidence: 0.85,
            }),
            RoleCategory::Standard,
        );
        assert_eq!(result.sub_category.as_deref(), Some("CRIMINAL_THEFT"));
        assert!(!result.was_reclassified);
    }
}
