//! Jurisdiction-aware permission evaluation (spec §4.3). Pure and
//! context-free: `evaluate` takes its inputs as plain arguments rather than
//! reading the ambient `RequestContext`, so repeated calls with equal
//! arguments are guaranteed to return equal results (spec §8's idempotence
//! law) without needing `PartialEq` gymnastics around time or I/O.

use crate::types::{CheckType, InformationType, RoleCategory, SearchDegree, ServiceTier};
use screening_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One compliance rule. A rule missing `role_category` applies to every
/// role at that (locale, check_type); a rule with neither `role_category`
/// nor a narrower locale match is the (locale, check_type) fallback tier in
/// the lookup order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRule {
    pub locale: String,
    pub check_type: CheckType,
    pub role_category: Option<RoleCategory>,
    pub permitted: bool,
    pub lookback_days: Option<i64>,
    pub requires_consent: bool,
    pub requires_disclosure: bool,
    pub block_reason: Option<String>,
}

impl ComplianceRule {
    pub fn new(locale: impl Into<String>, check_type: CheckType, permitted: bool) -> Self {
        Self {
            locale: locale.into(),
            check_type,
            role_category: None,
            permitted,
            lookback_days: None,
            requires_consent: false,
            requires_disclosure: false,
            block_reason: None,
        }
    }

    pub fn for_role(mut self, role: RoleCategory) -> Self {
        self.role_category = Some(role);
        self
    }

    pub fn with_lookback(mut self, days: i64) -> Self {
        self.lookback_days = Some(days);
        self
    }

    pub fn requiring_consent(mut self) -> Self {
        self.requires_consent = true;
        self
    }

    pub fn requiring_disclosure(mut self) -> Self {
        self.requires_disclosure = true;
        self
    }

    pub fn blocked_because(mut self, reason: impl Into<String>) -> Self {
        self.permitted = false;
        self.block_reason = Some(reason.into());
        self
    }
}

/// Result of `ComplianceEngine::evaluate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDecision {
    pub permitted: bool,
    pub restrictions: Vec<String>,
    pub block_reason: Option<String>,
    pub requires_consent: bool,
    pub requires_disclosure: bool,
    pub lookback_days: Option<i64>,
}

impl ComplianceDecision {
    fn permissive_default() -> Self {
        Self {
            permitted: true,
            restrictions: Vec::new(),
            block_reason: None,
            requires_consent: false,
            requires_disclosure: false,
            lookback_days: None,
        }
    }
}

/// Outcome of `validate_service_config`: hard errors abort screening setup,
/// warnings are surfaced but don't block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfigValidation {
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ComplianceEngine {
    rules: Vec<ComplianceRule>,
    /// Checks permitted only under `ServiceTier::Enhanced`, ANDed onto
    /// whatever the rule table says (a rule can permit but the tier gate
    /// still applies, and vice versa a rule can't re-permit past it).
    enhanced_only_checks: HashSet<CheckType>,
    /// Checks that always require consent, regardless of what the matched
    /// rule says (most jurisdictions treat criminal/financial/identity
    /// history as consent-gated by statute, not by contract).
    always_consent_checks: HashSet<CheckType>,
}

impl ComplianceEngine {
    pub fn new(rules: Vec<ComplianceRule>) -> Self {
        Self {
            rules,
            enhanced_only_checks: [InformationType::DigitalFootprint, InformationType::NetworkDepth3]
                .into_iter()
                .collect(),
            always_consent_checks: [
                InformationType::Criminal,
                InformationType::Financial,
                InformationType::Identity,
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn with_builtin_restrictions(
        mut self,
        enhanced_only_checks: HashSet<CheckType>,
        always_consent_checks: HashSet<CheckType>,
    ) -> Self {
        self.enhanced_only_checks = enhanced_only_checks;
        self.always_consent_checks = always_consent_checks;
        self
    }

    /// Rule lookup order: exact (locale, check_type, role) → (locale,
    /// check_type) → parent locale (`US_CA` → `US`) → default
    /// (`locale == "DEFAULT"`). A rule missing an attribute is not treated
    /// as disallowed -- absence of any matching rule at all levels falls
    /// back to permissive.
    pub fn evaluate(
        &self,
        locale: &str,
        check_type: CheckType,
        role: RoleCategory,
        tier: ServiceTier,
    ) -> ComplianceDecision {
        let mut decision = self
            .lookup_rule(locale, check_type, Some(role))
            .or_else(|| self.lookup_rule(locale, check_type, None))
            .map(|rule| ComplianceDecision {
                permitted: rule.permitted,
                restrictions: Vec::new(),
                block_reason: rule.block_reason.clone(),
                requires_consent: rule.requires_consent,
                requires_disclosure: rule.requires_disclosure,
                lookback_days: rule.lookback_days,
            })
            .unwrap_or_else(|| {
                if let Some(parent) = parent_locale(locale) {
                    self.evaluate(parent, check_type, role, tier)
                } else {
                    self.lookup_rule("DEFAULT", check_type, None)
                        .map(|rule| ComplianceDecision {
                            permitted: rule.permitted,
                            restrictions: Vec::new(),
                            block_reason: rule.block_reason.clone(),
                            requires_consent: rule.requires_consent,
                            requires_disclosure: rule.requires_disclosure,
                            lookback_days: rule.lookback_days,
                        })
                        .unwrap_or_else(ComplianceDecision::permissive_default)
                }
            });

        if self.enhanced_only_checks.contains(&check_type) && tier != ServiceTier::Enhanced {
            decision.permitted = false;
            decision.block_reason.get_or_insert_with(|| {
                format!("{:?} requires Enhanced tier", check_type)
            });
            decision.restrictions.push("enhanced_tier_required".to_string());
        }

        if self.always_consent_checks.contains(&check_type) {
            decision.requires_consent = true;
        }

        decision
    }

    fn lookup_rule(&self, locale: &str, check_type: CheckType, role: Option<RoleCategory>) -> Option<&ComplianceRule> {
        self.rules
            .iter()
            .find(|r| r.locale == locale && r.check_type == check_type && r.role_category == role)
    }

    /// Service-configuration validation beyond per-check evaluation (§4.3):
    /// D3 requires Enhanced, Enhanced-only information types require
    /// Enhanced tier, excluding identity/sanctions warns but never blocks.
    pub fn validate_service_config(
        &self,
        tier: ServiceTier,
        search_degree: SearchDegree,
        requested_types: &[CheckType],
    ) -> Result<ServiceConfigValidation> {
        if search_degree == SearchDegree::D3 && tier != ServiceTier::Enhanced {
            return Err(Error::validation_with_reason(
                "d3_requires_enhanced",
                "D3 search degree requires Enhanced service tier",
            ));
        }

        for check_type in requested_types {
            if self.enhanced_only_checks.contains(check_type) && tier != ServiceTier::Enhanced {
                return Err(Error::validation_with_reason(
                    "enhanced_only_check_requires_enhanced",
                    format!("{:?} is an Enhanced-only information type", check_type),
                ));
            }
        }

        let mut warnings = Vec::new();
        if !requested_types.contains(&InformationType::Identity) {
            warnings.push("screening excludes Identity verification".to_string());
        }
        if !requested_types.contains(&InformationType::Sanctions) {
            warnings.push("screening excludes Sanctions screening".to_string());
        }

        Ok(ServiceConfigValidation { warnings })
    }
}

/// `US_CA` → `US`; a locale with no `_` has no parent.
fn parent_locale(locale: &str) -> Option<&str> {
    locale.rfind('_').map(|idx| &locale[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ComplianceEngine {
        ComplianceEngine::new(vec![
            ComplianceRule::new("EU", InformationType::Financial, false)
                .blocked_because("GDPR restricts automated credit decisioning"),
            ComplianceRule::new("US_CA", InformationType::Criminal, true).with_lookback(2555),
        ])
    }

    #[test]
    fn eu_credit_check_is_blocked_with_gdpr_reason() {
        let decision = engine().evaluate("EU", InformationType::Financial, RoleCategory::Standard, ServiceTier::Standard);
        assert!(!decision.permitted);
        assert!(decision.block_reason.unwrap().contains("GDPR"));
    }

    #[test]
    fn missing_rule_falls_back_to_parent_locale() {
        let decision = engine().evaluate("US_CA", InformationType::Criminal, RoleCategory::Standard, ServiceTier::Standard);
        assert!(decision.permitted);
        assert_eq!(decision.lookback_days, Some(2555));
    }

    #[test]
    fn unknown_locale_and_check_defaults_permitted() {
        let decision = engine().evaluate("JP", InformationType::Employment, RoleCategory::Standard, ServiceTier::Standard);
        assert!(decision.permitted);
        assert!(decision.restrictions.is_empty());
    }

    #[test]
    fn enhanced_only_check_blocked_on_standard_tier() {
        let decision = engine().evaluate("US", InformationType::DigitalFootprint, RoleCategory::Standard, ServiceTier::Standard);
        assert!(!decision.permitted);
    }

    #[test]
    fn criminal_check_always_requires_consent() {
        let decision = engine().evaluate("US", InformationType::Criminal, RoleCategory::Standard, ServiceTier::Standard);
        assert!(decision.requires_consent);
    }

    #[test]
    fn evaluate_is_pure_and_idempotent() {
        let engine = engine();
        let a = engine.evaluate("EU", InformationType::Financial, RoleCategory::Standard, ServiceTier::Standard);
        let b = engine.evaluate("EU", InformationType::Financial, RoleCategory::Standard, ServiceTier::Standard);
        assert_eq!(a, b);
    }

    #[test]
    fn d3_on_standard_tier_is_rejected_before_any_provider_call() {
        let result = engine().validate_service_config(ServiceTier::Standard, SearchDegree::D3, &[InformationType::Identity]);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code, screening_core::error::ErrorCode::ValidationError);
    }

    #[test]
    fn excluding_identity_warns_but_does_not_block() {
        let result = engine()
            .validate_service_config(ServiceTier::Standard, SearchDegree::D1, &[InformationType::Employment])
            .unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("Identity")));
    }
}
