//! Provider registry (spec §4.4): capability-filtered, tier-filtered,
//! health-filtered, cost-then-reliability sorted provider selection.

use super::breaker::CircuitBreakerRegistry;
use super::provider::{HealthStatus, ProviderDescriptor, ProviderHealth};
use crate::types::{CheckType, ServiceTier};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, ProviderDescriptor>,
    health: DashMap<String, ProviderHealth>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, descriptor: ProviderDescriptor) {
        self.providers.insert(descriptor.id.clone(), descriptor);
    }

    pub fn record_health(&self, provider_id: &str, health: ProviderHealth) {
        self.health.insert(provider_id.to_string(), health);
    }

    fn is_healthy(&self, provider_id: &str) -> bool {
        self.health
            .get(provider_id)
            .map(|h| h.status != HealthStatus::Unhealthy)
            .unwrap_or(true)
    }

    /// Ordered candidate list for `(check_type, locale)` under `tier`: the
    /// head is the primary, the remainder fallbacks in order. Providers with
    /// an OPEN circuit or UNHEALTHY status are excluded entirely.
    pub fn select(
        &self,
        check_type: CheckType,
        locale: &str,
        tier: ServiceTier,
        breakers: &CircuitBreakerRegistry,
    ) -> Vec<ProviderDescriptor> {
        let mut candidates: Vec<(ProviderDescriptor, super::provider::CostTier)> = self
            .providers
            .iter()
            .filter(|entry| entry.permitted_for_tier(tier))
            .filter(|entry| entry.capability_for(check_type, locale).is_some())
            .filter(|entry| self.is_healthy(&entry.id))
            .filter(|entry| !breakers.is_open(&entry.id))
            .map(|entry| {
                let cost_tier = entry.capability_for(check_type, locale).unwrap().cost_tier;
                (entry.clone(), cost_tier)
            })
            .collect();

        candidates.sort_by(|(a, a_cost), (b, b_cost)| {
            a_cost
                .cmp(b_cost)
                .then(b.reliability.partial_cmp(&a.reliability).unwrap_or(Ordering::Equal))
        });

        candidates.into_iter().map(|(d, _)| d).collect()
    }

    pub fn get(&self, provider_id: &str) -> Option<ProviderDescriptor> {
        self.providers.get(provider_id).map(|p| p.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::breaker::BreakerConfig;
    use crate::routing::provider::{CostTier, ProviderCapability, ProviderCategory};
    use crate::types::InformationType;

    fn descriptor(id: &str, category: ProviderCategory, cost_tier: CostTier, reliability: f64) -> ProviderDescriptor {
        ProviderDescriptor {
            id: id.to_string(),
            category,
            reliability,
            capabilities: vec![ProviderCapability {
                check_type: InformationType::Criminal,
                locales: vec!["US".to_string()],
                cost_tier,
                cost_per_call: 1.0,
            }],
        }
    }

    #[test]
    fn standard_tier_excludes_premium_providers() {
        let registry = ProviderRegistry::new();
        registry.register(descriptor("core-a", ProviderCategory::Core, CostTier::Medium, 0.9));
        registry.register(descriptor("premium-a", ProviderCategory::Premium, CostTier::Low, 0.95));

        let breakers = Arc::new(CircuitBreakerRegistry::new(BreakerConfig::default()));
        let selected = registry.select(InformationType::Criminal, "US", ServiceTier::Standard, &breakers);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "core-a");
    }

    #[test]
    fn sorts_by_cost_tier_then_reliability() {
        let registry = ProviderRegistry::new();
        registry.register(descriptor("cheap-unreliable", ProviderCategory::Core, CostTier::Low, 0.5));
        registry.register(descriptor("cheap-reliable", ProviderCategory::Core, CostTier::Low, 0.95));
        registry.register(descriptor("expensive", ProviderCategory::Core, CostTier::High, 0.99));

        let breakers = Arc::new(CircuitBreakerRegistry::new(BreakerConfig::default()));
        let selected = registry.select(InformationType::Criminal, "US", ServiceTier::Standard, &breakers);
        assert_eq!(selected[0].id, "cheap-reliable");
        assert_eq!(selected[2].id, "expensive");
    }
}
