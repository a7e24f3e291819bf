//! Data provider routing layer (spec §4.4): registry, circuit breaker,
//! rate limiter, response cache, cost budgets, and the router that ties
//! them together. Deliberately not a singleton -- `RoutingServices` is
//! constructed once at startup and handed to the orchestrator, rather than
//! reached for through ambient globals (spec §9's explicit design note).

pub mod breaker;
pub mod cache;
pub mod cost;
pub mod provider;
pub mod rate_limiter;
pub mod registry;
pub mod router;

pub use breaker::{BreakerStatus, CircuitBreakerRegistry};
pub use cache::{CacheKey, CachedResponse, Freshness, ResponseCache};
pub use cost::{CostService, CostSummary};
pub use provider::{Provider, ProviderCapability, ProviderCategory, ProviderDescriptor, ProviderHealth, ProviderResult};
pub use rate_limiter::{RateLimiterConfig, RateLimiterRegistry};
pub use registry::ProviderRegistry;
pub use router::{RequestRouter, RoutedCheck};

use screening_core::Config;
use std::sync::Arc;

/// Bundles the routing layer's concurrent state. One instance lives for the
/// process lifetime and is shared (via `Arc`) with the orchestrator; nothing
/// here is a `static`/`lazy_static` singleton.
pub struct RoutingServices {
    pub registry: Arc<ProviderRegistry>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub rate_limiter: Arc<RateLimiterRegistry>,
    pub cache: Arc<ResponseCache>,
    pub cost: Arc<CostService>,
}

impl RoutingServices {
    pub fn new(config: &Config) -> Self {
        Self {
            registry: Arc::new(ProviderRegistry::new()),
            breakers: Arc::new(CircuitBreakerRegistry::new(config.breaker.clone())),
            rate_limiter: Arc::new(RateLimiterRegistry::new(RateLimiterConfig::default())),
            cache: Arc::new(ResponseCache::new()),
            cost: Arc::new(CostService::new(config.budget.clone())),
        }
    }

    pub fn router(&self, config: &Config) -> RequestRouter {
        RequestRouter::new(
            config.router.clone(),
            config.cache.clone(),
            self.registry.clone(),
            self.breakers.clone(),
            self.rate_limiter.clone(),
            self.cache.clone(),
            self.cost.clone(),
        )
    }
}
