//! Request router (spec §4.4): cache-first dispatch across the ordered
//! candidate list from `ProviderRegistry::select`, with per-provider circuit
//! breaker + rate limiter gating and exponential backoff with jitter on
//! retryable failures.

use super::breaker::CircuitBreakerRegistry;
use super::cache::{freshness_window, CacheKey, CachedResponse, ResponseCache};
use super::cost::CostService;
use super::provider::{Provider, ProviderResult};
use super::rate_limiter::{AcquireOutcome, RateLimiterRegistry};
use super::registry::ProviderRegistry;
use crate::types::{CheckType, DataOrigin, ServiceTier};
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use screening_core::config::{CacheConfig, RouterConfig};
use screening_core::error::{Error, Result};
use screening_core::TenantId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};
use uuid::Uuid;

pub struct RoutedCheck {
    pub provider_id: String,
    pub normalized_data: serde_json::Value,
    pub raw_response: Option<serde_json::Value>,
    pub cost_incurred: f64,
    pub cache_hit: bool,
}

pub struct RequestRouter {
    config: RouterConfig,
    cache_config: CacheConfig,
    registry: Arc<ProviderRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    rate_limiter: Arc<RateLimiterRegistry>,
    cache: Arc<ResponseCache>,
    cost: Arc<CostService>,
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl RequestRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RouterConfig,
        cache_config: CacheConfig,
        registry: Arc<ProviderRegistry>,
        breakers: Arc<CircuitBreakerRegistry>,
        rate_limiter: Arc<RateLimiterRegistry>,
        cache: Arc<ResponseCache>,
        cost: Arc<CostService>,
    ) -> Self {
        Self {
            config,
            cache_config,
            registry,
            breakers,
            rate_limiter,
            cache,
            cost,
            providers: HashMap::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(provider.id().to_string(), provider);
        self
    }

    /// Cache-first routing of a single check. Walks the registry's ordered
    /// candidate list, skipping providers whose breaker is open or whose
    /// rate limiter denies the call, retrying transient failures with
    /// exponential backoff + jitter up to `max_retries`, before falling
    /// through to the next candidate.
    #[allow(clippy::too_many_arguments)]
    pub async fn route(
        &self,
        entity_id: Uuid,
        check_type: CheckType,
        subject: &serde_json::Value,
        locale: &str,
        tier: ServiceTier,
        tenant_id: Option<TenantId>,
        allow_stale: bool,
        data_origin: DataOrigin,
    ) -> Result<RoutedCheck> {
        let candidates = self.registry.select(check_type, locale, tier, &self.breakers);
        if candidates.is_empty() {
            return Err(Error::no_provider_available(check_type));
        }

        let mut last_error: Option<Error> = None;

        for descriptor in &candidates {
            let Some(provider) = self.providers.get(&descriptor.id) else {
                continue;
            };
            let capability = descriptor
                .capability_for(check_type, locale)
                .expect("candidate was filtered by capability_for");

            if let Some(id) = tenant_id {
                if let Err(err) = self.cost.check_budget(id, capability.cost_per_call) {
                    last_error = Some(err);
                    continue;
                }
            }

            let key = CacheKey { entity_id, provider_id: descriptor.id.clone(), check_type };
            let provider = provider.clone();
            let cost_per_call = capability.cost_per_call;
            let breakers = self.breakers.clone();
            let provider_id = descriptor.id.clone();
            let subject = subject.clone();
            let locale_owned = locale.to_string();

            let (fresh_days, stale_days) = freshness_window(check_type, &self.cache_config);

            let fetch = {
                let provider_id = provider_id.clone();
                move || async move {
                    let result = self
                        .call_with_retry(&provider_id, &*provider, check_type, &subject, &locale_owned, &breakers)
                        .await?;
                    let now = Utc::now();
                    Ok(CachedResponse {
                        entity_id,
                        provider_id: provider_id.clone(),
                        check_type,
                        tenant_id,
                        data_origin,
                        normalized_data: result.normalized_data,
                        raw_response: result.raw_response.map(|v| v.to_string().into_bytes()),
                        cost_incurred: result.cost_incurred,
                        fetched_at: now,
                        fresh_until: now + ChronoDuration::days(fresh_days),
                        stale_until: now + ChronoDuration::days(stale_days),
                    })
                }
            };

            match self.cache.get_or_fetch(key, tenant_id, allow_stale, fetch).await {
                Ok(lookup) => {
                    if lookup.hit {
                        if let Some(id) = tenant_id {
                            self.cost.record_cache_savings(id, cost_per_call);
                        }
                    } else if let Some(id) = tenant_id {
                        self.cost.record_cost(id, lookup.response.cost_incurred);
                    }
                    return Ok(RoutedCheck {
                        provider_id: lookup.response.provider_id,
                        normalized_data: lookup.response.normalized_data,
                        raw_response: lookup
                            .response
                            .raw_response
                            .and_then(|bytes| serde_json::from_slice(&bytes).ok()),
                        cost_incurred: lookup.response.cost_incurred,
                        cache_hit: lookup.hit,
                    });
                }
                Err(err) => {
                    warn!(provider_id, error = %err, "provider candidate failed, trying next");
                    last_error = Some(err);
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::no_provider_available(check_type)))
    }

    async fn call_with_retry(
        &self,
        provider_id: &str,
        provider: &dyn Provider,
        check_type: CheckType,
        subject: &serde_json::Value,
        locale: &str,
        breakers: &CircuitBreakerRegistry,
    ) -> Result<ProviderResult> {
        let mut attempt = 0;

        loop {
            breakers.before_call(provider_id).await?;

            match self.rate_limiter.try_acquire(provider_id, 1.0).await {
                AcquireOutcome::Allowed => {}
                AcquireOutcome::Denied { retry_after } => {
                    if attempt >= self.config.max_retries {
                        return Err(Error::rate_limited(format!("provider {} rate limited", provider_id)));
                    }
                    sleep(retry_after).await;
                    attempt += 1;
                    continue;
                }
            }

            let call = provider.execute_check(check_type, subject, locale, &serde_json::Value::Null);
            let timeout = Duration::from_secs(self.config.timeout_secs);

            let outcome = tokio::time::timeout(timeout, call).await;

            match outcome {
                Ok(Ok(result)) if result.success => {
                    breakers.record_success(provider_id).await;
                    return Ok(result);
                }
                Ok(Ok(result)) => {
                    breakers.record_failure(provider_id).await;
                    if attempt >= self.config.max_retries {
                        return Err(Error::provider_failure(provider_id, "provider reported failure"));
                    }
                    self.backoff(attempt).await;
                    attempt += 1;
                }
                Ok(Err(err)) => {
                    breakers.record_failure(provider_id).await;
                    if attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    self.backoff(attempt).await;
                    attempt += 1;
                }
                Err(_) => {
                    breakers.record_failure(provider_id).await;
                    if attempt >= self.config.max_retries {
                        return Err(Error::provider_timeout(provider_id));
                    }
                    info!(provider_id, attempt, "provider call timed out, retrying");
                    self.backoff(attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Exponential backoff capped at `max_retry_delay_ms`, with
    /// `retry_jitter` fractional jitter applied symmetrically.
    async fn backoff(&self, attempt: u32) {
        let base = self.config.base_retry_delay_ms as f64 * 2f64.powi(attempt as i32);
        let capped = base.min(self.config.max_retry_delay_ms as f64);
        let jitter_fraction = rand::thread_rng().gen_range(-self.config.retry_jitter..=self.config.retry_jitter);
        let delay_ms = (capped * (1.0 + jitter_fraction)).max(0.0);
        sleep(Duration::from_millis(delay_ms as u64)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::provider::{CostTier, ProviderCapability, ProviderCategory, ProviderDescriptor, ProviderHealth};
    use crate::types::InformationType;
    use async_trait::async_trait;
    use screening_core::config::BudgetConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    struct FlakyProvider {
        id: String,
        calls: AtomicU32,
        fail_first_n: u32,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn execute_check(
            &self,
            _check_type: CheckType,
            _subject: &serde_json::Value,
            _locale: &str,
            _extras: &serde_json::Value,
        ) -> screening_core::error::Result<ProviderResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderResult {
                provider_id: self.id.clone(),
                check_type: InformationType::Criminal,
                locale: "US".to_string(),
                success: n >= self.fail_first_n,
                normalized_data: serde_json::json!({"clear": true}),
                raw_response: None,
                cost_incurred: 2.0,
                duration: StdDuration::from_millis(5),
            })
        }

        async fn health_check(&self) -> ProviderHealth {
            ProviderHealth {
                status: super::super::provider::HealthStatus::Healthy,
                last_check: Utc::now(),
                error: None,
            }
        }
    }

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor {
            id: "flaky".to_string(),
            category: ProviderCategory::Core,
            reliability: 0.9,
            capabilities: vec![ProviderCapability {
                check_type: InformationType::Criminal,
                locales: vec!["US".to_string()],
                cost_tier: CostTier::Low,
                cost_per_call: 2.0,
            }],
        }
    }

    fn router_with(provider: Arc<FlakyProvider>) -> RequestRouter {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(descriptor());

        let mut router_config = RouterConfig::default();
        router_config.base_retry_delay_ms = 1;
        router_config.max_retry_delay_ms = 5;

        RequestRouter::new(
            router_config,
            screening_core::config::CacheConfig::default(),
            registry,
            Arc::new(CircuitBreakerRegistry::new(screening_core::config::BreakerConfig::default())),
            Arc::new(RateLimiterRegistry::new(super::super::rate_limiter::RateLimiterConfig {
                tokens_per_second: 1000.0,
                max_tokens: 1000.0,
            })),
            Arc::new(ResponseCache::new()),
            Arc::new(CostService::new(BudgetConfig { warning_threshold: 0.8, hard_limit: false })),
        )
        .with_provider(provider)
    }

    #[tokio::test]
    async fn retries_transient_failure_then_succeeds() {
        let provider = Arc::new(FlakyProvider { id: "flaky".to_string(), calls: AtomicU32::new(0), fail_first_n: 1 });
        let router = router_with(provider.clone());

        let result = router
            .route(
                Uuid::now_v7(),
                InformationType::Criminal,
                &serde_json::json!({}),
                "US",
                ServiceTier::Standard,
                None,
                false,
                DataOrigin::PaidExternal,
            )
            .await
            .unwrap();

        assert_eq!(result.provider_id, "flaky");
        assert!(provider.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn second_call_for_same_entity_is_a_cache_hit() {
        let provider = Arc::new(FlakyProvider { id: "flaky".to_string(), calls: AtomicU32::new(0), fail_first_n: 0 });
        let router = router_with(provider.clone());
        let entity_id = Uuid::now_v7();

        let first = router
            .route(
                entity_id,
                InformationType::Criminal,
                &serde_json::json!({}),
                "US",
                ServiceTier::Standard,
                None,
                false,
                DataOrigin::PaidExternal,
            )
            .await
            .unwrap();
        assert!(!first.cache_hit);

        let second = router
            .route(
                entity_id,
                InformationType::Criminal,
                &serde_json::json!({}),
                "US",
                ServiceTier::Standard,
                None,
                false,
                DataOrigin::PaidExternal,
            )
            .await
            .unwrap();
        assert!(second.cache_hit);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
