//! Executor (spec §4.5): translates `SearchQuery`s into routed requests and
//! runs them concurrently, capped at `max_concurrent_queries`.

use super::types::{ExecutionSummary, QueryResult, QueryStatus, SearchQuery};
use crate::routing::RequestRouter;
use crate::types::{DataOrigin, ServiceTier};
use screening_core::TenantId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use uuid::Uuid;

pub struct Executor<'a> {
    pub router: &'a RequestRouter,
    pub max_concurrent: usize,
}

impl<'a> Executor<'a> {
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        entity_id: Uuid,
        queries: Vec<SearchQuery>,
        locale: &str,
        tier: ServiceTier,
        tenant_id: Option<TenantId>,
    ) -> (Vec<(SearchQuery, QueryResult)>, ExecutionSummary) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));
        let mut handles = Vec::new();

        for query in queries {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let router = self.router;
            let locale = locale.to_string();
            let query_clone = query.clone();

            handles.push(async move {
                let _permit = permit;
                let started = Instant::now();
                let outcome = router
                    .route(
                        entity_id,
                        query_clone.check_type,
                        &query_clone.params,
                        &locale,
                        tier,
                        tenant_id,
                        false,
                        DataOrigin::PaidExternal,
                    )
                    .await;

                let result = match outcome {
                    Ok(routed) => QueryResult {
                        query_id: query_clone.id,
                        status: QueryStatus::Success,
                        normalized_data: routed.normalized_data,
                        findings_count: 0,
                        duration: started.elapsed(),
                        cache_hit: routed.cache_hit,
                        error: None,
                    },
                    Err(err) => {
                        let status = match err.code {
                            screening_core::error::ErrorCode::ProviderTimeout => QueryStatus::Timeout,
                            screening_core::error::ErrorCode::RateLimited => QueryStatus::RateLimited,
                            screening_core::error::ErrorCode::NoProviderAvailable => QueryStatus::NoProvider,
                            _ => QueryStatus::Failed,
                        };
                        QueryResult {
                            query_id: query_clone.id,
                            status,
                            normalized_data: serde_json::Value::Null,
                            findings_count: 0,
                            duration: started.elapsed(),
                            cache_hit: false,
                            error: Some(err.to_string()),
                        }
                    }
                };
                (query, result)
            });
        }

        let results: Vec<(SearchQuery, QueryResult)> = futures::future::join_all(handles).await;

        let total = results.len();
        let successes = results.iter().filter(|(_, r)| r.status == QueryStatus::Success).count();
        let cache_hits = results.iter().filter(|(_, r)| r.cache_hit).count();
        let providers_used: Vec<String> = results
            .iter()
            .map(|(q, _)| q.provider_id.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        let mut status_counts: HashMap<QueryStatus, usize> = HashMap::new();
        for (_, r) in &results {
            *status_counts.entry(r.status).or_insert(0) += 1;
        }

        let summary = ExecutionSummary {
            success_rate: if total == 0 { 0.0 } else { successes as f64 / total as f64 },
            cache_hits,
            providers_used,
            status_counts,
        };

        (results, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{
        CircuitBreakerRegistry, CostService, ProviderCapability, ProviderCategory, ProviderDescriptor, ProviderHealth,
        ProviderRegistry, ProviderResult, RateLimiterConfig, RateLimiterRegistry, ResponseCache,
    };
    use crate::sar::types::QueryType;
    use crate::types::{CheckType, InformationType};
    use async_trait::async_trait;
    use chrono::Utc;
    use screening_core::config::{BudgetConfig, RouterConfig};

    struct AlwaysOk;

    #[async_trait]
    impl crate::routing::Provider for AlwaysOk {
        fn id(&self) -> &str {
            "p1"
        }

        async fn execute_check(
            &self,
            check_type: CheckType,
            _subject: &serde_json::Value,
            locale: &str,
            _extras: &serde_json::Value,
        ) -> screening_core::error::Result<ProviderResult> {
            Ok(ProviderResult {
                provider_id: "p1".to_string(),
                check_type,
                locale: locale.to_string(),
                success: true,
                normalized_data: serde_json::json!({"clear": true}),
                raw_response: None,
                cost_incurred: 1.0,
                duration: std::time::Duration::from_millis(1),
            })
        }

        async fn health_check(&self) -> ProviderHealth {
            ProviderHealth { status: crate::routing::provider::HealthStatus::Healthy, last_check: Utc::now(), error: None }
        }
    }

    #[tokio::test]
    async fn executes_queries_concurrently_and_summarizes_success_rate() {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(ProviderDescriptor {
            id: "p1".to_string(),
            category: ProviderCategory::Core,
            reliability: 0.9,
            capabilities: vec![ProviderCapability {
                check_type: InformationType::Criminal,
                locales: vec!["US".to_string()],
                cost_tier: crate::routing::provider::CostTier::Low,
                cost_per_call: 1.0,
            }],
        });

        let router = RequestRouter::new(
            RouterConfig::default(),
            screening_core::config::CacheConfig::default(),
            registry,
            Arc::new(CircuitBreakerRegistry::new(screening_core::config::BreakerConfig::default())),
            Arc::new(RateLimiterRegistry::new(RateLimiterConfig { tokens_per_second: 1000.0, max_tokens: 1000.0 })),
            Arc::new(ResponseCache::new()),
            Arc::new(CostService::new(BudgetConfig { warning_threshold: 0.8, hard_limit: false })),
        )
        .with_provider(Arc::new(AlwaysOk));

        let executor = Executor { router: &router, max_concurrent: 4 };
        let mut query = SearchQuery::initial(InformationType::Criminal, "p1", InformationType::Criminal, serde_json::json!({}));
        query.query_type = QueryType::Initial;

        let (results, summary) = executor.execute(Uuid::now_v7(), vec![query], "US", ServiceTier::Standard, None).await;
        assert_eq!(results.len(), 1);
        assert_eq!(summary.success_rate, 1.0);
        assert_eq!(summary.providers_used, vec!["p1".to_string()]);
    }
}
