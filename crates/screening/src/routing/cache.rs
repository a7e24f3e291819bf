//! Two-scope response cache (spec §4.4): keyed on `(entity_id, provider_id,
//! check_type)`, visibility scoped by `DataOrigin`, single-flight fetch
//! collapsing concurrent callers onto one underlying fetch.

use crate::types::{CheckType, DataOrigin};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use screening_core::error::Result;
use screening_core::TenantId;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity_id: Uuid,
    pub provider_id: String,
    pub check_type: CheckType,
}

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub entity_id: Uuid,
    pub provider_id: String,
    pub check_type: CheckType,
    pub tenant_id: Option<TenantId>,
    pub data_origin: DataOrigin,
    pub normalized_data: serde_json::Value,
    /// Encrypted at rest by the repository layer; kept as an opaque blob
    /// here since only the originating provider adapter ever parses it.
    pub raw_response: Option<Vec<u8>>,
    pub cost_incurred: f64,
    pub fetched_at: DateTime<Utc>,
    pub fresh_until: DateTime<Utc>,
    pub stale_until: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

impl CachedResponse {
    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        if now < self.fresh_until {
            Freshness::Fresh
        } else if now < self.stale_until {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Customer-provided entries are restricted to the tenant that supplied
    /// them; paid-external entries are shared across tenants.
    pub fn visible_to(&self, tenant_id: Option<TenantId>) -> bool {
        match self.data_origin {
            DataOrigin::PaidExternal => true,
            DataOrigin::CustomerProvided => self.tenant_id == tenant_id,
        }
    }
}

pub struct CacheLookup {
    pub response: CachedResponse,
    pub hit: bool,
}

/// Default freshness windows (spec §4.4), read from
/// `screening_core::config::CacheConfig`.
pub fn freshness_window(check_type: CheckType, config: &screening_core::config::CacheConfig) -> (i64, i64) {
    use crate::types::InformationType::*;
    match check_type {
        Criminal | Civil => (config.criminal_fresh_days, config.criminal_stale_days),
        Financial => (config.credit_fresh_days, config.credit_stale_days),
        Employment => (config.employment_fresh_days, config.employment_stale_days),
        Education => (config.education_fresh_days, config.education_stale_days),
        Identity => (config.identity_fresh_days, config.identity_stale_days),
        _ => (config.fallback_fresh_days, config.fallback_stale_days),
    }
}

enum Slot {
    Ready(CachedResponse),
    InFlight(Arc<Notify>),
}

#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<CacheKey, Slot>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey, tenant_id: Option<TenantId>) -> Option<CachedResponse> {
        match self.entries.get(key) {
            Some(slot) => match slot.value() {
                Slot::Ready(response) if response.visible_to(tenant_id) => Some(response.clone()),
                _ => None,
            },
            None => None,
        }
    }

    pub fn store(&self, key: CacheKey, response: CachedResponse) {
        if let Some((_, Slot::InFlight(notify))) = self.entries.remove(&key) {
            notify.notify_waiters();
        }
        self.entries.insert(key, Slot::Ready(response));
    }

    /// `get_or_fetch` semantics (spec §4.4): fresh hit returns immediately;
    /// stale only returns when `allow_stale`; otherwise fetches through
    /// `fetch`. Concurrent callers for the same key collapse onto one
    /// in-flight fetch (single-flight).
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        tenant_id: Option<TenantId>,
        allow_stale: bool,
        fetch: F,
    ) -> Result<CacheLookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedResponse>>,
    {
        loop {
            let wait_on = match self.entries.get(&key) {
                Some(slot) => match slot.value() {
                    Slot::Ready(response) if response.visible_to(tenant_id) => match response.freshness(Utc::now()) {
                        Freshness::Fresh => return Ok(CacheLookup { response: response.clone(), hit: true }),
                        Freshness::Stale if allow_stale => {
                            return Ok(CacheLookup { response: response.clone(), hit: true })
                        }
                        _ => None,
                    },
                    Slot::InFlight(notify) => Some(notify.clone()),
                    _ => None,
                },
                None => None,
            };

            if let Some(notify) = wait_on {
                notify.notified().await;
                continue;
            }

            // Claim the in-flight slot, unless another task raced us to it.
            let mut claimed = false;
            self.entries
                .entry(key.clone())
                .and_modify(|_| {})
                .or_insert_with(|| {
                    claimed = true;
                    Slot::InFlight(Arc::new(Notify::new()))
                });

            if !claimed {
                continue;
            }

            let result = fetch().await;
            match result {
                Ok(response) => {
                    self.store(key, response.clone());
                    return Ok(CacheLookup { response, hit: false });
                }
                Err(err) => {
                    if let Some((_, Slot::InFlight(notify))) = self.entries.remove(&key) {
                        notify.notify_waiters();
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InformationType;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn key() -> CacheKey {
        CacheKey { entity_id: Uuid::now_v7(), provider_id: "p1".to_string(), check_type: InformationType::Criminal }
    }

    fn fresh_response(key: &CacheKey) -> CachedResponse {
        CachedResponse {
            entity_id: key.entity_id,
            provider_id: key.provider_id.clone(),
            check_type: key.check_type,
            tenant_id: None,
            data_origin: DataOrigin::PaidExternal,
            normalized_data: serde_json::json!({}),
            raw_response: None,
            cost_incurred: 1.0,
            fetched_at: Utc::now(),
            fresh_until: Utc::now() + ChronoDuration::days(7),
            stale_until: Utc::now() + ChronoDuration::days(14),
        }
    }

    #[tokio::test]
    async fn cold_cache_invokes_fetch_once_under_concurrency() {
        let cache = Arc::new(ResponseCache::new());
        let k = key();
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let k = k.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(k.clone(), None, false, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(fresh_response(&k))
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn customer_provided_entry_invisible_to_other_tenant() {
        let k = key();
        let mut response = fresh_response(&k);
        response.data_origin = DataOrigin::CustomerProvided;
        response.tenant_id = Some(TenantId::new());
        assert!(!response.visible_to(Some(TenantId::new())));
        assert!(!response.visible_to(None));
        assert!(response.visible_to(response.tenant_id));
    }
}
