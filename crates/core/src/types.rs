use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant identifier, a time-ordered v7 UUID assigned at tenant creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
    Deleted,
}

/// Who is driving the current operation. Carried on [`RequestContext`] and
/// recorded on every audit event; `System` is used by the monitoring
/// scheduler and other background jobs that run without a human or
/// service-account caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    Human,
    Service,
    System,
}

/// Which cache partition a cacheable response belongs to. Paid, externally
/// sourced data is safe to share across tenants (`Shared`); anything
/// supplied by or about a specific tenant's data must stay isolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheScope {
    Shared,
    TenantIsolated,
}

/// The fourteen information types an investigation can target. Drives the
/// SAR loop's phase assignment, the compliance engine's rule lookups, and
/// `RequestContext::permitted_checks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckType {
    Identity,
    Employment,
    Education,
    Criminal,
    Civil,
    Financial,
    Licenses,
    Regulatory,
    Sanctions,
    AdverseMedia,
    DigitalFootprint,
    NetworkDepth2,
    NetworkDepth3,
    Reconciliation,
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Ambient request/task context. Installed once per inbound request or
/// background job via [`RequestContext::scope`] and read back from any
/// nested call with [`RequestContext::current`] -- it is never threaded
/// through individual function signatures.
///
/// `tenant_id` is `None` for system-wide operations (e.g. provider
/// registry maintenance) and for PAID_EXTERNAL cache reads that are
/// deliberately tenant-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub tenant_id: Option<TenantId>,
    pub actor_id: Option<Uuid>,
    pub actor_type: ActorType,
    pub correlation_id: Uuid,
    pub locale: String,
    pub cache_scope: CacheScope,
    pub permitted_checks: Vec<CheckType>,
}

impl RequestContext {
    pub fn new(actor_type: ActorType) -> Self {
        Self {
            tenant_id: None,
            actor_id: None,
            actor_type,
            correlation_id: Uuid::now_v7(),
            locale: "en-US".to_string(),
            cache_scope: CacheScope::TenantIsolated,
            permitted_checks: Vec::new(),
        }
    }

    pub fn with_tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_actor_id(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_cache_scope(mut self, cache_scope: CacheScope) -> Self {
        self.cache_scope = cache_scope;
        self
    }

    pub fn with_permitted_checks(mut self, permitted_checks: Vec<CheckType>) -> Self {
        self.permitted_checks = permitted_checks;
        self
    }

    pub fn is_permitted(&self, check_type: CheckType) -> bool {
        self.permitted_checks.contains(&check_type)
    }

    /// Install `context` as the ambient context for the duration of `fut`. Any
    /// task spawned from within `fut` and awaited in-place inherits it; tasks
    /// spawned with `tokio::spawn` must be wrapped in their own `scope` call.
    pub async fn scope<F, T>(context: RequestContext, fut: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        CURRENT_REQUEST_CONTEXT.scope(context, fut).await
    }

    /// Read the ambient context. Fails with `ContextMissing` if no `scope`
    /// call is active on the current task.
    pub fn current() -> crate::error::Result<RequestContext> {
        CURRENT_REQUEST_CONTEXT
            .try_with(|ctx| ctx.clone())
            .map_err(|_| crate::error::Error::context_missing("no RequestContext installed for the current task"))
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_CONTEXT: RequestContext;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn current_without_scope_fails() {
        let result = RequestContext::current();
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code, crate::error::ErrorCode::ContextMissing);
    }

    #[tokio::test]
    async fn scope_installs_context_for_nested_calls() {
        let tenant = TenantId::new();
        let ctx = RequestContext::new(ActorType::Service).with_tenant_id(tenant);

        RequestContext::scope(ctx, async {
            let current = RequestContext::current().expect("context should be installed");
            assert_eq!(current.tenant_id, Some(tenant));
        })
        .await;
    }

    #[test]
    fn tenant_id_round_trips_through_serde() {
        let id = TenantId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
