use super::AuditEvent;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Trait for audit backends (database, file, remote, etc.)
#[async_trait]
pub trait AuditBackend: Send + Sync {
    /// Store an audit event
    async fn store_event(&self, event: &AuditEvent) -> Result<()>;

    /// Retrieve audit events with filtering
    async fn retrieve_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>>;

    /// Count audit events matching filter
    async fn count_events(&self, filter: &AuditFilter) -> Result<u64>;

    /// Health check for the backend
    async fn health_check(&self) -> Result<BackendHealth>;

    /// Clean up old events based on retention policy
    async fn cleanup_old_events(&self, older_than: DateTime<Utc>) -> Result<u64>;
}

/// Health status of audit backend
#[derive(Debug, Clone)]
pub struct BackendHealth {
    pub is_healthy: bool,
    pub message: Option<String>,
    pub last_write: Option<DateTime<Utc>>,
    pub events_stored_today: Option<u64>,
}

/// Filter for querying audit events
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub actor_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub event_types: Option<Vec<String>>,
    pub severities: Option<Vec<String>>,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort_order: SortOrder,
}

/// Sort order for audit events
#[derive(Debug, Clone)]
pub enum SortOrder {
    TimestampAsc,
    TimestampDesc,
    SeverityDesc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::TimestampDesc
    }
}

/// Trait for types that can be audited
pub trait Auditable {
    /// Get the resource type for auditing
    fn resource_type() -> &'static str;

    /// Get the resource ID
    fn resource_id(&self) -> Uuid;

    /// Convert to JSON for audit logging
    fn to_audit_json(&self) -> Value;
}

/// Builder for audit filters
pub struct AuditFilterBuilder {
    filter: AuditFilter,
}

impl AuditFilterBuilder {
    pub fn new() -> Self {
        Self {
            filter: AuditFilter::default(),
        }
    }

    pub fn time_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.filter.start_time = Some(start);
        self.filter.end_time = Some(end);
        self
    }

    pub fn actor_id(mut self, actor_id: Uuid) -> Self {
        self.filter.actor_id = Some(actor_id);
        self
    }

    pub fn tenant_id(mut self, tenant_id: Uuid) -> Self {
        self.filter.tenant_id = Some(tenant_id);
        self
    }

    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.filter.event_types = Some(event_types);
        self
    }

    pub fn severities(mut self, severities: Vec<String>) -> Self {
        self.filter.severities = Some(severities);
        self
    }

    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.filter.resource_type = Some(resource_type.into());
        self
    }

    pub fn resource_id(mut self, resource_id: Uuid) -> Self {
        self.filter.resource_id = Some(resource_id);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.filter.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.filter.offset = Some(offset);
        self
    }

    pub fn sort_order(mut self, sort_order: SortOrder) -> Self {
        self.filter.sort_order = sort_order;
        self
    }

    pub fn build(self) -> AuditFilter {
        self.filter
    }
}

impl Default for AuditFilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditFilter {
    pub fn builder() -> AuditFilterBuilder {
        AuditFilterBuilder::new()
    }
}
