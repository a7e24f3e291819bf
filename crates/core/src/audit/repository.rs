use super::{
    event::{EventSeverity, EventType},
    traits::{AuditBackend, AuditFilter, BackendHealth, SortOrder},
    AuditEvent,
};
use crate::error::{Error, ErrorCode, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Database-backed audit repository. Events are append-only: there is no
/// update or delete path other than retention cleanup.
pub struct DatabaseAuditRepository {
    pool: Arc<PgPool>,
    table_name: String,
}

impl DatabaseAuditRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            table_name: "audit_events".to_string(),
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Initialize the audit table if it doesn't exist.
    pub async fn initialize(&self) -> Result<()> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                tenant_id UUID,
                actor_id UUID,
                correlation_id UUID NOT NULL,
                event_type VARCHAR(100) NOT NULL,
                severity VARCHAR(20) NOT NULL,
                resource_type VARCHAR(100),
                resource_id UUID,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table} (created_at);
            CREATE INDEX IF NOT EXISTS idx_{table}_tenant_id ON {table} (tenant_id);
            CREATE INDEX IF NOT EXISTS idx_{table}_actor_id ON {table} (actor_id);
            CREATE INDEX IF NOT EXISTS idx_{table}_event_type ON {table} (event_type);
            CREATE INDEX IF NOT EXISTS idx_{table}_resource ON {table} (resource_type, resource_id);
            CREATE INDEX IF NOT EXISTS idx_{table}_severity ON {table} (severity);
            "#,
            table = self.table_name,
        );

        sqlx::query(&sql).execute(self.pool.as_ref()).await?;
        info!("Audit table '{}' initialized", self.table_name);
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<AuditEvent> {
        let event_type: String = row.try_get("event_type")?;
        let severity: String = row.try_get("severity")?;

        Ok(AuditEvent {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            actor_id: row.try_get("actor_id")?,
            correlation_id: row.try_get("correlation_id")?,
            event_type: parse_event_type(&event_type),
            severity: parse_severity(&severity),
            resource_type: row.try_get("resource_type")?,
            resource_id: row.try_get("resource_id")?,
            data: row.try_get("data")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl AuditBackend for DatabaseAuditRepository {
    async fn store_event(&self, event: &AuditEvent) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (
                id, tenant_id, actor_id, correlation_id, event_type, severity,
                resource_type, resource_id, data, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            self.table_name
        );

        let result = sqlx::query(&sql)
            .bind(event.id)
            .bind(event.tenant_id)
            .bind(event.actor_id)
            .bind(event.correlation_id)
            .bind(event.event_type.to_string())
            .bind(event.severity.to_string())
            .bind(&event.resource_type)
            .bind(event.resource_id)
            .bind(&event.data)
            .bind(event.created_at)
            .execute(self.pool.as_ref())
            .await;

        match result {
            Ok(_) => {
                debug!(event_id = %event.id, "stored audit event");
                Ok(())
            }
            Err(e) => {
                error!(event_id = %event.id, error = %e, "failed to store audit event");
                Err(Error::from(e))
            }
        }
    }

    async fn retrieve_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        let mut conditions = Vec::new();
        let mut param_count = 0;

        if filter.start_time.is_some() {
            param_count += 1;
            conditions.push(format!("created_at >= ${}", param_count));
        }
        if filter.end_time.is_some() {
            param_count += 1;
            conditions.push(format!("created_at <= ${}", param_count));
        }
        if filter.actor_id.is_some() {
            param_count += 1;
            conditions.push(format!("actor_id = ${}", param_count));
        }
        if filter.tenant_id.is_some() {
            param_count += 1;
            conditions.push(format!("tenant_id = ${}", param_count));
        }
        if filter.resource_type.is_some() {
            param_count += 1;
            conditions.push(format!("resource_type = ${}", param_count));
        }

        let order_by = match filter.sort_order {
            SortOrder::TimestampAsc => "created_at ASC",
            SortOrder::TimestampDesc => "created_at DESC",
            SortOrder::SeverityDesc => {
                "CASE severity WHEN 'Critical' THEN 1 WHEN 'Warning' THEN 2 ELSE 3 END, created_at DESC"
            }
        };

        let limit_clause = if filter.limit.is_some() {
            param_count += 1;
            format!(" LIMIT ${}", param_count)
        } else {
            String::new()
        };

        let offset_clause = if filter.offset.is_some() {
            param_count += 1;
            format!(" OFFSET ${}", param_count)
        } else {
            String::new()
        };

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT id, tenant_id, actor_id, correlation_id, event_type, severity, \
             resource_type, resource_id, data, created_at FROM {}{} ORDER BY {}{}{}",
            self.table_name, where_clause, order_by, limit_clause, offset_clause
        );

        let mut query = sqlx::query(&sql);
        if let Some(start) = filter.start_time {
            query = query.bind(start);
        }
        if let Some(end) = filter.end_time {
            query = query.bind(end);
        }
        if let Some(actor_id) = filter.actor_id {
            query = query.bind(actor_id);
        }
        if let Some(tenant_id) = filter.tenant_id {
            query = query.bind(tenant_id);
        }
        if let Some(resource_type) = &filter.resource_type {
            query = query.bind(resource_type.clone());
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            query = query.bind(offset as i64);
        }

        let rows = query.fetch_all(self.pool.as_ref()).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn count_events(&self, filter: &AuditFilter) -> Result<u64> {
        let mut conditions = Vec::new();
        let mut param_count = 0;
        if filter.tenant_id.is_some() {
            param_count += 1;
            conditions.push(format!("tenant_id = ${}", param_count));
        }
        if filter.actor_id.is_some() {
            param_count += 1;
            conditions.push(format!("actor_id = ${}", param_count));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let sql = format!("SELECT COUNT(*) FROM {}{}", self.table_name, where_clause);
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(tenant_id) = filter.tenant_id {
            query = query.bind(tenant_id);
        }
        if let Some(actor_id) = filter.actor_id {
            query = query.bind(actor_id);
        }

        let count: i64 = query.fetch_one(self.pool.as_ref()).await?;
        Ok(count as u64)
    }

    async fn health_check(&self) -> Result<BackendHealth> {
        match sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await {
            Ok(_) => Ok(BackendHealth {
                is_healthy: true,
                message: None,
                last_write: None,
                events_stored_today: None,
            }),
            Err(e) => Ok(BackendHealth {
                is_healthy: false,
                message: Some(e.to_string()),
                last_write: None,
                events_stored_today: None,
            }),
        }
    }

    async fn cleanup_old_events(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE created_at < $1", self.table_name);

        let result = sqlx::query(&sql)
            .bind(older_than)
            .execute(self.pool.as_ref())
            .await?;

        info!("cleaned up {} old audit events", result.rows_affected());
        Ok(result.rows_affected())
    }
}

/// Fans an event out to every configured backend, but only the primary
/// backend's result determines success: a write that reaches the primary
/// store and fails a secondary (e.g. a metrics sink) is not an audit failure.
pub struct AuditRepository {
    backends: Vec<Box<dyn AuditBackend>>,
    primary_backend: usize,
}

impl AuditRepository {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            primary_backend: 0,
        }
    }

    pub fn add_backend(mut self, backend: Box<dyn AuditBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn with_primary_backend(mut self, index: usize) -> Self {
        if index < self.backends.len() {
            self.primary_backend = index;
        }
        self
    }
}

#[async_trait]
impl AuditBackend for AuditRepository {
    async fn store_event(&self, event: &AuditEvent) -> Result<()> {
        if self.backends.is_empty() {
            return Err(Error::new(ErrorCode::ConfigurationError, "no audit backends configured"));
        }

        let mut primary_result = Ok(());
        for (i, backend) in self.backends.iter().enumerate() {
            match backend.store_event(event).await {
                Ok(_) => {
                    if i == self.primary_backend {
                        primary_result = Ok(());
                    }
                }
                Err(e) => {
                    if i == self.primary_backend {
                        primary_result = Err(e);
                    } else {
                        error!(backend = i, error = %e, "secondary audit backend failed");
                    }
                }
            }
        }

        primary_result
    }

    async fn retrieve_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        if self.primary_backend >= self.backends.len() {
            return Err(Error::new(ErrorCode::ConfigurationError, "invalid primary backend index"));
        }
        self.backends[self.primary_backend].retrieve_events(filter).await
    }

    async fn count_events(&self, filter: &AuditFilter) -> Result<u64> {
        if self.primary_backend >= self.backends.len() {
            return Err(Error::new(ErrorCode::ConfigurationError, "invalid primary backend index"));
        }
        self.backends[self.primary_backend].count_events(filter).await
    }

    async fn health_check(&self) -> Result<BackendHealth> {
        if self.primary_backend >= self.backends.len() {
            return Err(Error::new(ErrorCode::ConfigurationError, "invalid primary backend index"));
        }
        self.backends[self.primary_backend].health_check().await
    }

    async fn cleanup_old_events(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut total_cleaned = 0u64;
        for backend in &self.backends {
            match backend.cleanup_old_events(older_than).await {
                Ok(cleaned) => total_cleaned += cleaned,
                Err(e) => error!(error = %e, "failed to clean up events in backend"),
            }
        }
        Ok(total_cleaned)
    }
}

impl Default for AuditRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_event_type(s: &str) -> EventType {
    match s {
        "ScreeningStarted" => EventType::ScreeningStarted,
        "ScreeningCompleted" => EventType::ScreeningCompleted,
        "ScreeningCancelled" => EventType::ScreeningCancelled,
        "ScreeningResumed" => EventType::ScreeningResumed,
        "CheckpointCreated" => EventType::CheckpointCreated,
        "EntityCreated" => EventType::EntityCreated,
        "EntityMerged" => EventType::EntityMerged,
        "ComplianceDecision" => EventType::ComplianceDecision,
        "ComplianceBlocked" => EventType::ComplianceBlocked,
        "ConsentRecorded" => EventType::ConsentRecorded,
        "ConsentExpired" => EventType::ConsentExpired,
        "BudgetExceeded" => EventType::BudgetExceeded,
        "CircuitOpened" => EventType::CircuitOpened,
        "CircuitClosed" => EventType::CircuitClosed,
        "ProviderFallback" => EventType::ProviderFallback,
        "VigilanceChanged" => EventType::VigilanceChanged,
        "AlertGenerated" => EventType::AlertGenerated,
        "AlertEscalated" => EventType::AlertEscalated,
        "AlertDelivered" => EventType::AlertDelivered,
        "AlertDeliveryFailed" => EventType::AlertDeliveryFailed,
        other => {
            let name = other.strip_prefix("CUSTOM_").unwrap_or(other);
            EventType::Custom(name.to_string())
        }
    }
}

fn parse_severity(s: &str) -> EventSeverity {
    match s {
        "Info" => EventSeverity::Info,
        "Warning" => EventSeverity::Warning,
        "Critical" => EventSeverity::Critical,
        _ => EventSeverity::Info,
    }
}
