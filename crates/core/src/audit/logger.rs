use super::{
    event::{AuditEvent, EventSeverity, EventType},
    traits::AuditBackend,
};
use crate::error::{Error, ErrorCode, ErrorMetrics, Result};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

/// High-level audit logger providing convenience methods for the events the
/// domain actually emits (screening lifecycle, compliance, provider routing,
/// monitoring). Every event is also mirrored to structured logging so an
/// audit-store outage doesn't leave operators blind.
#[derive(Clone)]
pub struct AuditLogger {
    backend: Arc<dyn AuditBackend>,
    error_metrics: Arc<ErrorMetrics>,
    context: Arc<RwLock<AuditContext>>,
}

/// Ambient fields applied to events that don't set them explicitly, set once
/// per request via `RequestContext`.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub tenant_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
}

impl AuditLogger {
    pub fn new(backend: Arc<dyn AuditBackend>, error_metrics: Arc<ErrorMetrics>) -> Self {
        Self {
            backend,
            error_metrics,
            context: Arc::new(RwLock::new(AuditContext::default())),
        }
    }

    pub async fn set_context(&self, context: AuditContext) {
        let mut ctx = self.context.write().await;
        *ctx = context;
    }

    pub async fn update_context<F>(&self, updater: F)
    where
        F: FnOnce(&mut AuditContext),
    {
        let mut ctx = self.context.write().await;
        updater(&mut *ctx);
    }

    /// Log a generic audit event, filling in ambient context for fields the
    /// caller left unset.
    pub async fn log_event(&self, mut event: AuditEvent) -> Result<()> {
        {
            let ctx = self.context.read().await;
            if event.tenant_id.is_none() {
                event.tenant_id = ctx.tenant_id;
            }
            if event.actor_id.is_none() {
                event.actor_id = ctx.actor_id;
            }
        }

        match event.severity {
            EventSeverity::Info => info!(
                event_id = %event.id,
                event_type = %event.event_type,
                actor_id = ?event.actor_id,
                resource = ?event.resource_type,
                "audit event"
            ),
            EventSeverity::Warning => warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                actor_id = ?event.actor_id,
                resource = ?event.resource_type,
                "audit event (warning)"
            ),
            EventSeverity::Critical => error!(
                event_id = %event.id,
                event_type = %event.event_type,
                actor_id = ?event.actor_id,
                resource = ?event.resource_type,
                data = ?event.data,
                "critical audit event"
            ),
        }

        match self.backend.store_event(&event).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let audit_error = Error::new(
                    ErrorCode::StorageError,
                    format!("failed to store audit event: {}", e),
                );
                self.error_metrics.record_error(&audit_error).await;
                error!(event_id = %event.id, error = %e, "failed to store audit event");
                Err(e)
            }
        }
    }

    /// `ScreeningStarted` / `ScreeningCompleted` / `ScreeningCancelled` / `ScreeningResumed`.
    pub async fn log_screening_lifecycle(
        &self,
        event_type: EventType,
        tenant_id: Uuid,
        correlation_id: Uuid,
        screening_id: Uuid,
    ) -> Result<()> {
        let event = AuditEvent::builder(event_type, correlation_id)
            .tenant_id(tenant_id)
            .resource("screening", screening_id)
            .build();
        self.log_event(event).await
    }

    pub async fn log_entity_merged(
        &self,
        tenant_id: Uuid,
        correlation_id: Uuid,
        surviving_id: Uuid,
        absorbed_id: Uuid,
    ) -> Result<()> {
        let event = AuditEvent::builder(EventType::EntityMerged, correlation_id)
            .tenant_id(tenant_id)
            .resource("entity", surviving_id)
            .data(json!({ "absorbed_id": absorbed_id }))
            .build();
        self.log_event(event).await
    }

    pub async fn log_compliance_decision(
        &self,
        tenant_id: Uuid,
        correlation_id: Uuid,
        check_type: &str,
        allowed: bool,
        reason: &str,
    ) -> Result<()> {
        let event_type = if allowed {
            EventType::ComplianceDecision
        } else {
            EventType::ComplianceBlocked
        };
        let event = AuditEvent::builder(event_type, correlation_id)
            .tenant_id(tenant_id)
            .severity(if allowed { EventSeverity::Info } else { EventSeverity::Warning })
            .data(json!({ "check_type": check_type, "allowed": allowed, "reason": reason }))
            .build();
        self.log_event(event).await
    }

    pub async fn log_budget_exceeded(
        &self,
        tenant_id: Uuid,
        correlation_id: Uuid,
        scope: &str,
        spent: f64,
        limit: f64,
    ) -> Result<()> {
        let event = AuditEvent::builder(EventType::BudgetExceeded, correlation_id)
            .tenant_id(tenant_id)
            .severity(EventSeverity::Warning)
            .data(json!({ "scope": scope, "spent": spent, "limit": limit }))
            .build();
        self.log_event(event).await
    }

    pub async fn log_circuit_state_change(
        &self,
        correlation_id: Uuid,
        provider_id: &str,
        opened: bool,
    ) -> Result<()> {
        let event_type = if opened { EventType::CircuitOpened } else { EventType::CircuitClosed };
        let event = AuditEvent::builder(event_type, correlation_id)
            .severity(if opened { EventSeverity::Warning } else { EventSeverity::Info })
            .data(json!({ "provider_id": provider_id }))
            .build();
        self.log_event(event).await
    }

    pub async fn log_vigilance_changed(
        &self,
        tenant_id: Uuid,
        correlation_id: Uuid,
        entity_id: Uuid,
        from: &str,
        to: &str,
    ) -> Result<()> {
        let event = AuditEvent::builder(EventType::VigilanceChanged, correlation_id)
            .tenant_id(tenant_id)
            .resource("entity", entity_id)
            .data(json!({ "from": from, "to": to }))
            .build();
        self.log_event(event).await
    }

    pub async fn log_alert(
        &self,
        tenant_id: Uuid,
        correlation_id: Uuid,
        alert_id: Uuid,
        event_type: EventType,
        severity: EventSeverity,
    ) -> Result<()> {
        let event = AuditEvent::builder(event_type, correlation_id)
            .tenant_id(tenant_id)
            .severity(severity)
            .resource("alert", alert_id)
            .build();
        self.log_event(event).await
    }
}

impl AuditContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant_id(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_actor_id(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}
