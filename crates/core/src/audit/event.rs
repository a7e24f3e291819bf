use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

/// Domain event types recorded to the append-only audit store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Screening lifecycle
    ScreeningStarted,
    ScreeningCompleted,
    ScreeningCancelled,
    ScreeningResumed,
    CheckpointCreated,

    // Entity resolution
    EntityCreated,
    EntityMerged,

    // Compliance
    ComplianceDecision,
    ComplianceBlocked,
    ConsentRecorded,
    ConsentExpired,

    // Provider routing
    BudgetExceeded,
    CircuitOpened,
    CircuitClosed,
    ProviderFallback,

    // Monitoring
    VigilanceChanged,
    AlertGenerated,
    AlertEscalated,
    AlertDelivered,
    AlertDeliveryFailed,

    // Catch-all for extensions that don't warrant a new variant yet
    Custom(String),
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Custom(name) => write!(f, "CUSTOM_{}", name.to_uppercase()),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Append-only audit record. The store accepts INSERT only; there is no
/// update or delete path, so anything that might need to change later
/// (an outcome, a correction) is recorded as a new event instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub correlation_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: EventSeverity,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    /// Free-form structured payload: everything event-specific lives here
    /// rather than as bespoke top-level columns.
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Builder for creating audit events
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn new(event_type: EventType, correlation_id: Uuid) -> Self {
        Self {
            event: AuditEvent {
                id: Uuid::now_v7(),
                tenant_id: None,
                actor_id: None,
                correlation_id,
                event_type,
                severity: EventSeverity::Info,
                resource_type: None,
                resource_id: None,
                data: serde_json::Value::Null,
                created_at: Utc::now(),
            },
        }
    }

    pub fn severity(mut self, severity: EventSeverity) -> Self {
        self.event.severity = severity;
        self
    }

    pub fn tenant_id(mut self, tenant_id: Uuid) -> Self {
        self.event.tenant_id = Some(tenant_id);
        self
    }

    pub fn actor_id(mut self, actor_id: Uuid) -> Self {
        self.event.actor_id = Some(actor_id);
        self
    }

    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: Uuid) -> Self {
        self.event.resource_type = Some(resource_type.into());
        self.event.resource_id = Some(resource_id);
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.event.data = data;
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

impl AuditEvent {
    pub fn builder(event_type: EventType, correlation_id: Uuid) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type, correlation_id)
    }

    /// Whether this event should feed the alerting path rather than just the log.
    pub fn should_alert(&self) -> bool {
        matches!(self.severity, EventSeverity::Critical)
            || matches!(
                self.event_type,
                EventType::ComplianceBlocked
                    | EventType::BudgetExceeded
                    | EventType::CircuitOpened
                    | EventType::AlertEscalated
                    | EventType::AlertDeliveryFailed
            )
    }

    pub fn category(&self) -> &'static str {
        match &self.event_type {
            EventType::ScreeningStarted
            | EventType::ScreeningCompleted
            | EventType::ScreeningCancelled
            | EventType::ScreeningResumed
            | EventType::CheckpointCreated => "screening",

            EventType::EntityCreated | EventType::EntityMerged => "entity",

            EventType::ComplianceDecision
            | EventType::ComplianceBlocked
            | EventType::ConsentRecorded
            | EventType::ConsentExpired => "compliance",

            EventType::BudgetExceeded
            | EventType::CircuitOpened
            | EventType::CircuitClosed
            | EventType::ProviderFallback => "provider_routing",

            EventType::VigilanceChanged
            | EventType::AlertGenerated
            | EventType::AlertEscalated
            | EventType::AlertDelivered
            | EventType::AlertDeliveryFailed => "monitoring",

            EventType::Custom(_) => "custom",
        }
    }

    pub fn to_log_format(&self) -> String {
        format!(
            "[{}] {} actor={} resource={}/{}",
            self.severity,
            self.event_type,
            self.actor_id.map(|id| id.to_string()).unwrap_or_else(|| "system".to_string()),
            self.resource_type.as_deref().unwrap_or("-"),
            self.resource_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_info_severity() {
        let event = AuditEvent::builder(EventType::ScreeningStarted, Uuid::now_v7()).build();
        assert_eq!(event.severity, EventSeverity::Info);
        assert!(!event.should_alert());
    }

    #[test]
    fn compliance_blocked_always_alerts() {
        let event = AuditEvent::builder(EventType::ComplianceBlocked, Uuid::now_v7()).build();
        assert!(event.should_alert());
        assert_eq!(event.category(), "compliance");
    }
}
