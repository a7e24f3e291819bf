//! Alert generation and delivery for monitored entities (spec §4.9).
//! A delta only becomes an alert once it clears the gate for the entity's
//! current vigilance level -- V1 only cares about new high/critical
//! findings, V2 reacts to any new finding, V3 also flags any risk-score
//! movement at all. Delivery retries `notification_retry_count` times with
//! `notification_retry_delay_secs` between attempts before the alert is
//! recorded as failed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use screening_core::audit::{AuditLogger, EventSeverity, EventType};
use screening_core::config::MonitoringConfig;
use screening_core::error::Result;
use uuid::Uuid;

use super::delta::ProfileDelta;
use crate::types::VigilanceLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub severity: AlertSeverity,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Where a generated alert is actually sent (email, webhook, paging system).
/// Kept narrow and fallible so delivery failures drive the retry loop.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// Delivers nowhere; used where an alert only needs to be recorded in the
/// audit log, not pushed to an external channel.
pub struct NullSink;

#[async_trait]
impl AlertSink for NullSink {
    async fn deliver(&self, _alert: &Alert) -> Result<()> {
        Ok(())
    }
}

struct EscalationWindow {
    alerts: Vec<DateTime<Utc>>,
}

pub struct AlertGenerator {
    config: MonitoringConfig,
    sink: Arc<dyn AlertSink>,
    windows: DashMap<Uuid, EscalationWindow>,
}

impl AlertGenerator {
    pub fn new(config: MonitoringConfig, sink: Arc<dyn AlertSink>) -> Self {
        Self { config, sink, windows: DashMap::new() }
    }

    fn clears_vigilance_gate(level: VigilanceLevel, delta: &ProfileDelta) -> bool {
        match level {
            VigilanceLevel::V0 => false,
            VigilanceLevel::V1 => !delta.new_finding_categories.is_empty() && delta.risk_delta >= 25.0,
            VigilanceLevel::V2 => !delta.new_finding_categories.is_empty(),
            VigilanceLevel::V3 => delta.has_material_change(),
        }
    }

    /// Evaluates a delta against the entity's vigilance level and, if it
    /// clears the gate, builds, delivers, and audits an alert. Returns
    /// `None` when the delta didn't warrant one.
    pub async fn evaluate(
        &self,
        audit: &AuditLogger,
        tenant_id: Uuid,
        correlation_id: Uuid,
        level: VigilanceLevel,
        delta: &ProfileDelta,
    ) -> Result<Option<Alert>> {
        if !Self::clears_vigilance_gate(level, delta) {
            return Ok(None);
        }

        let severity = if delta.risk_delta >= 50.0 {
            AlertSeverity::Critical
        } else if delta.risk_delta >= 25.0 {
            AlertSeverity::Warning
        } else {
            AlertSeverity::Info
        };

        let alert = Alert {
            id: Uuid::now_v7(),
            entity_id: delta.entity_id,
            severity,
            summary: format!(
                "risk moved {:+.1} ({} new finding categor{})",
                delta.risk_delta,
                delta.new_finding_categories.len(),
                if delta.new_finding_categories.len() == 1 { "y" } else { "ies" },
            ),
            created_at: Utc::now(),
        };

        self.deliver_with_retry(audit, tenant_id, correlation_id, &alert).await?;
        self.record_and_maybe_escalate(audit, tenant_id, correlation_id, &alert).await?;

        Ok(Some(alert))
    }

    async fn deliver_with_retry(&self, audit: &AuditLogger, tenant_id: Uuid, correlation_id: Uuid, alert: &Alert) -> Result<()> {
        let mut last_error = None;
        for attempt in 0..=self.config.notification_retry_count {
            match self.sink.deliver(alert).await {
                Ok(()) => {
                    let event_severity = to_event_severity(alert.severity);
                    return audit.log_alert(tenant_id, correlation_id, alert.id, EventType::AlertGenerated, event_severity).await;
                }
                Err(err) => {
                    last_error = Some(err);
                    if attempt < self.config.notification_retry_count {
                        tokio::time::sleep(Duration::from_secs(self.config.notification_retry_delay_secs)).await;
                    }
                }
            }
        }

        audit
            .log_alert(tenant_id, correlation_id, alert.id, EventType::AlertDeliveryFailed, EventSeverity::Warning)
            .await?;
        Err(last_error.unwrap_or_else(|| screening_core::error::Error::internal("alert delivery failed with no recorded cause")))
    }

    async fn record_and_maybe_escalate(&self, audit: &AuditLogger, tenant_id: Uuid, correlation_id: Uuid, alert: &Alert) -> Result<()> {
        let window_start = alert.created_at - chrono::Duration::hours(self.config.alert_window_hours);
        let mut window = self.windows.entry(alert.entity_id).or_insert_with(|| EscalationWindow { alerts: Vec::new() });
        window.alerts.retain(|t| *t >= window_start);
        window.alerts.push(alert.created_at);

        if window.alerts.len() as u32 >= self.config.max_alerts_before_escalation {
            audit
                .log_alert(tenant_id, correlation_id, alert.id, EventType::AlertEscalated, EventSeverity::Critical)
                .await?;
        }

        Ok(())
    }
}

fn to_event_severity(severity: AlertSeverity) -> EventSeverity {
    match severity {
        AlertSeverity::Info => EventSeverity::Info,
        AlertSeverity::Warning => EventSeverity::Warning,
        AlertSeverity::Critical => EventSeverity::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_core::audit::traits::BackendHealth;
    use screening_core::audit::{AuditBackend, AuditEvent, AuditFilter};
    use screening_core::error::ErrorMetrics;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditBackend for RecordingBackend {
        async fn store_event(&self, event: &AuditEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
        async fn retrieve_events(&self, _filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
            Ok(self.events.lock().unwrap().clone())
        }
        async fn count_events(&self, _filter: &AuditFilter) -> Result<u64> {
            Ok(self.events.lock().unwrap().len() as u64)
        }
        async fn health_check(&self) -> Result<BackendHealth> {
            Ok(BackendHealth { is_healthy: true, message: None, last_write: None, events_stored_today: None })
        }
        async fn cleanup_old_events(&self, _older_than: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
    }

    fn audit() -> (AuditLogger, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        (AuditLogger::new(backend.clone(), Arc::new(ErrorMetrics::new())), backend)
    }

    fn delta(risk_delta: f64, new_categories: &[&str]) -> ProfileDelta {
        ProfileDelta {
            entity_id: Uuid::now_v7(),
            risk_score_before: 10.0,
            risk_score_after: 10.0 + risk_delta,
            risk_delta,
            new_finding_categories: new_categories.iter().map(|s| s.to_string()).collect(),
            resolved_finding_categories: vec![],
        }
    }

    #[tokio::test]
    async fn v0_never_alerts() {
        let generator = AlertGenerator::new(MonitoringConfig::default(), Arc::new(NullSink));
        let (audit, _backend) = audit();
        let result = generator
            .evaluate(&audit, Uuid::now_v7(), Uuid::now_v7(), VigilanceLevel::V0, &delta(60.0, &["CRIMINAL"]))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn v2_alerts_on_any_new_category() {
        let generator = AlertGenerator::new(MonitoringConfig::default(), Arc::new(NullSink));
        let (audit, _backend) = audit();
        let result = generator
            .evaluate(&audit, Uuid::now_v7(), Uuid::now_v7(), VigilanceLevel::V2, &delta(2.0, &["FINANCIAL"]))
            .await
            .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn v1_ignores_small_risk_movement_even_with_new_category() {
        let generator = AlertGenerator::new(MonitoringConfig::default(), Arc::new(NullSink));
        let (audit, _backend) = audit();
        let result = generator
            .evaluate(&audit, Uuid::now_v7(), Uuid::now_v7(), VigilanceLevel::V1, &delta(2.0, &["FINANCIAL"]))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    struct AlwaysFailSink;

    #[async_trait]
    impl AlertSink for AlwaysFailSink {
        async fn deliver(&self, _alert: &Alert) -> Result<()> {
            Err(screening_core::error::Error::internal("delivery unavailable"))
        }
    }

    #[tokio::test]
    async fn repeated_delivery_failure_is_recorded_as_delivery_failed() {
        let mut config = MonitoringConfig::default();
        config.notification_retry_count = 0;
        config.notification_retry_delay_secs = 0;
        let generator = AlertGenerator::new(config, Arc::new(AlwaysFailSink));
        let (audit, backend) = audit();

        let outcome = generator
            .evaluate(&audit, Uuid::now_v7(), Uuid::now_v7(), VigilanceLevel::V3, &delta(60.0, &["CRIMINAL"]))
            .await;
        assert!(outcome.is_err());

        let stored = backend.events.lock().unwrap();
        assert!(stored.iter().any(|e| e.event_type == EventType::AlertDeliveryFailed));
    }
}
