//! Vigilance level assignment and auto-escalation. A subject's level is
//! assigned once (role + initial risk score) and can only move up from
//! there -- a later low-risk screening never demotes an existing V2/V3
//! subject back down, since the point of vigilance is catching a subject
//! who later turns risky, not un-watching one who currently looks clean.

use dashmap::DashMap;
use screening_core::audit::AuditLogger;
use screening_core::error::Result;
use uuid::Uuid;

use crate::types::{RiskLevel, RoleCategory, VigilanceLevel};

#[derive(Debug, Clone, Copy)]
pub struct VigilanceRecord {
    pub level: VigilanceLevel,
    pub last_checked_at: chrono::DateTime<chrono::Utc>,
}

/// Tracks the current vigilance level per entity. One instance is shared
/// (via `Arc`) across the monitoring scheduler and the orchestrator.
pub struct VigilanceManager {
    records: DashMap<Uuid, VigilanceRecord>,
}

impl Default for VigilanceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl VigilanceManager {
    pub fn new() -> Self {
        Self { records: DashMap::new() }
    }

    pub fn record_for(&self, entity_id: Uuid) -> Option<VigilanceRecord> {
        self.records.get(&entity_id).map(|r| *r)
    }

    /// Role baseline: Security/Government/Executive start at V2, everything
    /// else starts at V1. A risk level of High or Critical bumps the
    /// baseline by one step (capped at V3).
    fn baseline_level(role: RoleCategory, risk_level: RiskLevel) -> VigilanceLevel {
        let base = match role {
            RoleCategory::Security | RoleCategory::Government | RoleCategory::Executive => VigilanceLevel::V2,
            _ => VigilanceLevel::V1,
        };
        match (base, risk_level) {
            (VigilanceLevel::V2, RiskLevel::High | RiskLevel::Critical) => VigilanceLevel::V3,
            (VigilanceLevel::V1, RiskLevel::High | RiskLevel::Critical) => VigilanceLevel::V2,
            _ => base,
        }
    }

    /// Assigns an initial level on first screening, or escalates an
    /// existing one if the newly computed level is higher. Returns the
    /// resulting (possibly unchanged) level.
    pub async fn assign_or_escalate(
        &self,
        audit: &AuditLogger,
        tenant_id: Uuid,
        correlation_id: Uuid,
        entity_id: Uuid,
        role: RoleCategory,
        risk_level: RiskLevel,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<VigilanceLevel> {
        let candidate = Self::baseline_level(role, risk_level);

        let previous = self.record_for(entity_id);
        let resolved = match previous {
            Some(record) if record.level >= candidate => record.level,
            _ => candidate,
        };

        if previous.map(|r| r.level) != Some(resolved) {
            let from = previous.map(|r| format!("{:?}", r.level)).unwrap_or_else(|| "NONE".to_string());
            audit.log_vigilance_changed(tenant_id, correlation_id, entity_id, &from, &format!("{:?}", resolved)).await?;
        }

        self.records.insert(entity_id, VigilanceRecord { level: resolved, last_checked_at: now });
        Ok(resolved)
    }

    /// Marks that a scheduled recheck ran now, without changing the level.
    pub fn mark_checked(&self, entity_id: Uuid, now: chrono::DateTime<chrono::Utc>) {
        if let Some(mut record) = self.records.get_mut(&entity_id) {
            record.last_checked_at = now;
        }
    }

    pub fn is_due(&self, entity_id: Uuid, now: chrono::DateTime<chrono::Utc>) -> bool {
        match self.record_for(entity_id) {
            Some(record) => match record.level.interval_days() {
                Some(days) => (now - record.last_checked_at) >= chrono::Duration::days(days),
                None => false,
            },
            None => false,
        }
    }

    pub fn due_entities(&self, now: chrono::DateTime<chrono::Utc>) -> Vec<Uuid> {
        self.records.iter().filter(|entry| self.is_due(*entry.key(), now)).map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_core::audit::traits::BackendHealth;
    use screening_core::audit::{AuditBackend, AuditEvent, AuditFilter};
    use screening_core::error::ErrorMetrics;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct NullBackend {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditBackend for NullBackend {
        async fn store_event(&self, event: &AuditEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
        async fn retrieve_events(&self, _filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
            Ok(self.events.lock().unwrap().clone())
        }
        async fn count_events(&self, _filter: &AuditFilter) -> Result<u64> {
            Ok(0)
        }
        async fn health_check(&self) -> Result<BackendHealth> {
            Ok(BackendHealth { is_healthy: true, message: None, last_write: None, events_stored_today: None })
        }
        async fn cleanup_old_events(&self, _older_than: chrono::DateTime<chrono::Utc>) -> Result<u64> {
            Ok(0)
        }
    }

    fn audit() -> AuditLogger {
        AuditLogger::new(Arc::new(NullBackend::default()), Arc::new(ErrorMetrics::new()))
    }

    #[tokio::test]
    async fn standard_role_low_risk_starts_at_v1() {
        let manager = VigilanceManager::new();
        let entity_id = Uuid::now_v7();
        let level = manager
            .assign_or_escalate(&audit(), Uuid::now_v7(), Uuid::now_v7(), entity_id, RoleCategory::Standard, RiskLevel::Low, chrono::Utc::now())
            .await
            .unwrap();
        assert_eq!(level, VigilanceLevel::V1);
    }

    #[tokio::test]
    async fn level_never_moves_down_on_a_later_clean_screening() {
        let manager = VigilanceManager::new();
        let entity_id = Uuid::now_v7();
        let audit = audit();

        manager
            .assign_or_escalate(&audit, Uuid::now_v7(), Uuid::now_v7(), entity_id, RoleCategory::Executive, RiskLevel::Critical, chrono::Utc::now())
            .await
            .unwrap();
        let level = manager
            .assign_or_escalate(&audit, Uuid::now_v7(), Uuid::now_v7(), entity_id, RoleCategory::Executive, RiskLevel::Low, chrono::Utc::now())
            .await
            .unwrap();

        assert_eq!(level, VigilanceLevel::V3);
    }

    #[test]
    fn v0_never_comes_due() {
        let manager = VigilanceManager::new();
        let entity_id = Uuid::now_v7();
        manager.records.insert(entity_id, VigilanceRecord { level: VigilanceLevel::V0, last_checked_at: chrono::Utc::now() - chrono::Duration::days(9999) });
        assert!(!manager.is_due(entity_id, chrono::Utc::now()));
    }
}
