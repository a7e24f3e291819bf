//! Drives recurring rechecks off `VigilanceLevel::interval_days()`. Rather
//! than rolling its own poller, the scheduler is itself a `JobHandler`
//! plugged into the existing generic job-queue infrastructure
//! (`screening_core::jobs::{RedisJobQueue, JobExecutor}`) -- the same
//! queue/executor pair any other background job in the system uses.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use screening_core::error::{Error, Result};
use screening_core::jobs::traits::{JobContext, JobHandlerConfig};
use screening_core::jobs::{JobHandler, JobResult};
use serde_json::Value;
use uuid::Uuid;

use super::vigilance::VigilanceManager;

pub const RECHECK_JOB_TYPE: &str = "monitoring_recheck";

/// Vigilance-interval-driven scheduler. `execute_due` is the direct entry
/// point for a cron-style caller; `JobHandler` is the entry point when a
/// recheck is dispatched through the shared job queue instead.
pub struct MonitoringScheduler {
    vigilance: Arc<VigilanceManager>,
}

impl MonitoringScheduler {
    pub fn new(vigilance: Arc<VigilanceManager>) -> Self {
        Self { vigilance }
    }

    /// Entities whose vigilance interval has elapsed since their last
    /// check, as of `now`. Marks each as checked immediately -- callers are
    /// expected to actually enqueue or run the recheck screening themselves;
    /// this only advances the schedule so a slow consumer doesn't cause the
    /// same entity to be returned again on the next poll.
    pub fn execute_due(&self, now: chrono::DateTime<chrono::Utc>) -> Vec<Uuid> {
        let due = self.vigilance.due_entities(now);
        for entity_id in &due {
            self.vigilance.mark_checked(*entity_id, now);
        }
        due
    }
}

#[async_trait]
impl JobHandler for MonitoringScheduler {
    fn job_type(&self) -> &'static str {
        RECHECK_JOB_TYPE
    }

    async fn handle(&self, job_data: &Value, _context: &JobContext) -> JobResult {
        let entity_id = match job_data.get("entity_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => id,
            None => return JobResult::failed("monitoring_recheck job is missing a valid entity_id"),
        };

        self.vigilance.mark_checked(entity_id, Utc::now());
        JobResult::success_with_result(serde_json::json!({ "entity_id": entity_id }))
    }

    fn validate_job_data(&self, job_data: &Value) -> Result<()> {
        job_data
            .get("entity_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(|_| ())
            .ok_or_else(|| Error::validation("monitoring_recheck job data requires a string entity_id"))
    }

    fn config(&self) -> JobHandlerConfig {
        JobHandlerConfig { max_concurrent_jobs: Some(1), default_timeout: Some(60), default_max_attempts: Some(3) }
    }
}

/// Serializable payload for enqueuing a recheck via `screening_core::jobs`.
pub struct RecheckJob {
    pub entity_id: Uuid,
}

impl screening_core::jobs::SerializableJob for RecheckJob {
    fn job_type(&self) -> &'static str {
        RECHECK_JOB_TYPE
    }

    fn serialize(&self) -> std::result::Result<Value, serde_json::Error> {
        Ok(serde_json::json!({ "entity_id": self.entity_id }))
    }

    fn deserialize(data: &Value) -> std::result::Result<Box<dyn screening_core::jobs::SerializableJob>, serde_json::Error> {
        let entity_id = data
            .get("entity_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| <serde_json::Error as serde::de::Error>::custom("missing entity_id"))?;
        Ok(Box::new(RecheckJob { entity_id }))
    }

    fn metadata(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("entity_id".to_string(), serde_json::json!(self.entity_id));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VigilanceLevel;
    use screening_core::audit::AuditLogger;
    use screening_core::audit::traits::BackendHealth;
    use screening_core::audit::{AuditBackend, AuditEvent, AuditFilter};
    use screening_core::error::ErrorMetrics;
    use async_trait::async_trait as _async_trait;

    #[derive(Default)]
    struct NullBackend;

    #[_async_trait]
    impl AuditBackend for NullBackend {
        async fn store_event(&self, _event: &AuditEvent) -> Result<()> {
            Ok(())
        }
        async fn retrieve_events(&self, _filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
            Ok(vec![])
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

    async fn seed_vigilance(vigilance: &VigilanceManager, entity_id: Uuid, level: VigilanceLevel, last_checked_days_ago: i64) {
        let audit = AuditLogger::new(Arc::new(NullBackend), Arc::new(ErrorMetrics::new()));
        let now = Utc::now() - chrono::Duration::days(last_checked_days_ago);
        vigilance
            .assign_or_escalate(
                &audit,
                Uuid::now_v7(),
                Uuid::now_v7(),
                entity_id,
                crate::types::RoleCategory::Executive,
                crate::types::RiskLevel::Critical,
                now,
            )
            .await
            .unwrap();
        let _ = level;
    }

    #[tokio::test]
    async fn due_entity_is_returned_once_then_rescheduled() {
        let vigilance = Arc::new(VigilanceManager::new());
        let entity_id = Uuid::now_v7();
        seed_vigilance(&vigilance, entity_id, VigilanceLevel::V3, 20).await;

        let scheduler = MonitoringScheduler::new(vigilance.clone());
        let now = Utc::now();
        let due = scheduler.execute_due(now);
        assert_eq!(due, vec![entity_id]);

        let due_again = scheduler.execute_due(now);
        assert!(due_again.is_empty());
    }

    #[test]
    fn validate_job_data_rejects_missing_entity_id() {
        let scheduler = MonitoringScheduler::new(Arc::new(VigilanceManager::new()));
        assert!(scheduler.validate_job_data(&serde_json::json!({})).is_err());
        assert!(scheduler.validate_job_data(&serde_json::json!({ "entity_id": Uuid::now_v7().to_string() })).is_ok());
    }
}
