use std::sync::Arc;

use redis::aio::ConnectionManager;
use screening::entity::repository::PostgresEntityRepository;
use screening::monitoring::{AlertGenerator, MonitoringScheduler, VigilanceManager};
use screening::orchestrator::ScreeningOrchestrator;
use screening_core::audit::AuditLogger;
use screening_core::error::ErrorMetrics;
use screening_core::{Config, DatabasePool};

/// Shared process state. The orchestrator is the one stateful thing every
/// request handler needs; vigilance/scheduler/alerts exist independently of
/// any single screening and are polled by background callers, not handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: DatabasePool,
    pub redis: ConnectionManager,
    pub orchestrator: Arc<ScreeningOrchestrator<PostgresEntityRepository>>,
    pub vigilance: Arc<VigilanceManager>,
    pub monitoring_scheduler: Arc<MonitoringScheduler>,
    pub alert_generator: Arc<AlertGenerator>,
    pub audit: AuditLogger,
    pub error_metrics: Arc<ErrorMetrics>,
}
