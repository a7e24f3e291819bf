pub mod audit;
pub mod config;
pub mod database;
pub mod error;
pub mod jobs;
pub mod security;
pub mod types;
pub mod utils;

pub use audit::{AuditEvent, AuditLogger, AuditRepository};
pub use config::{Config, CorsConfig};
pub use database::DatabasePool;
pub use error::{Error, ErrorCode, ErrorContext, ErrorMetrics, Result};
pub use jobs::{JobExecutor, JobQueue, RedisJobQueue, SerializableJob};
pub use security::EncryptionService;
pub use types::*;

// Re-export commonly used types from dependencies
pub use uuid::Uuid;
pub use chrono::{DateTime, Utc};