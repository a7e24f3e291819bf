pub mod event;
pub mod logger;
pub mod repository;
pub mod traits;

pub use event::{AuditEvent, AuditEventBuilder, EventSeverity, EventType};
pub use logger::{AuditContext, AuditLogger};
pub use repository::{AuditRepository, DatabaseAuditRepository};
pub use traits::{AuditBackend, AuditFilter, AuditFilterBuilder, Auditable};