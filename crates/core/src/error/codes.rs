use serde::{Deserialize, Serialize};
use std::fmt;

/// Taxonomy-first error codes shared across every layer of the screening core.
///
/// These are business-agnostic categories; the specific, human-facing reason
/// (e.g. `"d3_requires_enhanced"`) travels in [`crate::error::Error::details`]
/// under the `"reason"` key rather than as a new enum variant per case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Context & tenancy
    ContextMissing = 1000,
    TenantNotFound = 1001,
    TenantInactive = 1002,

    // Validation & compliance
    ValidationError = 1100,
    ComplianceBlocked = 1101,
    ConsentMissing = 1102,
    ConsentExpired = 1103,

    // Provider routing
    BudgetExceeded = 1200,
    CircuitOpen = 1201,
    RateLimited = 1202,
    ProviderTimeout = 1203,
    ProviderFailure = 1204,
    NoProviderAvailable = 1205,

    // Lifecycle
    Cancelled = 1300,

    // General system errors
    InternalError = 2000,
    ConfigurationError = 2001,
    ServiceUnavailable = 2002,
    Timeout = 2003,
    ResourceExhausted = 2004,

    // Database errors
    DatabaseConnectionError = 2100,
    DatabaseConstraintViolation = 2101,
    DatabaseTransactionError = 2102,
    DatabaseQueryError = 2103,

    // Network & serialization
    NetworkError = 2200,
    SerializationError = 2201,

    // Storage / crypto
    CacheError = 2300,
    StorageError = 2301,
    EncryptionError = 2302,
    DecryptionError = 2303,

    // Resource management
    ResourceNotFound = 2400,
    ResourceAlreadyExists = 2401,
    NotFound = 2402,
    NotImplemented = 2403,

    // Jobs (monitoring scheduler, alert delivery retries)
    JobQueueError = 2500,
    JobExecutionFailed = 2501,
    JobTimeout = 2502,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::ContextMissing => 401,
            ErrorCode::TenantNotFound | ErrorCode::ResourceNotFound | ErrorCode::NotFound => 404,
            ErrorCode::TenantInactive => 403,

            ErrorCode::ValidationError => 400,
            ErrorCode::ComplianceBlocked => 403,
            ErrorCode::ConsentMissing | ErrorCode::ConsentExpired => 403,

            ErrorCode::BudgetExceeded => 402,
            ErrorCode::CircuitOpen | ErrorCode::NoProviderAvailable => 503,
            ErrorCode::RateLimited => 429,
            ErrorCode::ProviderTimeout => 504,
            ErrorCode::ProviderFailure => 502,

            ErrorCode::Cancelled => 499,

            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::DatabaseConnectionError
            | ErrorCode::DatabaseTransactionError
            | ErrorCode::DatabaseQueryError
            | ErrorCode::NetworkError
            | ErrorCode::SerializationError
            | ErrorCode::CacheError
            | ErrorCode::StorageError
            | ErrorCode::EncryptionError
            | ErrorCode::DecryptionError
            | ErrorCode::JobQueueError
            | ErrorCode::JobExecutionFailed => 500,

            ErrorCode::ServiceUnavailable => 503,
            ErrorCode::Timeout | ErrorCode::JobTimeout => 408,
            ErrorCode::ResourceExhausted => 507,
            ErrorCode::DatabaseConstraintViolation | ErrorCode::ResourceAlreadyExists => 409,
            ErrorCode::NotImplemented => 501,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::ContextMissing | ErrorCode::TenantNotFound | ErrorCode::TenantInactive => {
                "context"
            }
            ErrorCode::ValidationError => "validation",
            ErrorCode::ComplianceBlocked | ErrorCode::ConsentMissing | ErrorCode::ConsentExpired => {
                "compliance"
            }
            ErrorCode::BudgetExceeded
            | ErrorCode::CircuitOpen
            | ErrorCode::RateLimited
            | ErrorCode::ProviderTimeout
            | ErrorCode::ProviderFailure
            | ErrorCode::NoProviderAvailable => "provider_routing",
            ErrorCode::Cancelled => "lifecycle",
            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::ServiceUnavailable
            | ErrorCode::Timeout
            | ErrorCode::ResourceExhausted => "system",
            ErrorCode::DatabaseConnectionError
            | ErrorCode::DatabaseConstraintViolation
            | ErrorCode::DatabaseTransactionError
            | ErrorCode::DatabaseQueryError => "database",
            ErrorCode::NetworkError | ErrorCode::SerializationError => "network",
            ErrorCode::CacheError | ErrorCode::StorageError | ErrorCode::EncryptionError | ErrorCode::DecryptionError => {
                "storage"
            }
            ErrorCode::ResourceNotFound | ErrorCode::ResourceAlreadyExists | ErrorCode::NotFound => "resource",
            ErrorCode::NotImplemented => "system",
            ErrorCode::JobQueueError | ErrorCode::JobExecutionFailed | ErrorCode::JobTimeout => "jobs",
        }
    }

    /// Errors the router recovers from locally (retry / fallback) rather than surfacing, per
    /// the propagation policy: RateLimited and CircuitOpen are handled by trying fallbacks;
    /// ProviderTimeout and transient ProviderFailure are retried up to `max_retries`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::RateLimited
                | ErrorCode::CircuitOpen
                | ErrorCode::ProviderTimeout
                | ErrorCode::ProviderFailure
                | ErrorCode::NetworkError
                | ErrorCode::DatabaseConnectionError
                | ErrorCode::ServiceUnavailable
                | ErrorCode::CacheError
        )
    }

    pub fn should_log_as_error(&self) -> bool {
        !matches!(
            self,
            ErrorCode::ValidationError
                | ErrorCode::ComplianceBlocked
                | ErrorCode::ConsentMissing
                | ErrorCode::ConsentExpired
                | ErrorCode::ResourceNotFound
                | ErrorCode::NotFound
                | ErrorCode::RateLimited
                | ErrorCode::Cancelled
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
