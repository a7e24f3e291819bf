use super::{ErrorCode, ErrorContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Low priority errors that don't affect system functionality
    Low,
    /// Medium priority errors that may degrade performance
    Medium,
    /// High priority errors that affect core functionality
    High,
    /// Critical errors that require immediate attention
    Critical,
}

/// Error categories for classification, mirroring [`ErrorCode::category`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Context,
    Validation,
    Compliance,
    ProviderRouting,
    Lifecycle,
    System,
    Database,
    Network,
    Storage,
    Resource,
    Jobs,
}

/// Main error type threaded through the screening core.
///
/// `code` identifies the taxonomy kind; anything more specific (e.g.
/// `"d3_requires_enhanced"`) travels in `details` or under
/// `context.metadata["reason"]` rather than as a new variant per case.
#[derive(Debug, ThisError, Clone)]
pub struct Error {
    /// Standardized error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional detailed description
    pub details: Option<String>,
    /// Error context for debugging
    pub context: ErrorContext,
    /// Error severity
    pub severity: ErrorSeverity,
    /// Optional cause chain
    pub cause: Option<Box<Error>>,
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            context: ErrorContext::new(),
            severity: Self::default_severity_for_code(code),
            cause: None,
        }
    }

    /// Create error with details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set error context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    /// Set error severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Chain with another error as cause
    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Add trace to context
    pub fn add_trace(mut self, trace: impl Into<String>) -> Self {
        self.context = self.context.add_trace(trace.into());
        self
    }

    /// Add metadata to context
    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.add_metadata(key.into(), value);
        self
    }

    /// Get HTTP status code
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self.code.category() {
            "context" => ErrorCategory::Context,
            "validation" => ErrorCategory::Validation,
            "compliance" => ErrorCategory::Compliance,
            "provider_routing" => ErrorCategory::ProviderRouting,
            "lifecycle" => ErrorCategory::Lifecycle,
            "database" => ErrorCategory::Database,
            "network" => ErrorCategory::Network,
            "storage" => ErrorCategory::Storage,
            "resource" => ErrorCategory::Resource,
            "jobs" => ErrorCategory::Jobs,
            _ => ErrorCategory::System,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Check if should be logged as error level
    pub fn should_log_as_error(&self) -> bool {
        self.code.should_log_as_error() || matches!(self.severity, ErrorSeverity::High | ErrorSeverity::Critical)
    }

    /// Convert to JSON for API responses (sanitized for security)
    pub fn to_api_response(&self) -> serde_json::Value {
        self.to_api_response_with_environment("development")
    }

    /// Convert to JSON for API responses with environment-specific sanitization
    pub fn to_api_response_with_environment(&self, environment: &str) -> serde_json::Value {
        let is_production = environment == "production";

        let (message, details) = if is_production {
            self.sanitize_for_production()
        } else {
            (self.message.clone(), self.details.clone())
        };

        serde_json::json!({
            "error": {
                "code": self.code,
                "message": message,
                "details": if is_production { None } else { details },
                "error_id": self.context.error_id,
                "request_id": self.context.request_id,
                "timestamp": self.context.timestamp
            }
        })
    }

    /// Convert to full debug JSON (for internal logging only, never for API responses)
    pub fn to_debug_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
                "context": self.context,
                "severity": self.severity,
                "cause": self.cause.as_ref().map(|c| c.to_debug_json())
            }
        })
    }

    /// Sanitize error messages and details for production API responses
    fn sanitize_for_production(&self) -> (String, Option<String>) {
        let sanitized_message = match self.code {
            ErrorCode::ContextMissing => "Request context missing".to_string(),
            ErrorCode::TenantNotFound | ErrorCode::ResourceNotFound | ErrorCode::NotFound => {
                "Resource not found".to_string()
            }
            ErrorCode::TenantInactive => "Tenant is inactive".to_string(),

            ErrorCode::ValidationError => "Input validation failed".to_string(),

            ErrorCode::ComplianceBlocked => {
                "This check is not permitted for the given locale, role, or tier".to_string()
            }
            ErrorCode::ConsentMissing => "Subject consent is required".to_string(),
            ErrorCode::ConsentExpired => "Subject consent has expired".to_string(),

            ErrorCode::ResourceAlreadyExists => "Resource already exists".to_string(),

            ErrorCode::RateLimited => "Rate limit exceeded, please try again later".to_string(),

            ErrorCode::Cancelled => "Request was cancelled".to_string(),

            // Provider-routing and system errors - generic message to prevent information disclosure
            ErrorCode::BudgetExceeded
            | ErrorCode::CircuitOpen
            | ErrorCode::ProviderTimeout
            | ErrorCode::ProviderFailure
            | ErrorCode::NoProviderAvailable
            | ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::DatabaseConnectionError
            | ErrorCode::DatabaseConstraintViolation
            | ErrorCode::DatabaseTransactionError
            | ErrorCode::DatabaseQueryError
            | ErrorCode::NetworkError
            | ErrorCode::ServiceUnavailable
            | ErrorCode::Timeout
            | ErrorCode::CacheError
            | ErrorCode::StorageError
            | ErrorCode::SerializationError
            | ErrorCode::EncryptionError
            | ErrorCode::DecryptionError
            | ErrorCode::ResourceExhausted
            | ErrorCode::NotImplemented
            | ErrorCode::JobQueueError
            | ErrorCode::JobExecutionFailed
            | ErrorCode::JobTimeout => "An internal error occurred. Please try again later".to_string(),
        };

        // Never expose details in production
        (sanitized_message, None)
    }

    /// Get default severity for error code
    fn default_severity_for_code(code: ErrorCode) -> ErrorSeverity {
        match code {
            ErrorCode::ValidationError
            | ErrorCode::ResourceNotFound
            | ErrorCode::NotFound
            | ErrorCode::Cancelled
            | ErrorCode::NotImplemented => ErrorSeverity::Low,

            ErrorCode::ComplianceBlocked
            | ErrorCode::ConsentMissing
            | ErrorCode::ConsentExpired
            | ErrorCode::ResourceAlreadyExists
            | ErrorCode::RateLimited
            | ErrorCode::NoProviderAvailable
            | ErrorCode::Timeout
            | ErrorCode::JobTimeout => ErrorSeverity::Medium,

            ErrorCode::TenantNotFound
            | ErrorCode::TenantInactive
            | ErrorCode::BudgetExceeded
            | ErrorCode::CircuitOpen
            | ErrorCode::ProviderTimeout
            | ErrorCode::ProviderFailure
            | ErrorCode::DatabaseConnectionError
            | ErrorCode::NetworkError
            | ErrorCode::ServiceUnavailable
            | ErrorCode::ResourceExhausted
            | ErrorCode::CacheError
            | ErrorCode::StorageError
            | ErrorCode::JobQueueError
            | ErrorCode::JobExecutionFailed => ErrorSeverity::High,

            ErrorCode::ContextMissing
            | ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::DatabaseTransactionError
            | ErrorCode::DatabaseConstraintViolation
            | ErrorCode::DatabaseQueryError
            | ErrorCode::SerializationError
            | ErrorCode::EncryptionError
            | ErrorCode::DecryptionError => ErrorSeverity::Critical,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct ErrorSer {
            code: ErrorCode,
            message: String,
            details: Option<String>,
            context: ErrorContext,
            severity: ErrorSeverity,
        }

        let error_ser = ErrorSer {
            code: self.code,
            message: self.message.clone(),
            details: self.details.clone(),
            context: self.context.clone(),
            severity: self.severity,
        };

        error_ser.serialize(serializer)
    }
}

/// Convenience constructors, one per taxonomy kind.
impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn context_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ContextMissing, message)
    }

    pub fn tenant_not_found(tenant: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TenantNotFound, format!("tenant {} not found", tenant))
    }

    pub fn tenant_inactive(tenant: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TenantInactive, format!("tenant {} is inactive", tenant))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Validation error carrying a stable machine-readable reason under `context.metadata["reason"]`.
    pub fn validation_with_reason(reason: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message).add_metadata("reason", serde_json::json!(reason))
    }

    pub fn compliance_blocked(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ComplianceBlocked, reason)
    }

    pub fn consent_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConsentMissing, message)
    }

    pub fn consent_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConsentExpired, message)
    }

    pub fn budget_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BudgetExceeded, message)
    }

    pub fn circuit_open(provider_id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::CircuitOpen, format!("circuit open for provider {}", provider_id))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceAlreadyExists, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    pub fn provider_timeout(provider_id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::ProviderTimeout, format!("provider {} timed out", provider_id))
    }

    pub fn provider_failure(provider_id: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderFailure, message)
            .add_metadata("provider_id", serde_json::json!(provider_id.to_string()))
    }

    pub fn no_provider_available(check_type: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::NoProviderAvailable,
            format!("no provider available for {}", check_type),
        )
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, message)
    }
}

// Implement From for common error types
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                    ErrorCode::DatabaseConstraintViolation
                } else {
                    ErrorCode::DatabaseQueryError
                }
            }
            sqlx::Error::PoolTimedOut => ErrorCode::DatabaseConnectionError,
            sqlx::Error::Io(_) => ErrorCode::DatabaseConnectionError,
            sqlx::Error::RowNotFound => ErrorCode::ResourceNotFound,
            _ => ErrorCode::DatabaseQueryError,
        };

        Self::new(code, err.to_string())
            .add_trace("sqlx::Error conversion")
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        let code = match err.kind() {
            redis::ErrorKind::IoError => ErrorCode::NetworkError,
            redis::ErrorKind::TypeError | redis::ErrorKind::ExecAbortError => ErrorCode::SerializationError,
            _ => ErrorCode::CacheError,
        };

        Self::new(code, err.to_string())
            .add_trace("redis::RedisError conversion")
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, err.to_string())
            .add_trace("serde_json::Error conversion")
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::new(ErrorCode::ConfigurationError, err.to_string())
            .add_trace("config::ConfigError conversion")
    }
}
