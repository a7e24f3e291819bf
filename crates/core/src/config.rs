//! # Configuration Management
//!
//! Hierarchical configuration, loaded in order of increasing precedence:
//!
//! 1. `config/default.toml`
//! 2. `config/{environment}.toml`
//! 3. Environment variables (`DATABASE_URL`, `SAR_CONFIDENCE_THRESHOLD`, ...)
//!
//! The sections below mirror the tunables in the configuration table: SAR
//! loop thresholds, provider routing (router/breaker/rate-limiter), cache
//! freshness windows, cost budgets, and monitoring escalation policy.
//!
//! ```rust,no_run
//! use screening_core::Config;
//!
//! let config = Config::load().expect("failed to load configuration");
//! println!("database url: {}", config.database.url);
//! ```

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub security: SecurityConfig,
    pub server: ServerConfig,
    pub app: AppConfig,
    pub metrics: MetricsConfig,
    pub cors: CorsConfig,
    pub sar: SarConfig,
    pub provider: ProviderConfig,
    pub router: RouterConfig,
    pub breaker: BreakerConfig,
    pub cache: CacheConfig,
    pub budget: BudgetConfig,
    pub monitoring: MonitoringConfig,
}

/// PostgreSQL connection and pool settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/screening_test".to_string(),
            max_connections: 10,
            min_connections: 1,
        }
    }
}

/// Redis is used for the monitoring job queue (`RedisJobQueue`) and, where a
/// deployment wants it shared across processes, as a backing store for the
/// rate limiter / circuit breaker state that is otherwise process-local.
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: "redis://localhost".to_string(), max_connections: 10 }
    }
}

/// AES-GCM key used to encrypt raw provider responses and identifier values
/// at rest. Normalized data and audit events are never encrypted.
#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    pub aes_encryption_key: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { aes_encryption_key: "0123456789abcdef0123456789abcdef".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080, workers: 4 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub company_name: String,
    pub base_url: String,
    pub environment: String,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            company_name: "Screening".to_string(),
            base_url: "http://localhost:8080".to_string(),
            environment: "development".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false, port: 9090, path: "/metrics".to_string(), namespace: "screening".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age: Option<u64>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allowed_headers: vec!["content-type".to_string()],
            expose_headers: Vec::new(),
            max_age: Some(3600),
            allow_credentials: false,
        }
    }
}

/// SAR (Search-Assess-Refine) loop tunables. `*_foundation` variants apply
/// to Identity/Employment/Education; everything else uses the base value.
#[derive(Debug, Deserialize, Clone)]
pub struct SarConfig {
    pub confidence_threshold: f64,
    pub foundation_confidence_threshold: f64,
    pub max_iterations_per_type: u32,
    pub foundation_max_iterations: u32,
    pub min_gain_threshold: f64,
}

impl Default for SarConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
            foundation_confidence_threshold: 0.90,
            max_iterations_per_type: 3,
            foundation_max_iterations: 4,
            min_gain_threshold: 0.10,
        }
    }
}

/// Executor fan-out caps (§5 concurrency boundaries).
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub max_concurrent_queries: usize,
    pub max_concurrent_overall: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: 10,
            max_concurrent_overall: 20,
        }
    }
}

/// Request router retry/backoff/timeout policy.
#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    pub max_retries: u32,
    pub base_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub retry_jitter: f64,
    pub timeout_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 10_000,
            retry_jitter: 0.1,
            timeout_secs: 30,
        }
    }
}

/// Per-provider circuit breaker thresholds.
#[derive(Debug, Deserialize, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_secs: u64,
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            timeout_secs: 60,
            half_open_max_calls: 3,
        }
    }
}

/// Default freshness windows per check-type category (§4.4). A category not
/// present here falls back to `fallback_fresh`/`fallback_stale`.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub criminal_fresh_days: i64,
    pub criminal_stale_days: i64,
    pub credit_fresh_days: i64,
    pub credit_stale_days: i64,
    pub employment_fresh_days: i64,
    pub employment_stale_days: i64,
    pub education_fresh_days: i64,
    pub education_stale_days: i64,
    pub identity_fresh_days: i64,
    pub identity_stale_days: i64,
    pub fallback_fresh_days: i64,
    pub fallback_stale_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            criminal_fresh_days: 7,
            criminal_stale_days: 14,
            credit_fresh_days: 30,
            credit_stale_days: 30,
            employment_fresh_days: 30,
            employment_stale_days: 60,
            education_fresh_days: 90,
            education_stale_days: 180,
            identity_fresh_days: 30,
            identity_stale_days: 60,
            fallback_fresh_days: 7,
            fallback_stale_days: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BudgetConfig {
    pub warning_threshold: f64,
    pub hard_limit: bool,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            warning_threshold: 0.8,
            hard_limit: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitoringConfig {
    pub alert_window_hours: i64,
    pub max_alerts_before_escalation: u32,
    pub notification_retry_count: u32,
    pub notification_retry_delay_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            alert_window_hours: 24,
            max_alerts_before_escalation: 3,
            notification_retry_count: 3,
            notification_retry_delay_secs: 30,
        }
    }
}

impl Default for Config {
    /// Defaults for every section, used by tests that need a fully-populated
    /// `Config` without going through `Config::load`'s file/env discovery.
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            security: SecurityConfig::default(),
            server: ServerConfig::default(),
            app: AppConfig::default(),
            metrics: MetricsConfig::default(),
            cors: CorsConfig::default(),
            sar: SarConfig::default(),
            provider: ProviderConfig::default(),
            router: RouterConfig::default(),
            breaker: BreakerConfig::default(),
            cache: CacheConfig::default(),
            budget: BudgetConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, merging defaults, environment-specific TOML, and
    /// environment variables (highest precedence), then validates security
    /// invariants for the detected environment.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            .add_source(Environment::with_prefix("").separator("__"));

        let built = builder.build()?;
        let mut loaded_config: Config = built.try_deserialize()?;

        loaded_config.validate(&environment)?;

        Ok(loaded_config)
    }

    fn validate(&mut self, environment: &str) -> Result<(), ConfigError> {
        if self.security.aes_encryption_key.len() != 32 {
            return Err(ConfigError::Message(format!(
                "AES encryption key must be exactly 32 characters long (current: {})",
                self.security.aes_encryption_key.len()
            )));
        }

        if !self.database.url.starts_with("postgresql://") {
            return Err(ConfigError::Message(
                "Database URL must be a PostgreSQL connection string starting with 'postgresql://'".to_string(),
            ));
        }

        if !self.redis.url.starts_with("redis://") {
            return Err(ConfigError::Message(
                "Redis URL must be a Redis connection string starting with 'redis://'".to_string(),
            ));
        }

        if self.sar.foundation_confidence_threshold < self.sar.confidence_threshold {
            return Err(ConfigError::Message(
                "foundation_confidence_threshold must be >= confidence_threshold".to_string(),
            ));
        }

        if environment == "production" {
            self.validate_production_security()?;
        }

        Ok(())
    }

    fn validate_production_security(&self) -> Result<(), ConfigError> {
        const ERROR_INDICATORS: &[&str] = &[
            "ERROR_", "INSECURE_DEFAULT", "CHANGE_THIS", "NOT_SET", "CHECK_ENVIRONMENT", "PLACEHOLDER",
        ];

        for indicator in ERROR_INDICATORS {
            if self.security.aes_encryption_key.contains(indicator) {
                return Err(ConfigError::Message(format!(
                    "Production deployment detected an insecure AES encryption key. Set AES_ENCRYPTION_KEY. Found: {}",
                    indicator
                )));
            }
            if self.database.url.contains(indicator) {
                return Err(ConfigError::Message(format!(
                    "Production deployment detected a missing database configuration. Set DATABASE_URL. Found: {}",
                    indicator
                )));
            }
        }

        if self.cors.allowed_origins.iter().any(|o| o == "*") {
            return Err(ConfigError::Message(
                "Production deployment must not use a wildcard (*) CORS origin".to_string(),
            ));
        }

        if !self.budget.hard_limit {
            return Err(ConfigError::Message(
                "Production deployment must enforce budget.hard_limit".to_string(),
            ));
        }

        Ok(())
    }
}
