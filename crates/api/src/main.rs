//! # Screening API Server
//!
//! The HTTP entry point into the screening platform, built with Axum. This
//! is deliberately a thin shim over the `screening` crate: one route takes
//! an intake request and hands it straight to `ScreeningOrchestrator::run`,
//! plus the health/readiness/metrics endpoints every deployed service needs.
//!
//! ## Middleware Stack
//!
//! 1. **Security headers**: HSTS, CSP, X-Frame-Options
//! 2. **Request ID**: correlation ID generation/propagation
//! 3. **Tenant header**: optional `X-Tenant-ID` extraction
//! 4. **Tracing**: structured request/response logging
//! 5. **Compression**: gzip/brotli response compression
//! 6. **CORS**: cross-origin policy from configuration
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin screening-server
//! ```
//!
//! - **API**: http://localhost:8080/v1/screenings
//! - **Health**: http://localhost:8080/health
//! - **Docs**: http://localhost:8080/swagger-ui

use axum::{http::StatusCode, response::IntoResponse, Json};
use axum::http::{HeaderName, HeaderValue, Method};
use redis::aio::ConnectionManager;
use screening::compliance::ComplianceEngine;
use screening::entity::repository::PostgresEntityRepository;
use screening::monitoring::{AlertGenerator, MonitoringScheduler, NullSink, VigilanceManager};
use screening::orchestrator::ScreeningOrchestrator;
use screening::routing::RoutingServices;
use screening_core::audit::{AuditLogger, AuditRepository, DatabaseAuditRepository};
use screening_core::error::ErrorMetrics;
use screening_core::{Config, CorsConfig, DatabasePool};
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api_middleware;
mod error;
mod handlers;
mod health;
mod state;

use crate::{handlers::screenings, state::AppState};

fn build_cors_layer(cors_config: &CorsConfig) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    let mut cors = CorsLayer::new();

    if cors_config.allowed_origins.contains(&"*".to_string()) {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Result<Vec<HeaderValue>, _> = cors_config.allowed_origins.iter().map(|origin| origin.parse()).collect();
        cors = cors.allow_origin(origins?);
    }

    if cors_config.allowed_methods.contains(&"*".to_string()) {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Result<Vec<Method>, _> = cors_config.allowed_methods.iter().map(|method| method.parse()).collect();
        cors = cors.allow_methods(methods?);
    }

    if cors_config.allowed_headers.contains(&"*".to_string()) {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Result<Vec<HeaderName>, _> = cors_config.allowed_headers.iter().map(|header| header.parse()).collect();
        cors = cors.allow_headers(headers?);
    }

    if !cors_config.expose_headers.is_empty() {
        let expose_headers: Result<Vec<HeaderName>, _> =
            cors_config.expose_headers.iter().map(|header| header.parse()).collect();
        cors = cors.expose_headers(expose_headers?);
    }

    cors = cors.allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting screening server...");

    // Config::load validates its own security invariants (AES key length,
    // CORS wildcard in production, budget.hard_limit) -- no separate
    // validation pass needed here.
    let config = Config::load()?;
    info!("Configuration loaded successfully");

    let db = DatabasePool::new(config.database.clone()).await?;
    info!("Database pool initialized");

    run_migrations(&db).await?;
    info!("Database migrations completed");

    let redis = init_redis(&config.redis.url).await?;
    info!("Redis connection established");

    let error_metrics = Arc::new(ErrorMetrics::new());
    let audit_backend = Arc::new(
        AuditRepository::new().add_backend(Box::new(DatabaseAuditRepository::new(Arc::new(db.main_pool.clone())))),
    );
    let audit = AuditLogger::new(audit_backend, error_metrics.clone());

    let repo = Arc::new(PostgresEntityRepository::new(Arc::new(db.main_pool.clone())));
    // `new` already seeds the enhanced-only / always-consent sets that most
    // deployments want; `with_builtin_restrictions` exists for tenants that
    // need to override them with a jurisdiction-specific table.
    let compliance = ComplianceEngine::new(Vec::new());
    let services = RoutingServices::new(&config);
    let orchestrator =
        Arc::new(ScreeningOrchestrator::new(repo, compliance, services, config.clone(), audit.clone()));

    let vigilance = Arc::new(VigilanceManager::new());
    let monitoring_scheduler = Arc::new(MonitoringScheduler::new(vigilance.clone()));
    let alert_generator = Arc::new(AlertGenerator::new(config.monitoring.clone(), Arc::new(NullSink)));

    let app_state = AppState {
        config: config.clone(),
        db,
        redis,
        orchestrator,
        vigilance,
        monitoring_scheduler,
        alert_generator,
        audit,
        error_metrics,
    };

    let app = create_app(app_state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn create_app(state: AppState) -> Result<axum::Router, Box<dyn std::error::Error>> {
    #[derive(OpenApi)]
    #[openapi(
        paths(health::health_check, health::readiness_check, health::metrics, screenings::create_screening),
        tags(
            (name = "health", description = "Health, readiness, and metrics endpoints"),
            (name = "screenings", description = "Screening intake"),
        )
    )]
    struct ApiDoc;

    let router = axum::Router::new()
        .route("/v1/screenings", axum::routing::post(screenings::create_screening))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", axum::routing::get(health::health_check))
        .route("/ready", axum::routing::get(health::readiness_check))
        .route("/metrics", axum::routing::get(health::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(api_middleware::security_headers::security_headers_middleware))
                .layer(axum::middleware::from_fn(api_middleware::request_id_middleware))
                .layer(axum::middleware::from_fn(api_middleware::tenant_header_middleware))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(build_cors_layer(&state.config.cors)?),
        )
        .with_state(state)
        .fallback(handler_404);

    Ok(router)
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "Resource not found" })))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "screening_api=debug,screening=debug,screening_core=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn init_redis(url: &str) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(url)?;
    ConnectionManager::new(client).await
}

async fn run_migrations(db: &DatabasePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");
    let migrator = sqlx::migrate!("../../migrations");
    migrator.run(&db.main_pool).await?;
    info!("Migrations completed successfully");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate()).expect("failed to install signal handler").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
