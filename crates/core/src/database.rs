//! # Database Connection Pool
//!
//! Every screening-domain entity carries tenant isolation as a *column*, not
//! a schema (see `Entity`, `CachedResponse` in the data model): paid-external
//! data is shared across tenants, customer-provided data is scoped by
//! `tenant_id`. A single pool with row-level `WHERE tenant_id = $1` filtering
//! is therefore sufficient; there is no per-tenant schema to provision.

use crate::{config::DatabaseConfig, error::Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

/// Process-wide PostgreSQL connection pool.
#[derive(Clone)]
pub struct DatabasePool {
    pub main_pool: PgPool,
}

impl DatabasePool {
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        info!("Initializing database pool");

        let main_pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        info!("Database pool initialized successfully");

        Ok(Self { main_pool })
    }

    pub async fn check_health(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.main_pool).await?;
        Ok(())
    }
}
