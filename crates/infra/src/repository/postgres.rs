//! Postgres-backed repository.
//!
//! Every mutating operation runs in one transaction. Referential integrity and
//! SKU uniqueness are enforced by the schema as well as checked up front, so a
//! concurrent writer that slips between check and insert still surfaces as a
//! domain error (see [`crate::error`] for the mapping). Under READ COMMITTED
//! a transition that waited on a concurrent update re-checks `version` and
//! matches no row, so the loser gets `Conflict`.
//!
//! ## Thread Safety
//!
//! `PostgresRepository` is `Send + Sync`; the SQLx pool handles connection
//! sharing.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use super::sql_backend::sql_repository;
use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult, map_sqlx_error};

/// Postgres repository over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| StoreError::Config(format!("invalid postgres url: {e}")))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

sql_repository!(
    PostgresRepository,
    sqlx::Postgres,
    sqlx::PgConnection,
    crate::config::Dialect::Postgres
);
