//! SQLite-backed repository.
//!
//! Used for single-user deployments and for exercising the SQL paths in tests
//! via `sqlite::memory:`. Foreign keys are switched on for every connection so
//! referential integrity matches Postgres.
//!
//! Transactions start deferred. When two writers overlap, SQLite refuses the
//! second one with `SQLITE_BUSY`, which surfaces as `Conflict` (see
//! [`crate::error`]).

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::sql_backend::sql_repository;
use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for a `sqlite:` URL, creating the database file if needed.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StoreError::Config(format!("invalid sqlite url '{}': {e}", config.url)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if config.is_sqlite_memory() {
            // One private database per connection: keep exactly one alive.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

sql_repository!(
    SqliteRepository,
    sqlx::Sqlite,
    sqlx::SqliteConnection,
    crate::config::Dialect::Sqlite
);

#[cfg(test)]
mod tests {
    use autotraq_catalog::CreatePart;
    use autotraq_core::{Aggregate, AggregateRoot, DomainError};
    use autotraq_inventory::{InventoryCommand, InventoryStatus, NewInventory, TransitionStatus};
    use chrono::Utc;

    use super::*;
    use crate::repository::Repository;

    async fn repo() -> SqliteRepository {
        let config = DatabaseConfig::parse("sqlite::memory:").unwrap();
        let repo = SqliteRepository::connect(&config).await.unwrap();
        repo.create_schema().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict_and_writes_nothing() {
        let repo = repo().await;
        repo.create_part(CreatePart {
            name: "Alternator".to_string(),
            make: "Honda".to_string(),
            model: "Civic".to_string(),
            year: 2015,
            color: "black".to_string(),
            sku: "HC15-ALT-01".to_string(),
            quality: "A".to_string(),
            miles: 45_000,
        })
        .await
        .unwrap();
        let recorded = repo
            .record_inventory(NewInventory::parse("HC15-ALT-01", "WH-1", None).unwrap())
            .await
            .unwrap();

        // A second writer loaded version 1 and decided on `damaged`...
        let mut stale = recorded.clone();
        let events = stale
            .execute(&InventoryCommand::TransitionStatus(TransitionStatus {
                inventory_id: stale.id_typed(),
                status: InventoryStatus::Damaged,
                occurred_at: Utc::now(),
            }))
            .unwrap();

        // ...while the first one reserved it.
        repo.transition_status(recorded.id_typed(), InventoryStatus::Reserved)
            .await
            .unwrap();

        let mut tx = repo.pool().begin().await.unwrap();
        let err = store::save_transition(&mut tx, 1, &stale, &events)
            .await
            .unwrap_err();
        drop(tx);
        assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))));

        let current = repo.get_inventory(recorded.id_typed()).await.unwrap();
        assert_eq!(current.status(), InventoryStatus::Reserved);
        assert_eq!(current.version(), 2);
        assert_eq!(repo.inventory_history(recorded.id_typed()).await.unwrap().len(), 2);
    }
}
