//! Infrastructure layer: configuration and storage backends.
//!
//! [`repository::connect`] turns a [`config::DatabaseConfig`] into a
//! [`repository::Repository`] backed by process memory, SQLite or Postgres.

pub mod config;
pub mod error;
pub mod repository;

pub use config::{DatabaseConfig, Dialect};
pub use error::{StoreError, StoreResult};
pub use repository::{
    HistoryFilter, InMemoryRepository, InventoryFilter, Page, Pagination, PartFilter,
    PostgresRepository, Repository, SqliteRepository, StockLevel, connect,
};
