//! Persistence of parts, interchanges and inventory.
//!
//! Every operation runs as a single unit of work: it either commits fully or
//! leaves the store untouched. Domain rules live in the catalog and inventory
//! crates; backends only enforce what needs the whole table (SKU uniqueness,
//! referential integrity, optimistic concurrency).

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod schema;
pub(crate) mod sql;
mod sql_backend;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};

use autotraq_catalog::{CreatePart, Interchange, LinkInterchange, Part, Sku, UpdatePart};
use autotraq_core::{InventoryId, PartId};
use autotraq_inventory::{
    CreateLocation, HistoryEntry, InventoryRecord, InventoryStatus, Location, LocationId,
    NewInventory,
};

use crate::config::{DatabaseConfig, Dialect};
use crate::error::StoreResult;

pub use in_memory::InMemoryRepository;
pub use postgres::PostgresRepository;
pub use query::{HistoryFilter, InventoryFilter, Page, Pagination, PartFilter, StockLevel};
pub use sqlite::SqliteRepository;

/// Storage port for the whole data model.
#[async_trait]
pub trait Repository: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Create all tables if they do not exist.
    async fn create_schema(&self) -> StoreResult<()>;

    // --- parts ---

    /// Validate and insert a part. A SKU already in use (even by a retired
    /// part) is a uniqueness error.
    async fn create_part(&self, input: CreatePart) -> StoreResult<Part>;

    async fn get_part(&self, id: PartId) -> StoreResult<Part>;

    async fn find_part_by_sku(&self, sku: &Sku) -> StoreResult<Option<Part>>;

    async fn update_part(&self, id: PartId, changes: UpdatePart) -> StoreResult<Part>;

    /// Soft-retire a part and drop all of its interchange links.
    async fn retire_part(&self, id: PartId) -> StoreResult<Part>;

    /// Parts ordered by SKU.
    async fn search_parts(&self, filter: &PartFilter, page: Pagination) -> StoreResult<Page<Part>>;

    // --- interchanges ---

    /// Record that `part_id` is interchangeable with each listed part.
    /// Existing links are kept; the full set for `part_id` is returned.
    async fn link_interchange(&self, link: LinkInterchange) -> StoreResult<Interchange>;

    /// Returns whether a link was removed.
    async fn unlink_interchange(&self, a: PartId, b: PartId) -> StoreResult<bool>;

    async fn equivalents_of(&self, part_id: PartId) -> StoreResult<Interchange>;

    // --- locations ---

    /// Register a location. A code already registered is a uniqueness error.
    async fn create_location(&self, input: CreateLocation) -> StoreResult<Location>;

    /// Registered locations ordered by code.
    async fn list_locations(&self) -> StoreResult<Vec<Location>>;

    // --- inventory ---

    async fn record_inventory(&self, input: NewInventory) -> StoreResult<InventoryRecord>;

    async fn get_inventory(&self, id: InventoryId) -> StoreResult<InventoryRecord>;

    async fn transition_status(
        &self,
        id: InventoryId,
        status: InventoryStatus,
    ) -> StoreResult<InventoryRecord>;

    /// Return a sold unit to stock as a new in-stock record. A sale is
    /// restocked at most once; a second attempt is a uniqueness error.
    async fn restock(
        &self,
        id: InventoryId,
        location_id: Option<LocationId>,
    ) -> StoreResult<InventoryRecord>;

    /// Records ordered by creation time.
    async fn list_inventory(&self, filter: &InventoryFilter) -> StoreResult<Vec<InventoryRecord>>;

    /// Status history, oldest first.
    async fn inventory_history(&self, id: InventoryId) -> StoreResult<Vec<HistoryEntry>>;

    /// Event ledger across all records, newest first.
    async fn inventory_events(
        &self,
        filter: &HistoryFilter,
        page: Pagination,
    ) -> StoreResult<Page<HistoryEntry>>;

    /// Number of in-stock units for a SKU, optionally at one location.
    async fn on_hand(&self, sku: &Sku, location_id: Option<&LocationId>) -> StoreResult<u64>;

    /// In-stock counts grouped by SKU and location, ordered by both. Groups
    /// with nothing in stock are omitted.
    async fn stock_levels(
        &self,
        sku: Option<&Sku>,
        location_id: Option<&LocationId>,
    ) -> StoreResult<Vec<StockLevel>>;
}

/// Open the backend selected by `config`.
pub async fn connect(config: &DatabaseConfig) -> StoreResult<Arc<dyn Repository>> {
    let repo: Arc<dyn Repository> = match config.dialect {
        Dialect::Memory => Arc::new(InMemoryRepository::new()),
        Dialect::Sqlite => Arc::new(SqliteRepository::connect(config).await?),
        Dialect::Postgres => Arc::new(PostgresRepository::connect(config).await?),
    };
    tracing::info!(dialect = %config.dialect, "repository connected");
    Ok(repo)
}

/// Current time at the precision every backend stores (microseconds).
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
