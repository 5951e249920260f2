//! SQL shared by the SQLite and Postgres repositories.
//!
//! Statements use `$N` placeholders, which both drivers accept. Row decoding
//! and dynamic filters are generic over the sqlx database so each backend only
//! owns its pool and transaction handling.

use chrono::{DateTime, Utc};
use sqlx::{ColumnIndex, Database, Decode, Encode, QueryBuilder, Row, Type};
use uuid::Uuid;

use autotraq_catalog::{InterchangePair, Part, PartDetails, Sku};
use autotraq_core::{AggregateRoot, InventoryId, PartId};
use autotraq_inventory::{HistoryEntry, InventoryRecord, InventoryStatus, Location, LocationId};

use super::query::{HistoryFilter, InventoryFilter, PartFilter, StockLevel, like_pattern};
use crate::config::Dialect;
use crate::error::{StoreError, StoreResult};

pub(crate) const PART_COLUMNS: &str =
    "id, name, make, model, year, color, sku, quality, miles, created_at, updated_at, retired_at";

pub(crate) const INVENTORY_COLUMNS: &str =
    "id, sku, location_id, status, version, restocked_from, created_at, updated_at";

pub(crate) const INSERT_PART: &str = r#"
    INSERT INTO parts (
        id, name, make, model, year, color, sku, quality, miles, created_at, updated_at, retired_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

pub(crate) const UPDATE_PART: &str = r#"
    UPDATE parts
    SET name = $2, make = $3, model = $4, year = $5, color = $6, quality = $7, miles = $8,
        updated_at = $9, retired_at = $10
    WHERE id = $1
"#;

pub(crate) const SKU_TAKEN: &str = "SELECT 1 AS taken FROM parts WHERE sku = $1";

pub(crate) const INSERT_PAIR: &str = r#"
    INSERT INTO interchanges (part_id, equivalent_id, created_at)
    VALUES ($1, $2, $3)
    ON CONFLICT (part_id, equivalent_id) DO NOTHING
"#;

pub(crate) const DELETE_PAIR: &str =
    "DELETE FROM interchanges WHERE part_id = $1 AND equivalent_id = $2";

pub(crate) const DELETE_PAIRS_OF: &str =
    "DELETE FROM interchanges WHERE part_id = $1 OR equivalent_id = $1";

/// Both directions of the symmetric join table.
pub(crate) const SELECT_PAIRS_OF: &str = r#"
    SELECT part_id, equivalent_id
    FROM interchanges
    WHERE part_id = $1 OR equivalent_id = $1
"#;

pub(crate) const LOCATION_TAKEN: &str = "SELECT 1 AS taken FROM locations WHERE id = $1";

pub(crate) const INSERT_LOCATION: &str =
    "INSERT INTO locations (id, description, created_at) VALUES ($1, $2, $3)";

pub(crate) const SELECT_LOCATIONS: &str =
    "SELECT id, description, created_at FROM locations ORDER BY id ASC";

pub(crate) const INSERT_INVENTORY: &str = r#"
    INSERT INTO inventory (
        id, sku, location_id, status, version, restocked_from, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

/// Compare-and-set on `version`; zero rows affected means a concurrent writer won.
pub(crate) const UPDATE_INVENTORY_STATUS: &str = r#"
    UPDATE inventory
    SET status = $2, version = $3, updated_at = $4
    WHERE id = $1 AND version = $5
"#;

pub(crate) const SELECT_RESTOCKED_AS: &str = "SELECT id FROM inventory WHERE restocked_from = $1";

pub(crate) const INSERT_HISTORY: &str = r#"
    INSERT INTO inventory_events (
        inventory_id, sequence_number, event_type, status, previous_status, occurred_at
    )
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

pub(crate) const SELECT_HISTORY: &str = r#"
    SELECT inventory_id, sequence_number, event_type, status, previous_status, occurred_at
    FROM inventory_events
    WHERE inventory_id = $1
    ORDER BY sequence_number ASC
"#;

pub(crate) const HISTORY_COLUMNS: &str =
    "e.inventory_id, e.sequence_number, e.event_type, e.status, e.previous_status, e.occurred_at";

/// History rows joined to the record they belong to, for ledger filters.
pub(crate) const EVENTS_WITH_RECORD: &str =
    "inventory_events e JOIN inventory i ON i.id = e.inventory_id";

/// Types that can be read out of a row of database `DB`.
pub(crate) trait Column<'r, DB: Database>: Decode<'r, DB> + Type<DB> {}

impl<'r, DB: Database, T: Decode<'r, DB> + Type<DB>> Column<'r, DB> for T {}

pub(crate) fn decode_part<'r, R>(row: &'r R) -> StoreResult<Part>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    Uuid: Column<'r, R::Database>,
    String: Column<'r, R::Database>,
    i32: Column<'r, R::Database>,
    i64: Column<'r, R::Database>,
    DateTime<Utc>: Column<'r, R::Database>,
{
    let corrupt = |e: sqlx::Error| StoreError::corrupt("part row", e);

    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let name: String = row.try_get("name").map_err(corrupt)?;
    let make: String = row.try_get("make").map_err(corrupt)?;
    let model: String = row.try_get("model").map_err(corrupt)?;
    let year: i32 = row.try_get("year").map_err(corrupt)?;
    let color: String = row.try_get("color").map_err(corrupt)?;
    let sku: String = row.try_get("sku").map_err(corrupt)?;
    let quality: String = row.try_get("quality").map_err(corrupt)?;
    let miles: i64 = row.try_get("miles").map_err(corrupt)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(corrupt)?;
    let retired_at: Option<DateTime<Utc>> = row.try_get("retired_at").map_err(corrupt)?;

    let year = u16::try_from(year).map_err(|e| StoreError::corrupt("part year", e))?;
    let miles = u32::try_from(miles).map_err(|e| StoreError::corrupt("part miles", e))?;
    let details = PartDetails::new(&name, &make, &model, year, &color, &quality, miles)
        .map_err(|e| StoreError::corrupt("part row", e))?;
    let sku = Sku::new(&sku).map_err(|e| StoreError::corrupt("part sku", e))?;

    Ok(Part::restore(
        PartId::from_uuid(id),
        sku,
        details,
        created_at,
        updated_at,
        retired_at,
    ))
}

pub(crate) fn decode_pair<'r, R>(row: &'r R) -> StoreResult<InterchangePair>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    Uuid: Column<'r, R::Database>,
{
    let corrupt = |e: sqlx::Error| StoreError::corrupt("interchange row", e);
    let a: Uuid = row.try_get("part_id").map_err(corrupt)?;
    let b: Uuid = row.try_get("equivalent_id").map_err(corrupt)?;
    InterchangePair::new(PartId::from_uuid(a), PartId::from_uuid(b))
        .map_err(|e| StoreError::corrupt("interchange row", e))
}

pub(crate) fn decode_inventory<'r, R>(row: &'r R) -> StoreResult<InventoryRecord>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    Uuid: Column<'r, R::Database>,
    String: Column<'r, R::Database>,
    i64: Column<'r, R::Database>,
    DateTime<Utc>: Column<'r, R::Database>,
{
    let corrupt = |e: sqlx::Error| StoreError::corrupt("inventory row", e);

    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let sku: String = row.try_get("sku").map_err(corrupt)?;
    let location_id: String = row.try_get("location_id").map_err(corrupt)?;
    let status: String = row.try_get("status").map_err(corrupt)?;
    let version: i64 = row.try_get("version").map_err(corrupt)?;
    let restocked_from: Option<Uuid> = row.try_get("restocked_from").map_err(corrupt)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(corrupt)?;

    let invalid = |e: autotraq_core::DomainError| StoreError::corrupt("inventory row", e);
    Ok(InventoryRecord::restore(
        InventoryId::from_uuid(id),
        Sku::new(&sku).map_err(invalid)?,
        LocationId::new(&location_id).map_err(invalid)?,
        status.parse::<InventoryStatus>().map_err(invalid)?,
        restocked_from.map(InventoryId::from_uuid),
        u64::try_from(version).map_err(|e| StoreError::corrupt("inventory version", e))?,
        created_at,
        updated_at,
    ))
}

pub(crate) fn decode_history<'r, R>(row: &'r R) -> StoreResult<HistoryEntry>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    Uuid: Column<'r, R::Database>,
    String: Column<'r, R::Database>,
    i64: Column<'r, R::Database>,
    DateTime<Utc>: Column<'r, R::Database>,
{
    let corrupt = |e: sqlx::Error| StoreError::corrupt("history row", e);

    let inventory_id: Uuid = row.try_get("inventory_id").map_err(corrupt)?;
    let sequence_number: i64 = row.try_get("sequence_number").map_err(corrupt)?;
    let event_type: String = row.try_get("event_type").map_err(corrupt)?;
    let status: String = row.try_get("status").map_err(corrupt)?;
    let previous_status: Option<String> = row.try_get("previous_status").map_err(corrupt)?;
    let occurred_at: DateTime<Utc> = row.try_get("occurred_at").map_err(corrupt)?;

    let invalid = |e: autotraq_core::DomainError| StoreError::corrupt("history row", e);
    Ok(HistoryEntry {
        inventory_id: InventoryId::from_uuid(inventory_id),
        sequence_number: u64::try_from(sequence_number)
            .map_err(|e| StoreError::corrupt("history sequence", e))?,
        event_type,
        status: status.parse().map_err(invalid)?,
        previous_status: previous_status
            .map(|s| s.parse::<InventoryStatus>())
            .transpose()
            .map_err(invalid)?,
        occurred_at,
    })
}

pub(crate) fn decode_location<'r, R>(row: &'r R) -> StoreResult<Location>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    String: Column<'r, R::Database>,
    DateTime<Utc>: Column<'r, R::Database>,
{
    let corrupt = |e: sqlx::Error| StoreError::corrupt("location row", e);
    let id: String = row.try_get("id").map_err(corrupt)?;
    let description: String = row.try_get("description").map_err(corrupt)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;

    let id = LocationId::new(&id).map_err(|e| StoreError::corrupt("location id", e))?;
    Ok(Location::restore(id, description, created_at))
}

pub(crate) fn decode_stock_level<'r, R>(row: &'r R) -> StoreResult<StockLevel>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    String: Column<'r, R::Database>,
    i64: Column<'r, R::Database>,
{
    let corrupt = |e: sqlx::Error| StoreError::corrupt("stock level", e);
    let sku: String = row.try_get("sku").map_err(corrupt)?;
    let location_id: String = row.try_get("location_id").map_err(corrupt)?;
    let quantity: i64 = row.try_get("quantity").map_err(corrupt)?;

    let invalid = |e: autotraq_core::DomainError| StoreError::corrupt("stock level", e);
    Ok(StockLevel {
        sku: Sku::new(&sku).map_err(invalid)?,
        location_id: LocationId::new(&location_id).map_err(invalid)?,
        quantity: u64::try_from(quantity).map_err(|e| StoreError::corrupt("stock level", e))?,
    })
}

/// SQL expression lowering ASCII letters of `column` and nothing else.
///
/// SQLite's built-in `LOWER` is ASCII-only already; Postgres' folds Unicode.
fn ascii_lower(dialect: Dialect, column: &str) -> String {
    match dialect {
        Dialect::Postgres => format!(
            "TRANSLATE({column}, 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz')"
        ),
        Dialect::Sqlite | Dialect::Memory => format!("LOWER({column})"),
    }
}

/// Append the `WHERE` clause for a part search.
pub(crate) fn push_part_filter<'args, DB>(
    qb: &mut QueryBuilder<'args, DB>,
    filter: &PartFilter,
    dialect: Dialect,
) where
    DB: Database,
    String: 'args + Encode<'args, DB> + Type<DB>,
    i32: 'args + Encode<'args, DB> + Type<DB>,
{
    qb.push(" WHERE 1 = 1");
    if !filter.include_retired {
        qb.push(" AND retired_at IS NULL");
    }
    if let Some(text) = &filter.text {
        let pattern = like_pattern(text);
        qb.push(format!(" AND ({} LIKE ", ascii_lower(dialect, "name")))
            .push_bind(pattern.clone())
            .push(format!(" ESCAPE '\\' OR {} LIKE ", ascii_lower(dialect, "sku")))
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(make) = &filter.make {
        qb.push(format!(" AND {} = ", ascii_lower(dialect, "make")))
            .push_bind(make.to_ascii_lowercase());
    }
    if let Some(model) = &filter.model {
        qb.push(format!(" AND {} = ", ascii_lower(dialect, "model")))
            .push_bind(model.to_ascii_lowercase());
    }
    if let Some(year) = filter.year {
        qb.push(" AND year = ").push_bind(i32::from(year));
    }
}

/// Append the `WHERE` clause for an inventory listing.
pub(crate) fn push_inventory_filter<'args, DB>(
    qb: &mut QueryBuilder<'args, DB>,
    filter: &InventoryFilter,
) where
    DB: Database,
    String: 'args + Encode<'args, DB> + Type<DB>,
{
    qb.push(" WHERE 1 = 1");
    if let Some(sku) = &filter.sku {
        qb.push(" AND sku = ").push_bind(sku.as_str().to_string());
    }
    if let Some(location) = &filter.location_id {
        qb.push(" AND location_id = ").push_bind(location.as_str().to_string());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str().to_string());
    }
}

/// In-stock records of an optional SKU and location.
pub(crate) fn in_stock(sku: Option<&Sku>, location_id: Option<&LocationId>) -> InventoryFilter {
    InventoryFilter {
        sku: sku.cloned(),
        location_id: location_id.cloned(),
        status: Some(InventoryStatus::InStock),
    }
}

/// Append the `WHERE` clause for an event ledger query over
/// [`EVENTS_WITH_RECORD`].
pub(crate) fn push_history_filter<'args, DB>(
    qb: &mut QueryBuilder<'args, DB>,
    filter: &HistoryFilter,
) where
    DB: Database,
    String: 'args + Encode<'args, DB> + Type<DB>,
{
    qb.push(" WHERE 1 = 1");
    if let Some(sku) = &filter.sku {
        qb.push(" AND i.sku = ").push_bind(sku.as_str().to_string());
    }
    if let Some(location) = &filter.location_id {
        qb.push(" AND i.location_id = ").push_bind(location.as_str().to_string());
    }
    if let Some(event_type) = &filter.event_type {
        qb.push(" AND e.event_type = ").push_bind(event_type.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND e.status = ").push_bind(status.as_str().to_string());
    }
}

/// Bindable column values of an inventory record.
pub(crate) struct InventoryRow<'a> {
    pub id: Uuid,
    pub sku: &'a str,
    pub location_id: &'a str,
    pub status: &'static str,
    pub version: i64,
    pub restocked_from: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> InventoryRow<'a> {
    pub(crate) fn from_record(record: &'a InventoryRecord) -> StoreResult<Self> {
        let (Some(sku), Some(location_id), Some(created_at), Some(updated_at)) = (
            record.sku(),
            record.location_id(),
            record.created_at(),
            record.updated_at(),
        ) else {
            return Err(StoreError::Database(format!(
                "inventory {} has not been recorded",
                record.id_typed()
            )));
        };
        Ok(Self {
            id: *record.id_typed().as_uuid(),
            sku: sku.as_str(),
            location_id: location_id.as_str(),
            status: record.status().as_str(),
            version: to_i64("inventory version", record.version())?,
            restocked_from: record.restocked_from().map(|id| *id.as_uuid()),
            created_at,
            updated_at,
        })
    }
}

pub(crate) fn to_i64(what: &str, value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|e| StoreError::Database(format!("{what} out of range: {e}")))
}
