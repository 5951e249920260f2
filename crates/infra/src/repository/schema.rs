//! Table definitions ("create all", no migrations).
//!
//! One template serves both SQL dialects; only the UUID and timestamp column
//! types differ. Every statement is idempotent.

use crate::config::Dialect;

struct ColumnTypes {
    uuid: &'static str,
    timestamp: &'static str,
}

fn column_types(dialect: Dialect) -> ColumnTypes {
    match dialect {
        Dialect::Postgres => ColumnTypes {
            uuid: "UUID",
            timestamp: "TIMESTAMPTZ",
        },
        // sqlx stores Uuid as a 16-byte BLOB and DateTime<Utc> as RFC 3339 TEXT.
        Dialect::Sqlite | Dialect::Memory => ColumnTypes {
            uuid: "BLOB",
            timestamp: "TEXT",
        },
    }
}

/// DDL statements in dependency order.
pub fn create_statements(dialect: Dialect) -> Vec<String> {
    let ColumnTypes { uuid, timestamp: ts } = column_types(dialect);
    vec![
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS parts (
                id          {uuid} PRIMARY KEY,
                name        VARCHAR(30) NOT NULL,
                make        VARCHAR(30) NOT NULL,
                model       VARCHAR(30) NOT NULL,
                year        INTEGER NOT NULL,
                color       VARCHAR(30) NOT NULL,
                sku         VARCHAR(30) NOT NULL UNIQUE,
                quality     VARCHAR(30) NOT NULL,
                miles       BIGINT NOT NULL CHECK (miles >= 0),
                created_at  {ts} NOT NULL,
                updated_at  {ts} NOT NULL,
                retired_at  {ts} NULL
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS interchanges (
                part_id       {uuid} NOT NULL REFERENCES parts (id),
                equivalent_id {uuid} NOT NULL REFERENCES parts (id),
                created_at    {ts} NOT NULL,
                PRIMARY KEY (part_id, equivalent_id),
                CHECK (part_id <> equivalent_id)
            )
            "#
        ),
        "CREATE INDEX IF NOT EXISTS interchanges_equivalent_idx ON interchanges (equivalent_id)"
            .to_string(),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS locations (
                id          VARCHAR(30) PRIMARY KEY,
                description VARCHAR(30) NOT NULL,
                created_at  {ts} NOT NULL
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS inventory (
                id             {uuid} PRIMARY KEY,
                sku            VARCHAR(30) NOT NULL REFERENCES parts (sku),
                location_id    VARCHAR(30) NOT NULL,
                status         VARCHAR(30) NOT NULL
                    CHECK (status IN ('in-stock', 'reserved', 'sold', 'damaged', 'disposed')),
                version        BIGINT NOT NULL,
                restocked_from {uuid} NULL REFERENCES inventory (id),
                created_at     {ts} NOT NULL,
                updated_at     {ts} NOT NULL
            )
            "#
        ),
        "CREATE INDEX IF NOT EXISTS inventory_sku_idx ON inventory (sku)".to_string(),
        // A sold unit goes back to stock at most once. NULLs do not collide.
        "CREATE UNIQUE INDEX IF NOT EXISTS inventory_restocked_from_idx \
         ON inventory (restocked_from)"
            .to_string(),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS inventory_events (
                inventory_id    {uuid} NOT NULL REFERENCES inventory (id),
                sequence_number BIGINT NOT NULL,
                event_type      VARCHAR(64) NOT NULL,
                status          VARCHAR(30) NOT NULL,
                previous_status VARCHAR(30) NULL,
                occurred_at     {ts} NOT NULL,
                PRIMARY KEY (inventory_id, sequence_number)
            )
            "#
        ),
    ]
}
