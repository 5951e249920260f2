//! The `Repository` implementation shared by the SQL backends.
//!
//! SQLite and Postgres run the same statements (see [`super::sql`]) through
//! the same transaction boundaries; only the pool type differs. A backend
//! module declares its repository struct with a `pool` field and invokes
//! [`sql_repository!`] with its sqlx database and connection types.
//!
//! Status transitions never lock the row up front. The `version` compare-and-set
//! in `UPDATE … WHERE version = $5` decides the winner, so a writer that lost a
//! race sees `Conflict` on both backends.

macro_rules! sql_repository {
    ($repo:ident, $db:ty, $conn:ty, $dialect:expr) => {
        mod store {
            use ::async_trait::async_trait;
            use ::sqlx::{QueryBuilder, Row};
            use ::tracing::instrument;

            use ::autotraq_catalog::{
                CreatePart, Interchange, InterchangePair, LinkInterchange, Part, Sku, UpdatePart,
            };
            use ::autotraq_core::{
                Aggregate, AggregateRoot, DomainError, ExpectedVersion, InventoryId, PartId,
            };
            use ::autotraq_inventory::{
                CreateLocation, HistoryEntry, InventoryCommand, InventoryEvent, InventoryRecord,
                InventoryStatus, Location, LocationId, NewInventory, TransitionStatus,
                history_entries,
            };

            use $crate::config::Dialect;
            use $crate::error::{StoreResult, map_sqlx_error};
            use $crate::repository::query::{
                HistoryFilter, InventoryFilter, Page, Pagination, PartFilter, StockLevel,
            };
            use $crate::repository::schema::create_statements;
            use $crate::repository::sql::{self, InventoryRow, to_i64};
            use $crate::repository::{Repository, now};

            use super::$repo;

            impl $repo {
                async fn conn(
                    &self,
                    operation: &str,
                ) -> StoreResult<::sqlx::pool::PoolConnection<$db>> {
                    self.pool
                        .acquire()
                        .await
                        .map_err(|e| map_sqlx_error(operation, e))
                }

                async fn begin(
                    &self,
                    operation: &str,
                ) -> StoreResult<::sqlx::Transaction<'static, $db>> {
                    self.pool
                        .begin()
                        .await
                        .map_err(|e| map_sqlx_error(operation, e))
                }
            }

            async fn commit(tx: ::sqlx::Transaction<'_, $db>, operation: &str) -> StoreResult<()> {
                tx.commit().await.map_err(|e| map_sqlx_error(operation, e))
            }

            async fn fetch_part(conn: &mut $conn, id: PartId) -> StoreResult<Option<Part>> {
                let row = ::sqlx::query(&format!(
                    "SELECT {} FROM parts WHERE id = $1",
                    sql::PART_COLUMNS
                ))
                .bind(*id.as_uuid())
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("fetch_part", e))?;
                row.as_ref().map(sql::decode_part).transpose()
            }

            async fn load_part(conn: &mut $conn, id: PartId) -> StoreResult<Part> {
                fetch_part(conn, id)
                    .await?
                    .ok_or_else(|| DomainError::not_found(format!("part {id}")).into())
            }

            async fn fetch_part_by_sku(conn: &mut $conn, sku: &Sku) -> StoreResult<Option<Part>> {
                let row = ::sqlx::query(&format!(
                    "SELECT {} FROM parts WHERE sku = $1",
                    sql::PART_COLUMNS
                ))
                .bind(sku.as_str())
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("fetch_part_by_sku", e))?;
                row.as_ref().map(sql::decode_part).transpose()
            }

            async fn ensure_sku_referenceable(conn: &mut $conn, sku: &Sku) -> StoreResult<()> {
                let part = fetch_part_by_sku(conn, sku)
                    .await?
                    .ok_or_else(|| DomainError::reference(format!("no part with SKU {sku}")))?;
                part.ensure_referenceable()?;
                Ok(())
            }

            async fn save_part(conn: &mut $conn, part: &Part, operation: &str) -> StoreResult<()> {
                let d = part.details();
                ::sqlx::query(sql::UPDATE_PART)
                    .bind(*part.id_typed().as_uuid())
                    .bind(d.name())
                    .bind(d.make())
                    .bind(d.model())
                    .bind(i32::from(d.year()))
                    .bind(d.color())
                    .bind(d.quality())
                    .bind(i64::from(d.miles()))
                    .bind(part.updated_at())
                    .bind(part.retired_at())
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| map_sqlx_error(operation, e))?;
                Ok(())
            }

            async fn fetch_interchange(
                conn: &mut $conn,
                part_id: PartId,
            ) -> StoreResult<Interchange> {
                let rows = ::sqlx::query(sql::SELECT_PAIRS_OF)
                    .bind(*part_id.as_uuid())
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(|e| map_sqlx_error("fetch_interchange", e))?;
                let pairs = rows
                    .iter()
                    .map(sql::decode_pair)
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(Interchange::from_pairs(part_id, pairs))
            }

            async fn fetch_inventory(
                conn: &mut $conn,
                id: InventoryId,
            ) -> StoreResult<InventoryRecord> {
                let row = ::sqlx::query(&format!(
                    "SELECT {} FROM inventory WHERE id = $1",
                    sql::INVENTORY_COLUMNS
                ))
                .bind(*id.as_uuid())
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("fetch_inventory", e))?;

                match row {
                    Some(row) => sql::decode_inventory(&row),
                    None => Err(DomainError::not_found(format!("inventory {id}")).into()),
                }
            }

            async fn fetch_restocked_as(
                conn: &mut $conn,
                id: InventoryId,
            ) -> StoreResult<Option<InventoryId>> {
                let row = ::sqlx::query(sql::SELECT_RESTOCKED_AS)
                    .bind(*id.as_uuid())
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(|e| map_sqlx_error("fetch_restocked_as", e))?;
                row.as_ref()
                    .map(|row| row.try_get::<::uuid::Uuid, _>("id"))
                    .transpose()
                    .map(|id| id.map(InventoryId::from_uuid))
                    .map_err(|e| map_sqlx_error("fetch_restocked_as", e))
            }

            async fn insert_inventory(
                conn: &mut $conn,
                record: &InventoryRecord,
            ) -> StoreResult<()> {
                let row = InventoryRow::from_record(record)?;
                ::sqlx::query(sql::INSERT_INVENTORY)
                    .bind(row.id)
                    .bind(row.sku)
                    .bind(row.location_id)
                    .bind(row.status)
                    .bind(row.version)
                    .bind(row.restocked_from)
                    .bind(row.created_at)
                    .bind(row.updated_at)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| map_sqlx_error("insert_inventory", e))?;
                Ok(())
            }

            async fn insert_history(conn: &mut $conn, entries: &[HistoryEntry]) -> StoreResult<()> {
                for entry in entries {
                    ::sqlx::query(sql::INSERT_HISTORY)
                        .bind(*entry.inventory_id.as_uuid())
                        .bind(to_i64("sequence number", entry.sequence_number)?)
                        .bind(entry.event_type.as_str())
                        .bind(entry.status.as_str())
                        .bind(entry.previous_status.map(InventoryStatus::as_str))
                        .bind(entry.occurred_at)
                        .execute(&mut *conn)
                        .await
                        .map_err(|e| map_sqlx_error("insert_history", e))?;
                }
                Ok(())
            }

            /// Execute a record command on a fresh aggregate and persist row plus history.
            async fn record_new(
                conn: &mut $conn,
                id: InventoryId,
                command: InventoryCommand,
            ) -> StoreResult<InventoryRecord> {
                let mut record = InventoryRecord::empty(id);
                let events = record.execute(&command)?;
                insert_inventory(conn, &record).await?;
                insert_history(conn, &history_entries(id, 0, &events)).await?;
                Ok(record)
            }

            /// Write a transitioned record if the stored row is still at
            /// `expected`, then append its history.
            pub(super) async fn save_transition(
                conn: &mut $conn,
                expected: u64,
                record: &InventoryRecord,
                events: &[InventoryEvent],
            ) -> StoreResult<()> {
                let id = record.id_typed();
                let row = InventoryRow::from_record(record)?;
                let result = ::sqlx::query(sql::UPDATE_INVENTORY_STATUS)
                    .bind(row.id)
                    .bind(row.status)
                    .bind(row.version)
                    .bind(row.updated_at)
                    .bind(to_i64("inventory version", expected)?)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| map_sqlx_error("transition_status", e))?;
                if result.rows_affected() == 0 {
                    let current = fetch_inventory(conn, id).await?;
                    ExpectedVersion::Exact(expected).check(current.version())?;
                }
                insert_history(conn, &history_entries(id, expected, events)).await
            }

            #[async_trait]
            impl Repository for $repo {
                fn dialect(&self) -> Dialect {
                    $dialect
                }

                #[instrument(skip(self), fields(operation = "create_schema"), err)]
                async fn create_schema(&self) -> StoreResult<()> {
                    for statement in create_statements($dialect) {
                        ::sqlx::query(&statement)
                            .execute(&self.pool)
                            .await
                            .map_err(|e| map_sqlx_error("create_schema", e))?;
                    }
                    Ok(())
                }

                #[instrument(
                    skip(self, input),
                    fields(operation = "create_part", sku = %input.sku),
                    err
                )]
                async fn create_part(&self, input: CreatePart) -> StoreResult<Part> {
                    let new_part = input.validate()?;
                    let mut tx = self.begin("create_part").await?;

                    let taken = ::sqlx::query(sql::SKU_TAKEN)
                        .bind(new_part.sku().as_str())
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error("create_part", e))?;
                    if taken.is_some() {
                        return Err(DomainError::uniqueness(format!(
                            "SKU {} is already in use",
                            new_part.sku()
                        ))
                        .into());
                    }

                    let part = new_part.into_part(PartId::new(), now());
                    let d = part.details();
                    ::sqlx::query(sql::INSERT_PART)
                        .bind(*part.id_typed().as_uuid())
                        .bind(d.name())
                        .bind(d.make())
                        .bind(d.model())
                        .bind(i32::from(d.year()))
                        .bind(d.color())
                        .bind(part.sku().as_str())
                        .bind(d.quality())
                        .bind(i64::from(d.miles()))
                        .bind(part.created_at())
                        .bind(part.updated_at())
                        .bind(part.retired_at())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error("create_part", e))?;

                    commit(tx, "create_part").await?;
                    Ok(part)
                }

                #[instrument(skip(self), fields(operation = "get_part"), err)]
                async fn get_part(&self, id: PartId) -> StoreResult<Part> {
                    let mut conn = self.conn("get_part").await?;
                    load_part(&mut conn, id).await
                }

                #[instrument(skip(self), fields(operation = "find_part_by_sku"), err)]
                async fn find_part_by_sku(&self, sku: &Sku) -> StoreResult<Option<Part>> {
                    let mut conn = self.conn("find_part_by_sku").await?;
                    fetch_part_by_sku(&mut conn, sku).await
                }

                #[instrument(skip(self), fields(operation = "update_part"), err)]
                async fn update_part(&self, id: PartId, changes: UpdatePart) -> StoreResult<Part> {
                    let mut tx = self.begin("update_part").await?;
                    let mut part = load_part(&mut tx, id).await?;
                    part.update(&changes, now())?;
                    save_part(&mut tx, &part, "update_part").await?;
                    commit(tx, "update_part").await?;
                    Ok(part)
                }

                #[instrument(skip(self), fields(operation = "retire_part"), err)]
                async fn retire_part(&self, id: PartId) -> StoreResult<Part> {
                    let mut tx = self.begin("retire_part").await?;
                    let mut part = load_part(&mut tx, id).await?;
                    part.retire(now())?;
                    save_part(&mut tx, &part, "retire_part").await?;
                    ::sqlx::query(sql::DELETE_PAIRS_OF)
                        .bind(*id.as_uuid())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error("retire_part", e))?;
                    commit(tx, "retire_part").await?;
                    Ok(part)
                }

                #[instrument(skip(self), fields(operation = "search_parts"), err)]
                async fn search_parts(
                    &self,
                    filter: &PartFilter,
                    page: Pagination,
                ) -> StoreResult<Page<Part>> {
                    let mut count =
                        QueryBuilder::<$db>::new("SELECT COUNT(*) AS total FROM parts");
                    sql::push_part_filter(&mut count, filter, $dialect);
                    let total: i64 = count
                        .build()
                        .fetch_one(&self.pool)
                        .await
                        .and_then(|row| row.try_get("total"))
                        .map_err(|e| map_sqlx_error("search_parts", e))?;

                    let mut select = QueryBuilder::<$db>::new(format!(
                        "SELECT {} FROM parts",
                        sql::PART_COLUMNS
                    ));
                    sql::push_part_filter(&mut select, filter, $dialect);
                    select
                        .push(" ORDER BY sku ASC LIMIT ")
                        .push_bind(i64::from(page.limit))
                        .push(" OFFSET ")
                        .push_bind(i64::from(page.offset));
                    let rows = select
                        .build()
                        .fetch_all(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("search_parts", e))?;

                    let items = rows
                        .iter()
                        .map(sql::decode_part)
                        .collect::<StoreResult<Vec<_>>>()?;
                    Ok(Page::new(items, total.max(0) as u64, page))
                }

                #[instrument(
                    skip(self),
                    fields(operation = "link_interchange", part_id = %link.part_id),
                    err
                )]
                async fn link_interchange(
                    &self,
                    link: LinkInterchange,
                ) -> StoreResult<Interchange> {
                    let pairs = link.pairs()?;
                    let mut tx = self.begin("link_interchange").await?;

                    for id in link.referenced_ids() {
                        let part = fetch_part(&mut tx, id).await?.ok_or_else(|| {
                            DomainError::reference(format!("part {id} does not exist"))
                        })?;
                        part.ensure_referenceable()?;
                    }

                    let linked_at = now();
                    for pair in &pairs {
                        ::sqlx::query(sql::INSERT_PAIR)
                            .bind(*pair.low().as_uuid())
                            .bind(*pair.high().as_uuid())
                            .bind(linked_at)
                            .execute(&mut *tx)
                            .await
                            .map_err(|e| map_sqlx_error("link_interchange", e))?;
                    }

                    let interchange = fetch_interchange(&mut tx, link.part_id).await?;
                    commit(tx, "link_interchange").await?;
                    Ok(interchange)
                }

                #[instrument(skip(self), fields(operation = "unlink_interchange"), err)]
                async fn unlink_interchange(&self, a: PartId, b: PartId) -> StoreResult<bool> {
                    let pair = InterchangePair::new(a, b)?;
                    let result = ::sqlx::query(sql::DELETE_PAIR)
                        .bind(*pair.low().as_uuid())
                        .bind(*pair.high().as_uuid())
                        .execute(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("unlink_interchange", e))?;
                    Ok(result.rows_affected() > 0)
                }

                #[instrument(skip(self), fields(operation = "equivalents_of"), err)]
                async fn equivalents_of(&self, part_id: PartId) -> StoreResult<Interchange> {
                    let mut conn = self.conn("equivalents_of").await?;
                    load_part(&mut conn, part_id).await?;
                    fetch_interchange(&mut conn, part_id).await
                }

                #[instrument(
                    skip(self, input),
                    fields(operation = "create_location", location_id = %input.id),
                    err
                )]
                async fn create_location(&self, input: CreateLocation) -> StoreResult<Location> {
                    let location = input.into_location(now())?;
                    let mut tx = self.begin("create_location").await?;

                    let taken = ::sqlx::query(sql::LOCATION_TAKEN)
                        .bind(location.id().as_str())
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error("create_location", e))?;
                    if taken.is_some() {
                        return Err(DomainError::uniqueness(format!(
                            "location {} is already registered",
                            location.id()
                        ))
                        .into());
                    }

                    ::sqlx::query(sql::INSERT_LOCATION)
                        .bind(location.id().as_str())
                        .bind(location.description())
                        .bind(location.created_at())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error("create_location", e))?;

                    commit(tx, "create_location").await?;
                    Ok(location)
                }

                #[instrument(skip(self), fields(operation = "list_locations"), err)]
                async fn list_locations(&self) -> StoreResult<Vec<Location>> {
                    let rows = ::sqlx::query(sql::SELECT_LOCATIONS)
                        .fetch_all(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("list_locations", e))?;
                    rows.iter().map(sql::decode_location).collect()
                }

                #[instrument(skip(self), fields(operation = "record_inventory"), err)]
                async fn record_inventory(
                    &self,
                    input: NewInventory,
                ) -> StoreResult<InventoryRecord> {
                    let mut tx = self.begin("record_inventory").await?;
                    ensure_sku_referenceable(&mut tx, &input.sku).await?;

                    let id = InventoryId::new();
                    let record = record_new(&mut tx, id, input.into_command(id, now())).await?;
                    commit(tx, "record_inventory").await?;
                    Ok(record)
                }

                #[instrument(skip(self), fields(operation = "get_inventory"), err)]
                async fn get_inventory(&self, id: InventoryId) -> StoreResult<InventoryRecord> {
                    let mut conn = self.conn("get_inventory").await?;
                    fetch_inventory(&mut conn, id).await
                }

                #[instrument(skip(self), fields(operation = "transition_status"), err)]
                async fn transition_status(
                    &self,
                    id: InventoryId,
                    status: InventoryStatus,
                ) -> StoreResult<InventoryRecord> {
                    let mut tx = self.begin("transition_status").await?;
                    let mut record = fetch_inventory(&mut tx, id).await?;
                    let expected = record.version();

                    let command = InventoryCommand::TransitionStatus(TransitionStatus {
                        inventory_id: id,
                        status,
                        occurred_at: now(),
                    });
                    let events = record.execute(&command)?;

                    save_transition(&mut tx, expected, &record, &events).await?;
                    commit(tx, "transition_status").await?;
                    Ok(record)
                }

                #[instrument(skip(self), fields(operation = "restock"), err)]
                async fn restock(
                    &self,
                    id: InventoryId,
                    location_id: Option<LocationId>,
                ) -> StoreResult<InventoryRecord> {
                    let mut tx = self.begin("restock").await?;
                    let sold = fetch_inventory(&mut tx, id).await?;
                    let restocked_as = fetch_restocked_as(&mut tx, id).await?;

                    let new_id = InventoryId::new();
                    let command = sold.restock_command(restocked_as, new_id, location_id, now())?;
                    if let Some(sku) = sold.sku() {
                        ensure_sku_referenceable(&mut tx, sku).await?;
                    }

                    let record = record_new(&mut tx, new_id, command).await?;
                    commit(tx, "restock").await?;
                    Ok(record)
                }

                #[instrument(skip(self), fields(operation = "list_inventory"), err)]
                async fn list_inventory(
                    &self,
                    filter: &InventoryFilter,
                ) -> StoreResult<Vec<InventoryRecord>> {
                    let mut select = QueryBuilder::<$db>::new(format!(
                        "SELECT {} FROM inventory",
                        sql::INVENTORY_COLUMNS
                    ));
                    sql::push_inventory_filter(&mut select, filter);
                    select.push(" ORDER BY created_at ASC, id ASC");

                    let rows = select
                        .build()
                        .fetch_all(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("list_inventory", e))?;
                    rows.iter().map(sql::decode_inventory).collect()
                }

                #[instrument(skip(self), fields(operation = "inventory_history"), err)]
                async fn inventory_history(
                    &self,
                    id: InventoryId,
                ) -> StoreResult<Vec<HistoryEntry>> {
                    let mut conn = self.conn("inventory_history").await?;
                    fetch_inventory(&mut conn, id).await?;

                    let rows = ::sqlx::query(sql::SELECT_HISTORY)
                        .bind(*id.as_uuid())
                        .fetch_all(&mut *conn)
                        .await
                        .map_err(|e| map_sqlx_error("inventory_history", e))?;
                    rows.iter().map(sql::decode_history).collect()
                }

                #[instrument(skip(self), fields(operation = "inventory_events"), err)]
                async fn inventory_events(
                    &self,
                    filter: &HistoryFilter,
                    page: Pagination,
                ) -> StoreResult<Page<HistoryEntry>> {
                    let mut count = QueryBuilder::<$db>::new(format!(
                        "SELECT COUNT(*) AS total FROM {}",
                        sql::EVENTS_WITH_RECORD
                    ));
                    sql::push_history_filter(&mut count, filter);
                    let total: i64 = count
                        .build()
                        .fetch_one(&self.pool)
                        .await
                        .and_then(|row| row.try_get("total"))
                        .map_err(|e| map_sqlx_error("inventory_events", e))?;

                    let mut select = QueryBuilder::<$db>::new(format!(
                        "SELECT {} FROM {}",
                        sql::HISTORY_COLUMNS,
                        sql::EVENTS_WITH_RECORD
                    ));
                    sql::push_history_filter(&mut select, filter);
                    select
                        .push(
                            " ORDER BY e.occurred_at DESC, e.inventory_id ASC, \
                             e.sequence_number DESC LIMIT ",
                        )
                        .push_bind(i64::from(page.limit))
                        .push(" OFFSET ")
                        .push_bind(i64::from(page.offset));
                    let rows = select
                        .build()
                        .fetch_all(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("inventory_events", e))?;

                    let items = rows
                        .iter()
                        .map(sql::decode_history)
                        .collect::<StoreResult<Vec<_>>>()?;
                    Ok(Page::new(items, total.max(0) as u64, page))
                }

                #[instrument(skip(self), fields(operation = "on_hand"), err)]
                async fn on_hand(
                    &self,
                    sku: &Sku,
                    location_id: Option<&LocationId>,
                ) -> StoreResult<u64> {
                    let mut count =
                        QueryBuilder::<$db>::new("SELECT COUNT(*) AS total FROM inventory");
                    sql::push_inventory_filter(&mut count, &sql::in_stock(Some(sku), location_id));
                    let total: i64 = count
                        .build()
                        .fetch_one(&self.pool)
                        .await
                        .and_then(|row| row.try_get("total"))
                        .map_err(|e| map_sqlx_error("on_hand", e))?;
                    Ok(total.max(0) as u64)
                }

                #[instrument(skip(self), fields(operation = "stock_levels"), err)]
                async fn stock_levels(
                    &self,
                    sku: Option<&Sku>,
                    location_id: Option<&LocationId>,
                ) -> StoreResult<Vec<StockLevel>> {
                    let mut select = QueryBuilder::<$db>::new(
                        "SELECT sku, location_id, COUNT(*) AS quantity FROM inventory",
                    );
                    sql::push_inventory_filter(&mut select, &sql::in_stock(sku, location_id));
                    select.push(" GROUP BY sku, location_id ORDER BY sku ASC, location_id ASC");

                    let rows = select
                        .build()
                        .fetch_all(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("stock_levels", e))?;
                    rows.iter().map(sql::decode_stock_level).collect()
                }
            }
        }
    };
}

pub(crate) use sql_repository;
