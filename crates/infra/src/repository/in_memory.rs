use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use autotraq_catalog::{
    CreatePart, Interchange, InterchangePair, LinkInterchange, Part, Sku, UpdatePart,
};
use autotraq_core::{Aggregate, AggregateRoot, DomainError, InventoryId, PartId};
use autotraq_inventory::{
    CreateLocation, HistoryEntry, InventoryCommand, InventoryRecord, InventoryStatus, Location,
    LocationId, NewInventory, TransitionStatus, history_entries,
};

use super::query::{HistoryFilter, InventoryFilter, Page, Pagination, PartFilter, StockLevel};
use super::{Repository, now};
use crate::config::Dialect;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct State {
    parts: HashMap<PartId, Part>,
    skus: HashMap<Sku, PartId>,
    pairs: BTreeSet<InterchangePair>,
    locations: BTreeMap<LocationId, Location>,
    inventory: HashMap<InventoryId, InventoryRecord>,
    history: HashMap<InventoryId, Vec<HistoryEntry>>,
}

impl State {
    fn part(&self, id: PartId) -> StoreResult<&Part> {
        self.parts
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("part {id}")).into())
    }

    fn referenceable_sku(&self, sku: &Sku) -> StoreResult<()> {
        let part = self
            .skus
            .get(sku)
            .and_then(|id| self.parts.get(id))
            .ok_or_else(|| DomainError::reference(format!("no part with SKU {sku}")))?;
        part.ensure_referenceable()?;
        Ok(())
    }

    fn record(&self, id: InventoryId) -> StoreResult<&InventoryRecord> {
        self.inventory
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("inventory {id}")).into())
    }

    /// The record already restocked from `id`, if any.
    fn restocked_as(&self, id: InventoryId) -> Option<InventoryId> {
        self.inventory
            .values()
            .find(|r| r.restocked_from() == Some(id))
            .map(InventoryRecord::id_typed)
    }

    fn in_stock<'a>(
        &'a self,
        sku: Option<&'a Sku>,
        location_id: Option<&'a LocationId>,
    ) -> impl Iterator<Item = &'a InventoryRecord> + 'a {
        let filter = InventoryFilter {
            sku: sku.cloned(),
            location_id: location_id.cloned(),
            status: Some(InventoryStatus::InStock),
        };
        self.inventory.values().filter(move |r| filter.matches(r))
    }

    fn interchange(&self, part_id: PartId) -> Interchange {
        Interchange::from_pairs(
            part_id,
            self.pairs.iter().filter(|p| p.contains(part_id)).copied(),
        )
    }

    /// Run a record command against a fresh aggregate and store the result.
    fn insert_record(
        &mut self,
        command: InventoryCommand,
        id: InventoryId,
    ) -> StoreResult<InventoryRecord> {
        if self.inventory.contains_key(&id) {
            return Err(DomainError::uniqueness(format!("inventory {id} already exists")).into());
        }
        let mut record = InventoryRecord::empty(id);
        let events = record.execute(&command)?;
        self.history.insert(id, history_entries(id, 0, &events));
        self.inventory.insert(id, record.clone());
        Ok(record)
    }
}

/// Process-local repository.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    fn dialect(&self) -> Dialect {
        Dialect::Memory
    }

    async fn create_schema(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_part(&self, input: CreatePart) -> StoreResult<Part> {
        let new_part = input.validate()?;
        let mut state = self.write()?;
        if state.skus.contains_key(new_part.sku()) {
            return Err(DomainError::uniqueness(format!(
                "SKU {} is already in use",
                new_part.sku()
            ))
            .into());
        }

        let part = new_part.into_part(PartId::new(), now());
        state.skus.insert(part.sku().clone(), part.id_typed());
        state.parts.insert(part.id_typed(), part.clone());
        Ok(part)
    }

    async fn get_part(&self, id: PartId) -> StoreResult<Part> {
        self.read()?.part(id).cloned()
    }

    async fn find_part_by_sku(&self, sku: &Sku) -> StoreResult<Option<Part>> {
        let state = self.read()?;
        Ok(state.skus.get(sku).and_then(|id| state.parts.get(id)).cloned())
    }

    async fn update_part(&self, id: PartId, changes: UpdatePart) -> StoreResult<Part> {
        let mut state = self.write()?;
        let mut part = state.part(id)?.clone();
        part.update(&changes, now())?;
        state.parts.insert(id, part.clone());
        Ok(part)
    }

    async fn retire_part(&self, id: PartId) -> StoreResult<Part> {
        let mut state = self.write()?;
        let mut part = state.part(id)?.clone();
        part.retire(now())?;
        state.pairs.retain(|p| !p.contains(id));
        state.parts.insert(id, part.clone());
        Ok(part)
    }

    async fn search_parts(&self, filter: &PartFilter, page: Pagination) -> StoreResult<Page<Part>> {
        let state = self.read()?;
        let mut matches: Vec<&Part> = state.parts.values().filter(|p| filter.matches(p)).collect();
        matches.sort_by(|a, b| a.sku().cmp(b.sku()));

        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, page))
    }

    async fn link_interchange(&self, link: LinkInterchange) -> StoreResult<Interchange> {
        let pairs = link.pairs()?;
        let mut state = self.write()?;
        for id in link.referenced_ids() {
            let part = state
                .parts
                .get(&id)
                .ok_or_else(|| DomainError::reference(format!("part {id} does not exist")))?;
            part.ensure_referenceable()?;
        }

        state.pairs.extend(pairs);
        Ok(state.interchange(link.part_id))
    }

    async fn unlink_interchange(&self, a: PartId, b: PartId) -> StoreResult<bool> {
        let pair = InterchangePair::new(a, b)?;
        Ok(self.write()?.pairs.remove(&pair))
    }

    async fn equivalents_of(&self, part_id: PartId) -> StoreResult<Interchange> {
        let state = self.read()?;
        state.part(part_id)?;
        Ok(state.interchange(part_id))
    }

    async fn create_location(&self, input: CreateLocation) -> StoreResult<Location> {
        let location = input.into_location(now())?;
        let mut state = self.write()?;
        if state.locations.contains_key(location.id()) {
            return Err(DomainError::uniqueness(format!(
                "location {} is already registered",
                location.id()
            ))
            .into());
        }
        state.locations.insert(location.id().clone(), location.clone());
        Ok(location)
    }

    async fn list_locations(&self) -> StoreResult<Vec<Location>> {
        Ok(self.read()?.locations.values().cloned().collect())
    }

    async fn record_inventory(&self, input: NewInventory) -> StoreResult<InventoryRecord> {
        let mut state = self.write()?;
        state.referenceable_sku(&input.sku)?;

        let id = InventoryId::new();
        state.insert_record(input.into_command(id, now()), id)
    }

    async fn get_inventory(&self, id: InventoryId) -> StoreResult<InventoryRecord> {
        self.read()?.record(id).cloned()
    }

    async fn transition_status(
        &self,
        id: InventoryId,
        status: InventoryStatus,
    ) -> StoreResult<InventoryRecord> {
        let mut state = self.write()?;
        let mut record = state.record(id)?.clone();
        let base_version = record.version();

        let command = InventoryCommand::TransitionStatus(TransitionStatus {
            inventory_id: id,
            status,
            occurred_at: now(),
        });
        let events = record.execute(&command)?;

        state
            .history
            .entry(id)
            .or_default()
            .extend(history_entries(id, base_version, &events));
        state.inventory.insert(id, record.clone());
        Ok(record)
    }

    async fn restock(
        &self,
        id: InventoryId,
        location_id: Option<LocationId>,
    ) -> StoreResult<InventoryRecord> {
        let mut state = self.write()?;
        let sold = state.record(id)?;
        let new_id = InventoryId::new();
        let command = sold.restock_command(state.restocked_as(id), new_id, location_id, now())?;
        if let Some(sku) = sold.sku() {
            state.referenceable_sku(sku)?;
        }
        state.insert_record(command, new_id)
    }

    async fn list_inventory(&self, filter: &InventoryFilter) -> StoreResult<Vec<InventoryRecord>> {
        let state = self.read()?;
        let mut records: Vec<InventoryRecord> = state
            .inventory
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.created_at(), r.id_typed()));
        Ok(records)
    }

    async fn inventory_history(&self, id: InventoryId) -> StoreResult<Vec<HistoryEntry>> {
        let state = self.read()?;
        state.record(id)?;
        Ok(state.history.get(&id).cloned().unwrap_or_default())
    }

    async fn inventory_events(
        &self,
        filter: &HistoryFilter,
        page: Pagination,
    ) -> StoreResult<Page<HistoryEntry>> {
        let state = self.read()?;
        let mut matches: Vec<&HistoryEntry> = state
            .history
            .values()
            .flatten()
            .filter(|e| {
                state
                    .inventory
                    .get(&e.inventory_id)
                    .is_some_and(|r| filter.matches(e, r))
            })
            .collect();
        matches.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then(a.inventory_id.cmp(&b.inventory_id))
                .then(b.sequence_number.cmp(&a.sequence_number))
        });

        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, page))
    }

    async fn on_hand(&self, sku: &Sku, location_id: Option<&LocationId>) -> StoreResult<u64> {
        let state = self.read()?;
        Ok(state.in_stock(Some(sku), location_id).count() as u64)
    }

    async fn stock_levels(
        &self,
        sku: Option<&Sku>,
        location_id: Option<&LocationId>,
    ) -> StoreResult<Vec<StockLevel>> {
        let state = self.read()?;
        let mut levels: BTreeMap<(&Sku, &LocationId), u64> = BTreeMap::new();
        for record in state.in_stock(sku, location_id) {
            if let (Some(sku), Some(location)) = (record.sku(), record.location_id()) {
                *levels.entry((sku, location)).or_default() += 1;
            }
        }
        Ok(levels
            .into_iter()
            .map(|((sku, location_id), quantity)| StockLevel {
                sku: sku.clone(),
                location_id: location_id.clone(),
                quantity,
            })
            .collect())
    }
}
