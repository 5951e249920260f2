use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autotraq_catalog::Sku;
use autotraq_core::{Aggregate, AggregateRoot, DomainError, DomainResult, InventoryId};
use autotraq_events::Event;

use crate::location::LocationId;
use crate::status::InventoryStatus;

/// Validated input for recording a stock receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventory {
    pub sku: Sku,
    pub location_id: LocationId,
    pub status: InventoryStatus,
}

impl NewInventory {
    /// Parse raw input. A missing status defaults to `in-stock`; an unknown one
    /// is a validation error.
    pub fn parse(sku: &str, location_id: &str, status: Option<&str>) -> DomainResult<Self> {
        let status = match status {
            Some(raw) => raw.parse()?,
            None => InventoryStatus::default(),
        };
        Ok(Self {
            sku: Sku::new(sku)?,
            location_id: LocationId::new(location_id)?,
            status,
        })
    }

    pub fn into_command(
        self,
        inventory_id: InventoryId,
        occurred_at: DateTime<Utc>,
    ) -> InventoryCommand {
        InventoryCommand::RecordInventory(RecordInventory {
            inventory_id,
            sku: self.sku,
            location_id: self.location_id,
            status: self.status,
            restocked_from: None,
            occurred_at,
        })
    }
}

/// Aggregate root: InventoryRecord (one physical unit of a part at a location).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryRecord {
    id: InventoryId,
    sku: Option<Sku>,
    location_id: Option<LocationId>,
    status: InventoryStatus,
    restocked_from: Option<InventoryId>,
    version: u64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl InventoryRecord {
    /// Create an empty, not-yet-recorded aggregate instance.
    pub fn empty(id: InventoryId) -> Self {
        Self {
            id,
            sku: None,
            location_id: None,
            status: InventoryStatus::default(),
            restocked_from: None,
            version: 0,
            created_at: None,
            updated_at: None,
        }
    }

    /// Rebuild a recorded aggregate from its stored row.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: InventoryId,
        sku: Sku,
        location_id: LocationId,
        status: InventoryStatus,
        restocked_from: Option<InventoryId>,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sku: Some(sku),
            location_id: Some(location_id),
            status,
            restocked_from,
            version,
            created_at: Some(created_at),
            updated_at: Some(updated_at),
        }
    }

    pub fn id_typed(&self) -> InventoryId {
        self.id
    }

    pub fn is_recorded(&self) -> bool {
        self.sku.is_some()
    }

    /// SKU of the recorded part. Empty for a not-yet-recorded aggregate.
    pub fn sku(&self) -> Option<&Sku> {
        self.sku.as_ref()
    }

    pub fn location_id(&self) -> Option<&LocationId> {
        self.location_id.as_ref()
    }

    pub fn status(&self) -> InventoryStatus {
        self.status
    }

    pub fn restocked_from(&self) -> Option<InventoryId> {
        self.restocked_from
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Build the command that returns this (sold) unit to stock as a fresh
    /// record. The sold record itself stays terminal.
    ///
    /// `restocked_as` is the record already created from this one, if any: a
    /// sale goes back to stock at most once.
    pub fn restock_command(
        &self,
        restocked_as: Option<InventoryId>,
        new_id: InventoryId,
        location_id: Option<LocationId>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<InventoryCommand> {
        let (Some(sku), Some(current_location)) = (&self.sku, &self.location_id) else {
            return Err(DomainError::not_found(format!("inventory {}", self.id)));
        };
        if self.status != InventoryStatus::Sold {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                "restock (only sold units can be restocked)",
            ));
        }
        if let Some(existing) = restocked_as {
            return Err(DomainError::uniqueness(format!(
                "inventory {} was already restocked as {existing}",
                self.id
            )));
        }
        Ok(InventoryCommand::RecordInventory(RecordInventory {
            inventory_id: new_id,
            sku: sku.clone(),
            location_id: location_id.unwrap_or_else(|| current_location.clone()),
            status: InventoryStatus::InStock,
            restocked_from: Some(self.id),
            occurred_at,
        }))
    }
}

impl AggregateRoot for InventoryRecord {
    type Id = InventoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordInventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInventory {
    pub inventory_id: InventoryId,
    pub sku: Sku,
    pub location_id: LocationId,
    pub status: InventoryStatus,
    pub restocked_from: Option<InventoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransitionStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionStatus {
    pub inventory_id: InventoryId,
    pub status: InventoryStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    RecordInventory(RecordInventory),
    TransitionStatus(TransitionStatus),
}

/// Event: InventoryRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecorded {
    pub inventory_id: InventoryId,
    pub sku: Sku,
    pub location_id: LocationId,
    pub status: InventoryStatus,
    pub restocked_from: Option<InventoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub inventory_id: InventoryId,
    pub from: InventoryStatus,
    pub to: InventoryStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    InventoryRecorded(InventoryRecorded),
    StatusChanged(StatusChanged),
}

impl InventoryEvent {
    /// Status after the event.
    pub fn status(&self) -> InventoryStatus {
        match self {
            InventoryEvent::InventoryRecorded(e) => e.status,
            InventoryEvent::StatusChanged(e) => e.to,
        }
    }

    /// Status before the event (none for the initial recording).
    pub fn previous_status(&self) -> Option<InventoryStatus> {
        match self {
            InventoryEvent::InventoryRecorded(_) => None,
            InventoryEvent::StatusChanged(e) => Some(e.from),
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::InventoryRecorded(_) => "inventory.record.recorded",
            InventoryEvent::StatusChanged(_) => "inventory.record.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::InventoryRecorded(e) => e.occurred_at,
            InventoryEvent::StatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryRecord {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::InventoryRecorded(e) => {
                self.id = e.inventory_id;
                self.sku = Some(e.sku.clone());
                self.location_id = Some(e.location_id.clone());
                self.status = e.status;
                self.restocked_from = e.restocked_from;
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
            }
            InventoryEvent::StatusChanged(e) => {
                self.status = e.to;
                self.updated_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::RecordInventory(cmd) => self.handle_record(cmd),
            InventoryCommand::TransitionStatus(cmd) => self.handle_transition(cmd),
        }
    }
}

impl InventoryRecord {
    fn ensure_inventory_id(&self, inventory_id: InventoryId) -> Result<(), DomainError> {
        if self.id != inventory_id {
            return Err(DomainError::validation("inventory_id mismatch"));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordInventory) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.is_recorded() {
            return Err(DomainError::uniqueness(format!(
                "inventory {} already exists",
                self.id
            )));
        }
        self.ensure_inventory_id(cmd.inventory_id)?;
        if cmd.status.is_terminal() {
            return Err(DomainError::validation(format!(
                "inventory cannot be recorded as '{}' (terminal status)",
                cmd.status
            )));
        }

        Ok(vec![InventoryEvent::InventoryRecorded(InventoryRecorded {
            inventory_id: cmd.inventory_id,
            sku: cmd.sku.clone(),
            location_id: cmd.location_id.clone(),
            status: cmd.status,
            restocked_from: cmd.restocked_from,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transition(
        &self,
        cmd: &TransitionStatus,
    ) -> Result<Vec<InventoryEvent>, DomainError> {
        if !self.is_recorded() {
            return Err(DomainError::not_found(format!("inventory {}", cmd.inventory_id)));
        }
        self.ensure_inventory_id(cmd.inventory_id)?;
        self.status.ensure_transition(cmd.status)?;

        Ok(vec![InventoryEvent::StatusChanged(StatusChanged {
            inventory_id: cmd.inventory_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn recorded() -> InventoryRecord {
        let id = InventoryId::new();
        let mut record = InventoryRecord::empty(id);
        let cmd = NewInventory::parse("HC15-ALT-01", "WH-1", None)
            .unwrap()
            .into_command(id, test_time());
        record.execute(&cmd).unwrap();
        record
    }

    fn transition(
        record: &mut InventoryRecord,
        status: InventoryStatus,
    ) -> DomainResult<Vec<InventoryEvent>> {
        let cmd = InventoryCommand::TransitionStatus(TransitionStatus {
            inventory_id: record.id_typed(),
            status,
            occurred_at: test_time(),
        });
        record.execute(&cmd)
    }

    #[test]
    fn record_defaults_to_in_stock() {
        let record = recorded();
        assert_eq!(record.status(), InventoryStatus::InStock);
        assert_eq!(record.sku().unwrap().as_str(), "HC15-ALT-01");
        assert_eq!(record.location_id().unwrap().as_str(), "WH-1");
        assert_eq!(record.version(), 1);
    }

    #[test]
    fn parse_rejects_unknown_status() {
        let err = NewInventory::parse("HC15-ALT-01", "WH-1", Some("misplaced")).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn record_rejects_terminal_initial_status() {
        let id = InventoryId::new();
        let record = InventoryRecord::empty(id);
        let cmd = NewInventory::parse("HC15-ALT-01", "WH-1", Some("sold"))
            .unwrap()
            .into_command(id, test_time());
        assert!(matches!(record.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn recording_twice_is_rejected() {
        let record = recorded();
        let cmd = NewInventory::parse("HC15-ALT-01", "WH-2", None)
            .unwrap()
            .into_command(record.id_typed(), test_time());
        assert!(matches!(record.handle(&cmd), Err(DomainError::Uniqueness(_))));
    }

    #[test]
    fn reserve_then_sell_succeeds() {
        let mut record = recorded();
        transition(&mut record, InventoryStatus::Reserved).unwrap();
        let events = transition(&mut record, InventoryStatus::Sold).unwrap();

        assert_eq!(record.status(), InventoryStatus::Sold);
        assert_eq!(record.version(), 3);
        match &events[0] {
            InventoryEvent::StatusChanged(e) => {
                assert_eq!(e.from, InventoryStatus::Reserved);
                assert_eq!(e.to, InventoryStatus::Sold);
            }
            _ => panic!("Expected StatusChanged event"),
        }
        assert_eq!(events[0].event_type(), "inventory.record.status_changed");
    }

    #[test]
    fn selling_from_stock_is_rejected_and_state_is_kept() {
        let mut record = recorded();
        let err = transition(&mut record, InventoryStatus::Sold).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("in-stock", "sold"));
        assert_eq!(record.status(), InventoryStatus::InStock);
        assert_eq!(record.version(), 1);
    }

    #[test]
    fn sold_is_terminal() {
        let mut record = recorded();
        transition(&mut record, InventoryStatus::Reserved).unwrap();
        transition(&mut record, InventoryStatus::Sold).unwrap();
        for next in InventoryStatus::ALL {
            assert!(matches!(
                transition(&mut record, next),
                Err(DomainError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn transition_on_unrecorded_is_not_found() {
        let mut record = InventoryRecord::empty(InventoryId::new());
        assert!(matches!(
            transition(&mut record, InventoryStatus::Reserved),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn restock_requires_sold_unit() {
        let record = recorded();
        let err = record
            .restock_command(None, InventoryId::new(), None, test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn sold_unit_is_restocked_once() {
        let mut sold = recorded();
        transition(&mut sold, InventoryStatus::Reserved).unwrap();
        transition(&mut sold, InventoryStatus::Sold).unwrap();

        let first = InventoryId::new();
        let err = sold
            .restock_command(Some(first), InventoryId::new(), None, test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::Uniqueness(msg) if msg.contains(&first.to_string())));
    }

    #[test]
    fn restock_creates_fresh_in_stock_record() {
        let mut sold = recorded();
        transition(&mut sold, InventoryStatus::Reserved).unwrap();
        transition(&mut sold, InventoryStatus::Sold).unwrap();

        let new_id = InventoryId::new();
        let cmd = sold
            .restock_command(None, new_id, Some(LocationId::new("WH-2").unwrap()), test_time())
            .unwrap();
        let mut fresh = InventoryRecord::empty(new_id);
        fresh.execute(&cmd).unwrap();

        assert_eq!(fresh.status(), InventoryStatus::InStock);
        assert_eq!(fresh.restocked_from(), Some(sold.id_typed()));
        assert_eq!(fresh.location_id().unwrap().as_str(), "WH-2");
        assert_eq!(fresh.sku(), sold.sku());
        assert_eq!(sold.status(), InventoryStatus::Sold);
    }
}
