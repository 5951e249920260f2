//! Append-only status history of inventory records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autotraq_core::InventoryId;
use autotraq_events::Event;

use crate::record::InventoryEvent;
use crate::status::InventoryStatus;

/// One row of `inventory_events`.
///
/// `sequence_number` equals the record's version after the event, so the
/// `(inventory_id, sequence_number)` key rejects a second writer racing on the
/// same version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub inventory_id: InventoryId,
    pub sequence_number: u64,
    pub event_type: String,
    pub status: InventoryStatus,
    pub previous_status: Option<InventoryStatus>,
    pub occurred_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_event(
        inventory_id: InventoryId,
        sequence_number: u64,
        event: &InventoryEvent,
    ) -> Self {
        Self {
            inventory_id,
            sequence_number,
            event_type: event.event_type().to_string(),
            status: event.status(),
            previous_status: event.previous_status(),
            occurred_at: event.occurred_at(),
        }
    }
}

/// Number events from `base_version + 1` onwards.
pub fn history_entries(
    inventory_id: InventoryId,
    base_version: u64,
    events: &[InventoryEvent],
) -> Vec<HistoryEntry> {
    events
        .iter()
        .enumerate()
        .map(|(idx, e)| HistoryEntry::from_event(inventory_id, base_version + idx as u64 + 1, e))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StatusChanged;

    #[test]
    fn entries_continue_from_base_version() {
        let id = InventoryId::new();
        let event = InventoryEvent::StatusChanged(StatusChanged {
            inventory_id: id,
            from: InventoryStatus::InStock,
            to: InventoryStatus::Reserved,
            occurred_at: Utc::now(),
        });

        let entries = history_entries(id, 4, &[event.clone(), event]);
        assert_eq!(entries[0].sequence_number, 5);
        assert_eq!(entries[1].sequence_number, 6);
        assert_eq!(entries[0].previous_status, Some(InventoryStatus::InStock));
        assert_eq!(entries[0].status, InventoryStatus::Reserved);
        assert_eq!(entries[0].event_type, "inventory.record.status_changed");
    }
}
