//! Inventory domain module.
//!
//! Business rules for physical stock records and their status lifecycle,
//! implemented purely as deterministic domain logic (no IO, no storage).

pub mod history;
pub mod location;
pub mod record;
pub mod status;

pub use history::{HistoryEntry, history_entries};
pub use location::{CreateLocation, Location, LocationId};
pub use record::{
    InventoryCommand, InventoryEvent, InventoryRecord, InventoryRecorded, NewInventory,
    RecordInventory, StatusChanged, TransitionStatus,
};
pub use status::InventoryStatus;
