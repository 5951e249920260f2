//! Domain events.
//!
//! Inventory records emit events on every state change; stores append them to
//! the `inventory_events` history table in the same transaction as the row
//! update.

pub mod event;

pub use event::Event;
