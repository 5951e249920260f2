//! Read-side filters and pagination.

use serde::{Deserialize, Serialize};

use autotraq_catalog::{Part, Sku};
use autotraq_inventory::{HistoryEntry, InventoryRecord, InventoryStatus, LocationId};

/// Pagination parameters for part searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of matches across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let has_more = u64::from(pagination.offset) + (items.len() as u64) < total;
        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }
}

/// Part search criteria. All set criteria must match.
///
/// Case-insensitive comparisons fold ASCII letters only, on every backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartFilter {
    /// Case-insensitive substring of name or SKU.
    pub text: Option<String>,
    /// Case-insensitive exact make.
    pub make: Option<String>,
    /// Case-insensitive exact model.
    pub model: Option<String>,
    pub year: Option<u16>,
    pub include_retired: bool,
}

impl PartFilter {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn vehicle(make: impl Into<String>, model: impl Into<String>, year: Option<u16>) -> Self {
        Self {
            make: Some(make.into()),
            model: Some(model.into()),
            year,
            ..Self::default()
        }
    }

    pub fn matches(&self, part: &Part) -> bool {
        let d = part.details();
        if part.is_retired() && !self.include_retired {
            return false;
        }
        if let Some(text) = &self.text {
            let needle = text.to_ascii_lowercase();
            if !d.name().to_ascii_lowercase().contains(&needle)
                && !part.sku().as_str().to_ascii_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(make) = &self.make {
            if !d.make().eq_ignore_ascii_case(make) {
                return false;
            }
        }
        if let Some(model) = &self.model {
            if !d.model().eq_ignore_ascii_case(model) {
                return false;
            }
        }
        self.year.is_none_or(|year| d.year() == year)
    }
}

/// Inventory listing criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryFilter {
    pub sku: Option<Sku>,
    pub location_id: Option<LocationId>,
    pub status: Option<InventoryStatus>,
}

impl InventoryFilter {
    pub fn matches(&self, record: &InventoryRecord) -> bool {
        if let Some(sku) = &self.sku {
            if record.sku() != Some(sku) {
                return false;
            }
        }
        if let Some(location) = &self.location_id {
            if record.location_id() != Some(location) {
                return false;
            }
        }
        self.status.is_none_or(|status| record.status() == status)
    }
}

/// In-stock units of one SKU at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub sku: Sku,
    pub location_id: LocationId,
    pub quantity: u64,
}

/// Criteria for the inventory event ledger across records.
///
/// `sku` and `location_id` match the record the event belongs to (its
/// current location).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub sku: Option<Sku>,
    pub location_id: Option<LocationId>,
    /// e.g. `inventory.record.status_changed`.
    pub event_type: Option<String>,
    /// Status after the event.
    pub status: Option<InventoryStatus>,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &HistoryEntry, record: &InventoryRecord) -> bool {
        let scope = InventoryFilter {
            sku: self.sku.clone(),
            location_id: self.location_id.clone(),
            status: None,
        };
        if !scope.matches(record) {
            return false;
        }
        if let Some(event_type) = &self.event_type {
            if entry.event_type != *event_type {
                return false;
            }
        }
        self.status.is_none_or(|status| entry.status == status)
    }
}

/// Escape `%`, `_` and `\` for a `LIKE … ESCAPE '\'` pattern and wrap in `%`.
pub(crate) fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for ch in text.to_ascii_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}
