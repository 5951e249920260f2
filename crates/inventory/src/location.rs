//! Stock locations (warehouses, bins).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autotraq_core::{DomainError, DomainResult, ValueObject, bounded_text};

/// Warehouse/bin location code (e.g. "WH-1").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocationId(String);

impl LocationId {
    pub fn new(value: &str) -> DomainResult<Self> {
        Ok(Self(bounded_text("location_id", value, true)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for LocationId {}

impl core::fmt::Display for LocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LocationId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<LocationId> for String {
    fn from(value: LocationId) -> Self {
        value.0
    }
}

/// Command: CreateLocation (raw, unvalidated input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLocation {
    pub id: String,
    pub description: String,
}

impl CreateLocation {
    /// Check both fields; uniqueness of the code is left to the store.
    pub fn into_location(self, created_at: DateTime<Utc>) -> DomainResult<Location> {
        Ok(Location {
            id: LocationId::new(&self.id)?,
            description: bounded_text("description", &self.description, false)?,
            created_at,
        })
    }
}

/// A registered location.
///
/// Inventory may name locations that were never registered; the registry is a
/// directory of known sites, not a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    description: String,
    created_at: DateTime<Utc>,
}

impl Location {
    /// Rebuild from a stored row.
    pub fn restore(id: LocationId, description: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            description,
            created_at,
        }
    }

    pub fn id(&self) -> &LocationId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_bounded() {
        assert!(LocationId::new(&"L".repeat(31)).is_err());
        assert!(LocationId::new("").is_err());
    }

    #[test]
    fn description_may_be_blank() {
        let location = CreateLocation {
            id: " WH-1 ".to_string(),
            description: String::new(),
        }
        .into_location(Utc::now())
        .unwrap();
        assert_eq!(location.id().as_str(), "WH-1");
        assert_eq!(location.description(), "");
    }

    #[test]
    fn long_description_is_rejected() {
        let err = CreateLocation {
            id: "WH-1".to_string(),
            description: "d".repeat(31),
        }
        .into_location(Utc::now())
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
