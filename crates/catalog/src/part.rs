use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autotraq_core::{DomainError, DomainResult, Entity, PartId, ValueObject, bounded_text};

/// Earliest plausible model year (first production automobile).
pub const MIN_MODEL_YEAR: u16 = 1886;
/// Latest accepted model year.
pub const MAX_MODEL_YEAR: u16 = 2100;

/// Stock-keeping unit code. Unique per part and immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: &str) -> DomainResult<Self> {
        let sku = bounded_text("sku", value, true)?;
        if sku.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("sku cannot contain whitespace"));
        }
        Ok(Self(sku))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Sku {}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for Sku {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Sku {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Sku> for String {
    fn from(value: Sku) -> Self {
        value.0
    }
}

/// Descriptive attributes of a part (everything except identity and SKU).
///
/// Only constructed through [`PartDetails::new`], so every instance honours
/// the column widths and the model-year range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartDetails {
    name: String,
    make: String,
    model: String,
    year: u16,
    color: String,
    quality: String,
    miles: u32,
}

impl PartDetails {
    pub fn new(
        name: &str,
        make: &str,
        model: &str,
        year: u16,
        color: &str,
        quality: &str,
        miles: u32,
    ) -> DomainResult<Self> {
        Ok(Self {
            name: bounded_text("name", name, true)?,
            make: bounded_text("make", make, true)?,
            model: bounded_text("model", model, true)?,
            year: validate_year(year)?,
            color: bounded_text("color", color, false)?,
            quality: bounded_text("quality", quality, false)?,
            miles,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn make(&self) -> &str {
        &self.make
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn quality(&self) -> &str {
        &self.quality
    }

    pub fn miles(&self) -> u32 {
        self.miles
    }
}

fn validate_year(year: u16) -> DomainResult<u16> {
    if !(MIN_MODEL_YEAR..=MAX_MODEL_YEAR).contains(&year) {
        return Err(DomainError::validation(format!(
            "year must be within {MIN_MODEL_YEAR}..={MAX_MODEL_YEAR} (got {year})"
        )));
    }
    Ok(year)
}

/// Command: CreatePart (raw, unvalidated input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePart {
    pub name: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub color: String,
    pub sku: String,
    pub quality: String,
    pub miles: u32,
}

impl CreatePart {
    /// Check every field; SKU uniqueness is left to the store.
    pub fn validate(&self) -> DomainResult<NewPart> {
        let sku = Sku::new(&self.sku)?;
        let details = PartDetails::new(
            &self.name,
            &self.make,
            &self.model,
            self.year,
            &self.color,
            &self.quality,
            self.miles,
        )?;
        Ok(NewPart { sku, details })
    }
}

/// A validated part that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPart {
    sku: Sku,
    details: PartDetails,
}

impl NewPart {
    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn into_part(self, id: PartId, created_at: DateTime<Utc>) -> Part {
        Part {
            id,
            sku: self.sku,
            details: self.details,
            created_at,
            updated_at: created_at,
            retired_at: None,
        }
    }
}

/// Command: UpdatePart. `None` leaves the attribute untouched.
///
/// Id and SKU are deliberately absent: both are immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePart {
    pub name: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u16>,
    pub color: Option<String>,
    pub quality: Option<String>,
    pub miles: Option<u32>,
}

impl UpdatePart {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.make.is_none()
            && self.model.is_none()
            && self.year.is_none()
            && self.color.is_none()
            && self.quality.is_none()
            && self.miles.is_none()
    }

    /// Quality regrade shortcut.
    pub fn quality(grade: impl Into<String>) -> Self {
        Self {
            quality: Some(grade.into()),
            ..Self::default()
        }
    }
}

/// Entity: Part (root of the data model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Part {
    id: PartId,
    sku: Sku,
    #[serde(flatten)]
    details: PartDetails,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    retired_at: Option<DateTime<Utc>>,
}

impl Part {
    /// Rebuild a part from stored columns.
    pub fn restore(
        id: PartId,
        sku: Sku,
        details: PartDetails,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        retired_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            sku,
            details,
            created_at,
            updated_at,
            retired_at,
        }
    }

    pub fn id_typed(&self) -> PartId {
        self.id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn details(&self) -> &PartDetails {
        &self.details
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn retired_at(&self) -> Option<DateTime<Utc>> {
        self.retired_at
    }

    pub fn is_retired(&self) -> bool {
        self.retired_at.is_some()
    }

    /// Fail with a reference error if this part can no longer be pointed at.
    pub fn ensure_referenceable(&self) -> DomainResult<()> {
        if self.is_retired() {
            return Err(DomainError::reference(format!(
                "part {} ({}) is retired",
                self.id, self.sku
            )));
        }
        Ok(())
    }

    /// Apply descriptive changes (e.g. quality regrading).
    pub fn update(&mut self, changes: &UpdatePart, at: DateTime<Utc>) -> DomainResult<()> {
        if self.is_retired() {
            return Err(DomainError::validation("retired parts cannot be updated"));
        }
        if changes.is_empty() {
            return Err(DomainError::validation("no changes supplied"));
        }

        let d = &self.details;
        let details = PartDetails::new(
            changes.name.as_deref().unwrap_or(&d.name),
            changes.make.as_deref().unwrap_or(&d.make),
            changes.model.as_deref().unwrap_or(&d.model),
            changes.year.unwrap_or(d.year),
            changes.color.as_deref().unwrap_or(&d.color),
            changes.quality.as_deref().unwrap_or(&d.quality),
            changes.miles.unwrap_or(d.miles),
        )?;

        self.details = details;
        self.updated_at = at;
        Ok(())
    }

    /// Soft-retire. Rows are never deleted so interchange and inventory
    /// history stay resolvable.
    pub fn retire(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.is_retired() {
            return Err(DomainError::validation(format!("part {} is already retired", self.id)));
        }
        self.retired_at = Some(at);
        self.updated_at = at;
        Ok(())
    }
}

impl Entity for Part {
    type Id = PartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        !self.is_retired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alternator() -> CreatePart {
        CreatePart {
            name: "Alternator".to_string(),
            make: "Honda".to_string(),
            model: "Civic".to_string(),
            year: 2015,
            color: "black".to_string(),
            sku: "HC15-ALT-01".to_string(),
            quality: "A".to_string(),
            miles: 45_000,
        }
    }

    fn created() -> Part {
        alternator().validate().unwrap().into_part(PartId::new(), Utc::now())
    }

    #[test]
    fn create_part_accepts_reference_alternator() {
        let part = created();
        assert_eq!(part.sku().as_str(), "HC15-ALT-01");
        assert_eq!(part.details().make(), "Honda");
        assert_eq!(part.details().miles(), 45_000);
        assert!(part.is_active());
        assert_eq!(part.created_at(), part.updated_at());
    }

    #[test]
    fn create_part_rejects_long_fields() {
        let mut cmd = alternator();
        cmd.model = "M".repeat(31);
        let err = cmd.validate().unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("model")),
            _ => panic!("Expected Validation error for long model"),
        }
    }

    #[test]
    fn create_part_rejects_blank_sku() {
        let mut cmd = alternator();
        cmd.sku = "   ".to_string();
        assert!(matches!(cmd.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn sku_rejects_inner_whitespace() {
        assert!(Sku::new("HC15 ALT").is_err());
        assert_eq!(Sku::new(" HC15-ALT ").unwrap().as_str(), "HC15-ALT");
    }

    #[test]
    fn create_part_rejects_implausible_year() {
        let mut cmd = alternator();
        cmd.year = 1700;
        assert!(matches!(cmd.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn blank_color_and_quality_are_allowed() {
        let mut cmd = alternator();
        cmd.color = String::new();
        cmd.quality = " ".to_string();
        let part = cmd.validate().unwrap();
        assert_eq!(part.sku().as_str(), "HC15-ALT-01");
    }

    #[test]
    fn regrade_changes_quality_only() {
        let mut part = created();
        let later = part.created_at() + chrono::Duration::seconds(5);
        part.update(&UpdatePart::quality("B"), later).unwrap();
        assert_eq!(part.details().quality(), "B");
        assert_eq!(part.details().name(), "Alternator");
        assert_eq!(part.updated_at(), later);
    }

    #[test]
    fn empty_update_is_rejected() {
        let mut part = created();
        let err = part.update(&UpdatePart::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn invalid_update_leaves_part_untouched() {
        let mut part = created();
        let before = part.clone();
        let changes = UpdatePart {
            quality: Some("C".to_string()),
            color: Some("c".repeat(40)),
            ..UpdatePart::default()
        };
        assert!(part.update(&changes, Utc::now()).is_err());
        assert_eq!(part, before);
    }

    #[test]
    fn retired_parts_are_frozen_and_unreferenceable() {
        let mut part = created();
        part.retire(Utc::now()).unwrap();
        assert!(!part.is_active());
        assert!(matches!(part.ensure_referenceable(), Err(DomainError::Reference(_))));
        assert!(part.retire(Utc::now()).is_err());
        assert!(part.update(&UpdatePart::quality("B"), Utc::now()).is_err());
    }

    proptest! {
        /// Any string the validator accepts fits in a 30-character column.
        #[test]
        fn accepted_names_fit_the_column(name in "\\PC{0,40}") {
            let mut cmd = alternator();
            cmd.name = name;
            if let Ok(part) = cmd.validate() {
                let part = part.into_part(PartId::new(), Utc::now());
                prop_assert!(part.details().name().chars().count() <= 30);
                prop_assert!(!part.details().name().trim().is_empty());
            }
        }
    }
}
