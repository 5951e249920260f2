//! Value objects and bounded text columns.
//!
//! Value objects have no identity; two with the same value are equal. Every
//! descriptive column in the schema is a `VARCHAR(30)`, so the text checks
//! live here where all domain crates can share them.

use crate::error::{DomainError, DomainResult};

/// Declared width of every string column.
pub const MAX_TEXT_LEN: usize = 30;

/// Marker trait for value objects (immutable, compared by value).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Trim `value` and check it against the column width.
///
/// Width is counted in characters, not bytes. Blank values are rejected when
/// `required` is set.
pub fn bounded_text(field: &str, value: &str, required: bool) -> DomainResult<String> {
    let trimmed = value.trim();
    if required && trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    let len = trimmed.chars().count();
    if len > MAX_TEXT_LEN {
        return Err(DomainError::validation(format!(
            "{field} exceeds {MAX_TEXT_LEN} characters (got {len})"
        )));
    }
    Ok(trimmed.to_string())
}
