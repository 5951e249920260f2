//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// dangling references, illegal state changes, conflicts). Infrastructure
/// concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. a field longer than its column width).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A foreign key does not resolve (unknown part id or SKU).
    #[error("dangling reference: {0}")]
    Reference(String),

    /// A status change is not permitted by the inventory state machine.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A unique key is already taken (duplicate SKU or identifier).
    #[error("already exists: {0}")]
    Uniqueness(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A concurrent writer got there first (stale version).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn reference(msg: impl Into<String>) -> Self {
        Self::Reference(msg.into())
    }

    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn uniqueness(msg: impl Into<String>) -> Self {
        Self::Uniqueness(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
