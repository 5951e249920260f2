//! Store error model.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx error | StoreError | Scenario |
//! |------------|------------|----------|
//! | `UniqueViolation` | `Domain(Uniqueness)` | duplicate key from a concurrent writer |
//! | `ForeignKeyViolation` | `Domain(Reference)` | SKU / part id vanished before insert |
//! | `CheckViolation`, `NotNullViolation` | `Domain(Validation)` | column constraint |
//! | SQLite `BUSY` / `LOCKED` | `Domain(Conflict)` | overlapping writer on SQLite |
//! | Postgres `40001`, `40P01` | `Domain(Conflict)` | serialization failure, deadlock |
//! | anything else | `Database` | connection failures, pool closed, decode errors |

use sqlx::error::{DatabaseError, ErrorKind};
use sqlx::sqlite::SqliteError;
use thiserror::Error;

use autotraq_core::DomainError;

/// Result type returned by every repository operation.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A business rule rejected the operation (validation, reference,
    /// transition, uniqueness, not found, conflict).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The backing store failed.
    #[error("database error: {0}")]
    Database(String),

    /// The connection string or environment is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            StoreError::Domain(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn corrupt(what: &str, err: impl core::fmt::Display) -> Self {
        StoreError::Database(format!("invalid stored {what}: {err}"))
    }
}

/// SQLite primary result codes `SQLITE_BUSY` and `SQLITE_LOCKED`.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Postgres `serialization_failure` and `deadlock_detected`.
const PG_CONFLICT_CODES: [&str; 2] = ["40001", "40P01"];

/// Whether the store refused a write because another transaction holds it.
fn is_write_conflict(db_err: &dyn DatabaseError) -> bool {
    if let Some(sqlite) = db_err.try_downcast_ref::<SqliteError>() {
        // Extended codes carry the primary code in the low byte.
        return sqlite
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED));
    }
    db_err
        .code()
        .is_some_and(|code| PG_CONFLICT_CODES.iter().any(|pg| *pg == code))
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{} in {}", db_err.message(), operation);
            if is_write_conflict(&*db_err) {
                return DomainError::conflict(msg).into();
            }
            match db_err.kind() {
                ErrorKind::UniqueViolation => DomainError::uniqueness(msg).into(),
                ErrorKind::ForeignKeyViolation => DomainError::reference(msg).into(),
                ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                    DomainError::validation(msg).into()
                }
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Database(format!("{operation}: {other}")),
    }
}
