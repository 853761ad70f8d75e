//! Storage error model and `sqlx` error mapping.
//!
//! | sqlx error | StoreError |
//! |---|---|
//! | Database (unique violation) | `Conflict` |
//! | Database (foreign key violation) | `Validation` |
//! | RowNotFound | `NotFound` |
//! | anything else | `Database` |

use thiserror::Error;

use postguard_core::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            if db_err.is_unique_violation() {
                StoreError::Conflict(msg)
            } else if db_err.is_foreign_key_violation() {
                StoreError::Validation(msg)
            } else {
                StoreError::Database(msg)
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {}", operation)),
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}
