//! Storage-specific error types for SQLite operations.
//!
//! Diesel and r2d2 errors are wrapped here and converted to the
//! database-agnostic errors of `boursomatic_core` at the crate boundary.

use boursomatic_core::errors::{DatabaseError, Error};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

/// Storage-specific errors that wrap Diesel and r2d2 types.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Stored row is invalid: {0}")]
    InvalidRow(String),

    #[error(transparent)]
    Core(#[from] Error),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::PoolError(e) => {
                Error::Database(DatabaseError::PoolCreationFailed(e.to_string()))
            }
            StorageError::QueryFailed(DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                info,
            )) => Error::Database(DatabaseError::UniqueViolation(info.message().to_string())),
            StorageError::QueryFailed(DieselError::DatabaseError(kind, info))
                if is_unreachable(&kind, info.message()) =>
            {
                Error::Database(DatabaseError::Unavailable(info.message().to_string()))
            }
            StorageError::QueryFailed(e) => {
                Error::Database(DatabaseError::QueryFailed(e.to_string()))
            }
            StorageError::MigrationFailed(e) => Error::Database(DatabaseError::MigrationFailed(e)),
            StorageError::InvalidRow(e) => Error::Database(DatabaseError::Internal(e)),
            StorageError::Core(e) => e,
        }
    }
}

/// SQLite reports a locked or vanished database file as a generic error.
fn is_unreachable(kind: &DatabaseErrorKind, message: &str) -> bool {
    if matches!(kind, DatabaseErrorKind::ClosedConnection) {
        return true;
    }
    let message = message.to_ascii_lowercase();
    ["database is locked", "unable to open", "disk i/o error", "readonly database"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Extension trait for converting Diesel and r2d2 results to core results.
pub trait IntoCore<T> {
    fn into_core(self) -> boursomatic_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, DieselError> {
    fn into_core(self) -> boursomatic_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, r2d2::Error> {
    fn into_core(self) -> boursomatic_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, diesel::ConnectionError> {
    fn into_core(self) -> boursomatic_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_pass_through() {
        let original: Error = DatabaseError::Unavailable("writer stopped".into()).into();
        let round_trip: Error = StorageError::from(original).into();
        assert!(round_trip.is_store_unavailable());
    }

    #[test]
    fn test_query_errors_are_not_unavailable() {
        let err: Error = StorageError::from(DieselError::NotFound).into();
        assert!(matches!(err, Error::Database(DatabaseError::QueryFailed(_))));
        assert!(!err.is_store_unavailable());
    }

    #[test]
    fn test_locked_database_is_unreachable() {
        assert!(is_unreachable(&DatabaseErrorKind::Unknown, "database is locked"));
        assert!(!is_unreachable(&DatabaseErrorKind::Unknown, "no such column: foo"));
    }
}
