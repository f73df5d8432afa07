//! Core error types for the ingestion engine.
//!
//! This module defines storage-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use thiserror::Error;

pub use boursomatic_market_data::MarketDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the ingestion engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to load configuration: {0}")]
    ConfigIO(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),
}

/// Storage-agnostic error type for bar persistence.
///
/// Uses `String` for all details so the storage layer can convert
/// Diesel/SQLite errors into this format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// The store cannot take writes right now (writer gone, file locked).
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// A unique constraint was violated.
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DatabaseError {
    /// True when the store could not be reached at all, as opposed to
    /// rejecting a particular write.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::PoolCreationFailed(_) | Self::Unavailable(_)
        )
    }
}

/// Errors around the resume checkpoint artifact.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to write checkpoint {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Validation errors for configuration and input files.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Line {line}: {message}")]
    InvalidLine { line: usize, message: String },
}

impl Error {
    /// True when the underlying cause is an unreachable store.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Error::Database(e) if e.is_unavailable())
    }
}

// === From implementations for common error types ===

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}
