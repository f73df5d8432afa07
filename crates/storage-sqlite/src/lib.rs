//! SQLite storage implementation for Boursomatic.
//!
//! This crate is the only place where Diesel dependencies exist. It
//! implements the [`BarStore`](boursomatic_core::BarStore) trait defined in
//! `boursomatic-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The single writer actor that serializes writes
//! - The `price_bars` repository

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

pub mod market_data;

pub use db::{create_pool, get_connection, init, run_migrations, DbConnection, DbPool, WriteHandle};
pub use errors::{IntoCore, StorageError};
pub use market_data::BarRepository;

// Re-export from boursomatic-core for convenience
pub use boursomatic_core::errors::{DatabaseError, Error, Result};
