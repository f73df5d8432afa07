//! Bar storage traits.
//!
//! This module defines the storage interface the ingestion engine writes to.
//! Implementations live in `storage-sqlite` (durable) or below (dry-run).

use std::ops::AddAssign;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boursomatic_market_data::{Bar, Interval, Symbol};

use crate::errors::Result;

/// Row counts reported by an upsert.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    /// Rows that did not exist before
    pub inserted: u64,
    /// Rows whose `(symbol, timestamp, interval)` key already existed
    pub duplicates: u64,
}

impl UpsertSummary {
    pub fn total(&self) -> u64 {
        self.inserted + self.duplicates
    }
}

impl AddAssign for UpsertSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.duplicates += rhs.duplicates;
    }
}

/// Storage interface for OHLCV bars.
///
/// # Contract
///
/// - `upsert_bars` is idempotent per `(symbol, market, interval, timestamp)`.
///   Re-writing an existing key is reported in `duplicates`, never as an error.
/// - Errors whose [`DatabaseError::is_unavailable`](crate::errors::DatabaseError::is_unavailable)
///   is true mean the store could not be reached; any other error means this
///   particular write was rejected.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Insert bars, skipping keys that are already stored.
    async fn upsert_bars(&self, bars: &[Bar]) -> Result<UpsertSummary>;

    /// Number of stored bars for `symbol`/`interval` at or after `since`.
    async fn count_bars(
        &self,
        symbol: &Symbol,
        interval: Interval,
        since: DateTime<Utc>,
    ) -> Result<u64>;
}
