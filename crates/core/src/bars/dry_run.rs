use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use boursomatic_market_data::{Bar, Interval, Symbol};

use super::store::{BarStore, UpsertSummary};
use crate::errors::Result;

/// A store that logs what would be written and persists nothing.
///
/// Reports zero inserted and zero duplicate rows, and an empty history
/// for coverage checks.
#[derive(Debug, Default)]
pub struct DryRunBarStore {
    would_write: AtomicU64,
}

impl DryRunBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bars that a real store would have received.
    pub fn would_write(&self) -> u64 {
        self.would_write.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BarStore for DryRunBarStore {
    async fn upsert_bars(&self, bars: &[Bar]) -> Result<UpsertSummary> {
        if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
            info!(
                symbol = %first.symbol,
                interval = %first.interval,
                rows = bars.len(),
                first = %first.timestamp,
                last = %last.timestamp,
                "dry run: would upsert bars"
            );
        }
        self.would_write
            .fetch_add(bars.len() as u64, Ordering::Relaxed);
        Ok(UpsertSummary::default())
    }

    async fn count_bars(
        &self,
        _symbol: &Symbol,
        _interval: Interval,
        _since: DateTime<Utc>,
    ) -> Result<u64> {
        Ok(0)
    }
}
