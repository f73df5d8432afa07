//! Test doubles shared by the ingestion integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;

use boursomatic_core::errors::{CheckpointError, DatabaseError, Result};
use boursomatic_core::{BarStore, CheckpointRecord, CheckpointStore, UpsertSummary};
use boursomatic_market_data::{
    Bar, BarKey, BarProvider, FetchOutcome, FetchWindow, Interval, Market, MarketDataError,
    ProviderCapabilities, Symbol,
};

pub fn sym(ticker: &str) -> Symbol {
    Symbol::new(ticker, Market::Nasdaq).unwrap()
}

pub fn universe(tickers: &[&str]) -> Vec<Symbol> {
    tickers.iter().map(|t| sym(t)).collect()
}

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

pub fn bar(symbol: &Symbol, ts: DateTime<Utc>, source: &str) -> Bar {
    Bar {
        symbol: symbol.clone(),
        timestamp: ts,
        interval: Interval::Daily,
        open: dec!(100),
        high: dec!(105),
        low: dec!(99),
        close: dec!(104),
        volume: dec!(1000),
        source: source.to_string(),
    }
}

type Respond = dyn Fn(&Symbol) -> std::result::Result<Vec<Bar>, MarketDataError> + Send + Sync;

/// Provider answering from a closure, recording every symbol it was asked for.
pub struct ScriptedProvider {
    id: &'static str,
    respond: Box<Respond>,
    calls: Mutex<Vec<Symbol>>,
}

impl ScriptedProvider {
    pub fn new(
        id: &'static str,
        respond: impl Fn(&Symbol) -> std::result::Result<Vec<Bar>, MarketDataError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Two daily bars for every symbol.
    pub fn healthy(id: &'static str) -> Arc<Self> {
        Self::new(id, move |s| Ok(vec![bar(s, day(2), id), bar(s, day(3), id)]))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.ticker().to_string())
            .collect()
    }
}

#[async_trait]
impl BarProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            intervals: Interval::ALL,
            markets: Market::ALL,
            supports_fundamentals: false,
        }
    }

    fn normalize_symbol(&self, symbol: &Symbol) -> std::result::Result<String, MarketDataError> {
        Ok(symbol.ticker().to_string())
    }

    async fn fetch_bars(
        &self,
        symbols: &[Symbol],
        _window: &FetchWindow,
    ) -> std::result::Result<HashMap<Symbol, FetchOutcome>, MarketDataError> {
        self.calls.lock().unwrap().extend(symbols.iter().cloned());
        Ok(symbols
            .iter()
            .map(|s| (s.clone(), FetchOutcome::from_result(self.id, (self.respond)(s))))
            .collect())
    }
}

/// In-memory bar store keyed like the real one. Tickers listed in
/// `unavailable_for` fail as if the database could not be reached.
#[derive(Default)]
pub struct MemoryBarStore {
    rows: Mutex<BTreeSet<BarKey>>,
    unavailable_for: Mutex<HashSet<String>>,
    existing_counts: Mutex<HashMap<String, u64>>,
    pub upsert_calls: AtomicUsize,
}

impl MemoryBarStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn make_unavailable(&self, tickers: &[&str]) {
        let mut set = self.unavailable_for.lock().unwrap();
        set.extend(tickers.iter().map(|t| t.to_string()));
    }

    pub fn report_existing(&self, ticker: &str, count: u64) {
        self.existing_counts
            .lock()
            .unwrap()
            .insert(ticker.to_string(), count);
    }

    pub fn keys(&self) -> BTreeSet<BarKey> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl BarStore for MemoryBarStore {
    async fn upsert_bars(&self, bars: &[Bar]) -> Result<UpsertSummary> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(first) = bars.first() {
            if self
                .unavailable_for
                .lock()
                .unwrap()
                .contains(first.symbol.ticker())
            {
                return Err(DatabaseError::Unavailable("connection refused".to_string()).into());
            }
        }

        let mut rows = self.rows.lock().unwrap();
        let mut summary = UpsertSummary::default();
        for bar in bars {
            if rows.insert(bar.key()) {
                summary.inserted += 1;
            } else {
                summary.duplicates += 1;
            }
        }
        Ok(summary)
    }

    async fn count_bars(
        &self,
        symbol: &Symbol,
        _interval: Interval,
        _since: DateTime<Utc>,
    ) -> Result<u64> {
        Ok(self
            .existing_counts
            .lock()
            .unwrap()
            .get(symbol.ticker())
            .copied()
            .unwrap_or(0))
    }
}

/// Checkpoint store kept in memory, with a save counter.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    record: Mutex<Option<CheckpointRecord>>,
    /// 1-based save attempt from which every save fails
    fail_from: Mutex<Option<usize>>,
    pub saves: AtomicUsize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn current(&self) -> Option<CheckpointRecord> {
        self.record.lock().unwrap().clone()
    }

    pub fn fail_saves_from(&self, attempt: usize) {
        *self.fail_from.lock().unwrap() = Some(attempt);
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Option<CheckpointRecord> {
        self.current()
    }

    fn save(&self, record: &CheckpointRecord) -> Result<()> {
        let attempt = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_from.lock().unwrap().is_some_and(|from| attempt >= from) {
            return Err(CheckpointError::Write {
                path: "memory".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            }
            .into());
        }
        *self.record.lock().unwrap() = Some(record.clone());
        Ok(())
    }
}
