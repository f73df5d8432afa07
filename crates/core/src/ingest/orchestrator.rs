//! Ingestion orchestrator.
//!
//! Walks the symbol universe batch by batch on a single lane, asks the
//! provider chain for each symbol, writes what comes back to the bar store,
//! and threads a [`CheckpointRecord`] through every step. The record is saved
//! after each batch so that a restart resumes at the first unfinished batch.
//!
//! # Example
//!
//! ```ignore
//! let orchestrator = IngestOrchestrator::new(chain, store, checkpoints, config);
//! let report = orchestrator.run(&universe).await?;
//! std::process::exit(report.exit_status().code().into());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use boursomatic_market_data::{
    BarProvider, FailureCause, FetchOutcome, FetchWindow, MarketDataError, Symbol,
};

use super::checkpoint::{resolve_start_offset, CheckpointRecord, CheckpointStore, RunState};
use super::config::IngestConfig;
use super::coverage::{expected_bar_count, is_covered, CoverageReport};
use super::pacing::{Batch, Pacer};
use crate::bars::{BarStore, UpsertSummary};
use crate::errors::Result;

/// Terminal state of one symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolState {
    Persisted,
    SkippedEmpty,
    Failed,
    AlreadyCovered,
}

impl SymbolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persisted => "PERSISTED",
            Self::SkippedEmpty => "SKIPPED_EMPTY",
            Self::Failed => "FAILED",
            Self::AlreadyCovered => "ALREADY_COVERED",
        }
    }
}

/// What happened to one symbol.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolReport {
    pub index: usize,
    pub symbol: Symbol,
    pub state: SymbolState,
    pub bars: UpsertSummary,
    /// Provider that produced the result, if any did
    pub provider: Option<String>,
    pub failure: Option<FailureCause>,
    /// Error message for failures not caused by a provider
    pub store_error: Option<String>,
    /// The store could not be reached at all
    pub store_unavailable: bool,
}

impl SymbolReport {
    fn new(index: usize, symbol: &Symbol, state: SymbolState) -> Self {
        Self {
            index,
            symbol: symbol.clone(),
            state,
            bars: UpsertSummary::default(),
            provider: None,
            failure: None,
            store_error: None,
            store_unavailable: false,
        }
    }

    fn fetch_failed(index: usize, symbol: &Symbol, cause: FailureCause) -> Self {
        Self {
            provider: Some(cause.provider.clone()),
            failure: Some(cause),
            ..Self::new(index, symbol, SymbolState::Failed)
        }
    }

    pub fn throttled(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(FailureCause::involves_throttling)
    }

    pub fn cause(&self) -> Option<String> {
        self.failure
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| self.store_error.clone())
    }
}

/// Whether the run continues after a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchFlow {
    Continue,
    Abort(String),
}

/// Process exit signal for schedulers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitStatus {
    /// Coverage target met
    Success,
    /// Universe exhausted below target
    Partial,
    /// Aborted on infrastructure failure
    Fatal,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Partial => 1,
            Self::Fatal => 2,
        }
    }
}

/// Outcome of a whole run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub coverage: CoverageReport,
    pub bars: UpsertSummary,
    pub throttle_warnings: u64,
    pub last_completed_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl RunReport {
    pub fn exit_status(&self) -> ExitStatus {
        match self.state {
            RunState::Completed => ExitStatus::Success,
            RunState::Partial => ExitStatus::Partial,
            _ => ExitStatus::Fatal,
        }
    }
}

/// Drives one ingestion run.
pub struct IngestOrchestrator {
    provider: Arc<dyn BarProvider>,
    store: Arc<dyn BarStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    pacer: Pacer,
    config: IngestConfig,
}

impl IngestOrchestrator {
    pub fn new(
        provider: Arc<dyn BarProvider>,
        store: Arc<dyn BarStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            provider,
            store,
            checkpoints,
            pacer: Pacer::new(config.pacing.clone()),
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run over `universe` until it is exhausted or the run aborts.
    ///
    /// Returns `Err` only if the run cannot start (invalid configuration,
    /// unwritable checkpoint). Per-symbol failures end up in the report.
    pub async fn run(&self, universe: &[Symbol]) -> Result<RunReport> {
        self.config.validate()?;

        let universe = match self.config.max_symbols {
            Some(max) if max < universe.len() => &universe[..max],
            _ => universe,
        };
        let interval = self.config.interval;
        let now = Utc::now();
        let window = self.config.lookback.window(interval, now)?;

        let previous = self.checkpoints.load().filter(|record| {
            if record.interval != interval {
                warn!(
                    found = %record.interval,
                    expected = %interval,
                    "ignoring checkpoint written for another interval"
                );
                return false;
            }
            true
        });
        let start = resolve_start_offset(
            self.config.start_offset,
            previous.as_ref().and_then(|r| r.last_completed_index),
            universe.len(),
        );

        let mut record = CheckpointRecord::begin(interval, start, universe.len(), now);
        record.state = RunState::Running;
        self.persist(&record)?;

        let total_batches = self.pacer.batch_count(universe.len(), start);
        info!(
            run_id = %record.run_id,
            interval = %interval,
            provider = self.provider.id(),
            universe = universe.len(),
            start,
            batches = total_batches,
            window_start = %window.start(),
            window_end = %window.end(),
            dry_run = self.config.dry_run,
            "starting ingestion run"
        );

        let mut abort_reason = None;
        for batch in self.pacer.batches(universe, start) {
            if batch.number > 1 {
                self.pacer.pause_between_batches().await;
            }

            let (next, flow) = self.process_batch(record, &batch, &window).await;
            record = next;

            if let BatchFlow::Abort(reason) = flow {
                abort_reason = Some(reason);
                break;
            }
            if let Err(e) = self.persist(&record) {
                error!(error = %e, "checkpoint save failed, aborting run");
                abort_reason = Some(format!("checkpoint save failed: {}", e));
                break;
            }
            self.log_progress(&record, &batch, total_batches);
        }

        let coverage = CoverageReport::from_record(&record, self.config.coverage_target);
        record.state = match abort_reason {
            Some(_) => RunState::Aborted,
            None if coverage.meets_target() => RunState::Completed,
            None => RunState::Partial,
        };
        record.touch(Utc::now());
        if let Err(e) = self.persist(&record) {
            error!(error = %e, "failed to save final checkpoint");
            if abort_reason.is_none() {
                abort_reason = Some(format!("checkpoint save failed: {}", e));
                record.state = RunState::Aborted;
            }
        }

        let report = RunReport {
            run_id: record.run_id,
            state: record.state,
            coverage,
            bars: record.bars,
            throttle_warnings: record.throttle_warnings,
            last_completed_index: record.last_completed_index,
            abort_reason,
        };
        log_summary(&report);
        Ok(report)
    }

    /// Process every symbol of `batch`, folding the results into `record`.
    pub async fn process_batch(
        &self,
        mut record: CheckpointRecord,
        batch: &Batch<'_>,
        window: &FetchWindow,
    ) -> (CheckpointRecord, BatchFlow) {
        debug!(
            batch = batch.number,
            first = batch.start_index,
            size = batch.symbols.len(),
            "processing batch"
        );

        for (position, (index, symbol)) in batch.indexed().enumerate() {
            if position > 0 {
                self.pacer.pause_between_symbols().await;
            }

            let report = self.process_symbol(index, symbol, window).await;
            apply(&mut record, &report);

            if record.consecutive_store_failures >= self.config.max_consecutive_store_failures {
                let reason = format!(
                    "store unavailable for {} consecutive symbols",
                    record.consecutive_store_failures
                );
                error!(symbol = %symbol, reason = %reason, "aborting run");
                return (record, BatchFlow::Abort(reason));
            }
        }

        (record, BatchFlow::Continue)
    }

    /// Fetch and store one symbol.
    pub async fn process_symbol(
        &self,
        index: usize,
        symbol: &Symbol,
        window: &FetchWindow,
    ) -> SymbolReport {
        if self.config.skip_covered && self.already_covered(symbol, window).await {
            let report = SymbolReport::new(index, symbol, SymbolState::AlreadyCovered);
            log_symbol(&report);
            return report;
        }

        let provider_id = self.provider.id();
        let outcome = match self
            .provider
            .fetch_bars(std::slice::from_ref(symbol), window)
            .await
        {
            Ok(mut outcomes) => take_outcome(&mut outcomes, symbol, provider_id),
            Err(e) => FetchOutcome::from_error(provider_id, &e, 1),
        };

        let report = match outcome {
            FetchOutcome::Success(bars) => {
                let source = bars.first().map(|b| b.source.clone());
                match self.store.upsert_bars(&bars).await {
                    Ok(summary) => SymbolReport {
                        bars: summary,
                        provider: source,
                        ..SymbolReport::new(index, symbol, SymbolState::Persisted)
                    },
                    Err(e) => SymbolReport {
                        provider: source,
                        store_unavailable: e.is_store_unavailable(),
                        store_error: Some(e.to_string()),
                        ..SymbolReport::new(index, symbol, SymbolState::Failed)
                    },
                }
            }
            FetchOutcome::Empty => SymbolReport::new(index, symbol, SymbolState::SkippedEmpty),
            FetchOutcome::TransientFailure(cause) | FetchOutcome::PermanentFailure(cause) => {
                SymbolReport::fetch_failed(index, symbol, cause)
            }
        };

        log_symbol(&report);
        report
    }

    async fn already_covered(&self, symbol: &Symbol, window: &FetchWindow) -> bool {
        let expected = expected_bar_count(window.interval(), window.calendar_days());
        match self
            .store
            .count_bars(symbol, window.interval(), window.start())
            .await
        {
            Ok(existing) => {
                let covered = is_covered(existing, expected, self.config.covered_ratio);
                debug!(symbol = %symbol, existing, expected, covered, "coverage check");
                covered
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "coverage check failed, fetching anyway");
                false
            }
        }
    }

    fn persist(&self, record: &CheckpointRecord) -> Result<()> {
        if self.config.dry_run {
            debug!(state = ?record.state, "dry run: checkpoint not saved");
            return Ok(());
        }
        self.checkpoints.save(record)
    }

    fn log_progress(&self, record: &CheckpointRecord, batch: &Batch<'_>, total_batches: usize) {
        let progress = json!({
            "batch": batch.number,
            "batches": total_batches,
            "next_index": record.next_index(),
            "universe": record.universe_size,
            "counts": record.counts,
            "bars": record.bars,
            "throttle_warnings": record.throttle_warnings,
        });
        info!(run_id = %record.run_id, progress = %progress, "batch complete");
    }
}

/// The chain's outcome for `symbol`; a provider that skipped it broke its
/// contract.
fn take_outcome(
    outcomes: &mut HashMap<Symbol, FetchOutcome>,
    symbol: &Symbol,
    provider: &str,
) -> FetchOutcome {
    outcomes.remove(symbol).unwrap_or_else(|| {
        let error = MarketDataError::MalformedResponse {
            provider: provider.to_string(),
            message: format!("no outcome returned for {}", symbol),
        };
        FetchOutcome::from_error(provider, &error, 1)
    })
}

/// Fold one symbol's result into the run record.
fn apply(record: &mut CheckpointRecord, report: &SymbolReport) {
    let now = Utc::now();
    record.counts.attempted += 1;
    record.bars += report.bars;

    match report.state {
        SymbolState::Persisted => record.counts.succeeded += 1,
        SymbolState::AlreadyCovered => {
            record.counts.succeeded += 1;
            record.counts.already_covered += 1;
        }
        SymbolState::SkippedEmpty => record.counts.skipped += 1,
        SymbolState::Failed => {
            record.counts.failed += 1;
            let kind = report.failure.as_ref().map(|c| c.kind);
            let message = report.cause().unwrap_or_else(|| "unknown error".to_string());
            record.record_error(&report.symbol, message, kind, now);
        }
    }

    if report.throttled() {
        record.throttle_warnings += 1;
        warn!(
            symbol = %report.symbol,
            throttle_warnings = record.throttle_warnings,
            "provider throttling detected"
        );
    }

    if report.store_unavailable {
        record.consecutive_store_failures += 1;
        if !record.resume_pinned {
            record.resume_pinned = true;
            record.last_completed_index = report.index.checked_sub(1);
            warn!(
                symbol = %report.symbol,
                resume_at = report.index,
                "store unavailable, resume pointer pinned"
            );
        }
    } else {
        record.consecutive_store_failures = 0;
    }

    if !record.resume_pinned {
        record.last_completed_index = Some(report.index);
    }
    record.touch(now);
}

fn log_symbol(report: &SymbolReport) {
    let attempts = report.failure.as_ref().map(|c| c.attempts);
    let cause = report.cause();
    let kind = report.failure.as_ref().map(|c| c.kind);
    match report.state {
        SymbolState::Failed => warn!(
            symbol = report.symbol.ticker(),
            market = %report.symbol.market(),
            state = report.state.as_str(),
            attempts = ?attempts,
            kind = ?kind,
            provider = ?report.provider,
            cause = ?cause,
            "symbol failed"
        ),
        _ => info!(
            symbol = report.symbol.ticker(),
            market = %report.symbol.market(),
            state = report.state.as_str(),
            provider = ?report.provider,
            inserted = report.bars.inserted,
            duplicates = report.bars.duplicates,
            "symbol done"
        ),
    }
}

fn log_summary(report: &RunReport) {
    let coverage = &report.coverage;
    let summary = json!({
        "run_id": report.run_id,
        "state": report.state,
        "attempted": coverage.attempted,
        "succeeded": coverage.succeeded,
        "failed": coverage.failed,
        "skipped": coverage.skipped,
        "coverage": format!("{:.2}", coverage.coverage_percentage),
        "target": coverage.target,
        "bars": report.bars,
        "throttle_warnings": report.throttle_warnings,
    });
    match report.exit_status() {
        ExitStatus::Success => info!(summary = %summary, "ingestion complete"),
        ExitStatus::Partial => warn!(
            summary = %summary,
            failed_symbols = ?coverage.failed_symbols,
            "ingestion below coverage target"
        ),
        ExitStatus::Fatal => error!(
            summary = %summary,
            reason = ?report.abort_reason,
            "ingestion aborted"
        ),
    }
}
