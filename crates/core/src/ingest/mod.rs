//! Batch ingestion: pacing, checkpointing, coverage and the run loop.

mod checkpoint;
mod config;
mod coverage;
mod orchestrator;
mod pacing;
mod universe;

pub use checkpoint::{
    resolve_start_offset, CheckpointRecord, CheckpointStore, FileCheckpointStore, RunCounts,
    RunState, SymbolError, DAILY_CHECKPOINT_FILE, INTRADAY_CHECKPOINT_FILE, WEEKLY_CHECKPOINT_FILE,
};
pub use config::{
    IngestConfig, Lookback, DEFAULT_END_OF_DAY_COVERAGE_TARGET, DEFAULT_INTRADAY_COVERAGE_TARGET,
    DEFAULT_MAX_CONSECUTIVE_STORE_FAILURES,
};
pub use coverage::{coverage_percentage, expected_bar_count, is_covered, CoverageReport};
pub use orchestrator::{
    BatchFlow, ExitStatus, IngestOrchestrator, RunReport, SymbolReport, SymbolState,
};
pub use pacing::{Batch, Batches, Pacer, PacingConfig};
pub use universe::{load_universe, parse_universe, DEFAULT_MARKET};
