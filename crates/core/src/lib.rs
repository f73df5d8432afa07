//! Boursomatic Core - ingestion engine for OHLCV market data.
//!
//! This crate drives batch ingestion runs over a symbol universe. It is
//! database-agnostic: bars go through the [`bars::BarStore`] trait, which the
//! `storage-sqlite` crate implements.

pub mod bars;
pub mod errors;
pub mod ingest;

pub use bars::{BarStore, DryRunBarStore, UpsertSummary};
pub use ingest::{
    CheckpointRecord, CheckpointStore, ExitStatus, FileCheckpointStore, IngestConfig,
    IngestOrchestrator, RunReport, RunState,
};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
