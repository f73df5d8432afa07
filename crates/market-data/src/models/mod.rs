//! Market data models
//!
//! This module contains the core data types for bar ingestion:
//! - `symbol` - Ticker plus listing market (Symbol, Market)
//! - `interval` - Bar granularity (Interval)
//! - `bar` - OHLCV bars, their storage key, and fetch windows
//! - `outcome` - Per-symbol fetch outcomes and failure provenance
//! - `fundamentals` - Company fundamentals (Fundamentals)

mod bar;
mod fundamentals;
mod interval;
mod outcome;
mod symbol;

pub use bar::{Bar, BarKey, FetchWindow};
pub use fundamentals::Fundamentals;
pub use interval::Interval;
pub use outcome::{FailureCause, FetchOutcome};
pub use symbol::{Market, Symbol};
