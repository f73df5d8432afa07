//! Boursomatic Market Data Crate
//!
//! Provider-agnostic OHLCV bar fetching for the ingestion engine.
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  ProviderChain   |  primary first, failed symbols once to the fallback
//! +------------------+
//!          |
//!          v
//! +-------------------+
//! | ResilientProvider |  per-provider retry with exponential backoff
//! +-------------------+
//!          |
//!          v
//! +------------------+
//! |   BarProvider    |  Yahoo Finance, Stooq
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  FetchOutcome    |  Success / Empty / Transient / Permanent, per symbol
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Symbol`] - Ticker plus listing [`Market`]
//! - [`Bar`] - One OHLCV bar, keyed by [`BarKey`]
//! - [`FetchWindow`] - Time range plus [`Interval`]
//! - [`FetchOutcome`] - Per-symbol fetch result with [`FailureCause`] provenance

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use errors::{FailureKind, MarketDataError, RetryClass};

pub use models::{
    Bar, BarKey, FailureCause, FetchOutcome, FetchWindow, Fundamentals, Interval, Market, Symbol,
};

pub use provider::stooq::StooqProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{BarProvider, ProviderCapabilities};

pub use registry::{
    BarValidator, ProviderChain, ResilientProvider, RetryPolicy, ValidationSeverity,
    ValidatorConfig,
};
