//! Provider composition.
//!
//! This module layers resilience on top of raw providers:
//! - Retry with exponential backoff per provider (`ResilientProvider`)
//! - Primary/fallback chaining (`ProviderChain`)
//! - Bar data validation (`BarValidator`)

mod chain;
mod retry;
mod validator;

pub use chain::ProviderChain;
pub use retry::{
    ResilientProvider, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
};
pub use validator::{BarValidator, ValidationSeverity, ValidatorConfig};
