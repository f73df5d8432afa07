//! Bar provider abstractions and implementations.
//!
//! This module contains:
//! - The `BarProvider` trait that all providers implement
//! - Provider capability descriptions
//! - Concrete HTTP providers (Yahoo Finance, Stooq)
//!
//! Providers report one [`FetchOutcome`](crate::models::FetchOutcome) per
//! requested symbol and never retry on their own. Retry and fallback are
//! layered on top by the registry module.

mod capabilities;
mod traits;

pub mod stooq;
pub mod yahoo;

// Re-exports
pub use capabilities::ProviderCapabilities;
pub use traits::BarProvider;
pub(crate) use traits::ensure_valid_request;
