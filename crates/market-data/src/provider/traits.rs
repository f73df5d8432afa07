//! Bar provider trait definitions.
//!
//! This module defines the core `BarProvider` trait implemented by the
//! concrete HTTP clients and by the resilience/fallback wrappers that
//! compose them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{FetchOutcome, FetchWindow, Fundamentals, Symbol};

use super::capabilities::ProviderCapabilities;

/// Trait for bar providers.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use boursomatic_market_data::provider::{BarProvider, ProviderCapabilities};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl BarProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             intervals: &[Interval::Daily],
///             markets: &[Market::Nasdaq],
///             supports_fundamentals: false,
///         }
///     }
///
///     // ... implement normalize_symbol and fetch_bars
/// }
/// ```
#[async_trait]
pub trait BarProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// A constant string like "YAHOO" or "STOOQ". Recorded as the bar
    /// source and in failure causes.
    fn id(&self) -> &'static str;

    /// Describes what this provider can do.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Map a symbol to the provider's ticker convention.
    ///
    /// Pure and deterministic. Returns `UnsupportedMarket` for markets the
    /// provider has no convention for.
    fn normalize_symbol(&self, symbol: &Symbol) -> Result<String, MarketDataError>;

    /// Fetch bars for each symbol over the window.
    ///
    /// Every requested symbol gets an entry in the returned map. A whole-call
    /// `Err` is reserved for invalid requests (empty symbol set, inverted
    /// window) and for transport failures that hit the batch as a whole.
    async fn fetch_bars(
        &self,
        symbols: &[Symbol],
        window: &FetchWindow,
    ) -> Result<HashMap<Symbol, FetchOutcome>, MarketDataError>;

    /// Fetch company fundamentals. Best effort.
    ///
    /// Default implementation returns `Ok(None)`.
    async fn fetch_fundamentals(
        &self,
        _symbol: &Symbol,
    ) -> Result<Option<Fundamentals>, MarketDataError> {
        Ok(None)
    }
}

#[async_trait]
impl<T: BarProvider + ?Sized> BarProvider for Arc<T> {
    fn id(&self) -> &'static str {
        (**self).id()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        (**self).capabilities()
    }

    fn normalize_symbol(&self, symbol: &Symbol) -> Result<String, MarketDataError> {
        (**self).normalize_symbol(symbol)
    }

    async fn fetch_bars(
        &self,
        symbols: &[Symbol],
        window: &FetchWindow,
    ) -> Result<HashMap<Symbol, FetchOutcome>, MarketDataError> {
        (**self).fetch_bars(symbols, window).await
    }

    async fn fetch_fundamentals(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<Fundamentals>, MarketDataError> {
        (**self).fetch_fundamentals(symbol).await
    }
}

/// Reject requests no provider can serve.
pub(crate) fn ensure_valid_request(symbols: &[Symbol]) -> Result<(), MarketDataError> {
    if symbols.is_empty() {
        return Err(MarketDataError::InvalidRequest(
            "symbol set cannot be empty".to_string(),
        ));
    }
    Ok(())
}
