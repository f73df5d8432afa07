//! Primary/fallback composition of bar providers.
//!
//! The chain asks the primary for every symbol, then sends only the symbols
//! whose outcome is a failure to the fallback, once. It also refuses work a
//! provider cannot do (unsupported interval or market) without touching the
//! network, and filters successful bar sets through the [`BarValidator`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};

use super::retry::{ResilientProvider, RetryPolicy};
use super::validator::BarValidator;
use crate::errors::MarketDataError;
use crate::models::{
    FailureCause, FetchOutcome, FetchWindow, Fundamentals, Interval, Market, Symbol,
};
use crate::provider::{ensure_valid_request, BarProvider, ProviderCapabilities};

/// Primary provider with an optional fallback, exposed as a single provider.
pub struct ProviderChain {
    primary: Arc<dyn BarProvider>,
    fallback: Option<Arc<dyn BarProvider>>,
    validator: BarValidator,
}

impl ProviderChain {
    /// Compose already-wrapped providers.
    pub fn new(primary: Arc<dyn BarProvider>, fallback: Option<Arc<dyn BarProvider>>) -> Self {
        Self {
            primary,
            fallback,
            validator: BarValidator::new(),
        }
    }

    /// Wrap both providers in a [`ResilientProvider`] with the same policy.
    pub fn resilient(
        primary: Arc<dyn BarProvider>,
        fallback: Option<Arc<dyn BarProvider>>,
        policy: RetryPolicy,
    ) -> Self {
        let wrap = |p: Arc<dyn BarProvider>| -> Arc<dyn BarProvider> {
            Arc::new(ResilientProvider::new(p, policy.clone()))
        };
        Self::new(wrap(primary), fallback.map(wrap))
    }

    pub fn primary_id(&self) -> &'static str {
        self.primary.id()
    }

    pub fn fallback_id(&self) -> Option<&'static str> {
        self.fallback.as_ref().map(|f| f.id())
    }

    /// Fetch from one provider, short-circuiting what it cannot serve.
    async fn fetch_from(
        &self,
        provider: &dyn BarProvider,
        symbols: &[Symbol],
        window: &FetchWindow,
    ) -> HashMap<Symbol, FetchOutcome> {
        let id = provider.id();
        let capabilities = provider.capabilities();
        let mut outcomes = HashMap::with_capacity(symbols.len());

        if !capabilities.supports_interval(window.interval()) {
            let error = MarketDataError::UnsupportedInterval {
                provider: id.to_string(),
                interval: window.interval().to_string(),
            };
            debug!("{} does not serve {} bars", id, window.interval());
            for symbol in symbols {
                let cause = FailureCause::from_error(id, &error, 0);
                outcomes.insert(symbol.clone(), FetchOutcome::PermanentFailure(cause));
            }
            return outcomes;
        }

        let (supported, unsupported): (Vec<Symbol>, Vec<Symbol>) = symbols
            .iter()
            .cloned()
            .partition(|s| capabilities.supports_market(s.market()));

        for symbol in unsupported {
            let error = MarketDataError::UnsupportedMarket {
                provider: id.to_string(),
                market: symbol.market().to_string(),
            };
            let cause = FailureCause::from_error(id, &error, 0);
            outcomes.insert(symbol, FetchOutcome::PermanentFailure(cause));
        }

        if supported.is_empty() {
            return outcomes;
        }

        let mut fetched = match provider.fetch_bars(&supported, window).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("{} request failed for {} symbol(s): {}", id, supported.len(), e);
                supported
                    .iter()
                    .map(|s| (s.clone(), FetchOutcome::from_error(id, &e, 1)))
                    .collect()
            }
        };

        for symbol in supported {
            let outcome = fetched.remove(&symbol).unwrap_or_else(|| {
                let error = MarketDataError::MalformedResponse {
                    provider: id.to_string(),
                    message: format!("no outcome returned for {}", symbol),
                };
                FetchOutcome::from_error(id, &error, 1)
            });
            outcomes.insert(symbol, self.validator.validate_outcome(id, outcome));
        }

        outcomes
    }
}

/// Attach the primary's cause to a failed fallback outcome.
fn merge_fallback(primary: Option<FailureCause>, fallback: FetchOutcome) -> FetchOutcome {
    match (primary, fallback) {
        (Some(previous), FetchOutcome::TransientFailure(cause)) => {
            FetchOutcome::TransientFailure(cause.with_previous(previous))
        }
        (Some(previous), FetchOutcome::PermanentFailure(cause)) => {
            FetchOutcome::PermanentFailure(cause.with_previous(previous))
        }
        (_, outcome) => outcome,
    }
}

#[async_trait]
impl BarProvider for ProviderChain {
    fn id(&self) -> &'static str {
        self.primary.id()
    }

    /// Union of what the providers can serve.
    fn capabilities(&self) -> ProviderCapabilities {
        let primary = self.primary.capabilities();
        let Some(fallback) = self.fallback.as_ref().map(|f| f.capabilities()) else {
            return primary;
        };
        let intervals: &'static [Interval] = if fallback.intervals.len() > primary.intervals.len()
        {
            fallback.intervals
        } else {
            primary.intervals
        };
        let markets: &'static [Market] = if fallback.markets.len() > primary.markets.len() {
            fallback.markets
        } else {
            primary.markets
        };
        ProviderCapabilities {
            intervals,
            markets,
            supports_fundamentals: primary.supports_fundamentals
                || fallback.supports_fundamentals,
        }
    }

    fn normalize_symbol(&self, symbol: &Symbol) -> Result<String, MarketDataError> {
        self.primary.normalize_symbol(symbol)
    }

    async fn fetch_bars(
        &self,
        symbols: &[Symbol],
        window: &FetchWindow,
    ) -> Result<HashMap<Symbol, FetchOutcome>, MarketDataError> {
        ensure_valid_request(symbols)?;

        let mut outcomes = self.fetch_from(self.primary.as_ref(), symbols, window).await;

        let Some(fallback) = self.fallback.as_ref() else {
            return Ok(outcomes);
        };

        let failed: Vec<Symbol> = symbols
            .iter()
            .filter(|s| outcomes.get(*s).is_some_and(FetchOutcome::is_failure))
            .cloned()
            .collect();

        if failed.is_empty() {
            return Ok(outcomes);
        }

        info!(
            "Falling back to {} for {} symbol(s) that failed on {}",
            fallback.id(),
            failed.len(),
            self.primary.id()
        );

        let mut fallback_outcomes = self.fetch_from(fallback.as_ref(), &failed, window).await;

        for symbol in failed {
            let primary_cause = outcomes
                .remove(&symbol)
                .and_then(|o| o.failure_cause().cloned());
            let fallback_outcome = fallback_outcomes
                .remove(&symbol)
                .unwrap_or(FetchOutcome::Empty);
            outcomes.insert(symbol, merge_fallback(primary_cause, fallback_outcome));
        }

        Ok(outcomes)
    }

    async fn fetch_fundamentals(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<Fundamentals>, MarketDataError> {
        let mut primary_error = None;

        if self.primary.capabilities().supports_fundamentals {
            match self.primary.fetch_fundamentals(symbol).await {
                Ok(Some(f)) if !f.is_blank() => return Ok(Some(f)),
                Ok(_) => debug!("{} has no fundamentals for {}", self.primary.id(), symbol),
                Err(e) => {
                    warn!("{} fundamentals failed for {}: {}", self.primary.id(), symbol, e);
                    primary_error = Some(e);
                }
            }
        }

        if let Some(fallback) = self
            .fallback
            .as_ref()
            .filter(|f| f.capabilities().supports_fundamentals)
        {
            match fallback.fetch_fundamentals(symbol).await {
                Ok(Some(f)) => return Ok(Some(f)),
                Ok(None) => {}
                Err(e) => warn!("{} fundamentals failed for {}: {}", fallback.id(), symbol, e),
            }
        }

        match primary_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}
