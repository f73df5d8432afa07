//! Provider capability descriptions.

use crate::models::{Interval, Market};

/// Describes what a bar provider can serve.
///
/// Used by the provider chain to refuse unsupported intervals up front
/// instead of silently degrading to another granularity.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Bar intervals this provider serves.
    pub intervals: &'static [Interval],

    /// Markets for which the provider has a ticker convention.
    pub markets: &'static [Market],

    /// Whether the provider exposes company fundamentals.
    pub supports_fundamentals: bool,
}

impl ProviderCapabilities {
    pub fn supports_interval(&self, interval: Interval) -> bool {
        self.intervals.contains(&interval)
    }

    pub fn supports_market(&self, market: Market) -> bool {
        self.markets.contains(&market)
    }
}
