//! Batch slicing and request pacing.
//!
//! The universe is walked in fixed-size batches on a single lane. Between two
//! symbols of a batch the pacer waits `per_symbol_delay`; between two batches
//! it waits `per_batch_delay`. Nothing waits before the first symbol of a
//! batch or after the last batch.

use std::time::Duration;

use boursomatic_market_data::Symbol;

use crate::errors::{Error, Result};

/// Validated pacing parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacingConfig {
    batch_size: usize,
    per_symbol_delay: Duration,
    per_batch_delay: Duration,
}

impl PacingConfig {
    pub fn new(
        batch_size: usize,
        per_symbol_delay: Duration,
        per_batch_delay: Duration,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfigValue(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            batch_size,
            per_symbol_delay,
            per_batch_delay,
        })
    }

    /// Build from delays in (fractional) seconds.
    pub fn from_secs(batch_size: usize, per_symbol_secs: f64, per_batch_secs: f64) -> Result<Self> {
        Self::new(
            batch_size,
            secs("symbol delay", per_symbol_secs)?,
            secs("batch delay", per_batch_secs)?,
        )
    }

    /// 10 symbols per batch, 0.5 s between symbols, 5 s between batches.
    pub fn end_of_day_default() -> Self {
        Self {
            batch_size: 10,
            per_symbol_delay: Duration::from_millis(500),
            per_batch_delay: Duration::from_secs(5),
        }
    }

    /// 10 symbols per batch, 1 s between symbols, 10 s between batches.
    pub fn intraday_default() -> Self {
        Self {
            batch_size: 10,
            per_symbol_delay: Duration::from_secs(1),
            per_batch_delay: Duration::from_secs(10),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn per_symbol_delay(&self) -> Duration {
        self.per_symbol_delay
    }

    pub fn per_batch_delay(&self) -> Duration {
        self.per_batch_delay
    }
}

fn secs(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidConfigValue(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| Error::InvalidConfigValue(format!("{}: {}", name, e)))
}

/// A contiguous slice of the universe processed together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch<'a> {
    /// 1-based batch number within this run
    pub number: usize,
    /// Universe index of `symbols[0]`
    pub start_index: usize,
    pub symbols: &'a [Symbol],
}

impl Batch<'_> {
    /// Universe index one past the last symbol.
    pub fn end_index(&self) -> usize {
        self.start_index + self.symbols.len()
    }

    /// Pairs of (universe index, symbol).
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &Symbol)> + '_ {
        self.symbols
            .iter()
            .enumerate()
            .map(move |(i, s)| (self.start_index + i, s))
    }
}

/// Lazy iterator over the batches of a universe.
#[derive(Debug)]
pub struct Batches<'a> {
    universe: &'a [Symbol],
    next_index: usize,
    next_number: usize,
    batch_size: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.universe.len() {
            return None;
        }
        let end = (self.next_index + self.batch_size).min(self.universe.len());
        let batch = Batch {
            number: self.next_number,
            start_index: self.next_index,
            symbols: &self.universe[self.next_index..end],
        };
        self.next_index = end;
        self.next_number += 1;
        Some(batch)
    }
}

/// Applies a [`PacingConfig`] to a run.
#[derive(Clone, Debug)]
pub struct Pacer {
    config: PacingConfig,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Batches of `universe[start..]`. Empty when `start` is past the end.
    pub fn batches<'a>(&self, universe: &'a [Symbol], start: usize) -> Batches<'a> {
        Batches {
            universe,
            next_index: start,
            next_number: 1,
            batch_size: self.config.batch_size,
        }
    }

    /// Number of batches `batches(universe, start)` will yield.
    pub fn batch_count(&self, universe_len: usize, start: usize) -> usize {
        universe_len
            .saturating_sub(start)
            .div_ceil(self.config.batch_size)
    }

    pub async fn pause_between_symbols(&self) {
        if !self.config.per_symbol_delay.is_zero() {
            tokio::time::sleep(self.config.per_symbol_delay).await;
        }
    }

    pub async fn pause_between_batches(&self) {
        if !self.config.per_batch_delay.is_zero() {
            tokio::time::sleep(self.config.per_batch_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boursomatic_market_data::Market;

    fn universe(n: usize) -> Vec<Symbol> {
        (0..n)
            .map(|i| Symbol::new(format!("T{}", i), Market::Nasdaq).unwrap())
            .collect()
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(PacingConfig::from_secs(0, 1.0, 1.0).is_err());
        assert!(PacingConfig::from_secs(5, -0.5, 1.0).is_err());
        assert!(PacingConfig::from_secs(5, 1.0, f64::NAN).is_err());
        assert!(PacingConfig::from_secs(5, 1.0, f64::INFINITY).is_err());
        let ok = PacingConfig::from_secs(5, 0.25, 0.0).unwrap();
        assert_eq!(ok.per_symbol_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_batches_cover_universe_from_start() {
        let symbols = universe(7);
        let pacer = Pacer::new(PacingConfig::from_secs(3, 0.0, 0.0).unwrap());

        let batches: Vec<_> = pacer.batches(&symbols, 2).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(pacer.batch_count(7, 2), 2);
        assert_eq!(batches[0].number, 1);
        assert_eq!(batches[0].start_index, 2);
        assert_eq!(batches[0].symbols.len(), 3);
        assert_eq!(batches[1].start_index, 5);
        assert_eq!(batches[1].end_index(), 7);
        assert_eq!(
            batches[1].indexed().map(|(i, _)| i).collect::<Vec<_>>(),
            vec![5, 6]
        );
    }

    #[test]
    fn test_start_past_end_yields_nothing() {
        let symbols = universe(3);
        let pacer = Pacer::new(PacingConfig::end_of_day_default());
        assert_eq!(pacer.batches(&symbols, 3).count(), 0);
        assert_eq!(pacer.batches(&symbols, 10).count(), 0);
        assert_eq!(pacer.batch_count(3, 10), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_sleep_for_configured_delay() {
        let pacer = Pacer::new(PacingConfig::from_secs(2, 1.5, 4.0).unwrap());
        let started = tokio::time::Instant::now();
        pacer.pause_between_symbols().await;
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
        pacer.pause_between_batches().await;
        assert_eq!(started.elapsed(), Duration::from_millis(5500));
    }
}
