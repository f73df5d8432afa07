//! Typed run parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boursomatic_market_data::{FetchWindow, Interval};

use super::pacing::PacingConfig;
use crate::errors::{Error, Result};

/// Coverage target for daily/weekly runs, in percent.
pub const DEFAULT_END_OF_DAY_COVERAGE_TARGET: f64 = 98.0;
/// Coverage target for intraday runs, in percent.
pub const DEFAULT_INTRADAY_COVERAGE_TARGET: f64 = 95.0;
/// Consecutive "store unavailable" failures that abort a run.
pub const DEFAULT_MAX_CONSECUTIVE_STORE_FAILURES: u32 = 3;

const END_OF_DAY_COVERED_RATIO: f64 = 0.95;
const INTRADAY_COVERED_RATIO: f64 = 0.90;
const DEFAULT_LOOKBACK_YEARS: u32 = 8;
const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// How far back a run reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lookback {
    Years(u32),
    Days(u32),
}

impl Lookback {
    pub fn window(&self, interval: Interval, now: DateTime<Utc>) -> Result<FetchWindow> {
        let window = match *self {
            Lookback::Years(years) => FetchWindow::lookback_years(years, interval, now),
            Lookback::Days(days) => FetchWindow::lookback_days(days, interval, now),
        };
        window.map_err(Error::from)
    }
}

/// Validated settings for one ingestion run.
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub interval: Interval,
    pub lookback: Lookback,
    pub pacing: PacingConfig,
    /// Explicit resume point; wins over the checkpoint when set.
    pub start_offset: Option<usize>,
    /// Truncate the universe to its first N symbols.
    pub max_symbols: Option<usize>,
    pub dry_run: bool,
    /// Percent of attempted symbols that must not fail.
    pub coverage_target: f64,
    pub skip_covered: bool,
    /// Fraction of expected bars that marks a symbol as already covered.
    pub covered_ratio: f64,
    pub max_consecutive_store_failures: u32,
}

impl IngestConfig {
    /// Defaults for `interval`: 8 years back for end-of-day data, 30 days for
    /// intraday, with the matching pacing and coverage target.
    pub fn for_interval(interval: Interval) -> Self {
        if interval.is_intraday() {
            Self {
                interval,
                lookback: Lookback::Days(DEFAULT_LOOKBACK_DAYS),
                pacing: PacingConfig::intraday_default(),
                start_offset: None,
                max_symbols: None,
                dry_run: false,
                coverage_target: DEFAULT_INTRADAY_COVERAGE_TARGET,
                skip_covered: false,
                covered_ratio: INTRADAY_COVERED_RATIO,
                max_consecutive_store_failures: DEFAULT_MAX_CONSECUTIVE_STORE_FAILURES,
            }
        } else {
            Self {
                interval,
                lookback: Lookback::Years(DEFAULT_LOOKBACK_YEARS),
                pacing: PacingConfig::end_of_day_default(),
                start_offset: None,
                max_symbols: None,
                dry_run: false,
                coverage_target: DEFAULT_END_OF_DAY_COVERAGE_TARGET,
                skip_covered: false,
                covered_ratio: END_OF_DAY_COVERED_RATIO,
                max_consecutive_store_failures: DEFAULT_MAX_CONSECUTIVE_STORE_FAILURES,
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.coverage_target.is_finite() || !(0.0..=100.0).contains(&self.coverage_target) {
            return Err(Error::InvalidConfigValue(format!(
                "coverage target must be between 0 and 100, got {}",
                self.coverage_target
            )));
        }
        if !self.covered_ratio.is_finite() || !(0.0..=1.0).contains(&self.covered_ratio) {
            return Err(Error::InvalidConfigValue(format!(
                "covered ratio must be between 0 and 1, got {}",
                self.covered_ratio
            )));
        }
        match self.lookback {
            Lookback::Years(0) | Lookback::Days(0) => {
                return Err(Error::InvalidConfigValue(
                    "lookback must be at least one day".to_string(),
                ));
            }
            _ => {}
        }
        if self.max_symbols == Some(0) {
            return Err(Error::InvalidConfigValue(
                "max symbols must be at least 1".to_string(),
            ));
        }
        if self.max_consecutive_store_failures == 0 {
            return Err(Error::InvalidConfigValue(
                "max consecutive store failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
