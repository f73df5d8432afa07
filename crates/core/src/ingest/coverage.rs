//! Coverage accounting.

use serde::{Deserialize, Serialize};

use boursomatic_market_data::Interval;

use super::checkpoint::CheckpointRecord;

const TRADING_DAYS_PER_YEAR: u64 = 252;
const WEEKS_PER_YEAR: u64 = 52;

/// Final coverage of a run, computed once at shutdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `(attempted - failed) / attempted`, in percent
    pub coverage_percentage: f64,
    pub target: f64,
    pub failed_symbols: Vec<String>,
}

impl CoverageReport {
    pub fn from_record(record: &CheckpointRecord, target: f64) -> Self {
        let counts = record.counts;
        Self {
            attempted: counts.attempted,
            succeeded: counts.succeeded,
            failed: counts.failed,
            skipped: counts.skipped,
            coverage_percentage: coverage_percentage(counts.attempted, counts.failed),
            target,
            failed_symbols: record.failed_symbols(),
        }
    }

    pub fn meets_target(&self) -> bool {
        self.coverage_percentage >= self.target
    }
}

/// Percent of attempted symbols that did not fail. Empty results count as
/// not failed. Nothing attempted is full coverage.
pub fn coverage_percentage(attempted: usize, failed: usize) -> f64 {
    if attempted == 0 {
        return 100.0;
    }
    let ok = attempted.saturating_sub(failed);
    ok as f64 / attempted as f64 * 100.0
}

/// Bars a fully covered symbol would have over `calendar_days`.
pub fn expected_bar_count(interval: Interval, calendar_days: i64) -> u64 {
    let days = calendar_days.max(0) as u64;
    match interval {
        Interval::Daily => days * TRADING_DAYS_PER_YEAR / 365,
        Interval::Weekly => days * WEEKS_PER_YEAR / 365,
        Interval::OneHour => 7 * trading_days(days),
        Interval::FifteenMinutes => 26 * trading_days(days),
        Interval::FiveMinutes => 78 * trading_days(days),
    }
}

fn trading_days(calendar_days: u64) -> u64 {
    calendar_days * 5 / 7
}

/// True when `existing` reaches `ratio` of a non-zero `expected`.
pub fn is_covered(existing: u64, expected: u64, ratio: f64) -> bool {
    expected > 0 && existing as f64 >= expected as f64 * ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_expected_counts() {
        assert_eq!(expected_bar_count(Interval::Daily, 365 * 8), 252 * 8);
        assert_eq!(expected_bar_count(Interval::Weekly, 365), 52);
        assert_eq!(expected_bar_count(Interval::FifteenMinutes, 28), 26 * 20);
        assert_eq!(expected_bar_count(Interval::OneHour, 7), 35);
        assert_eq!(expected_bar_count(Interval::FiveMinutes, -3), 0);
    }

    #[test]
    fn test_is_covered() {
        assert!(is_covered(1916, 2016, 0.95));
        assert!(!is_covered(1915, 2016, 0.95));
        assert!(!is_covered(0, 0, 0.95));
    }

    #[test]
    fn test_empty_results_do_not_lower_coverage() {
        // 4 attempted, 1 empty, 0 failed
        assert_eq!(coverage_percentage(4, 0), 100.0);
        assert_eq!(coverage_percentage(4, 1), 75.0);
        assert_eq!(coverage_percentage(0, 0), 100.0);
    }

    proptest! {
        #[test]
        fn prop_coverage_matches_formula(attempted in 1usize..5000, failed_frac in 0.0f64..=1.0) {
            let failed = ((attempted as f64) * failed_frac) as usize;
            let pct = coverage_percentage(attempted, failed);
            prop_assert!((0.0..=100.0).contains(&pct));
            let expected = (attempted - failed) as f64 / attempted as f64 * 100.0;
            prop_assert!((pct - expected).abs() < 1e-9);
        }

        #[test]
        fn prop_more_failures_never_raise_coverage(attempted in 1usize..5000, a in 0usize..5000, b in 0usize..5000) {
            let (lo, hi) = (a.min(b).min(attempted), a.max(b).min(attempted));
            prop_assert!(coverage_percentage(attempted, hi) <= coverage_percentage(attempted, lo));
        }
    }
}
