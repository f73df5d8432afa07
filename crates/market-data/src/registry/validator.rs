//! Bar data validation.
//!
//! Validates bars from providers before they reach storage:
//! - OHLC invariants (high >= low, open/close between high/low)
//! - Non-negative prices and volume
//! - Reasonable value ranges

use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{Bar, FailureCause, FetchOutcome};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - drop the bar.
    Hard,
    /// Soft warning - keep the bar but log it.
    Soft,
}

#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

/// Bar validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Whether to reject bars with negative prices.
    pub reject_negative_prices: bool,
    /// Whether to reject bars where high < low.
    pub reject_invalid_ohlc: bool,
    /// Maximum allowed price value (for sanity check).
    pub max_price: Option<Decimal>,
    /// Whether to warn on zero volume.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_negative_prices: true,
            reject_invalid_ohlc: true,
            max_price: Some(Decimal::from(1_000_000_000i64)),
            // Indices and halted sessions legitimately report zero volume
            warn_on_zero_volume: false,
        }
    }
}

/// Bar data validator.
#[derive(Clone, Debug, Default)]
pub struct BarValidator {
    config: ValidatorConfig,
}

impl BarValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a bar.
    ///
    /// Soft issues are logged; any hard issue rejects the bar.
    pub fn validate(&self, bar: &Bar) -> Result<(), MarketDataError> {
        let mut issues = Vec::new();
        self.validate_ohlc_invariants(bar, &mut issues);
        self.validate_price_range(bar, &mut issues);
        self.validate_volume(bar, &mut issues);

        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(MarketDataError::MalformedResponse {
                provider: bar.source.clone(),
                message: errors.join("; "),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!(
                "Bar validation warning for {} at {}: {}",
                bar.symbol, bar.timestamp, issue.message
            );
        }

        Ok(())
    }

    /// Validate all bars in a batch.
    ///
    /// Returns a tuple of (valid_bars, invalid_bars_with_errors).
    pub fn validate_batch(&self, bars: Vec<Bar>) -> (Vec<Bar>, Vec<(Bar, MarketDataError)>) {
        let mut valid = Vec::with_capacity(bars.len());
        let mut invalid = Vec::new();

        for bar in bars {
            match self.validate(&bar) {
                Ok(()) => valid.push(bar),
                Err(e) => invalid.push((bar, e)),
            }
        }

        (valid, invalid)
    }

    /// Filter a successful outcome, leaving other outcomes untouched.
    ///
    /// A response in which every bar is invalid becomes a permanent
    /// `MalformedResponse` failure.
    pub fn validate_outcome(&self, provider: &str, outcome: FetchOutcome) -> FetchOutcome {
        let FetchOutcome::Success(bars) = outcome else {
            return outcome;
        };

        let total = bars.len();
        let (valid, invalid) = self.validate_batch(bars);

        if let Some((first, err)) = invalid.first() {
            warn!(
                "Dropped {}/{} invalid bars for {} from {} (first: {})",
                invalid.len(),
                total,
                first.symbol,
                provider,
                err
            );
        }

        if valid.is_empty() {
            let error = MarketDataError::MalformedResponse {
                provider: provider.to_string(),
                message: format!("all {} bars failed validation", total),
            };
            return FetchOutcome::PermanentFailure(FailureCause::from_error(provider, &error, 1));
        }

        FetchOutcome::Success(valid)
    }

    fn validate_ohlc_invariants(&self, bar: &Bar, issues: &mut Vec<ValidationIssue>) {
        let (open, high, low, close) = (bar.open, bar.high, bar.low, bar.close);

        if self.config.reject_invalid_ohlc && high < low {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("High ({}) is less than Low ({})", high, low),
            });
        }

        if open < low || open > high {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: format!("Open ({}) is outside High/Low range ({}-{})", open, low, high),
            });
        }

        if close < low || close > high {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: format!(
                    "Close ({}) is outside High/Low range ({}-{})",
                    close, low, high
                ),
            });
        }

        if self.config.reject_negative_prices {
            for (label, value) in [("open", open), ("high", high), ("low", low), ("close", close)]
            {
                if value < Decimal::ZERO {
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Hard,
                        message: format!("Negative {} price: {}", label, value),
                    });
                }
            }
        }
    }

    fn validate_price_range(&self, bar: &Bar, issues: &mut Vec<ValidationIssue>) {
        if let Some(max_price) = self.config.max_price {
            if bar.high > max_price {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: format!(
                        "High price ({}) exceeds max threshold ({})",
                        bar.high, max_price
                    ),
                });
            }
        }
    }

    fn validate_volume(&self, bar: &Bar, issues: &mut Vec<ValidationIssue>) {
        if bar.volume < Decimal::ZERO {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("Negative volume: {}", bar.volume),
            });
        }

        if self.config.warn_on_zero_volume && bar.volume == Decimal::ZERO {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: "Zero volume".to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use crate::models::{Interval, Market, Symbol};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn make_bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar {
            symbol: Symbol::new("AAPL", Market::Nasdaq).unwrap(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            interval: Interval::Daily,
            open,
            high,
            low,
            close,
            volume: dec!(1000),
            source: "TEST".to_string(),
        }
    }

    #[test]
    fn test_valid_bar() {
        let validator = BarValidator::new();
        let bar = make_bar(dec!(100), dec!(110), dec!(95), dec!(105));
        assert!(validator.validate(&bar).is_ok());
    }

    #[test]
    fn test_high_less_than_low_rejected() {
        let validator = BarValidator::new();
        let bar = make_bar(dec!(100), dec!(90), dec!(95), dec!(100));

        let result = validator.validate(&bar);
        if let Err(MarketDataError::MalformedResponse { message, .. }) = result {
            assert!(message.contains("High") && message.contains("less than Low"));
        } else {
            panic!("expected rejection, got {:?}", result);
        }
    }

    #[test]
    fn test_negative_values_rejected() {
        let validator = BarValidator::new();
        assert!(validator
            .validate(&make_bar(dec!(-1), dec!(10), dec!(-2), dec!(5)))
            .is_err());

        let mut bar = make_bar(dec!(100), dec!(110), dec!(95), dec!(105));
        bar.volume = dec!(-1000);
        assert!(validator.validate(&bar).is_err());
    }

    #[test]
    fn test_close_outside_range_is_soft() {
        let validator = BarValidator::new();
        let bar = make_bar(dec!(100), dec!(110), dec!(95), dec!(111));
        assert!(validator.validate(&bar).is_ok());
    }

    #[test]
    fn test_custom_config_allows_negative() {
        let validator = BarValidator::with_config(ValidatorConfig {
            reject_negative_prices: false,
            ..Default::default()
        });
        let bar = make_bar(dec!(-10), dec!(-5), dec!(-12), dec!(-8));
        assert!(validator.validate(&bar).is_ok());
    }

    #[test]
    fn test_outcome_drops_invalid_bars() {
        let validator = BarValidator::new();
        let good = make_bar(dec!(100), dec!(110), dec!(95), dec!(105));
        let bad = make_bar(dec!(100), dec!(90), dec!(95), dec!(100));

        let outcome =
            validator.validate_outcome("TEST", FetchOutcome::Success(vec![good.clone(), bad]));
        assert_eq!(outcome, FetchOutcome::Success(vec![good]));
    }

    #[test]
    fn test_all_invalid_becomes_malformed_failure() {
        let validator = BarValidator::new();
        let bad = make_bar(dec!(100), dec!(90), dec!(95), dec!(100));

        let outcome = validator.validate_outcome("YAHOO", FetchOutcome::Success(vec![bad]));
        match outcome {
            FetchOutcome::PermanentFailure(cause) => {
                assert_eq!(cause.kind, FailureKind::MalformedResponse);
                assert_eq!(cause.provider, "YAHOO");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_non_success_outcomes_pass_through() {
        let validator = BarValidator::new();
        assert_eq!(
            validator.validate_outcome("TEST", FetchOutcome::Empty),
            FetchOutcome::Empty
        );
    }
}
