use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::interval::Interval;
use super::symbol::Symbol;
use crate::errors::MarketDataError;

/// One OHLCV bar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: Symbol,

    /// Bar open time, UTC
    pub timestamp: DateTime<Utc>,

    pub interval: Interval,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,

    /// Provider that produced the bar ("YAHOO", "STOOQ")
    pub source: String,
}

/// Storage identity of a bar. Upserts are keyed on it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BarKey {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub interval: Interval,
}

impl Bar {
    pub fn key(&self) -> BarKey {
        BarKey {
            symbol: self.symbol.clone(),
            timestamp: self.timestamp,
            interval: self.interval,
        }
    }
}

/// Requested time range plus interval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: Interval,
}

impl FetchWindow {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Self, MarketDataError> {
        if end <= start {
            return Err(MarketDataError::InvalidRequest(format!(
                "window end {} must be after start {}",
                end, start
            )));
        }
        Ok(Self {
            start,
            end,
            interval,
        })
    }

    /// Window ending at `now` and covering `years` of 365 days.
    pub fn lookback_years(
        years: u32,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> Result<Self, MarketDataError> {
        Self::lookback_days(years.saturating_mul(365), interval, now)
    }

    /// Window ending at `now` and covering `days` calendar days.
    pub fn lookback_days(
        days: u32,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> Result<Self, MarketDataError> {
        let start = Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                MarketDataError::InvalidRequest(format!(
                    "lookback of {} days is out of range",
                    days
                ))
            })?;
        Self::new(start, now, interval)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Length of the window in whole calendar days.
    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}
