use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Bar granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
}

impl Interval {
    pub const ALL: &'static [Interval] = &[
        Interval::Daily,
        Interval::Weekly,
        Interval::OneHour,
        Interval::FifteenMinutes,
        Interval::FiveMinutes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "daily",
            Interval::Weekly => "weekly",
            Interval::OneHour => "1h",
            Interval::FifteenMinutes => "15m",
            Interval::FiveMinutes => "5m",
        }
    }

    pub fn is_intraday(&self) -> bool {
        !self.is_end_of_day()
    }

    pub fn is_end_of_day(&self) -> bool {
        matches!(self, Interval::Daily | Interval::Weekly)
    }

    /// Canonical bar timestamp, shared by every provider.
    ///
    /// Daily bars sit at 00:00 UTC of the session date and weekly bars at
    /// 00:00 UTC of that week's Monday. Intraday timestamps are kept as is.
    pub fn anchor(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let day = match self {
            Interval::Daily => Some(date),
            Interval::Weekly => {
                date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
            }
            _ => return ts,
        };
        day.and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .unwrap_or(ts)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "1d" => Ok(Interval::Daily),
            "weekly" | "1wk" => Ok(Interval::Weekly),
            "1h" | "60m" => Ok(Interval::OneHour),
            "15m" => Ok(Interval::FifteenMinutes),
            "5m" => Ok(Interval::FiveMinutes),
            other => Err(MarketDataError::InvalidRequest(format!(
                "unknown interval '{}'",
                other
            ))),
        }
    }
}
