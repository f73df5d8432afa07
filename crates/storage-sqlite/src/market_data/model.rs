//! Database models for price bars.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use boursomatic_market_data::{Bar, Interval, Market, Symbol};

use crate::errors::StorageError;

/// Number of bound columns in [`NewPriceBarDB`].
pub const PRICE_BAR_COLUMNS: usize = 11;

/// Stored row.
#[derive(Queryable, Identifiable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::price_bars)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceBarDB {
    pub id: i32,
    pub symbol: String,
    pub market: String,
    pub interval: String,
    pub ts: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub source: String,
    pub created_at: String,
}

/// Row to insert; `id` is assigned by SQLite.
#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::price_bars)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewPriceBarDB {
    pub symbol: String,
    pub market: String,
    pub interval: String,
    pub ts: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub source: String,
    pub created_at: String,
}

/// Fixed-width UTC text, so string order is time order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl NewPriceBarDB {
    pub fn from_bar(bar: &Bar, created_at: DateTime<Utc>) -> Self {
        Self {
            symbol: bar.symbol.ticker().to_string(),
            market: bar.symbol.market().as_str().to_string(),
            interval: bar.interval.as_str().to_string(),
            ts: format_ts(bar.timestamp),
            open: bar.open.to_string(),
            high: bar.high.to_string(),
            low: bar.low.to_string(),
            close: bar.close.to_string(),
            volume: bar.volume.to_string(),
            source: bar.source.clone(),
            created_at: format_ts(created_at),
        }
    }
}

impl TryFrom<PriceBarDB> for Bar {
    type Error = StorageError;

    fn try_from(db: PriceBarDB) -> Result<Self, Self::Error> {
        let invalid = |what: &str, e: &dyn std::fmt::Display| {
            StorageError::InvalidRow(format!("price_bars.{} (id {}): {}", what, db.id, e))
        };
        let decimal = |what: &str, raw: &str| {
            Decimal::from_str(raw).map_err(|e| invalid(what, &e))
        };

        let market = Market::from_str(&db.market).map_err(|e| invalid("market", &e))?;
        let symbol = Symbol::new(&db.symbol, market).map_err(|e| invalid("symbol", &e))?;
        let interval = Interval::from_str(&db.interval).map_err(|e| invalid("interval", &e))?;
        let timestamp = DateTime::parse_from_rfc3339(&db.ts)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| invalid("ts", &e))?;

        Ok(Bar {
            symbol,
            timestamp,
            interval,
            open: decimal("open", &db.open)?,
            high: decimal("high", &db.high)?,
            low: decimal("low", &db.low)?,
            close: decimal("close", &db.close)?,
            volume: decimal("volume", &db.volume)?,
            source: db.source,
        })
    }
}
