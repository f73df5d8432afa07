use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;

use boursomatic_core::bars::{BarStore, UpsertSummary};
use boursomatic_core::Result;
use boursomatic_market_data::{Bar, Interval, Symbol};

use super::model::{format_ts, NewPriceBarDB, PriceBarDB, PRICE_BAR_COLUMNS};
use crate::db::{create_pool, get_connection, init, run_migrations, spawn_writer, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::price_bars::dsl as bars_dsl;
use crate::utils::rows_per_statement;

/// SQLite-backed [`BarStore`].
///
/// Writes go through the single writer actor; reads use the pool.
pub struct BarRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl BarRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Create or open the database at `db_path`, migrate it and start the
    /// writer. Must be called inside a Tokio runtime.
    pub fn open(db_path: &str) -> Result<Self> {
        let db_path = init(db_path)?;
        let pool = create_pool(&db_path)?;
        run_migrations(&pool)?;
        let writer = spawn_writer(&pool)?;
        Ok(Self::new(pool, writer))
    }

    /// Stored bars for `symbol`/`interval`, oldest first.
    pub fn list_bars(&self, symbol: &Symbol, interval: Interval) -> Result<Vec<Bar>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = bars_dsl::price_bars
            .filter(bars_dsl::symbol.eq(symbol.ticker()))
            .filter(bars_dsl::market.eq(symbol.market().as_str()))
            .filter(bars_dsl::interval.eq(interval.as_str()))
            .order(bars_dsl::ts.asc())
            .select(PriceBarDB::as_select())
            .load::<PriceBarDB>(&mut conn)
            .into_core()?;

        rows.into_iter()
            .map(|row| Bar::try_from(row).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl BarStore for BarRepository {
    async fn upsert_bars(&self, bars: &[Bar]) -> Result<UpsertSummary> {
        if bars.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let now = Utc::now();
        let rows: Vec<NewPriceBarDB> = bars.iter().map(|b| NewPriceBarDB::from_bar(b, now)).collect();
        let total = rows.len() as u64;

        let inserted = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<u64> {
                let mut inserted = 0u64;
                for chunk in rows.chunks(rows_per_statement(PRICE_BAR_COLUMNS)) {
                    inserted += diesel::insert_or_ignore_into(bars_dsl::price_bars)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::QueryFailed)? as u64;
                }
                Ok(inserted)
            })
            .await?;

        let summary = UpsertSummary {
            inserted,
            duplicates: total.saturating_sub(inserted),
        };
        debug!(
            "Upserted {} bars: {} new, {} already stored",
            total, summary.inserted, summary.duplicates
        );
        Ok(summary)
    }

    async fn count_bars(
        &self,
        symbol: &Symbol,
        interval: Interval,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = bars_dsl::price_bars
            .filter(bars_dsl::symbol.eq(symbol.ticker()))
            .filter(bars_dsl::market.eq(symbol.market().as_str()))
            .filter(bars_dsl::interval.eq(interval.as_str()))
            .filter(bars_dsl::ts.ge(format_ts(since)))
            .count()
            .get_result(&mut conn)
            .into_core()?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boursomatic_market_data::Market;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn bar(symbol: &Symbol, day: u32) -> Bar {
        Bar {
            symbol: symbol.clone(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            interval: Interval::Daily,
            open: dec!(187.15),
            high: dec!(188.44),
            low: dec!(183.885),
            close: dec!(185.64),
            volume: dec!(82488700),
            source: "YAHOO".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("data/bars.db");
        let repo = BarRepository::open(db_path.to_str().unwrap()).unwrap();
        let aapl = Symbol::new("AAPL", Market::Nasdaq).unwrap();
        let bars = vec![bar(&aapl, 2), bar(&aapl, 3), bar(&aapl, 4)];

        let first = repo.upsert_bars(&bars).await.unwrap();
        assert_eq!(first, UpsertSummary { inserted: 3, duplicates: 0 });

        let second = repo.upsert_bars(&bars).await.unwrap();
        assert_eq!(second, UpsertSummary { inserted: 0, duplicates: 3 });

        let mixed = repo
            .upsert_bars(&[bar(&aapl, 4), bar(&aapl, 5)])
            .await
            .unwrap();
        assert_eq!(mixed, UpsertSummary { inserted: 1, duplicates: 1 });

        let stored = repo.list_bars(&aapl, Interval::Daily).unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[0], bars[0]);
    }

    #[tokio::test]
    async fn test_key_includes_market_and_interval() {
        let dir = tempdir().unwrap();
        let repo = BarRepository::open(dir.path().join("bars.db").to_str().unwrap()).unwrap();
        let us = Symbol::new("SHEL", Market::Nyse).unwrap();
        let uk = Symbol::new("SHEL", Market::Lse).unwrap();
        let mut weekly = bar(&us, 2);
        weekly.interval = Interval::Weekly;

        let summary = repo
            .upsert_bars(&[bar(&us, 2), bar(&uk, 2), weekly])
            .await
            .unwrap();
        assert_eq!(summary.inserted, 3);

        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(repo.count_bars(&us, Interval::Daily, since).await.unwrap(), 1);
        assert_eq!(repo.count_bars(&uk, Interval::Daily, since).await.unwrap(), 1);
        assert_eq!(repo.count_bars(&us, Interval::Weekly, since).await.unwrap(), 1);

        let later = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        assert_eq!(repo.count_bars(&us, Interval::Daily, later).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_large_batch_spans_statements() {
        let dir = tempdir().unwrap();
        let repo = BarRepository::open(dir.path().join("bars.db").to_str().unwrap()).unwrap();
        let msft = Symbol::new("MSFT", Market::Nasdaq).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 14, 30, 0).unwrap();
        let bars: Vec<Bar> = (0..250)
            .map(|i| Bar {
                timestamp: start + chrono::Duration::minutes(15 * i),
                interval: Interval::FifteenMinutes,
                ..bar(&msft, 2)
            })
            .collect();

        let summary = repo.upsert_bars(&bars).await.unwrap();
        assert_eq!(summary.inserted, 250);
        assert_eq!(
            repo.count_bars(&msft, Interval::FifteenMinutes, start)
                .await
                .unwrap(),
            250
        );
    }
}
