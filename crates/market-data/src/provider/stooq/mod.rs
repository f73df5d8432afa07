//! Stooq bar provider.
//!
//! Daily and weekly bars via the CSV download endpoint
//! `https://stooq.com/q/d/l/?s={symbol}&d1={YYYYMMDD}&d2={YYYYMMDD}&i={d|w}`.
//!
//! The endpoint answers 200 in almost every case; "No data" and the daily
//! hit limit notice come back as plain-text bodies.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{is_quota_notice, MarketDataError};
use crate::models::{Bar, FetchOutcome, FetchWindow, Interval, Market, Symbol};
use crate::provider::{ensure_valid_request, BarProvider, ProviderCapabilities};

const BASE_URL: &str = "https://stooq.com/q/d/l/";
const PROVIDER_ID: &str = "STOOQ";

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StooqRow {
    date: String,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    /// Missing for indices and some foreign listings
    #[serde(default)]
    volume: Option<Decimal>,
}

pub struct StooqProvider {
    client: Client,
}

impl Default for StooqProvider {
    fn default() -> Self {
        Self::new(REQUEST_TIMEOUT)
    }
}

impl StooqProvider {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    fn interval_code(interval: Interval) -> Option<&'static str> {
        match interval {
            Interval::Daily => Some("d"),
            Interval::Weekly => Some("w"),
            _ => None,
        }
    }

    async fn fetch_symbol(
        &self,
        symbol: &Symbol,
        window: &FetchWindow,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let code = Self::interval_code(window.interval()).ok_or_else(|| {
            MarketDataError::UnsupportedInterval {
                provider: PROVIDER_ID.to_string(),
                interval: window.interval().to_string(),
            }
        })?;
        let ticker = self.normalize_symbol(symbol)?;
        let d1 = window.start().format("%Y%m%d").to_string();
        let d2 = window.end().format("%Y%m%d").to_string();

        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("s", ticker.as_str()),
                ("d1", d1.as_str()),
                ("d2", d2.as_str()),
                ("i", code),
            ])
            .send()
            .await
            .map_err(|e| MarketDataError::from_transport(PROVIDER_ID, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::from_status(
                PROVIDER_ID,
                status,
                symbol.ticker(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MarketDataError::from_transport(PROVIDER_ID, &e))?;

        parse_csv(symbol, window, &body)
    }
}

/// Decode a Stooq CSV body into bars inside the window.
pub(crate) fn parse_csv(
    symbol: &Symbol,
    window: &FetchWindow,
    body: &str,
) -> Result<Vec<Bar>, MarketDataError> {
    let trimmed = body.trim();
    if is_quota_notice(trimmed) {
        return Err(MarketDataError::RateLimited {
            provider: PROVIDER_ID.to_string(),
        });
    }
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("no data") {
        return Err(MarketDataError::NoDataForRange);
    }
    if !trimmed.starts_with("Date,") {
        return Err(MarketDataError::MalformedResponse {
            provider: PROVIDER_ID.to_string(),
            message: format!(
                "unexpected body: {}",
                trimmed.chars().take(80).collect::<String>()
            ),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(trimmed.as_bytes());

    let mut bars = Vec::new();
    for record in reader.deserialize::<StooqRow>() {
        let row = record.map_err(|e| MarketDataError::MalformedResponse {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse CSV row: {}", e),
        })?;
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
            MarketDataError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Invalid date '{}': {}", row.date, e),
            }
        })?;
        let Some(timestamp) = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()) else {
            continue;
        };
        if timestamp < window.start() || timestamp > window.end() {
            continue;
        }
        bars.push(Bar {
            symbol: symbol.clone(),
            timestamp: window.interval().anchor(timestamp),
            interval: window.interval(),
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.unwrap_or(Decimal::ZERO),
            source: PROVIDER_ID.to_string(),
        });
    }

    if bars.is_empty() {
        return Err(MarketDataError::NoDataForRange);
    }
    Ok(bars)
}

#[async_trait]
impl BarProvider for StooqProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            intervals: &[Interval::Daily, Interval::Weekly],
            markets: &[Market::Nyse, Market::Nasdaq, Market::Xetra, Market::Lse],
            supports_fundamentals: false,
        }
    }

    fn normalize_symbol(&self, symbol: &Symbol) -> Result<String, MarketDataError> {
        let ticker = symbol.ticker().to_ascii_lowercase();
        match symbol.market() {
            Market::Nyse | Market::Nasdaq => Ok(format!("{}.us", ticker.replace('.', "-"))),
            Market::Xetra => Ok(format!("{}.de", ticker)),
            Market::Lse => Ok(format!("{}.uk", ticker)),
            market => Err(MarketDataError::UnsupportedMarket {
                provider: PROVIDER_ID.to_string(),
                market: market.to_string(),
            }),
        }
    }

    async fn fetch_bars(
        &self,
        symbols: &[Symbol],
        window: &FetchWindow,
    ) -> Result<HashMap<Symbol, FetchOutcome>, MarketDataError> {
        ensure_valid_request(symbols)?;

        let mut outcomes = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            let result = self.fetch_symbol(symbol, window).await;
            if let Err(e) = &result {
                debug!("Stooq fetch for {} failed: {}", symbol, e);
            }
            outcomes.insert(symbol.clone(), FetchOutcome::from_result(PROVIDER_ID, result));
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn window() -> FetchWindow {
        FetchWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
            Interval::Daily,
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_symbol() {
        let provider = StooqProvider::default();
        let norm = |t: &str, m: Market| provider.normalize_symbol(&Symbol::new(t, m).unwrap());

        assert_eq!(norm("AAPL", Market::Nasdaq).unwrap(), "aapl.us");
        assert_eq!(norm("BRK.B", Market::Nyse).unwrap(), "brk-b.us");
        assert_eq!(norm("SAP", Market::Xetra).unwrap(), "sap.de");
        assert_eq!(norm("HSBA", Market::Lse).unwrap(), "hsba.uk");
        assert!(matches!(
            norm("MC", Market::EuronextParis),
            Err(MarketDataError::UnsupportedMarket { .. })
        ));
    }

    #[test]
    fn test_parse_csv() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2023-12-29,193.9,194.4,191.73,192.53,42628802\n\
                    2024-01-02,187.15,188.44,183.89,185.64,82488674\n\
                    2024-01-03,184.22,185.88,183.43,184.25,58414460\n";
        let symbol = Symbol::new("AAPL", Market::Nasdaq).unwrap();
        let bars = parse_csv(&symbol, &window(), body).unwrap();

        // First row falls before the window
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, dec!(187.15));
        assert_eq!(bars[0].volume, dec!(82488674));
        assert_eq!(bars[1].source, "STOOQ");
    }

    #[test]
    fn test_end_of_day_keys_match_yahoo() {
        use crate::provider::yahoo::parse_chart;

        let symbol = Symbol::new("AAPL", Market::Nasdaq).unwrap();
        // 2024-01-02 14:30 UTC, session open
        let chart = r#"{"chart":{"result":[{
            "timestamp":[1704205800],
            "indicators":{"quote":[{"open":[187.15],"high":[188.44],"low":[183.89],"close":[185.64],"volume":[82488674]}]}
            }],"error":null}}"#;
        let csv = "Date,Open,High,Low,Close,Volume\n2024-01-02,187.15,188.44,183.89,185.64,82488674\n";

        let yahoo = parse_chart(&symbol, &window(), chart).unwrap();
        let stooq = parse_csv(&symbol, &window(), csv).unwrap();
        assert_eq!(yahoo[0].key(), stooq[0].key());
        assert_eq!(
            stooq[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );

        // Yahoo stamps a week at its Monday open, Stooq at its last session
        let weekly = FetchWindow::new(window().start(), window().end(), Interval::Weekly).unwrap();
        let chart = chart.replace("1704205800", "1704119400");
        let csv = csv.replace("2024-01-02", "2024-01-05");
        let yahoo = parse_chart(&symbol, &weekly, &chart).unwrap();
        let stooq = parse_csv(&symbol, &weekly, &csv).unwrap();
        assert_eq!(yahoo[0].key(), stooq[0].key());
    }

    #[test]
    fn test_parse_csv_without_volume_column() {
        let body = "Date,Open,High,Low,Close\n2024-01-02,10,11,9,10.5\n";
        let symbol = Symbol::new("SAP", Market::Xetra).unwrap();
        let bars = parse_csv(&symbol, &window(), body).unwrap();
        assert_eq!(bars[0].volume, Decimal::ZERO);
    }

    #[test]
    fn test_parse_csv_special_bodies() {
        let symbol = Symbol::new("AAPL", Market::Nasdaq).unwrap();
        assert!(parse_csv(&symbol, &window(), "No data")
            .unwrap_err()
            .is_empty_result());
        assert!(matches!(
            parse_csv(&symbol, &window(), "Exceeded the daily hits limit"),
            Err(MarketDataError::RateLimited { .. })
        ));
        assert!(matches!(
            parse_csv(&symbol, &window(), "<html></html>"),
            Err(MarketDataError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_intraday_is_unsupported_without_network() {
        let provider = StooqProvider::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let window = FetchWindow::lookback_days(5, Interval::FiveMinutes, now).unwrap();
        let symbol = Symbol::new("AAPL", Market::Nasdaq).unwrap();

        let outcomes = provider.fetch_bars(&[symbol.clone()], &window).await.unwrap();
        let cause = outcomes[&symbol].failure_cause().unwrap();
        assert_eq!(cause.kind, crate::errors::FailureKind::UnsupportedInterval);
    }

    #[tokio::test]
    async fn test_empty_symbol_set_is_rejected() {
        let provider = StooqProvider::default();
        assert!(matches!(
            provider.fetch_bars(&[], &window()).await,
            Err(MarketDataError::InvalidRequest(_))
        ));
    }
}
