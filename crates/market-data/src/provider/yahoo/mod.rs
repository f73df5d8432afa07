//! Yahoo Finance bar provider.
//!
//! Bars come from the public `v8/finance/chart` endpoint, one request per
//! symbol. End-of-day bars are adjusted for splits and dividends using the
//! `adjclose` series. Fundamentals use `quoteSummary`, which needs a
//! cookie/crumb pair cached process-wide.
//!
//! # Symbol convention
//!
//! | Market | Example | Yahoo ticker |
//! |--------|---------|--------------|
//! | NYSE/NASDAQ | `BRK.B` | `BRK-B` |
//! | Euronext Paris | `MC` | `MC.PA` |
//! | Euronext Amsterdam | `ASML` | `ASML.AS` |
//! | Euronext Brussels | `ABI` | `ABI.BR` |
//! | Xetra | `SAP` | `SAP.DE` |
//! | LSE | `HSBA` | `HSBA.L` |

mod models;

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use lazy_static::lazy_static;
use num_traits::FromPrimitive;
use reqwest::{header, Client, StatusCode};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::errors::{is_quota_notice, MarketDataError};
use crate::models::{Bar, FetchOutcome, FetchWindow, Fundamentals, Interval, Market, Symbol};
use crate::provider::{ensure_valid_request, BarProvider, ProviderCapabilities};

use models::{YahooChartResponse, YahooQuoteSummaryResponse, YahooQuoteSummaryResult};

const PROVIDER_ID: &str = "YAHOO";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Default HTTP request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Decimal places kept after price adjustment
const PRICE_SCALE: u32 = 6;

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

lazy_static! {
    /// Global cache for Yahoo authentication crumb
    static ref YAHOO_CRUMB: RwLock<Option<CrumbData>> = RwLock::default();
}

// ============================================================================
// Yahoo Provider
// ============================================================================

pub struct YahooProvider {
    client: Client,
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl YahooProvider {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    fn interval_code(interval: Interval) -> &'static str {
        match interval {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::OneHour => "60m",
            Interval::FifteenMinutes => "15m",
            Interval::FiveMinutes => "5m",
        }
    }

    // ========================================================================
    // Bars
    // ========================================================================

    async fn fetch_symbol(
        &self,
        symbol: &Symbol,
        window: &FetchWindow,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let ticker = self.normalize_symbol(symbol)?;
        let url = format!(
            "{}/{}?period1={}&period2={}&interval={}&includeAdjustedClose=true&events=div%2Csplits",
            CHART_URL,
            encode(&ticker),
            window.start().timestamp(),
            window.end().timestamp(),
            Self::interval_code(window.interval()),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketDataError::from_transport(PROVIDER_ID, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MarketDataError::from_transport(PROVIDER_ID, &e))?;

        if !status.is_success() {
            // Yahoo reports unknown tickers as 404 with a chart.error body
            if status == StatusCode::NOT_FOUND || body.contains("No data found") {
                return Err(MarketDataError::SymbolNotFound(symbol.ticker().to_string()));
            }
            if is_quota_notice(&body) {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            return Err(MarketDataError::from_status(
                PROVIDER_ID,
                status,
                symbol.ticker(),
            ));
        }

        parse_chart(symbol, window, &body)
    }

    // ========================================================================
    // Crumb/Cookie Authentication
    // ========================================================================

    async fn ensure_crumb(&self) -> Result<CrumbData, MarketDataError> {
        {
            let guard = YAHOO_CRUMB.read().unwrap_or_else(|e| e.into_inner());
            if let Some(crumb) = guard.as_ref() {
                return Ok(crumb.clone());
            }
        }
        self.fetch_crumb().await
    }

    async fn fetch_crumb(&self) -> Result<CrumbData, MarketDataError> {
        // Step 1: Get cookie from fc.yahoo.com
        let response = self
            .client
            .get("https://fc.yahoo.com")
            .send()
            .await
            .map_err(|e| MarketDataError::from_transport(PROVIDER_ID, &e))?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| MarketDataError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: "Failed to parse Yahoo cookie".to_string(),
            })?;

        // Step 2: Get crumb using cookie
        let crumb = self
            .client
            .get("https://query1.finance.yahoo.com/v1/test/getcrumb")
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| MarketDataError::from_transport(PROVIDER_ID, &e))?
            .text()
            .await
            .map_err(|e| MarketDataError::from_transport(PROVIDER_ID, &e))?;

        if crumb.is_empty() || is_quota_notice(&crumb) {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        let crumb_data = CrumbData { cookie, crumb };
        let mut guard = YAHOO_CRUMB.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(crumb_data.clone());

        Ok(crumb_data)
    }

    fn clear_crumb(&self) {
        let mut guard = YAHOO_CRUMB.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    // ========================================================================
    // Fundamentals
    // ========================================================================

    async fn fetch_quote_summary(
        &self,
        ticker: &str,
    ) -> Result<Option<Fundamentals>, MarketDataError> {
        let crumb = self.ensure_crumb().await?;

        let url = format!(
            "{}/{}?modules=price,summaryProfile,summaryDetail&crumb={}",
            SUMMARY_URL,
            encode(ticker),
            encode(&crumb.crumb)
        );

        let response = self
            .client
            .get(&url)
            .header(header::COOKIE, &crumb.cookie)
            .send()
            .await
            .map_err(|e| MarketDataError::from_transport(PROVIDER_ID, &e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.clear_crumb();
            return Err(MarketDataError::ClientError {
                provider: PROVIDER_ID.to_string(),
                status: status.as_u16(),
                message: "Yahoo authentication expired".to_string(),
            });
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MarketDataError::from_status(PROVIDER_ID, status, ticker));
        }

        let data: YahooQuoteSummaryResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::MalformedResponse {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("Failed to parse quoteSummary response: {}", e),
                })?;

        Ok(data
            .quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .map(|r| map_quote_summary(&r)))
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.round_dp(PRICE_SCALE))
}

/// Decode a chart response body into bars.
///
/// Halted bars (null OHLC) are skipped; a missing volume becomes zero.
/// End-of-day bars are scaled by `adjclose / close`.
pub(crate) fn parse_chart(
    symbol: &Symbol,
    window: &FetchWindow,
    body: &str,
) -> Result<Vec<Bar>, MarketDataError> {
    let response: YahooChartResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::MalformedResponse {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse chart response: {}", e),
        })?;

    if let Some(error) = response.chart.error {
        let description = error.description.unwrap_or_default();
        if error.code == "Not Found" {
            return Err(MarketDataError::SymbolNotFound(symbol.ticker().to_string()));
        }
        return Err(MarketDataError::MalformedResponse {
            provider: PROVIDER_ID.to_string(),
            message: format!("{}: {}", error.code, description),
        });
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(MarketDataError::NoDataForRange);
    };
    let Some(timestamps) = result.timestamp else {
        return Err(MarketDataError::NoDataForRange);
    };
    let Some(series) = result.indicators.quote.into_iter().next() else {
        return Err(MarketDataError::NoDataForRange);
    };
    let adjclose = if window.interval().is_end_of_day() {
        result
            .indicators
            .adjclose
            .and_then(|a| a.into_iter().next())
            .map(|a| a.adjclose)
    } else {
        None
    };

    let interval = window.interval();
    let mut bars = Vec::with_capacity(timestamps.len());

    for (i, ts) in timestamps.iter().enumerate() {
        let at = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            at(&series.open),
            at(&series.high),
            at(&series.low),
            at(&series.close),
        ) else {
            continue;
        };
        let Some(timestamp) = Utc.timestamp_opt(*ts, 0).single() else {
            continue;
        };
        // session open becomes the shared daily/weekly anchor
        let timestamp = interval.anchor(timestamp);

        let factor = match adjclose.as_ref().and_then(|a| a.get(i).copied().flatten()) {
            Some(adj) if close != 0.0 => adj / close,
            _ => 1.0,
        };

        let (Some(open), Some(high), Some(low), Some(close)) = (
            decimal(open * factor),
            decimal(high * factor),
            decimal(low * factor),
            decimal(close * factor),
        ) else {
            continue;
        };
        let volume = at(&series.volume)
            .and_then(decimal)
            .unwrap_or(Decimal::ZERO);

        bars.push(Bar {
            symbol: symbol.clone(),
            timestamp,
            interval,
            open,
            high,
            low,
            close,
            volume,
            source: PROVIDER_ID.to_string(),
        });
    }

    if bars.is_empty() {
        return Err(MarketDataError::NoDataForRange);
    }
    Ok(bars)
}

fn map_quote_summary(result: &YahooQuoteSummaryResult) -> Fundamentals {
    let price = result.price.as_ref();
    let profile = result.summary_profile.as_ref();
    let detail = result.summary_detail.as_ref();

    let raw = |v: Option<&models::YahooRawValue>| v.and_then(|r| r.raw).and_then(decimal);

    Fundamentals {
        source: PROVIDER_ID.to_string(),
        name: price.and_then(|p| p.long_name.clone().or_else(|| p.short_name.clone())),
        sector: profile.and_then(|p| p.sector.clone()),
        industry: profile.and_then(|p| p.industry.clone()),
        market_cap: raw(detail.and_then(|d| d.market_cap.as_ref()))
            .or_else(|| raw(price.and_then(|p| p.market_cap.as_ref()))),
        pe_ratio: raw(detail.and_then(|d| d.trailing_pe.as_ref())),
        exchange: price.and_then(|p| p.exchange_name.clone()),
        currency: price.and_then(|p| p.currency.clone()),
    }
}

// ============================================================================
// BarProvider Implementation
// ============================================================================

#[async_trait]
impl BarProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            intervals: Interval::ALL,
            markets: Market::ALL,
            supports_fundamentals: true,
        }
    }

    fn normalize_symbol(&self, symbol: &Symbol) -> Result<String, MarketDataError> {
        let ticker = symbol.ticker();
        Ok(match symbol.market() {
            Market::Nyse | Market::Nasdaq => ticker.replace('.', "-"),
            Market::EuronextParis => format!("{}.PA", ticker),
            Market::EuronextAmsterdam => format!("{}.AS", ticker),
            Market::EuronextBrussels => format!("{}.BR", ticker),
            Market::Xetra => format!("{}.DE", ticker),
            Market::Lse => format!("{}.L", ticker),
        })
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
                debug!("Yahoo fetch for {} failed: {}", symbol, e);
            }
            outcomes.insert(symbol.clone(), FetchOutcome::from_result(PROVIDER_ID, result));
        }
        Ok(outcomes)
    }

    async fn fetch_fundamentals(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<Fundamentals>, MarketDataError> {
        let ticker = self.normalize_symbol(symbol)?;
        match self.fetch_quote_summary(&ticker).await {
            Ok(f) => Ok(f),
            Err(e) => {
                warn!("quoteSummary failed for {}: {}", ticker, e);
                Err(e)
            }
        }
    }
}
