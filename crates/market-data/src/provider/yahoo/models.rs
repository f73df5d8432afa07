//! Yahoo Finance API response models.
//!
//! `chart` carries the OHLCV series; `quoteSummary` carries fundamentals.

use serde::Deserialize;

// ============================================================================
// Chart API
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Deserialize)]
pub struct YahooChart {
    #[serde(default)]
    pub result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    pub error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
pub struct YahooApiError {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    /// Absent when the symbol has no bars in range
    #[serde(default)]
    pub timestamp: Option<Vec<i64>>,
    pub indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
pub struct YahooIndicators {
    #[serde(default)]
    pub quote: Vec<YahooQuoteSeries>,
    #[serde(default)]
    pub adjclose: Option<Vec<YahooAdjCloseSeries>>,
}

/// Parallel arrays; halted bars come back as nulls
#[derive(Debug, Default, Deserialize)]
pub struct YahooQuoteSeries {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct YahooAdjCloseSeries {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

// ============================================================================
// quoteSummary API
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResponse {
    pub quote_summary: YahooQuoteSummary,
}

#[derive(Debug, Deserialize)]
pub struct YahooQuoteSummary {
    #[serde(default)]
    pub result: Option<Vec<YahooQuoteSummaryResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResult {
    pub price: Option<YahooPriceData>,
    pub summary_profile: Option<YahooSummaryProfile>,
    pub summary_detail: Option<YahooSummaryDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooPriceData {
    pub currency: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub exchange_name: Option<String>,
    pub market_cap: Option<YahooRawValue>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`, or `{}` when absent
#[derive(Debug, Deserialize, Clone)]
pub struct YahooRawValue {
    pub raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooSummaryProfile {
    pub sector: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooSummaryDetail {
    pub market_cap: Option<YahooRawValue>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<YahooRawValue>,
}
