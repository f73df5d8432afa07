//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior
//! - [`FailureKind`]: The serializable tag of an error, carried in fetch outcomes

mod retry;

pub use retry::RetryClass;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines whether the resilience wrapper should try again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// The requested symbol is unknown to the provider (HTTP 404 or equivalent).
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The symbol exists but has no bars in the requested window.
    /// Surfaces as an `Empty` outcome rather than a failure.
    #[error("No data for date range")]
    NoDataForRange,

    /// The provider has no ticker convention for this market.
    #[error("Unsupported market {market} for provider {provider}")]
    UnsupportedMarket { provider: String, market: String },

    /// The provider cannot serve this bar interval.
    #[error("Unsupported interval {interval} for provider {provider}")]
    UnsupportedInterval { provider: String, interval: String },

    /// The provider throttled the request (HTTP 429 or quota text in the body).
    #[error("Rate limited: {provider}")]
    RateLimited { provider: String },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout { provider: String },

    /// The connection could not be established or was reset.
    #[error("Connection error: {provider} - {message}")]
    Connection { provider: String, message: String },

    /// The provider answered with a 5xx status.
    #[error("Server error: {provider} - HTTP {status}")]
    ServerError { provider: String, status: u16 },

    /// The provider rejected the request with a 4xx status other than 404/429.
    #[error("Client error: {provider} - HTTP {status}: {message}")]
    ClientError {
        provider: String,
        status: u16,
        message: String,
    },

    /// The body could not be decoded, or every bar in it was invalid.
    #[error("Malformed response: {provider} - {message}")]
    MalformedResponse { provider: String, message: String },

    /// The request itself is invalid (empty symbol set, inverted window).
    /// Structural; never turned into a per-symbol outcome.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A symbol could not be constructed.
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),
}

/// Serializable tag for [`MarketDataError`] variants.
///
/// Stored in failure causes and the checkpoint's per-symbol error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    SymbolNotFound,
    NoData,
    UnsupportedMarket,
    UnsupportedInterval,
    RateLimited,
    Timeout,
    Connection,
    ServerError,
    ClientError,
    MalformedResponse,
    InvalidRequest,
}

impl FailureKind {
    pub fn retry_class(self) -> RetryClass {
        match self {
            Self::RateLimited | Self::Timeout | Self::Connection | Self::ServerError => {
                RetryClass::Transient
            }
            _ => RetryClass::Permanent,
        }
    }

    /// Whether this kind means the provider is throttling us.
    pub fn is_throttling(self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// ```
    /// use boursomatic_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "YAHOO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Transient);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Permanent);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        self.kind().retry_class()
    }

    /// True when the provider reported "no data in range" rather than a failure.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::NoDataForRange)
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::SymbolNotFound(_) | Self::InvalidSymbol(_) => FailureKind::SymbolNotFound,
            Self::NoDataForRange => FailureKind::NoData,
            Self::UnsupportedMarket { .. } => FailureKind::UnsupportedMarket,
            Self::UnsupportedInterval { .. } => FailureKind::UnsupportedInterval,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Connection { .. } => FailureKind::Connection,
            Self::ServerError { .. } => FailureKind::ServerError,
            Self::ClientError { .. } => FailureKind::ClientError,
            Self::MalformedResponse { .. } => FailureKind::MalformedResponse,
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
        }
    }

    /// Map a transport-level `reqwest` failure.
    pub fn from_transport(provider: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
            }
        } else if err.is_decode() {
            Self::MalformedResponse {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::from_status(provider, status, &err.to_string())
        } else {
            Self::Connection {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Map a non-success HTTP status. `symbol` is used for 404s.
    pub fn from_status(provider: &str, status: StatusCode, symbol: &str) -> Self {
        match status.as_u16() {
            429 => Self::RateLimited {
                provider: provider.to_string(),
            },
            404 => Self::SymbolNotFound(symbol.to_string()),
            408 => Self::Timeout {
                provider: provider.to_string(),
            },
            code if status.is_server_error() => Self::ServerError {
                provider: provider.to_string(),
                status: code,
            },
            code => Self::ClientError {
                provider: provider.to_string(),
                status: code,
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            },
        }
    }
}

/// Returns true when a response body reads like a quota/throttling notice.
///
/// Some providers answer 200 with a plain-text notice instead of a 429.
pub fn is_quota_notice(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("too many requests")
        || lower.contains("rate limit")
        || lower.contains("exceeded the daily hits limit")
        || lower.contains("quota")
}
