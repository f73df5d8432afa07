use serde::{Deserialize, Serialize};

use super::bar::Bar;
use crate::errors::{FailureKind, MarketDataError};

/// Why a symbol could not be fetched, with provenance across providers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub provider: String,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,

    /// Cause reported by an earlier provider in the chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Box<FailureCause>>,
}

impl FailureCause {
    pub fn from_error(provider: &str, error: &MarketDataError, attempts: u32) -> Self {
        Self {
            provider: provider.to_string(),
            kind: error.kind(),
            message: error.to_string(),
            attempts,
            previous: None,
        }
    }

    pub fn with_previous(mut self, previous: FailureCause) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    /// Providers involved, most recent first.
    pub fn providers(&self) -> Vec<&str> {
        let mut out = vec![self.provider.as_str()];
        let mut cursor = self.previous.as_deref();
        while let Some(cause) = cursor {
            out.push(cause.provider.as_str());
            cursor = cause.previous.as_deref();
        }
        out
    }

    /// True if any provider along the chain was throttling.
    pub fn involves_throttling(&self) -> bool {
        self.kind.is_throttling()
            || self
                .previous
                .as_deref()
                .is_some_and(FailureCause::involves_throttling)
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} after {} attempt(s): {}",
            self.provider, self.attempts, self.message
        )?;
        if let Some(previous) = &self.previous {
            write!(f, " (after {})", previous)?;
        }
        Ok(())
    }
}

/// Per-symbol result of a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Non-empty, ordered by timestamp
    Success(Vec<Bar>),
    /// The provider knows the symbol but has nothing in range
    Empty,
    TransientFailure(FailureCause),
    PermanentFailure(FailureCause),
}

impl FetchOutcome {
    /// Turn a single-symbol provider result into an outcome.
    pub fn from_result(provider: &str, result: Result<Vec<Bar>, MarketDataError>) -> Self {
        match result {
            Ok(bars) => Self::from_bars(bars),
            Err(e) if e.is_empty_result() => Self::Empty,
            Err(e) => Self::from_error(provider, &e, 1),
        }
    }

    pub fn from_bars(mut bars: Vec<Bar>) -> Self {
        if bars.is_empty() {
            return Self::Empty;
        }
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Self::Success(bars)
    }

    pub fn from_error(provider: &str, error: &MarketDataError, attempts: u32) -> Self {
        let cause = FailureCause::from_error(provider, error, attempts);
        if error.retry_class().is_transient() {
            Self::TransientFailure(cause)
        } else {
            Self::PermanentFailure(cause)
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TransientFailure(_) | Self::PermanentFailure(_))
    }

    pub fn failure_cause(&self) -> Option<&FailureCause> {
        match self {
            Self::TransientFailure(c) | Self::PermanentFailure(c) => Some(c),
            _ => None,
        }
    }

    pub fn bar_count(&self) -> usize {
        match self {
            Self::Success(bars) => bars.len(),
            _ => 0,
        }
    }
}
