use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Listing venue of a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Market {
    Nyse,
    Nasdaq,
    EuronextParis,
    EuronextAmsterdam,
    EuronextBrussels,
    Xetra,
    Lse,
}

impl Market {
    pub const ALL: &'static [Market] = &[
        Market::Nyse,
        Market::Nasdaq,
        Market::EuronextParis,
        Market::EuronextAmsterdam,
        Market::EuronextBrussels,
        Market::Xetra,
        Market::Lse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Nyse => "NYSE",
            Market::Nasdaq => "NASDAQ",
            Market::EuronextParis => "EURONEXT_PARIS",
            Market::EuronextAmsterdam => "EURONEXT_AMSTERDAM",
            Market::EuronextBrussels => "EURONEXT_BRUSSELS",
            Market::Xetra => "XETRA",
            Market::Lse => "LSE",
        }
    }

    pub fn is_us(&self) -> bool {
        matches!(self, Market::Nyse | Market::Nasdaq)
    }

    pub fn is_euronext(&self) -> bool {
        matches!(
            self,
            Market::EuronextParis | Market::EuronextAmsterdam | Market::EuronextBrussels
        )
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Market::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| MarketDataError::InvalidSymbol(format!("unknown market '{}'", s)))
    }
}

/// A ticker on a market. Immutable once built; the ticker is stored upper-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    ticker: String,
    market: Market,
}

impl Symbol {
    pub fn new(ticker: impl AsRef<str>, market: Market) -> Result<Self, MarketDataError> {
        let ticker = ticker.as_ref().trim();
        if ticker.is_empty() {
            return Err(MarketDataError::InvalidSymbol(
                "ticker cannot be empty".to_string(),
            ));
        }
        if ticker.chars().any(char::is_whitespace) {
            return Err(MarketDataError::InvalidSymbol(format!(
                "ticker '{}' contains whitespace",
                ticker
            )));
        }
        Ok(Self {
            ticker: ticker.to_ascii_uppercase(),
            market,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn market(&self) -> Market {
        self.market
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ticker, self.market)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_uppercases_ticker() {
        let symbol = Symbol::new(" brk.b ", Market::Nyse).unwrap();
        assert_eq!(symbol.ticker(), "BRK.B");
        assert_eq!(symbol.market(), Market::Nyse);
        assert_eq!(symbol.to_string(), "BRK.B:NYSE");
    }

    #[test]
    fn test_symbol_rejects_empty_ticker() {
        assert!(Symbol::new("   ", Market::Nasdaq).is_err());
        assert!(Symbol::new("A B", Market::Nasdaq).is_err());
    }

    #[test]
    fn test_market_parse() {
        assert_eq!("nasdaq".parse::<Market>().unwrap(), Market::Nasdaq);
        assert_eq!(
            "euronext-paris".parse::<Market>().unwrap(),
            Market::EuronextParis
        );
        assert!("TSX".parse::<Market>().is_err());
    }

    #[test]
    fn test_market_serde_matches_display() {
        for market in Market::ALL {
            let json = serde_json::to_string(market).unwrap();
            assert_eq!(json, format!("\"{}\"", market.as_str()));
        }
    }
}
