//! Symbol universe loading.
//!
//! One symbol per line as `ticker[,market]`. Lines starting with `#` are
//! comments, an optional `ticker,market` header is skipped, and the market
//! defaults to NASDAQ.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use boursomatic_market_data::{Market, Symbol};

use crate::errors::{Error, Result, ValidationError};

pub const DEFAULT_MARKET: Market = Market::Nasdaq;

/// Load and parse a universe file.
pub fn load_universe(path: impl AsRef<Path>) -> Result<Vec<Symbol>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::ConfigIO(format!("{}: {}", path.display(), e)))?;
    let symbols = parse_universe(&content)?;
    info!(path = %path.display(), symbols = symbols.len(), "loaded symbol universe");
    Ok(symbols)
}

/// Parse universe text. Order is preserved; later duplicates are dropped.
pub fn parse_universe(content: &str) -> Result<Vec<Symbol>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut seen = HashSet::new();
    let mut symbols = Vec::new();

    for (i, row) in reader.records().enumerate() {
        let row = row?;
        let line = row.position().map_or(i + 1, |p| p.line() as usize);
        let ticker = row.get(0).unwrap_or_default();
        if ticker.is_empty() {
            continue;
        }
        if symbols.is_empty() && seen.is_empty() && ticker.eq_ignore_ascii_case("ticker") {
            continue;
        }
        if row.len() > 2 {
            return Err(invalid(line, "expected `ticker[,market]`"));
        }

        let market = match row.get(1).filter(|m| !m.is_empty()) {
            Some(raw) => raw
                .parse::<Market>()
                .map_err(|e| invalid(line, e.to_string()))?,
            None => DEFAULT_MARKET,
        };
        let symbol = Symbol::new(ticker, market).map_err(|e| invalid(line, e.to_string()))?;

        if !seen.insert(symbol.clone()) {
            warn!(symbol = %symbol, line, "duplicate symbol in universe, keeping first occurrence");
            continue;
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

fn invalid(line: usize, message: impl Into<String>) -> Error {
    ValidationError::InvalidLine {
        line,
        message: message.into(),
    }
    .into()
}
