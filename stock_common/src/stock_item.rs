//! Tracked stock entries and stock list parsing.
//!
//! A caller hands the manager a list of `StockItem`s: either a bare symbol or a
//! holding record that may name a preferred provider. Lists are read either as
//! JSON (an array mixing strings and objects) or as a plain line file where each
//! line is `SYMBOL` or `SYMBOL,provider`.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, Read};

use crate::error::FeedError;

/// One entry of the desired symbol list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StockItem {
    /// Bare symbol routed along the configured fallback chain.
    Symbol(String),
    /// Symbol with an optional preferred provider. Extra holding fields are ignored.
    Holding {
        /// Symbol identifier.
        symbol: String,
        /// Provider to try first; empty means no preference.
        #[serde(default, rename = "stock_provider")]
        preferred_provider: Option<String>,
    },
}

impl StockItem {
    /// Creates an item with a preferred provider.
    pub fn with_provider(symbol: &str, provider: &str) -> Self {
        StockItem::Holding {
            symbol: symbol.to_string(),
            preferred_provider: Some(provider.to_string()),
        }
    }

    /// Symbol identifier.
    pub fn symbol(&self) -> &str {
        match self {
            StockItem::Symbol(symbol) => symbol,
            StockItem::Holding { symbol, .. } => symbol,
        }
    }

    /// Preferred provider, if one was given and is not blank.
    pub fn preferred_provider(&self) -> Option<&str> {
        match self {
            StockItem::Symbol(_) => None,
            StockItem::Holding {
                preferred_provider, ..
            } => preferred_provider
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty()),
        }
    }
}

impl From<&str> for StockItem {
    fn from(symbol: &str) -> Self {
        StockItem::Symbol(symbol.to_string())
    }
}

/// Trait providing stock list parsing.
pub trait StockListParser {
    /// Parses one item per non-empty line. `#` starts a comment line.
    ///
    /// A line is `SYMBOL` or `SYMBOL,provider`. Returns an error for a line with an empty symbol.
    fn parse_lines<R: BufRead>(reader: R) -> Result<Vec<StockItem>, FeedError>;

    /// Parses a JSON array of strings and/or `{"symbol": .., "stock_provider": ..}` objects.
    fn parse_json<R: Read>(reader: R) -> Result<Vec<StockItem>, FeedError>;
}

impl StockListParser for StockItem {
    fn parse_lines<R: BufRead>(reader: R) -> Result<Vec<Self>, FeedError> {
        let mut items = Vec::new();

        for (line_no, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(FeedError::Io)?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }

            let (symbol, provider) = match trimmed_line.split_once(',') {
                Some((symbol, provider)) => (symbol.trim(), provider.trim()),
                None => (trimmed_line, ""),
            };
            if symbol.is_empty() {
                return Err(FeedError::ParseStockList(format!(
                    "line {}: missing symbol in '{}'",
                    line_no + 1,
                    trimmed_line
                )));
            }

            if provider.is_empty() {
                items.push(StockItem::from(symbol));
            } else {
                items.push(StockItem::with_provider(symbol, provider));
            }
        }
        Ok(items)
    }

    fn parse_json<R: Read>(reader: R) -> Result<Vec<Self>, FeedError> {
        let items: Vec<StockItem> = serde_json::from_reader(reader)
            .map_err(|e| FeedError::ParseStockList(e.to_string()))?;
        if let Some(bad) = items.iter().find(|item| item.symbol().trim().is_empty()) {
            return Err(FeedError::ParseStockList(format!(
                "empty symbol in entry {:?}",
                bad
            )));
        }
        Ok(items)
    }
}
