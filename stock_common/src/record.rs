//! Stock data record pushed by providers and served from the cache.
//!
//! A `StockDataRecord` carries the common quote fields as named optional values
//! plus an open `extras` map for anything a single upstream reports (open, high,
//! bid, ...). Whether a record is usable is decided by the feed's validator, not here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Latest known quote for one symbol as reported by one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockDataRecord {
    /// Symbol identifier (e.g. `BP.L`).
    pub symbol: String,
    /// Company or instrument name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Last traded price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Absolute change since previous close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    /// Percentage change since previous close.
    #[serde(default, rename = "chg_percent", skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<f64>,
    /// Traded volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    /// Provider-reported failure counter; anything above zero marks the record unusable.
    #[serde(default, rename = "failCount")]
    pub fail_count: u32,
    /// UTC timestamp in milliseconds since Unix epoch, 0 when unknown.
    #[serde(default)]
    pub timestamp: u64,
    /// Provider-specific fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl StockDataRecord {
    /// Creates an empty record for `symbol`.
    pub fn new(symbol: &str) -> Self {
        StockDataRecord {
            symbol: symbol.to_string(),
            ..Default::default()
        }
    }

    /// Creates a record carrying only a price.
    pub fn with_price(symbol: &str, price: f64) -> Self {
        StockDataRecord {
            price: Some(price),
            ..Self::new(symbol)
        }
    }

    /// Creates a record flagged as a failed fetch.
    pub fn failed(symbol: &str) -> Self {
        StockDataRecord {
            name: Some(symbol.to_string()),
            fail_count: 1,
            ..Self::new(symbol)
        }
    }

    /// True when no quote field has been populated.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.change.is_none()
            && self.percent_change.is_none()
            && self.volume.is_none()
            && self.extras.is_empty()
    }

    /// Compares quote content, ignoring the timestamp.
    pub fn same_quote(&self, other: &StockDataRecord) -> bool {
        self.symbol == other.symbol
            && self.name == other.name
            && self.price == other.price
            && self.change == other.change
            && self.percent_change == other.percent_change
            && self.volume == other.volume
            && self.fail_count == other.fail_count
            && self.extras == other.extras
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_has_no_fields() {
        let record = StockDataRecord::new("BP.L");
        assert!(record.is_empty());
        assert!(!StockDataRecord::with_price("BP.L", 434.2).is_empty());
    }

    #[test]
    fn same_quote_ignores_timestamp() {
        let mut a = StockDataRecord::with_price("BP.L", 434.2);
        let mut b = a.clone();
        a.timestamp = 1;
        b.timestamp = 2;
        assert!(a.same_quote(&b));

        b.price = Some(435.0);
        assert!(!a.same_quote(&b));
    }

    #[test]
    fn deserializes_provider_style_keys() {
        let json = r#"{"symbol":"IMI.L","price":2450.0,"chg_percent":1.5,"failCount":0}"#;
        let record: StockDataRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.percent_change, Some(1.5));
        assert_eq!(record.fail_count, 0);
        assert_eq!(record.price, Some(2450.0));
    }
}
