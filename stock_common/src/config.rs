//! Flat `KEY=VALUE` configuration source.
//!
//! The file format is line oriented: blank lines and lines starting with `#` are
//! skipped, everything else is split on the first `=`. Keys and values are
//! trimmed and the last occurrence of a key wins. Lines without `=` are ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::error::FeedError;
use crate::provider_kind::ProviderKind;

/// Comma-separated provider names, in default fallback order.
pub const FALLBACK_CHAIN_KEY: &str = "STOCK_PROVIDER_FALLBACK_CHAIN";
/// Replaces every real provider with the synthetic one.
pub const TEST_MODE_KEY: &str = "TEST_MODE";
/// Skip upstream fetches while the market is closed.
pub const ONLY_WHEN_OPEN_KEY: &str = "ONLY_UPDATE_WHEN_MARKET_OPEN";
/// RapidAPI key for the Yahoo REST provider.
pub const YAHOO_API_KEY: &str = "YAHOO_FINANCE_API_KEY";
/// RapidAPI host for the Yahoo REST provider.
pub const YAHOO_API_HOST_KEY: &str = "YAHOO_API_HOST";

/// Fallback chain used when the key is absent.
pub const DEFAULT_FALLBACK_CHAIN: &str = "yahoo_api,google";
/// Yahoo host used when the key is absent.
pub const DEFAULT_YAHOO_API_HOST: &str = "yahoo-finance15.p.rapidapi.com";

/// Parsed key/value configuration.
#[derive(Debug, Clone, Default)]
pub struct FlatConfig {
    values: HashMap<String, String>,
}

impl FlatConfig {
    /// Parses configuration lines from a buffered reader.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, FeedError> {
        let mut values = HashMap::new();
        for line_result in reader.lines() {
            let line = line_result.map_err(FeedError::Io)?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = trimmed.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    values.insert(key.to_string(), value.trim().to_string());
                }
            }
        }
        Ok(FlatConfig { values })
    }

    /// Reads and parses a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FeedError> {
        let file = File::open(path)?;
        Self::parse(BufReader::new(file))
    }

    /// Overrides a single key.
    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for `key`, or `default` when absent or empty.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.get(key) {
            Some(value) if !value.is_empty() => value,
            _ => default,
        }
    }

    /// Boolean value for `key`; accepts true/false, 1/0, yes/no, on/off.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, FeedError> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        match raw.to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(FeedError::Config {
                key: key.to_string(),
                reason: format!("'{}' is not a boolean", other),
            }),
        }
    }

    /// Whether the synthetic provider replaces all real ones.
    pub fn is_test_mode(&self) -> Result<bool, FeedError> {
        self.get_bool(TEST_MODE_KEY, false)
    }

    /// Provider names from `STOCK_PROVIDER_FALLBACK_CHAIN`, or `["test"]` in test mode.
    ///
    /// Blank entries are dropped and known provider names are lowercased to their
    /// canonical form. Unknown names are kept as written; they surface later as a
    /// construction failure for that one provider.
    pub fn fallback_chain(&self) -> Result<Vec<String>, FeedError> {
        if self.is_test_mode()? {
            return Ok(vec![ProviderKind::Test.to_string()]);
        }
        let chain = self
            .get_or(FALLBACK_CHAIN_KEY, DEFAULT_FALLBACK_CHAIN)
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| match ProviderKind::from_str(name) {
                Ok(kind) => kind.to_string(),
                Err(_) => name.to_string(),
            })
            .collect();
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn skips_comments_and_trims() {
        let text = "# providers\n STOCK_PROVIDER_FALLBACK_CHAIN = google , yahoo_api,,\nnot a pair\n";
        let config = FlatConfig::parse(Cursor::new(text)).unwrap();
        assert_eq!(config.fallback_chain().unwrap(), vec!["google", "yahoo_api"]);
        assert_eq!(config.get("not a pair"), None);
    }

    #[test]
    fn chain_names_are_canonical() {
        let config = FlatConfig::parse(Cursor::new("STOCK_PROVIDER_FALLBACK_CHAIN=Google,YAHOO_API,Broker\n")).unwrap();
        assert_eq!(config.fallback_chain().unwrap(), vec!["google", "yahoo_api", "Broker"]);
    }

    #[test]
    fn value_may_contain_equals() {
        let config = FlatConfig::parse(Cursor::new("YAHOO_FINANCE_API_KEY=abc=def\n")).unwrap();
        assert_eq!(config.get(YAHOO_API_KEY), Some("abc=def"));
    }

    #[test]
    fn defaults_apply_when_missing() {
        let config = FlatConfig::default();
        assert_eq!(config.fallback_chain().unwrap(), vec!["yahoo_api", "google"]);
        assert_eq!(config.get_or(YAHOO_API_HOST_KEY, DEFAULT_YAHOO_API_HOST), DEFAULT_YAHOO_API_HOST);
        assert!(!config.is_test_mode().unwrap());
    }

    #[test]
    fn test_mode_replaces_chain() {
        let text = "TEST_MODE=True\nSTOCK_PROVIDER_FALLBACK_CHAIN=yahoo_api\n";
        let config = FlatConfig::parse(Cursor::new(text)).unwrap();
        assert_eq!(config.fallback_chain().unwrap(), vec!["test"]);
    }

    #[test]
    fn rejects_non_boolean() {
        let config = FlatConfig::parse(Cursor::new("TEST_MODE=maybe\n")).unwrap();
        assert!(matches!(config.is_test_mode(), Err(FeedError::Config { .. })));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ONLY_UPDATE_WHEN_MARKET_OPEN=yes").unwrap();
        let config = FlatConfig::from_file(file.path()).unwrap();
        assert!(config.get_bool(ONLY_WHEN_OPEN_KEY, false).unwrap());
    }
}
