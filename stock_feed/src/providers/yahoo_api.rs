//! Yahoo Finance quotes through the RapidAPI REST endpoint.
//!
//! The worker walks the tracked list in batches of ten symbols, one batch per
//! pass. Any symbol missing from a response, or every symbol of a batch whose
//! request failed, is stored as a failed record so the manager can move it to
//! the next provider. Only records whose content changed are pushed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use reqwest::blocking::Client;
use serde::Deserialize;
use stock_common::config::{DEFAULT_YAHOO_API_HOST, YAHOO_API_HOST_KEY, YAHOO_API_KEY};
use stock_common::{FeedError, FlatConfig, Result, StockDataRecord};

use crate::adapter::{ProviderAdapter, PushCallback};
use crate::market_hours::MarketHours;
use crate::providers::batch::{BatchCursor, IDLE_TICK, Schedule, run_pass};
use crate::providers::book::SymbolBook;
use crate::providers::http_client;
use crate::worker::{DEFAULT_JOIN_TIMEOUT, PollWorker};

const SCHEDULE: Schedule = Schedule {
    batch_size: 10,
    first_pass: Duration::from_secs(5),
    when_open: Duration::from_secs(30),
    when_closed: Duration::from_secs(300),
};

/// Connection settings read from the flat config.
#[derive(Debug, Clone)]
pub struct YahooApiSettings {
    /// RapidAPI key; requests are still attempted without one.
    pub api_key: String,
    /// RapidAPI host, also used to build the base URL.
    pub api_host: String,
}

impl YahooApiSettings {
    /// Reads `YAHOO_FINANCE_API_KEY` and `YAHOO_API_HOST`.
    pub fn from_config(config: &FlatConfig) -> Self {
        YahooApiSettings {
            api_key: config.get_or(YAHOO_API_KEY, "").to_string(),
            api_host: config.get_or(YAHOO_API_HOST_KEY, DEFAULT_YAHOO_API_HOST).to_string(),
        }
    }

    fn base_url(&self) -> String {
        format!("https://{}", self.api_host)
    }
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    body: Vec<QuoteItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteItem {
    #[serde(default)]
    symbol: String,
    long_name: Option<String>,
    short_name: Option<String>,
    regular_market_price: Option<f64>,
    regular_market_change: Option<f64>,
    regular_market_change_percent: Option<f64>,
    regular_market_volume: Option<f64>,
    regular_market_open: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_previous_close: Option<f64>,
}

impl QuoteItem {
    fn into_record(self, timestamp: u64) -> StockDataRecord {
        let mut extras = std::collections::BTreeMap::new();
        for (key, value) in [
            ("open", self.regular_market_open),
            ("high", self.regular_market_day_high),
            ("low", self.regular_market_day_low),
            ("close", self.regular_market_previous_close),
        ] {
            if let Some(value) = value {
                extras.insert(key.to_string(), serde_json::Value::from(value));
            }
        }
        StockDataRecord {
            name: Some(
                self.long_name
                    .or(self.short_name)
                    .unwrap_or_else(|| self.symbol.clone()),
            ),
            price: self.regular_market_price,
            change: self.regular_market_change,
            percent_change: self.regular_market_change_percent,
            volume: self.regular_market_volume.map(|v| v as u64),
            fail_count: 0,
            timestamp,
            extras,
            symbol: self.symbol,
        }
    }
}

/// Turns a quotes response into one record per requested symbol.
///
/// Symbols absent from the payload, or all of them if the payload does not have
/// the expected shape, come back as failed records.
pub fn parse_quotes(payload: &str, symbols: &[String], timestamp: u64) -> Vec<StockDataRecord> {
    let mut quotes: HashMap<String, StockDataRecord> = HashMap::new();
    match serde_json::from_str::<QuotesResponse>(payload) {
        Ok(response) => {
            for item in response.body.into_iter().filter(|i| !i.symbol.is_empty()) {
                debug!("Got quote for {}: price={:?}", item.symbol, item.regular_market_price);
                quotes.insert(item.symbol.clone(), item.into_record(timestamp));
            }
        }
        Err(e) => warn!("Unexpected API response format: {}", e),
    }
    failed_for_missing(quotes, symbols, timestamp)
}

fn failed_for_missing(
    mut quotes: HashMap<String, StockDataRecord>,
    symbols: &[String],
    timestamp: u64,
) -> Vec<StockDataRecord> {
    symbols
        .iter()
        .map(|symbol| {
            quotes.remove(symbol).unwrap_or_else(|| {
                warn!("No data received for symbol {}", symbol);
                StockDataRecord {
                    timestamp,
                    ..StockDataRecord::failed(symbol)
                }
            })
        })
        .collect()
}

struct YahooState {
    name: String,
    settings: YahooApiSettings,
    client: Client,
    book: SymbolBook,
    hours: MarketHours,
    only_when_open: AtomicBool,
    status: Mutex<String>,
    callback: PushCallback,
}

impl YahooState {
    fn set_status(&self, status: String) {
        if let Ok(mut current) = self.status.lock() {
            *current = status;
        }
    }

    fn request(&self, symbols: &[String]) -> Result<String> {
        let url = format!("{}/api/v1/markets/stock/quotes", self.settings.base_url());
        let response = self
            .client
            .get(url)
            .header("X-RapidAPI-Key", &self.settings.api_key)
            .header("X-RapidAPI-Host", &self.settings.api_host)
            .query(&[("ticker", symbols.join(","))])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| FeedError::fetch(&self.name, e))?;
        response.text().map_err(|e| FeedError::fetch(&self.name, e))
    }

    fn fetch(&self, symbols: &[String]) -> Vec<StockDataRecord> {
        let timestamp = Utc::now().timestamp_millis() as u64;
        match self.request(symbols) {
            Ok(payload) => parse_quotes(&payload, symbols, timestamp),
            Err(e) => {
                warn!("Failed to get quotes for {:?}: {}", symbols, e);
                if let Some(first) = symbols.first() {
                    self.set_status(format!("failed for {}", first));
                }
                failed_for_missing(HashMap::new(), symbols, timestamp)
            }
        }
    }

    fn pass(&self, cursor: &mut BatchCursor) -> Result<Duration> {
        let market_open = self.hours.is_open();
        self.set_status(self.hours.status_label().to_string());
        run_pass(
            &self.book,
            cursor,
            &SCHEDULE,
            market_open,
            self.only_when_open.load(Ordering::Relaxed),
            &self.callback,
            |batch| self.fetch(batch),
        )
    }
}

/// REST provider backed by the RapidAPI Yahoo Finance service.
pub struct YahooApiProvider {
    shared: Arc<YahooState>,
    worker: Mutex<Option<PollWorker>>,
}

impl YahooApiProvider {
    /// Builds the provider and its HTTP client.
    pub fn new(name: &str, settings: YahooApiSettings, callback: PushCallback) -> Result<Self> {
        if settings.api_key.is_empty() {
            warn!("{}: no API key configured, requests will likely be rejected", name);
        }
        let client = http_client(name)?;
        info!("{} initialized for host {}", name, settings.api_host);
        Ok(YahooApiProvider {
            shared: Arc::new(YahooState {
                name: name.to_string(),
                settings,
                client,
                book: SymbolBook::new(),
                hours: MarketHours::london(),
                only_when_open: AtomicBool::new(false),
                status: Mutex::new(String::new()),
                callback,
            }),
            worker: Mutex::new(None),
        })
    }
}

impl ProviderAdapter for YahooApiProvider {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn set_stocks(&self, symbols: &[String]) -> Result<()> {
        info!("{} setStocks: {} symbols: {:?}", self.shared.name, symbols.len(), symbols);
        self.shared.book.replace(symbols)
    }

    fn add_stock(&self, symbol: &str) -> Result<()> {
        debug!("{}: adding symbol {}", self.shared.name, symbol);
        self.shared.book.add(symbol)
    }

    fn stock_data(&self, symbol: &str) -> Option<StockDataRecord> {
        self.shared.book.record(symbol)
    }

    fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock()?;
        if worker.is_some() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let mut cursor = BatchCursor::default();
        *worker = Some(PollWorker::spawn(&self.shared.name, IDLE_TICK, move || {
            shared.pass(&mut cursor).unwrap_or_else(|e| {
                error!("Error in {} update thread: {}", shared.name, e);
                IDLE_TICK
            })
        })?);
        info!("{} started", self.shared.name);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let worker = self.worker.lock()?.take();
        if let Some(worker) = worker {
            worker.stop(DEFAULT_JOIN_TIMEOUT)?;
        }
        info!("{} stopped", self.shared.name);
        Ok(())
    }

    fn set_only_update_when_market_open(&self, only_when_open: bool) {
        debug!("{} setOnlyUpdateWhenMarketOpen: {}", self.shared.name, only_when_open);
        self.shared.only_when_open.store(only_when_open, Ordering::Relaxed);
    }

    fn market_open_status(&self) -> String {
        self.shared.hours.status_label().to_string()
    }

    fn status(&self) -> Option<String> {
        self.shared
            .status
            .lock()
            .ok()
            .map(|s| s.clone())
            .filter(|s| !s.is_empty())
    }
}
