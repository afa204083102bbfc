//! Deterministic synthetic quotes for test mode.
//!
//! Each symbol gets a base price (from a small preset table or derived from a
//! stable hash of the symbol) and walks through a fixed cycle of percentage
//! variations, one step per tick. Every tracked symbol is pushed on every tick,
//! so a UI bound to the manager sees steady, predictable changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info};
use stock_common::{Result, StockDataRecord};

use crate::adapter::{ProviderAdapter, PushCallback};
use crate::market_hours::MarketHours;
use crate::providers::book::SymbolBook;
use crate::worker::{DEFAULT_JOIN_TIMEOUT, PollWorker};

/// Percentage offsets from the base price, applied cyclically.
pub const VARIATIONS: [f64; 10] = [0.0, 0.5, 1.0, 0.8, 0.2, -0.3, -0.8, -1.2, -0.5, 0.3];

const TICK_INTERVAL: Duration = Duration::from_secs(3);

const PRESETS: [(&str, f64, &str); 6] = [
    ("BP.L", 434.2, "BP PLC"),
    ("IMI.L", 2450.0, "IMI PLC"),
    ("NWG.L", 345.6, "NatWest Group"),
    ("TLW.L", 678.5, "Tullow Oil"),
    ("FDM.L", 345.7, "FDM Group"),
    ("HILS.L", 678.2, "Hill & Smith"),
];

struct Series {
    name: String,
    base: f64,
    current: f64,
    cycle: usize,
}

impl Series {
    fn for_symbol(symbol: &str) -> Self {
        match PRESETS.iter().find(|(sym, _, _)| *sym == symbol) {
            Some((_, base, name)) => Series {
                name: name.to_string(),
                base: *base,
                current: *base,
                cycle: 0,
            },
            None => {
                let base = 100.0 + (stable_hash(symbol) % 500) as f64;
                Series {
                    name: format!("Test Company {}", symbol),
                    base,
                    current: base,
                    cycle: 0,
                }
            }
        }
    }

    fn advance(&mut self) {
        let variation = VARIATIONS[self.cycle % VARIATIONS.len()];
        self.current = (self.base * (1.0 + variation / 100.0) * 100.0).round() / 100.0;
        self.cycle += 1;
    }

    fn record(&self, symbol: &str) -> StockDataRecord {
        let change = self.current - self.base;
        StockDataRecord {
            symbol: symbol.to_string(),
            name: Some(self.name.clone()),
            price: Some(self.current),
            change: Some(change),
            percent_change: Some(if self.base > 0.0 { change / self.base * 100.0 } else { 0.0 }),
            volume: Some(1_000_000 + stable_hash(symbol) % 500_000),
            fail_count: 0,
            timestamp: Utc::now().timestamp_millis() as u64,
            extras: Default::default(),
        }
    }
}

/// FNV-1a over the symbol bytes; stable across runs and platforms.
fn stable_hash(symbol: &str) -> u64 {
    symbol
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        })
}

struct SyntheticState {
    name: String,
    book: SymbolBook,
    series: Mutex<HashMap<String, Series>>,
    only_when_open: AtomicBool,
    first_pass_done: AtomicBool,
    hours: MarketHours,
    callback: PushCallback,
}

impl SyntheticState {
    fn ensure_series(&self, symbols: &[String]) -> Result<()> {
        let mut series = self.series.lock()?;
        for symbol in symbols {
            series
                .entry(symbol.clone())
                .or_insert_with(|| Series::for_symbol(symbol));
        }
        Ok(())
    }

    fn tick(&self) -> Result<usize> {
        self.book.take_pending()?;
        if self.only_when_open.load(Ordering::Relaxed)
            && self.first_pass_done.load(Ordering::Relaxed)
            && !self.hours.is_open()
        {
            debug!("{}: skipping update (market closed)", self.name);
            return Ok(0);
        }

        let symbols = self.book.active()?;
        let records: Vec<StockDataRecord> = {
            let mut series = self.series.lock()?;
            symbols
                .iter()
                .filter_map(|symbol| {
                    let entry = series.get_mut(symbol)?;
                    entry.advance();
                    Some(entry.record(symbol))
                })
                .collect()
        };

        if !symbols.is_empty() {
            self.first_pass_done.store(true, Ordering::Relaxed);
        }
        let updated = records.len();
        for record in records {
            let symbol = record.symbol.clone();
            self.book.update(record.clone())?;
            (self.callback)(&symbol, Some(record));
        }
        if updated > 0 {
            debug!("{}: updated {} symbols in test cycle", self.name, updated);
        }
        Ok(updated)
    }
}

/// Test-mode provider producing predictable, changing prices.
pub struct SyntheticProvider {
    shared: Arc<SyntheticState>,
    worker: Mutex<Option<PollWorker>>,
}

impl SyntheticProvider {
    /// Creates a provider registered under `name` that pushes through `callback`.
    pub fn new(name: &str, callback: PushCallback) -> Self {
        info!("{} initialized with synthetic test data", name);
        SyntheticProvider {
            shared: Arc::new(SyntheticState {
                name: name.to_string(),
                book: SymbolBook::new(),
                series: Mutex::new(HashMap::new()),
                only_when_open: AtomicBool::new(false),
                first_pass_done: AtomicBool::new(false),
                hours: MarketHours::london(),
                callback,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Runs one update cycle on the calling thread and returns how many symbols were pushed.
    pub fn tick(&self) -> Result<usize> {
        self.shared.tick()
    }
}

impl ProviderAdapter for SyntheticProvider {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn set_stocks(&self, symbols: &[String]) -> Result<()> {
        info!("{} setStocks: {} symbols: {:?}", self.shared.name, symbols.len(), symbols);
        self.shared.ensure_series(symbols)?;
        self.shared.book.replace(symbols)
    }

    fn add_stock(&self, symbol: &str) -> Result<()> {
        self.shared.ensure_series(&[symbol.to_string()])?;
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
        *worker = Some(PollWorker::spawn(&self.shared.name, Duration::ZERO, move || {
            if let Err(e) = shared.tick() {
                error!("{} update loop error: {}", shared.name, e);
            }
            TICK_INTERVAL
        })?);
        info!("{} started - price variations cycle every {:?}", self.shared.name, TICK_INTERVAL);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let worker = self.worker.lock()?.take();
        if let Some(worker) = worker {
            worker.stop(DEFAULT_JOIN_TIMEOUT)?;
            info!("{} stopped", self.shared.name);
        }
        Ok(())
    }

    fn set_only_update_when_market_open(&self, only_when_open: bool) {
        self.shared.only_when_open.store(only_when_open, Ordering::Relaxed);
    }

    fn market_open_status(&self) -> String {
        format!("{} (Test Mode)", self.shared.hours.status_label())
    }
}
