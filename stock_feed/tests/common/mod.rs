//! Scripted in-memory adapters for driving `ProviderManager` from tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use stock_common::{FeedError, Result, StockDataRecord};
use stock_feed::{ProviderAdapter, ProviderManager, PushCallback};

/// What an adapter does when it is asked to take over a symbol.
#[derive(Clone, Default)]
pub enum OnAdd {
    /// Accept silently.
    #[default]
    Accept,
    /// Reject with an error.
    Reject,
    /// Accept and push a record with this price from inside `add_stock`.
    PushPrice(f64),
}

pub struct Scripted {
    name: String,
    callback: PushCallback,
    on_add: OnAdd,
    pub batches: Mutex<Vec<Vec<String>>>,
    pub added: Mutex<Vec<String>>,
    records: Mutex<HashMap<String, StockDataRecord>>,
}

impl Scripted {
    /// Pushes `price` for `symbol` through the manager callback.
    pub fn push_price(&self, symbol: &str, price: f64) {
        let record = StockDataRecord::with_price(symbol, price);
        self.records.lock().unwrap().insert(symbol.to_string(), record.clone());
        (self.callback)(symbol, Some(record));
    }

    /// Pushes a record carrying a failure count.
    pub fn push_failure(&self, symbol: &str) {
        (self.callback)(symbol, Some(StockDataRecord::failed(symbol)));
    }

    pub fn last_batch(&self) -> Vec<String> {
        self.batches.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl ProviderAdapter for Scripted {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_stocks(&self, symbols: &[String]) -> Result<()> {
        self.batches.lock()?.push(symbols.to_vec());
        Ok(())
    }

    fn add_stock(&self, symbol: &str) -> Result<()> {
        match self.on_add {
            OnAdd::Accept => {}
            OnAdd::Reject => return Err(FeedError::ProviderUnavailable(self.name.clone())),
            OnAdd::PushPrice(price) => {
                self.added.lock()?.push(symbol.to_string());
                self.push_price(symbol, price);
                return Ok(());
            }
        }
        self.added.lock()?.push(symbol.to_string());
        Ok(())
    }

    fn stock_data(&self, symbol: &str) -> Option<StockDataRecord> {
        self.records.lock().ok()?.get(symbol).cloned()
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn set_only_update_when_market_open(&self, _only_when_open: bool) {}

    fn market_open_status(&self) -> String {
        "Market Open".to_string()
    }
}

pub struct Harness {
    pub manager: Arc<ProviderManager>,
    adapters: HashMap<String, Arc<Scripted>>,
}

impl Harness {
    pub fn adapter(&self, name: &str) -> &Scripted {
        &self.adapters[name]
    }
}

/// Manager over scripted adapters named by `chain`, minus those in `missing`.
pub fn harness(chain: &[&str], missing: &[&str], on_add: impl Fn(&str) -> OnAdd) -> Harness {
    let chain: Vec<String> = chain.iter().map(|n| n.to_string()).collect();
    let mut adapters = HashMap::new();
    let manager = ProviderManager::with_factory(
        &chain,
        |name, callback| {
            if missing.contains(&name) {
                return Err(FeedError::UnknownProvider(name.to_string()));
            }
            let adapter = Arc::new(Scripted {
                name: name.to_string(),
                callback,
                on_add: on_add(name),
                batches: Mutex::new(Vec::new()),
                added: Mutex::new(Vec::new()),
                records: Mutex::new(HashMap::new()),
            });
            adapters.insert(name.to_string(), Arc::clone(&adapter));
            Ok(adapter as Arc<dyn ProviderAdapter>)
        },
        None,
    );
    Harness { manager, adapters }
}

pub fn accept_all(_: &str) -> OnAdd {
    OnAdd::Accept
}
