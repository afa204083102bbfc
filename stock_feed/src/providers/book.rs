//! Per-adapter symbol list and record store.
//!
//! Adapters receive new symbol lists on the caller's thread but consume them on
//! their worker thread. The book keeps the active list separate from a pending
//! one; the worker swaps the pending list in at the start of a pass.

use std::collections::HashMap;
use std::sync::Mutex;

use stock_common::{Result, StockDataRecord};

#[derive(Default)]
struct BookState {
    active: Vec<String>,
    pending: Option<Vec<String>>,
    records: HashMap<String, StockDataRecord>,
}

/// Symbols an adapter serves plus the records it last fetched.
#[derive(Default)]
pub struct SymbolBook {
    state: Mutex<BookState>,
}

impl SymbolBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `symbols` to replace the active list.
    pub fn replace(&self, symbols: &[String]) -> Result<()> {
        self.state.lock()?.pending = Some(symbols.to_vec());
        Ok(())
    }

    /// Queues `symbol` on top of the pending list, or the active one if nothing is pending.
    pub fn add(&self, symbol: &str) -> Result<()> {
        let mut guard = self.state.lock()?;
        let state = &mut *guard;
        let mut list = match state.pending.take() {
            Some(pending) => pending,
            None => state.active.clone(),
        };
        if !list.iter().any(|s| s == symbol) {
            list.push(symbol.to_string());
        }
        state.pending = Some(list);
        Ok(())
    }

    /// Makes the pending list active. Returns `true` if there was one.
    pub fn take_pending(&self) -> Result<bool> {
        let mut state = self.state.lock()?;
        match state.pending.take() {
            Some(list) => {
                state.active = list;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Copy of the active list.
    pub fn active(&self) -> Result<Vec<String>> {
        Ok(self.state.lock()?.active.clone())
    }

    /// Active list with any pending replacement applied, without consuming it.
    pub fn effective(&self) -> Result<Vec<String>> {
        let state = self.state.lock()?;
        Ok(state.pending.clone().unwrap_or_else(|| state.active.clone()))
    }

    /// Last record stored for `symbol`.
    pub fn record(&self, symbol: &str) -> Option<StockDataRecord> {
        self.state.lock().ok()?.records.get(symbol).cloned()
    }

    /// Stores `record` and reports whether its quote content differs from the previous one.
    pub fn update(&self, record: StockDataRecord) -> Result<bool> {
        let mut state = self.state.lock()?;
        let changed = state
            .records
            .get(&record.symbol)
            .is_none_or(|old| !old.same_quote(&record));
        state.records.insert(record.symbol.clone(), record);
        Ok(changed)
    }
}
