//! Latest valid record per symbol plus the set of symbols changed since the last read.
//!
//! Both live behind one mutex so that storing a record and marking its symbol
//! changed is a single step. The lock is never held while calling out of the cache.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::Mutex;

use stock_common::{Result, StockDataRecord};

#[derive(Default)]
struct CacheState {
    records: HashMap<String, StockDataRecord>,
    changed: HashSet<String>,
}

/// Thread-safe symbol → record map with change tracking.
#[derive(Default)]
pub struct DataCache {
    state: Mutex<CacheState>,
}

impl DataCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` for `symbol` and marks the symbol changed.
    pub fn store(&self, symbol: &str, record: StockDataRecord) -> Result<()> {
        let mut state = self.state.lock()?;
        state.records.insert(symbol.to_string(), record);
        state.changed.insert(symbol.to_string());
        Ok(())
    }

    /// Copy of the cached record for `symbol`.
    pub fn get(&self, symbol: &str) -> Result<Option<StockDataRecord>> {
        let state = self.state.lock()?;
        Ok(state.records.get(symbol).cloned())
    }

    /// Swaps the pending change set for an empty one and returns it.
    pub fn drain_changes(&self) -> Result<HashSet<String>> {
        let mut state = self.state.lock()?;
        Ok(mem::take(&mut state.changed))
    }

    /// Number of symbols with a cached record.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.lock()?.records.len())
    }

    /// True when nothing has been cached yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_pushed_symbols_once() {
        let cache = DataCache::new();
        cache.store("A", StockDataRecord::with_price("A", 1.0)).unwrap();
        cache.store("B", StockDataRecord::with_price("B", 2.0)).unwrap();
        cache.store("A", StockDataRecord::with_price("A", 1.5)).unwrap();

        let drained = cache.drain_changes().unwrap();
        assert_eq!(drained, HashSet::from(["A".to_string(), "B".to_string()]));
        assert!(cache.drain_changes().unwrap().is_empty());
    }

    #[test]
    fn keeps_latest_record_after_drain() {
        let cache = DataCache::new();
        cache.store("A", StockDataRecord::with_price("A", 1.0)).unwrap();
        cache.store("A", StockDataRecord::with_price("A", 2.0)).unwrap();
        cache.drain_changes().unwrap();

        assert_eq!(cache.get("A").unwrap().unwrap().price, Some(2.0));
        assert_eq!(cache.get("missing").unwrap(), None);
        assert_eq!(cache.len().unwrap(), 1);
    }
}
