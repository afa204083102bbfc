//! Contract every upstream data source implements.
//!
//! Adapters own their background worker and push updates through a
//! [`PushCallback`] handed to them at construction. The manager never polls an
//! adapter on a timer; it only asks for a record when a push arrives without one.

use std::sync::Arc;

use stock_common::{Result, StockDataRecord};

/// Called by an adapter whenever it has new data for `symbol`.
///
/// `None` means "something changed, ask me for it" and makes the manager call
/// [`ProviderAdapter::stock_data`] on the pushing adapter.
pub type PushCallback = Arc<dyn Fn(&str, Option<StockDataRecord>) + Send + Sync>;

/// Uniform shape of an upstream quote source.
pub trait ProviderAdapter: Send + Sync {
    /// Provider name as used in fallback chains.
    fn name(&self) -> &str;

    /// Replaces the full set of symbols this adapter serves.
    fn set_stocks(&self, symbols: &[String]) -> Result<()>;

    /// Adds one symbol without disturbing the others. No-op by default.
    fn add_stock(&self, symbol: &str) -> Result<()> {
        let _ = symbol;
        Ok(())
    }

    /// Current record for `symbol`, if the adapter has one.
    fn stock_data(&self, symbol: &str) -> Option<StockDataRecord>;

    /// Starts the background worker.
    fn start(&self) -> Result<()>;

    /// Signals the background worker to stop and waits a bounded time for it.
    fn stop(&self) -> Result<()>;

    /// Skip upstream fetches while the market is closed.
    fn set_only_update_when_market_open(&self, only_when_open: bool);

    /// Human-readable market status, e.g. `Market Open`.
    fn market_open_status(&self) -> String;

    /// Adapter-specific status line, if it tracks one.
    fn status(&self) -> Option<String> {
        None
    }
}
