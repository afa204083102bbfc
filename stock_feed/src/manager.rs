//! Composition root tying the registry, router and cache together.
//!
//! Adapters are built with a push callback that holds a weak handle back to the
//! manager, so dropping the manager is enough to tear everything down. Every
//! push goes through [`ProviderManager::on_provider_push`]: valid records land in
//! the cache, invalid ones advance the symbol along its fallback chain.

use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use log::{debug, error, info};
use stock_common::config::ONLY_WHEN_OPEN_KEY;
use stock_common::{FlatConfig, Result, StockDataRecord, StockItem};

use crate::adapter::{ProviderAdapter, PushCallback};
use crate::cache::DataCache;
use crate::providers::build_adapter;
use crate::registry::ProviderRegistry;
use crate::router::{FallbackOutcome, SymbolAssignment, SymbolRouter, SymbolState};
use crate::validator;

/// Market status when the configured chain is empty.
pub const NO_PROVIDERS: &str = "No providers available";
/// Market status when the head of the chain could not be built.
pub const STATUS_UNAVAILABLE: &str = "Market status unavailable";

/// Invoked with the symbol after a valid record has been cached.
///
/// Runs on the pushing adapter's worker thread. A panic inside it is caught and
/// logged; only that one push is lost.
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Public entry point of the feed engine.
pub struct ProviderManager {
    registry: Arc<ProviderRegistry>,
    router: SymbolRouter,
    cache: DataCache,
    on_change: Option<ChangeCallback>,
}

fn push_callback(manager: Weak<ProviderManager>, provider: &str) -> PushCallback {
    let provider = provider.to_string();
    Arc::new(move |symbol: &str, record: Option<StockDataRecord>| {
        let Some(manager) = manager.upgrade() else {
            debug!("Dropping push for {} from {}: manager is gone", symbol, provider);
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| manager.on_provider_push(&provider, symbol, record))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error processing update for {} from {}: {}", symbol, provider, e),
            Err(_) => error!("Panic while processing update for {} from {}", symbol, provider),
        }
    })
}

impl ProviderManager {
    /// Builds the providers named by `config` and applies its market-hours flag.
    pub fn new(config: &FlatConfig, on_change: Option<ChangeCallback>) -> Result<Arc<Self>> {
        let chain = config.fallback_chain()?;
        let only_when_open = config.get_bool(ONLY_WHEN_OPEN_KEY, false)?;
        let manager = Self::with_factory(&chain, |name, callback| build_adapter(name, config, callback), on_change);
        manager.set_only_update_when_market_open(only_when_open);
        Ok(manager)
    }

    /// Builds one adapter per distinct name in `chain` through `factory`.
    ///
    /// The factory receives the push callback the adapter must use.
    pub fn with_factory<F>(chain: &[String], mut factory: F, on_change: Option<ChangeCallback>) -> Arc<Self>
    where
        F: FnMut(&str, PushCallback) -> Result<Arc<dyn ProviderAdapter>>,
    {
        Arc::new_cyclic(|weak: &Weak<ProviderManager>| {
            let registry = Arc::new(ProviderRegistry::initialize(chain, |name| {
                factory(name, push_callback(weak.clone(), name))
            }));
            ProviderManager {
                router: SymbolRouter::new(Arc::clone(&registry)),
                registry,
                cache: DataCache::new(),
                on_change,
            }
        })
    }

    /// Replaces the tracked symbols and returns them grouped by assigned provider.
    pub fn set_stocks(&self, items: &[StockItem]) -> Result<BTreeMap<String, Vec<String>>> {
        info!("Setting {} stocks", items.len());
        self.router.set_stocks(items)
    }

    /// Last valid record cached for `symbol`.
    pub fn stock_data(&self, symbol: &str) -> Result<Option<StockDataRecord>> {
        self.cache.get(symbol)
    }

    /// Symbols updated since the previous call; the set is cleared by reading it.
    pub fn stocks_changed_since_last_read(&self) -> Result<HashSet<String>> {
        self.cache.drain_changes()
    }

    /// Market status reported by the first provider of the configured chain.
    pub fn market_open_status(&self) -> String {
        let Some(head) = self.registry.configured_chain().first() else {
            return NO_PROVIDERS.to_string();
        };
        match self.registry.get(head) {
            Some(adapter) => adapter.market_open_status(),
            None => STATUS_UNAVAILABLE.to_string(),
        }
    }

    /// Status line per constructed provider.
    ///
    /// Symbols that exhausted their chain are listed against the provider tried last.
    pub fn provider_status(&self) -> Result<BTreeMap<String, String>> {
        let exhausted = self.router.exhausted_by_provider()?;
        let mut statuses = BTreeMap::new();
        for name in self.registry.names() {
            let Some(adapter) = self.registry.get(&name) else {
                continue;
            };
            let mut status = match adapter.status() {
                Some(status) => status,
                None => self
                    .registry
                    .state(&name)?
                    .map(|state| state.to_string())
                    .unwrap_or_default(),
            };
            if let Some(symbols) = exhausted.get(&name) {
                status.push_str(&format!("; exhausted: {}", symbols.join(", ")));
            }
            statuses.insert(name, status);
        }
        Ok(statuses)
    }

    /// Forwards the market-hours flag to every provider.
    pub fn set_only_update_when_market_open(&self, only_when_open: bool) {
        self.registry.set_only_update_when_market_open(only_when_open);
    }

    /// Starts every provider.
    pub fn start(&self) -> Result<()> {
        self.registry.start()
    }

    /// Stops every provider.
    pub fn stop(&self) -> Result<()> {
        self.registry.stop()
    }

    /// Handles one push from `provider`.
    ///
    /// A missing record is fetched from the pushing adapter first. Invalid data
    /// moves the symbol along its fallback chain, whichever provider sent it.
    pub fn on_provider_push(&self, provider: &str, symbol: &str, record: Option<StockDataRecord>) -> Result<()> {
        let record = match record {
            Some(record) => Some(record),
            None => self.registry.get(provider).and_then(|a| a.stock_data(symbol)),
        };

        match record {
            Some(record) if validator::is_valid(Some(&record)) => {
                self.cache.store(symbol, record)?;
                if let Some(on_change) = &self.on_change {
                    on_change(symbol);
                }
                Ok(())
            }
            _ => {
                info!("Invalid data received for {} from {}, trying fallback", symbol, provider);
                match self.router.try_fallback_provider(symbol)? {
                    FallbackOutcome::Reassigned { provider: next, .. } => {
                        debug!("{} now served by {}", symbol, next)
                    }
                    outcome => debug!("Fallback for {} ended with {:?}", symbol, outcome),
                }
                Ok(())
            }
        }
    }

    /// Current assignment of `symbol`.
    pub fn assignment(&self, symbol: &str) -> Result<Option<SymbolAssignment>> {
        self.router.assignment(symbol)
    }

    /// Routing state of `symbol`.
    pub fn symbol_state(&self, symbol: &str) -> Result<SymbolState> {
        self.router.symbol_state(symbol)
    }

    /// Fallback chain `symbol` would get with `preferred`.
    pub fn fallback_chain_for_symbol(&self, symbol: &str, preferred: Option<&str>) -> Vec<String> {
        self.router.fallback_chain_for_symbol(symbol, preferred)
    }

    /// Names of the providers that were constructed, in chain order.
    pub fn provider_names(&self) -> Vec<String> {
        self.registry.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use stock_common::FeedError;

    struct Fixed {
        name: String,
        status: Option<String>,
        records: Mutex<BTreeMap<String, StockDataRecord>>,
    }

    impl ProviderAdapter for Fixed {
        fn name(&self) -> &str {
            &self.name
        }
        fn set_stocks(&self, _symbols: &[String]) -> Result<()> {
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
            format!("{} says open", self.name)
        }
        fn status(&self) -> Option<String> {
            self.status.clone()
        }
    }

    fn chain(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn manager(names: &[&str], broken: &[&str]) -> Arc<ProviderManager> {
        let broken: Vec<String> = broken.iter().map(|n| n.to_string()).collect();
        ProviderManager::with_factory(
            &chain(names),
            |name, _callback| {
                if broken.iter().any(|b| b == name) {
                    return Err(FeedError::UnknownProvider(name.to_string()));
                }
                let adapter: Arc<dyn ProviderAdapter> = Arc::new(Fixed {
                    name: name.to_string(),
                    status: (name == "c").then(|| "busy".to_string()),
                    records: Mutex::new(BTreeMap::new()),
                });
                Ok(adapter)
            },
            None,
        )
    }

    #[test]
    fn market_status_comes_from_chain_head() {
        assert_eq!(manager(&["a", "b"], &[]).market_open_status(), "a says open");
        assert_eq!(manager(&["a", "b"], &["a"]).market_open_status(), STATUS_UNAVAILABLE);
        assert_eq!(manager(&[], &[]).market_open_status(), NO_PROVIDERS);
    }

    #[test]
    fn provider_status_reports_lifecycle_and_exhaustion() {
        let manager = manager(&["a", "c"], &[]);
        manager.set_stocks(&[StockItem::from("X")]).unwrap();
        assert_eq!(manager.provider_status().unwrap()["a"], "Stopped");

        manager.start().unwrap();
        manager.on_provider_push("a", "X", Some(StockDataRecord::failed("X"))).unwrap();
        manager.on_provider_push("c", "X", Some(StockDataRecord::failed("X"))).unwrap();

        let status = manager.provider_status().unwrap();
        assert_eq!(status["a"], "Running");
        assert_eq!(status["c"], "busy; exhausted: X");
        assert_eq!(manager.symbol_state("X").unwrap(), SymbolState::Exhausted);
    }

    #[test]
    fn empty_push_is_resolved_through_the_adapter() {
        let manager = manager(&["a"], &[]);
        manager.set_stocks(&[StockItem::from("X")]).unwrap();
        manager.on_provider_push("a", "X", None).unwrap();
        assert_eq!(manager.symbol_state("X").unwrap(), SymbolState::Exhausted);
        assert!(manager.stock_data("X").unwrap().is_none());
    }

    #[test]
    fn panicking_change_callback_is_contained_per_push() {
        let on_change: ChangeCallback = Arc::new(|symbol: &str| {
            if symbol == "BAD" {
                panic!("renderer failed for {}", symbol);
            }
        });
        let mut push: Option<PushCallback> = None;
        let manager = ProviderManager::with_factory(
            &chain(&["a"]),
            |name, callback| {
                push = Some(Arc::clone(&callback));
                Ok(Arc::new(Fixed {
                    name: name.to_string(),
                    status: None,
                    records: Mutex::new(BTreeMap::new()),
                }) as Arc<dyn ProviderAdapter>)
            },
            Some(on_change),
        );
        let push = push.unwrap();

        push("BAD", Some(StockDataRecord::with_price("BAD", 1.0)));
        push("GOOD", Some(StockDataRecord::with_price("GOOD", 2.0)));

        assert_eq!(manager.stock_data("BAD").unwrap().unwrap().price, Some(1.0));
        assert_eq!(manager.stock_data("GOOD").unwrap().unwrap().price, Some(2.0));
    }

    #[test]
    fn change_callback_runs_after_store() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let on_change: ChangeCallback = Arc::new(move |symbol: &str| {
            sink.lock().unwrap().push(symbol.to_string());
        });
        let manager = ProviderManager::with_factory(&chain(&[]), |_, _| unreachable!(), Some(on_change));
        manager
            .on_provider_push("a", "X", Some(StockDataRecord::with_price("X", 3.0)))
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["X".to_string()]);
        assert_eq!(manager.stock_data("X").unwrap().unwrap().price, Some(3.0));
    }
}
