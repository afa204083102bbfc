//! Symbol → provider routing and per-symbol failover.
//!
//! Every tracked symbol gets its own copy of a fallback chain: the preferred
//! provider first (when it was constructed) followed by the configured chain
//! without it. The symbol is assigned to the first constructed provider in its
//! chain. When a push for the symbol fails validation the router walks further
//! down that chain; reaching the end makes the symbol exhausted until the next
//! `set_stocks`.
//!
//! Locking: the assignment table is guarded by one mutex that is only held while
//! reading or mutating the table, never while calling into an adapter. Adapter
//! calls may push synchronously, and that push may come back into the router.
//! Each `set_stocks` bumps an epoch; a fallback walk that notices a newer epoch
//! abandons its work instead of advancing the rebuilt assignment.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use stock_common::{Result, StockItem};

use crate::registry::ProviderRegistry;

/// Routing state of one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolState {
    /// Not tracked, or no provider in its chain could take it.
    Unassigned,
    /// Served by the named provider.
    Assigned(String),
    /// Every provider in the chain failed; only a new `set_stocks` recovers.
    Exhausted,
}

/// Fallback bookkeeping for one tracked symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolAssignment {
    /// Symbol identifier.
    pub symbol: String,
    /// Ordered provider names to try.
    pub fallback_chain: Vec<String>,
    /// Position of the current provider in `fallback_chain`.
    pub current_index: usize,
    /// Preferred provider as supplied by the caller, if it was constructed.
    pub preferred_provider: Option<String>,
    /// Set once the chain has run out.
    pub exhausted: bool,
}

impl SymbolAssignment {
    /// Provider currently responsible for the symbol.
    pub fn current_provider(&self) -> &str {
        &self.fallback_chain[self.current_index]
    }
}

/// Result of one [`SymbolRouter::try_fallback_provider`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// The symbol moved to `provider` at `index` in its chain.
    Reassigned {
        /// New provider name.
        provider: String,
        /// Its position in the chain.
        index: usize,
    },
    /// This call ran off the end of the chain.
    Exhausted,
    /// The chain had already run out before this call.
    AlreadyExhausted,
    /// The symbol has no assignment.
    Unassigned,
    /// A concurrent `set_stocks` rebuilt the table mid-walk.
    Superseded,
}

#[derive(Default)]
struct RouterTables {
    assignments: HashMap<String, SymbolAssignment>,
    epoch: u64,
}

/// Owns the symbol assignment table.
pub struct SymbolRouter {
    registry: Arc<ProviderRegistry>,
    tables: Mutex<RouterTables>,
}

/// Computes the fallback chain for one symbol.
///
/// With a `preferred` provider that is present in `registry`, the chain is the
/// preferred provider, under its registered spelling, followed by `configured`
/// minus that provider. Otherwise it is a fresh copy of `configured`.
pub fn fallback_chain_for_symbol(
    configured: &[String],
    registry: &ProviderRegistry,
    preferred: Option<&str>,
) -> Vec<String> {
    match preferred.and_then(|p| registry.resolve(p)) {
        Some(preferred) => {
            let mut chain = Vec::with_capacity(configured.len() + 1);
            chain.push(preferred.to_string());
            chain.extend(
                configured
                    .iter()
                    .filter(|p| !p.eq_ignore_ascii_case(preferred))
                    .cloned(),
            );
            chain
        }
        None => configured.to_vec(),
    }
}

impl SymbolRouter {
    /// Creates a router over `registry` with an empty assignment table.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        SymbolRouter {
            registry,
            tables: Mutex::new(RouterTables::default()),
        }
    }

    /// Fallback chain `symbol` would get with `preferred`.
    pub fn fallback_chain_for_symbol(&self, symbol: &str, preferred: Option<&str>) -> Vec<String> {
        let chain = fallback_chain_for_symbol(self.registry.configured_chain(), &self.registry, preferred);
        debug!("Fallback chain for {}: {:?}", symbol, chain);
        chain
    }

    /// Rebuilds every assignment from `items` and hands each provider its batch.
    ///
    /// Every constructed provider receives exactly one `set_stocks` call, with an
    /// empty list when nothing is routed to it, so symbols dropped from the list
    /// stop being fetched. Returns the symbols grouped by provider.
    pub fn set_stocks(&self, items: &[StockItem]) -> Result<BTreeMap<String, Vec<String>>> {
        let mut batches: BTreeMap<String, Vec<String>> = self
            .registry
            .names()
            .into_iter()
            .map(|name| (name, Vec::new()))
            .collect();

        {
            let mut tables = self.tables.lock()?;
            tables.assignments.clear();
            tables.epoch += 1;

            for item in items {
                let symbol = item.symbol();
                let preferred = item.preferred_provider();
                if let Some(p) = preferred {
                    if !self.registry.contains(p) {
                        warn!("Preferred provider {} for {} is not available, ignoring", p, symbol);
                    }
                }
                let chain = self.fallback_chain_for_symbol(symbol, preferred);

                let Some(index) = chain.iter().position(|name| self.registry.contains(name)) else {
                    error!("Could not assign symbol {} to any provider (chain: {:?})", symbol, chain);
                    continue;
                };
                let provider = chain[index].clone();
                debug!("Assigned symbol {} to provider {} (index {} in chain {:?})", symbol, provider, index, chain);

                batches.entry(provider).or_default().push(symbol.to_string());
                tables.assignments.insert(
                    symbol.to_string(),
                    SymbolAssignment {
                        symbol: symbol.to_string(),
                        preferred_provider: preferred
                            .and_then(|p| self.registry.resolve(p))
                            .map(String::from),
                        fallback_chain: chain,
                        current_index: index,
                        exhausted: false,
                    },
                );
            }
        }

        for (provider_name, symbols) in &batches {
            let Some(provider) = self.registry.get(provider_name) else {
                continue;
            };
            info!("Setting {} symbols on provider {}: {:?}", symbols.len(), provider_name, symbols);
            if let Err(e) = provider.set_stocks(symbols) {
                error!("Failed to set stocks on provider {}: {}", provider_name, e);
            }
        }
        Ok(batches)
    }

    /// Moves `symbol` to the next usable provider in its chain.
    ///
    /// The previous provider keeps the symbol; the cache simply reflects whichever
    /// valid push arrives last. A next provider that is missing from the registry or
    /// whose `add_stock` fails is skipped. Running off the end marks the symbol
    /// exhausted, after which further calls change nothing.
    pub fn try_fallback_provider(&self, symbol: &str) -> Result<FallbackOutcome> {
        let mut epoch: Option<u64> = None;
        loop {
            let (next_provider, next_index, chain) = {
                let mut tables = self.tables.lock()?;
                match epoch {
                    Some(seen) if seen != tables.epoch => {
                        debug!("Fallback for {} superseded by a new stock list", symbol);
                        return Ok(FallbackOutcome::Superseded);
                    }
                    None => epoch = Some(tables.epoch),
                    _ => {}
                }
                let Some(assignment) = tables.assignments.get_mut(symbol) else {
                    return Ok(FallbackOutcome::Unassigned);
                };
                if assignment.exhausted {
                    debug!("Symbol {} already exhausted its fallback chain", symbol);
                    return Ok(FallbackOutcome::AlreadyExhausted);
                }
                let next_index = assignment.current_index + 1;
                if next_index >= assignment.fallback_chain.len() {
                    assignment.exhausted = true;
                    error!(
                        "Exhausted all fallback providers for symbol {} (tried chain: {:?})",
                        symbol, assignment.fallback_chain
                    );
                    return Ok(FallbackOutcome::Exhausted);
                }
                assignment.current_index = next_index;
                (
                    assignment.fallback_chain[next_index].clone(),
                    next_index,
                    assignment.fallback_chain.clone(),
                )
            };

            info!(
                "Trying fallback provider {} for symbol {} (index {} in chain {:?})",
                next_provider, symbol, next_index, chain
            );
            let Some(provider) = self.registry.get(&next_provider) else {
                error!("Fallback provider {} not available for {}", next_provider, symbol);
                continue;
            };
            match provider.add_stock(symbol) {
                Ok(()) => {
                    info!("Moved symbol {} to fallback provider {}", symbol, next_provider);
                    return Ok(FallbackOutcome::Reassigned {
                        provider: next_provider,
                        index: next_index,
                    });
                }
                Err(e) => {
                    error!("Failed to move {} to fallback provider {}: {}", symbol, next_provider, e);
                }
            }
        }
    }

    /// Copy of the assignment for `symbol`.
    pub fn assignment(&self, symbol: &str) -> Result<Option<SymbolAssignment>> {
        Ok(self.tables.lock()?.assignments.get(symbol).cloned())
    }

    /// Routing state of `symbol`.
    pub fn symbol_state(&self, symbol: &str) -> Result<SymbolState> {
        let tables = self.tables.lock()?;
        Ok(match tables.assignments.get(symbol) {
            None => SymbolState::Unassigned,
            Some(a) if a.exhausted => SymbolState::Exhausted,
            Some(a) => SymbolState::Assigned(a.current_provider().to_string()),
        })
    }

    /// Exhausted symbols keyed by the last provider tried, each list sorted.
    pub fn exhausted_by_provider(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let tables = self.tables.lock()?;
        let mut exhausted: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for assignment in tables.assignments.values().filter(|a| a.exhausted) {
            exhausted
                .entry(assignment.current_provider().to_string())
                .or_default()
                .push(assignment.symbol.clone());
        }
        for symbols in exhausted.values_mut() {
            symbols.sort();
        }
        Ok(exhausted)
    }
}
