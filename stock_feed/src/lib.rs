//!
//! Provider-routing and failover engine for stock quotes.
//!
//! This crate aggregates:
//! - `adapter`: the contract every upstream quote source implements.
//! - `validator`: the single predicate deciding whether a pushed record is usable.
//! - `cache`: latest valid record per symbol plus the changed-since-last-read set.
//! - `router`: per-symbol fallback chains and the symbol → provider assignment table.
//! - `registry`: construction and lifecycle of the configured providers.
//! - `manager`: `ProviderManager`, the public entry point wiring all of the above.
//! - `market_hours`: London trading session check used by the adapters.
//! - `worker`: background polling thread with cooperative cancellation.
//! - `providers`: the concrete adapters (`test`, `yahoo_api`, `google`).
#![warn(missing_docs)]
pub mod adapter;
pub mod cache;
pub mod manager;
pub mod market_hours;
pub mod providers;
pub mod registry;
pub mod router;
pub mod validator;
pub mod worker;

pub use adapter::{ProviderAdapter, PushCallback};
pub use manager::{ChangeCallback, ProviderManager};
pub use router::{FallbackOutcome, SymbolAssignment, SymbolState};
