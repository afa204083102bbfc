//!
//! Common types and utilities shared by the feed engine and the ticker binary.
//!
//! This crate aggregates:
//! - `error`: unified error type `FeedError` used across the workspace.
//! - `result`: handy `Result<T, FeedError>` alias.
//! - `record`: the `StockDataRecord` pushed by providers.
//! - `stock_item`: tracked symbols, preferred providers and list parsing.
//! - `provider_kind`: names of the providers that can be constructed.
//! - `config`: flat `KEY=VALUE` configuration loader.
#![warn(missing_docs)]
pub mod config;
pub mod error;
pub mod provider_kind;
pub mod record;
pub mod result;
pub mod stock_item;

pub use config::FlatConfig;
pub use error::FeedError;
pub use provider_kind::ProviderKind;
pub use record::StockDataRecord;
pub use result::Result;
pub use stock_item::{StockItem, StockListParser};
