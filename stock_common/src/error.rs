//! Error types shared by the feed engine and the ticker binary.
//!
//! The `FeedError` enum unifies I/O, parsing, configuration, upstream fetch and
//! lock failures so every crate in the workspace can propagate a single error type.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type for the stock feed workspace.
#[derive(Error, Debug)]
pub enum FeedError {
    /// I/O error originating from files, sockets or thread spawning.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error while parsing a stock list into `StockItem` values.
    #[error("Parse stock list error: {0}")]
    ParseStockList(String),

    /// A configuration value was present but could not be interpreted.
    #[error("Config error: {key}: {reason}")]
    Config {
        /// Offending key.
        key: String,
        /// What was wrong with its value.
        reason: String,
    },

    /// A fallback chain named a provider this build cannot construct.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// A provider exists in the chain but not in the registry.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// An upstream request failed or returned something unusable.
    #[error("Fetch from {provider} failed: {reason}")]
    Fetch {
        /// Provider that issued the request.
        provider: String,
        /// Transport or decoding failure description.
        reason: String,
    },

    /// An HTML page did not contain the expected quote elements.
    #[error("Scrape error: {0}")]
    Scrape(String),

    /// Crossbeam/channel receive failed (e.g., sender closed); contains a short context string.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for FeedError {
    fn from(err: PoisonError<T>) -> Self {
        FeedError::MutexLock(err.to_string())
    }
}

impl FeedError {
    /// Builds a `Fetch` error for `provider` from any displayable cause.
    pub fn fetch(provider: &str, reason: impl std::fmt::Display) -> Self {
        FeedError::Fetch {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }
}
