//! Stock Ticker: a command-line consumer of the provider manager. It loads the
//! flat configuration and a stock list, starts the configured providers, and on
//! every poll logs one line per symbol whose quote changed since the last poll.
//!
//! Usage example (CLI):
//! ```bash
//! stock_ticker --stocks ./stocks.json --chain google,yahoo_api --poll-ms 5000
//! stock_ticker --stocks ./stocks.txt --test-mode
//! ```
//!
//! The stock list is either a JSON array (`"BP.L"` or
//! `{"symbol": "BP.L", "stock_provider": "google"}` entries) or a text file with
//! one `SYMBOL` or `SYMBOL,provider` per line.
#![warn(missing_docs)]
mod args;

use crate::args::Args;
use clap::Parser;
use log::{error, info, warn};
use stock_common::config::{FALLBACK_CHAIN_KEY, TEST_MODE_KEY};
use stock_common::{FeedError, FlatConfig, Result, StockItem, StockListParser};
use stock_feed::ProviderManager;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

/// Runs the drain loop until `shutdown` is set.
fn run_poll_loop(manager: &ProviderManager, poll: Duration, shutdown: Arc<AtomicBool>) -> Result<()> {
    let mut last_status = String::new();
    while !shutdown.load(Ordering::Relaxed) {
        let status = manager.market_open_status();
        if status != last_status {
            info!("Market status: {}", status);
            last_status = status;
        }

        let mut changed: Vec<String> = manager.stocks_changed_since_last_read()?.into_iter().collect();
        changed.sort();
        for symbol in changed {
            if let Some(record) = manager.stock_data(&symbol)? {
                info!(
                    "QUOTE: {} ({}) Price={:.2} Change={:+.2} ({:+.2}%) Volume={}",
                    record.symbol,
                    record.name.as_deref().unwrap_or("-"),
                    record.price.unwrap_or_default(),
                    record.change.unwrap_or_default(),
                    record.percent_change.unwrap_or_default(),
                    record.volume.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
                );
            }
        }
        thread::sleep(poll);
    }
    info!("Poll loop stopping...");
    Ok(())
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down ticker...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| FeedError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    let mut config = load_config(&normalize_path(&args.config))?;
    if args.test_mode {
        config.set(TEST_MODE_KEY, "true");
    }
    if !args.chain.is_empty() {
        let chain: Vec<String> = args.chain.iter().map(|kind| kind.to_string()).collect();
        config.set(FALLBACK_CHAIN_KEY, &chain.join(","));
    }

    let items = load_stocks(&normalize_path(&args.stocks))?;
    info!("Tracking {} stocks", items.len());

    let manager = ProviderManager::new(&config, None)?;
    for (provider, symbols) in manager.set_stocks(&items)? {
        info!("{}: {:?}", provider, symbols);
    }
    manager.start()?;
    info!("Ticker is running. Press Ctrl+C to exit.");

    let result = run_poll_loop(&manager, Duration::from_millis(args.poll_ms), shutdown);
    if let Err(e) = manager.stop() {
        error!("Failed to stop providers: {}", e);
    }
    for (provider, status) in manager.provider_status()? {
        info!("Provider {}: {}", provider, status);
    }
    result
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Reads the config file, or returns an empty config when it does not exist.
fn load_config(path: &Path) -> Result<FlatConfig> {
    match FlatConfig::from_file(path) {
        Ok(config) => Ok(config),
        Err(FeedError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(FlatConfig::default())
        }
        Err(e) => Err(e),
    }
}

/// Parses the stock list, choosing the format by file extension.
fn load_stocks(path: &Path) -> Result<Vec<StockItem>> {
    let reader = BufReader::new(File::open(path)?);
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        StockItem::parse_json(reader)
    } else {
        StockItem::parse_lines(reader)
    }
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}
