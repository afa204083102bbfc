//! Command-line arguments for the stock ticker.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use stock_common::ProviderKind;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Flat `KEY=VALUE` configuration file. Missing files fall back to defaults.
    #[clap(long, default_value = "privatesettings/config.ini")]
    pub config: String,

    /// Stock list: a `.json` array of symbols/holdings, or one `SYMBOL[,provider]` per line.
    #[clap(long)]
    pub stocks: String,

    /// How often to drain changed symbols, in milliseconds.
    #[clap(long, default_value_t = 2000)]
    pub poll_ms: u64,

    /// Replace every real provider with the synthetic one.
    #[clap(long)]
    pub test_mode: bool,

    /// Override the configured fallback chain, e.g. `--chain google,yahoo_api`.
    #[clap(long, value_enum, value_delimiter = ',')]
    pub chain: Vec<ProviderKind>,
}
