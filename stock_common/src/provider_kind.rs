//! Names of the upstream providers this workspace knows how to build.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Provider names as they appear in `STOCK_PROVIDER_FALLBACK_CHAIN`.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    Hash,
    Eq,
    PartialEq,
)]
#[value(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProviderKind {
    /// Deterministic synthetic data used in test mode.
    Test,
    /// RapidAPI-hosted Yahoo Finance REST quotes.
    YahooApi,
    /// Google Finance JSON quotes with an HTML-scraped alternate source.
    Google,
}
