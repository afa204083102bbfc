//! Concrete provider adapters and the factory that builds them by name.

mod batch;
pub mod book;
pub mod google;
pub mod synthetic;
pub mod yahoo_api;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use stock_common::{FeedError, FlatConfig, ProviderKind, Result};

use crate::adapter::{ProviderAdapter, PushCallback};
use google::GoogleProvider;
use synthetic::SyntheticProvider;
use yahoo_api::{YahooApiProvider, YahooApiSettings};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("stock_feed/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP client shared by the network adapters.
pub(crate) fn http_client(provider: &str) -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FeedError::fetch(provider, e))
}

/// Builds the adapter registered under `name`.
///
/// Unknown names fail with [`FeedError::UnknownProvider`]; the registry logs the
/// failure and carries on without that provider.
pub fn build_adapter(
    name: &str,
    config: &FlatConfig,
    callback: PushCallback,
) -> Result<Arc<dyn ProviderAdapter>> {
    let kind = ProviderKind::from_str(name).map_err(|_| FeedError::UnknownProvider(name.to_string()))?;
    let adapter: Arc<dyn ProviderAdapter> = match kind {
        ProviderKind::Test => Arc::new(SyntheticProvider::new(name, callback)),
        ProviderKind::YahooApi => Arc::new(YahooApiProvider::new(
            name,
            YahooApiSettings::from_config(config),
            callback,
        )?),
        ProviderKind::Google => Arc::new(GoogleProvider::new(name, callback)?),
    };
    Ok(adapter)
}
