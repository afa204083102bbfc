//! Owner of the constructed provider adapters.
//!
//! Only providers named in the configured fallback chain are built, each at most
//! once. A provider whose construction fails is logged and left out; nothing
//! retries it. Start and stop walk every owned adapter and keep going past
//! individual failures.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::{debug, error, info};
use stock_common::Result;
use strum_macros::Display;

use crate::adapter::ProviderAdapter;

/// Lifecycle state of a registered provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ProviderState {
    /// Constructed but not started, or stopped.
    Stopped,
    /// Start succeeded and stop has not been called.
    Running,
}

struct RegisteredProvider {
    name: String,
    adapter: Arc<dyn ProviderAdapter>,
    state: Mutex<ProviderState>,
}

/// Adapters built from the configured chain, kept in chain order.
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
    configured_chain: Vec<String>,
}

impl ProviderRegistry {
    /// Builds one adapter per distinct name in `chain` using `factory`.
    pub fn initialize<F>(chain: &[String], mut factory: F) -> Self
    where
        F: FnMut(&str) -> Result<Arc<dyn ProviderAdapter>>,
    {
        info!("Initializing providers in fallback chain: {:?}", chain);
        let mut providers: Vec<RegisteredProvider> = Vec::new();
        let mut attempted: HashSet<String> = HashSet::new();
        for name in chain {
            if !attempted.insert(name.to_ascii_lowercase()) {
                continue;
            }
            match factory(name) {
                Ok(adapter) => {
                    info!("Provider {} initialized", name);
                    providers.push(RegisteredProvider {
                        name: name.clone(),
                        adapter,
                        state: Mutex::new(ProviderState::Stopped),
                    });
                }
                Err(e) => error!("Failed to initialize provider {}: {}", name, e),
            }
        }
        ProviderRegistry {
            providers,
            configured_chain: chain.to_vec(),
        }
    }

    /// The configured chain, including names that failed to construct.
    pub fn configured_chain(&self) -> &[String] {
        &self.configured_chain
    }

    fn find(&self, name: &str) -> Option<&RegisteredProvider> {
        self.providers.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Whether `name` was constructed. Names compare ASCII case-insensitively.
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Registered spelling of `name`, if it was constructed.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.find(name).map(|p| p.name.as_str())
    }

    /// Adapter registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.find(name).map(|p| Arc::clone(&p.adapter))
    }

    /// Names of constructed providers, in chain order.
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name.clone()).collect()
    }

    /// Lifecycle state of `name`.
    pub fn state(&self, name: &str) -> Result<Option<ProviderState>> {
        match self.find(name) {
            Some(p) => Ok(Some(*p.state.lock()?)),
            None => Ok(None),
        }
    }

    /// Starts every adapter; a failing adapter is logged and stays stopped.
    pub fn start(&self) -> Result<()> {
        for provider in &self.providers {
            match provider.adapter.start() {
                Ok(()) => {
                    *provider.state.lock()? = ProviderState::Running;
                    debug!("Started provider: {}", provider.name);
                }
                Err(e) => error!("Failed to start provider {}: {}", provider.name, e),
            }
        }
        Ok(())
    }

    /// Stops every adapter; failures are logged and the rest are still stopped.
    pub fn stop(&self) -> Result<()> {
        for provider in &self.providers {
            if let Err(e) = provider.adapter.stop() {
                error!("Failed to stop provider {}: {}", provider.name, e);
            }
            *provider.state.lock()? = ProviderState::Stopped;
            debug!("Stopped provider: {}", provider.name);
        }
        Ok(())
    }

    /// Forwards the market-hours flag to every adapter.
    pub fn set_only_update_when_market_open(&self, only_when_open: bool) {
        for provider in &self.providers {
            provider.adapter.set_only_update_when_market_open(only_when_open);
        }
    }
}
