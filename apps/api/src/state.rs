use std::sync::Arc;

use crate::config::Config;
use crate::store::AttendeeStore;
use crate::teammates::ResolverConfig;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// `PgStore` in production, `MemoryStore` in tests.
    pub store: Arc<dyn AttendeeStore>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn AttendeeStore>, config: Config) -> Self {
        Self { store, config }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            throttle: self.config.teammate_throttle,
            lookup_timeout: self.config.teammate_lookup_timeout,
        }
    }
}
