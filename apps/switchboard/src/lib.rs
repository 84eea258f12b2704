pub mod ack;
pub mod config;
pub mod error;
pub mod gateway;
pub mod namespace;
pub mod routes;
pub mod session;
pub mod store;

use std::sync::Arc;

use ack::{AckCorrelator, AckManager};
use config::Config;
use gateway::registry::SessionRegistry;
use namespace::NamespaceRegistry;
use store::StoreFactory;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub namespaces: Arc<NamespaceRegistry>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    /// Wire up the registries. Every namespace in `config` is created up front.
    pub fn new(config: Config, store_factory: Arc<dyn StoreFactory>) -> Self {
        let ack: Arc<dyn AckCorrelator> = Arc::new(AckManager::new());
        let namespaces = NamespaceRegistry::new();
        for name in &config.namespaces {
            namespaces.create(name);
        }
        Self {
            config: Arc::new(config),
            namespaces: Arc::new(namespaces),
            sessions: SessionRegistry::new(ack, store_factory),
        }
    }
}
