//! Application-defined channels a connection can join.
//!
//! The session layer only tracks membership; what a namespace does with its
//! clients lives behind [`NamespaceListener`].

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::gateway::packet::ROOT_NAMESPACE;
use crate::session::NamespaceClient;

/// Hooks a namespace runs as clients come, go, and emit events.
///
/// Errors are logged by the namespace and never stop delivery to other
/// listeners or other clients.
pub trait NamespaceListener: Send + Sync {
    fn on_connect(&self, _client: &NamespaceClient) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_disconnect(&self, _client: &NamespaceClient) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_event(
        &self,
        _client: &NamespaceClient,
        _event: &str,
        _data: &Value,
        _ack_id: Option<u64>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct Namespace {
    name: String,
    listeners: RwLock<Vec<Arc<dyn NamespaceListener>>>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_listener(&self, listener: Arc<dyn NamespaceListener>) {
        self.listeners.write().push(listener);
    }

    pub fn notify_connect(&self, client: &NamespaceClient) {
        for listener in self.snapshot() {
            if let Err(err) = listener.on_connect(client) {
                tracing::warn!(
                    namespace = %self.name,
                    session_id = %client.session_id(),
                    ?err,
                    "connect listener failed"
                );
            }
        }
    }

    pub fn notify_disconnect(&self, client: &NamespaceClient) {
        for listener in self.snapshot() {
            if let Err(err) = listener.on_disconnect(client) {
                tracing::warn!(
                    namespace = %self.name,
                    session_id = %client.session_id(),
                    ?err,
                    "disconnect listener failed"
                );
            }
        }
    }

    pub fn dispatch_event(
        &self,
        client: &NamespaceClient,
        event: &str,
        data: &Value,
        ack_id: Option<u64>,
    ) {
        for listener in self.snapshot() {
            if let Err(err) = listener.on_event(client, event, data, ack_id) {
                tracing::warn!(
                    namespace = %self.name,
                    session_id = %client.session_id(),
                    event,
                    ?err,
                    "event listener failed"
                );
            }
        }
    }

    // Hooks run without the lock held so they may register more listeners.
    fn snapshot(&self) -> Vec<Arc<dyn NamespaceListener>> {
        self.listeners.read().clone()
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

/// All namespaces known to the server. The root namespace always exists.
pub struct NamespaceRegistry {
    namespaces: DashMap<String, Arc<Namespace>>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        let namespaces = DashMap::new();
        namespaces.insert(
            ROOT_NAMESPACE.to_string(),
            Arc::new(Namespace::new(ROOT_NAMESPACE)),
        );
        Self { namespaces }
    }

    /// Get or create the namespace called `name`.
    pub fn create(&self, name: &str) -> Arc<Namespace> {
        self.namespaces
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Namespace::new(name)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Namespace>> {
        self.namespaces.get(name).map(|entry| entry.value().clone())
    }

    /// Sorted namespace names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_starts_with_root() {
        let registry = NamespaceRegistry::new();
        assert!(registry.get("/").is_some());
        assert!(registry.get("/chat").is_none());
        assert_eq!(registry.names(), vec!["/"]);
    }

    #[test]
    fn create_is_idempotent() {
        let registry = NamespaceRegistry::new();
        let a = registry.create("/chat");
        let b = registry.create("/chat");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.names(), vec!["/", "/chat"]);
    }
}
