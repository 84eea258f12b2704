use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use switchboard_common::SessionId;

use super::{Store, StoreFactory};
use crate::error::StoreError;

// ---------------------------------------------------------------------------
// In-memory implementation (single process / tests)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.data.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.data.lock().get(key).cloned())
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.lock().contains_key(key))
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.data.lock().remove(key);
        Ok(())
    }
}

/// Hands each session its own `MemoryStore`. The store is freed together with
/// the session, so `release` has nothing to do.
#[derive(Default)]
pub struct MemoryStoreFactory;

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoreFactory for MemoryStoreFactory {
    fn create_store(&self, _session_id: &SessionId) -> Arc<dyn Store> {
        Arc::new(MemoryStore::new())
    }

    async fn release(&self, _session_id: &SessionId) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_has_del() {
        let store = MemoryStore::new();
        assert!(!store.has("name").await.unwrap());

        store.set("name", serde_json::json!("alice")).await.unwrap();
        assert!(store.has("name").await.unwrap());
        assert_eq!(store.get("name").await.unwrap(), Some(serde_json::json!("alice")));

        store.del("name").await.unwrap();
        assert_eq!(store.get("name").await.unwrap(), None);
    }

    #[tokio::test]
    async fn factory_isolates_sessions() {
        let factory = MemoryStoreFactory::new();
        let a = factory.create_store(&SessionId::from("a"));
        let b = factory.create_store(&SessionId::from("b"));

        a.set("k", serde_json::json!(1)).await.unwrap();
        assert!(b.get("k").await.unwrap().is_none());
    }
}
