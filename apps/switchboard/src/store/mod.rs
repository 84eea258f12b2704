//! Session-scoped key/value state.

mod memory;
mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use switchboard_common::SessionId;

use crate::error::StoreError;

pub use self::memory::{MemoryStore, MemoryStoreFactory};
pub use self::redis_store::{RedisStore, RedisStoreFactory};

/// Key/value state belonging to one session.
///
/// Backed by process memory by default and by Redis when sessions must be
/// visible across processes.
#[async_trait]
pub trait Store: Send + Sync {
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn has(&self, key: &str) -> Result<bool, StoreError>;
    async fn del(&self, key: &str) -> Result<(), StoreError>;
}

/// Creates the store of each new session.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Called exactly once, while the session is being constructed.
    fn create_store(&self, session_id: &SessionId) -> Arc<dyn Store>;

    /// Discard everything stored for a session that has been torn down.
    async fn release(&self, session_id: &SessionId) -> Result<(), StoreError>;
}
