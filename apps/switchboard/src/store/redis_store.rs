use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use switchboard_common::SessionId;

use super::{Store, StoreFactory};
use crate::error::StoreError;

/// Redis hash holding every key of one session.
fn session_key(session_id: &SessionId) -> String {
    format!("switchboard:session:{session_id}")
}

/// Session store kept in a Redis hash, so any process sharing the Redis
/// instance sees the same session state.
pub struct RedisStore {
    conn: ConnectionManager,
    key: String,
}

#[async_trait]
impl Store for RedisStore {
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(&value)?;
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(&self.key, key, encoded)
            .await
            .map_err(|e| {
                tracing::error!(?e, hash = %self.key, "redis hset failed");
                StoreError::from(e)
            })
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(&self.key, key).await.map_err(|e| {
            tracing::error!(?e, hash = %self.key, "redis hget failed");
            StoreError::from(e)
        })?;
        match raw {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.hexists(&self.key, key).await?)
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.hdel::<_, _, ()>(&self.key, key).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct RedisStoreFactory {
    conn: ConnectionManager,
}

impl RedisStoreFactory {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl StoreFactory for RedisStoreFactory {
    fn create_store(&self, session_id: &SessionId) -> Arc<dyn Store> {
        Arc::new(RedisStore {
            conn: self.conn.clone(),
            key: session_key(session_id),
        })
    }

    async fn release(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(session_key(session_id)).await?;
        Ok(())
    }
}
