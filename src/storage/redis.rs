use async_trait::async_trait;
use log::debug;
use redis::aio::MultiplexedConnection;
use redis::{ AsyncCommands, Client };
use std::sync::Arc;
use tokio::sync::Mutex;

use super::LocalStore;
use crate::error::StorageError;

/// Keeps the device keys in Redis so separate CLI runs share one session.
pub struct RedisLocalStore {
    conn: Arc<Mutex<MultiplexedConnection>>,
    key_prefix: String,
}

impl RedisLocalStore {
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self, StorageError> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            key_prefix: key_prefix.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl LocalStore for RedisLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut guard = self.conn.lock().await;
        let value: Option<String> = guard.get(self.key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        debug!("storing local key {}", key);
        let mut guard = self.conn.lock().await;
        guard.set::<_, _, ()>(self.key(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.conn.lock().await;
        guard.del::<_, ()>(self.key(key)).await?;
        Ok(())
    }
}
