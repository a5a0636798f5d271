mod memory;
mod redis;

pub use self::memory::MemoryLocalStore;
pub use self::redis::RedisLocalStore;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;

use crate::cli::Args;
use crate::error::StorageError;

pub const TOKEN_KEY: &str = "token";
pub const CURRENT_USER_ID_KEY: &str = "currentUserId";
pub const ROLE_KEY: &str = "role";
pub const CURRENT_USER_KEY: &str = "current-user";
pub const REMINDERS_KEY: &str = "reminders";
pub const NOTIFICATION_SETTINGS_KEY: &str = "notificationSettings";

/// Device-local string key/value storage.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub async fn create_local_store(args: &Args) -> Result<Arc<dyn LocalStore>, StorageError> {
    match args.storage_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryLocalStore::new())),
        "redis" => {
            let store = RedisLocalStore::connect(&args.storage_redis_url, &args.storage_redis_prefix).await?;
            Ok(Arc::new(store))
        }
        other => Err(StorageError::Unsupported(other.to_string())),
    }
}

pub async fn initialize_local_store(args: &Args) -> Result<Arc<dyn LocalStore>, StorageError> {
    info!("Local storage: {} at {}", args.storage_type, args.storage_redis_url);
    create_local_store(args).await
}
