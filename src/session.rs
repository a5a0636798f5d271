use log::{ info, warn };
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::api::normalize;
use crate::api::ApiClient;
use crate::error::{ ChatError, ChatResult, StorageError };
use crate::models::{ Role, UserId, UserProfile };
use crate::storage::{
    LocalStore,
    CURRENT_USER_ID_KEY,
    CURRENT_USER_KEY,
    ROLE_KEY,
    TOKEN_KEY,
};

/// Explicit session context: the persisted auth token and the cached identity
/// of whoever is logged in. Handed to the chat service instead of living in a
/// global.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn LocalStore>,
}

impl Session {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub fn local_store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub async fn token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.store.get(TOKEN_KEY).await?.filter(|t| !t.is_empty()))
    }

    pub async fn require_token(&self) -> ChatResult<String> {
        self.token().await?.ok_or(ChatError::Unauthenticated)
    }

    pub async fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.store.set(TOKEN_KEY, token).await
    }

    pub async fn current_user_id(&self) -> Result<Option<UserId>, StorageError> {
        Ok(self.store.get(CURRENT_USER_ID_KEY).await?.filter(|id| !id.trim().is_empty()))
    }

    pub async fn set_current_user_id(&self, user_id: &str) -> Result<(), StorageError> {
        self.store.set(CURRENT_USER_ID_KEY, user_id).await
    }

    pub async fn role(&self) -> Result<Option<Role>, StorageError> {
        let stored = self.store.get(ROLE_KEY).await?;
        Ok(stored.and_then(|r| r.parse().ok()))
    }

    pub async fn set_role(&self, role: Role) -> Result<(), StorageError> {
        self.store.set(ROLE_KEY, role.as_str()).await
    }

    /// The raw `current-user` blob as the backend returned it at login.
    /// A blob that no longer parses is treated as absent.
    pub async fn cached_profile_json(&self) -> Result<Option<JsonValue>, StorageError> {
        let Some(raw) = self.store.get(CURRENT_USER_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Ignoring unreadable cached user profile: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn cached_profile(&self) -> Result<Option<UserProfile>, StorageError> {
        Ok(self.cached_profile_json().await?.as_ref().and_then(normalize::user_record))
    }

    pub async fn set_cached_profile(&self, profile: &JsonValue) -> Result<(), StorageError> {
        self.store.set(CURRENT_USER_KEY, &serde_json::to_string(profile)?).await
    }

    /// Persists everything a successful login yields: token, id, role and the
    /// full profile blob.
    pub async fn store_login(&self, token: &str, profile: &JsonValue) -> ChatResult<()> {
        self.set_token(token).await?;
        if let Some(id) = normalize::extract_user_id(profile) {
            self.set_current_user_id(&id).await?;
        }
        let role = normalize::user_record(profile).map(|p| p.role).unwrap_or_default();
        self.set_role(role).await?;
        self.set_cached_profile(profile).await?;
        Ok(())
    }

    /// Password-grant login followed by a current-user fetch.
    pub async fn login(&self, api: &ApiClient, username: &str, password: &str) -> ChatResult<UserProfile> {
        let token = api.login(username, password).await?;
        let profile = api.current_user_json(&token.access_token).await?;
        self.store_login(&token.access_token, &profile).await?;
        let user = normalize::user_record(&profile).ok_or(ChatError::IdentityNotFound)?;
        info!("Logged in as {} ({})", user.display_name(), user.id);
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), StorageError> {
        for key in [TOKEN_KEY, CURRENT_USER_ID_KEY, ROLE_KEY, CURRENT_USER_KEY] {
            self.store.remove(key).await?;
        }
        info!("Session cleared");
        Ok(())
    }
}
