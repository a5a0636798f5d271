use log::{ debug, info };

use crate::api::normalize;
use crate::api::UserDirectory;
use crate::error::{ ChatError, ChatResult };
use crate::models::UserId;
use crate::session::Session;

/// Who is logged in on this device, as a backend user id.
///
/// The persisted `currentUserId` wins. Without it the backend's current-user
/// endpoint is asked once, then the cached profile blob; a found id is
/// persisted for next time. Remote failures propagate as they are.
pub async fn resolve_current_user_id(session: &Session, directory: &dyn UserDirectory) -> ChatResult<UserId> {
    if let Some(id) = session.current_user_id().await? {
        return Ok(id);
    }

    let Some(token) = session.token().await? else {
        debug!("No stored token, cannot resolve the current user");
        return Err(ChatError::IdentityNotFound);
    };

    let profile = directory.current_user(&token).await?;
    if let Some(id) = normalize::extract_user_id(&profile) {
        info!("Resolved current user {} from the backend", id);
        session.set_current_user_id(&id).await?;
        return Ok(id);
    }

    let cached = session.cached_profile_json().await?;
    if let Some(id) = cached.as_ref().and_then(normalize::extract_user_id) {
        info!("Resolved current user {} from the cached profile", id);
        session.set_current_user_id(&id).await?;
        return Ok(id);
    }

    Err(ChatError::IdentityNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::FakeDirectory;
    use crate::storage::{ MemoryLocalStore, CURRENT_USER_KEY };
    use serde_json::json;
    use std::sync::Arc;

    fn session() -> Session {
        Session::new(Arc::new(MemoryLocalStore::new()))
    }

    #[tokio::test]
    async fn persisted_id_skips_the_network() {
        let session = session();
        session.set_current_user_id("9").await.unwrap();
        let directory = FakeDirectory::failing();

        let id = resolve_current_user_id(&session, &directory).await.expect("persisted id");
        assert_eq!(id, "9");
        assert_eq!(directory.current_user_calls(), 0);
    }

    #[tokio::test]
    async fn numeric_backend_id_is_stringified_and_cached() {
        let session = session();
        session.set_token("tok").await.unwrap();
        let directory = FakeDirectory::with_current_user(json!({"id": 42, "username": "an"}));

        assert_eq!(resolve_current_user_id(&session, &directory).await.unwrap(), "42");
        assert_eq!(session.current_user_id().await.unwrap().as_deref(), Some("42"));

        assert_eq!(resolve_current_user_id(&session, &directory).await.unwrap(), "42");
        assert_eq!(directory.current_user_calls(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_the_cached_profile() {
        let session = session();
        session.set_token("tok").await.unwrap();
        session.local_store().set(CURRENT_USER_KEY, r#"{"pk": "17"}"#).await.unwrap();
        let directory = FakeDirectory::with_current_user(json!({"detail": "ok"}));

        assert_eq!(resolve_current_user_id(&session, &directory).await.unwrap(), "17");
    }

    #[tokio::test]
    async fn no_token_and_no_id_is_not_found() {
        let err = resolve_current_user_id(&session(), &FakeDirectory::failing())
            .await
            .expect_err("nothing to resolve from");
        assert!(matches!(err, ChatError::IdentityNotFound));
    }

    #[tokio::test]
    async fn remote_failure_propagates() {
        let session = session();
        session.set_token("tok").await.unwrap();
        let err = resolve_current_user_id(&session, &FakeDirectory::failing())
            .await
            .expect_err("directory is down");
        assert!(matches!(err, ChatError::Api(_)));
    }
}
