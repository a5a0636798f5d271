use futures::future::join_all;
use futures::stream::{ BoxStream, StreamExt };
use log::warn;
use std::sync::Arc;

use super::messages::log_errors;
use super::read_state::unread_count;
use crate::api::normalize;
use crate::api::UserDirectory;
use crate::error::ChatResult;
use crate::models::{ ChatRoom, RoomListEntry, UserProfile };
use crate::session::Session;
use crate::store::ChatStore;

/// Everything needed to turn stored rooms into conversation-list rows.
#[derive(Clone)]
pub struct RoomEnricher {
    store: Arc<dyn ChatStore>,
    directory: Arc<dyn UserDirectory>,
    session: Session,
}

impl RoomEnricher {
    pub fn new(store: Arc<dyn ChatStore>, directory: Arc<dyn UserDirectory>, session: Session) -> Self {
        Self { store, directory, session }
    }

    async fn lookup_profile(&self, user_id: &str) -> Option<UserProfile> {
        match self.store.user_profile(user_id).await {
            Ok(Some(profile)) => return Some(profile),
            Ok(None) => {}
            Err(e) => warn!("Profile projection for {} unreadable: {}", user_id, e),
        }

        let token = match self.session.token().await {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cannot read token for profile lookup: {}", e);
                return None;
            }
        };
        match self.directory.user_info(&token, user_id).await {
            Ok(body) => normalize::user_record(&body),
            Err(e) => {
                warn!("Profile lookup for {} failed: {}", user_id, e);
                None
            }
        }
    }

    async fn enrich_room(&self, room: ChatRoom, user_id: &str) -> RoomListEntry {
        let counterpart_id = room.counterpart(user_id).cloned();
        let profile = async {
            match &counterpart_id {
                Some(id) => Some(self.lookup_profile(id).await),
                None => None,
            }
        };
        let unread = async {
            unread_count(self.store.as_ref(), &room.id, user_id).await.unwrap_or_else(|e| {
                warn!("Unread count for {} failed: {}", room.id, e);
                0
            })
        };
        let (profile, unread_count) = futures::join!(profile, unread);

        let (counterpart, profile_fallback) = match (profile, counterpart_id) {
            (Some(Some(p)), _) => (Some(p), false),
            (_, Some(id)) => (Some(UserProfile::placeholder(id)), true),
            (_, None) => (None, false),
        };
        RoomListEntry {
            room,
            counterpart,
            profile_fallback,
            unread_count,
        }
    }

    /// Enriches every room concurrently. Rows keep the order of `rooms`.
    pub async fn enrich(&self, rooms: Vec<ChatRoom>, user_id: &str) -> Vec<RoomListEntry> {
        join_all(rooms.into_iter().map(|room| self.enrich_room(room, user_id))).await
    }

    /// The user's conversation list, rebuilt from scratch on every change.
    pub async fn user_rooms(&self, user_id: &str) -> ChatResult<BoxStream<'static, Vec<RoomListEntry>>> {
        let live = self.store.watch_user_rooms(user_id).await?;
        let enricher = self.clone();
        let user_id = user_id.to_string();
        Ok(
            log_errors(live, "room list")
                .then(move |rooms| {
                    let enricher = enricher.clone();
                    let user_id = user_id.clone();
                    async move { enricher.enrich(rooms, &user_id).await }
                })
                .boxed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::messages::send_message;
    use crate::chat::rooms::find_or_create_direct_room;
    use crate::chat::testing::FakeDirectory;
    use crate::models::MessageType;
    use crate::storage::MemoryLocalStore;
    use crate::store::InMemoryChatStore;
    use serde_json::json;

    async fn setup() -> (Arc<InMemoryChatStore>, RoomEnricher) {
        let store = Arc::new(InMemoryChatStore::new());
        let session = Session::new(Arc::new(MemoryLocalStore::new()));
        session.set_token("tok").await.unwrap();
        let directory = FakeDirectory::failing()
            .with_user("2", json!({"id": 2, "first_name": "Lan", "last_name": "Pham"}))
            .with_user("3", json!({"user_id": "3", "username": "coach_minh"}));
        let enricher = RoomEnricher::new(store.clone(), Arc::new(directory), session);
        (store, enricher)
    }

    #[tokio::test]
    async fn failed_profile_lookup_still_lists_every_room() {
        let (store, enricher) = setup().await;
        for other in ["2", "3", "4"] {
            let room = find_or_create_direct_room(store.as_ref(), "1", other).await.unwrap();
            send_message(store.as_ref(), &room, other, "hello", MessageType::Text).await.unwrap();
        }

        let rooms = store.rooms_for_user("1", None).await.unwrap();
        let rows = enricher.enrich(rooms, "1").await;

        assert_eq!(rows.len(), 3);
        let ids: Vec<_> = rows.iter().map(|r| r.room.id.as_str()).collect();
        assert_eq!(ids, ["direct_1_4", "direct_1_3", "direct_1_2"]);
        assert_eq!(rows.iter().filter(|r| r.profile_fallback).count(), 1);

        let fallback = rows.iter().find(|r| r.profile_fallback).unwrap();
        assert_eq!(fallback.counterpart.as_ref().unwrap().id, "4");
        assert_eq!(fallback.title(), crate::models::user::PLACEHOLDER_NAME);

        assert_eq!(rows[1].title(), "coach_minh");
        assert_eq!(rows[2].title(), "Lan Pham");
        assert!(rows.iter().all(|r| r.unread_count == 1));
    }

    #[tokio::test]
    async fn store_projection_wins_over_the_directory() {
        let (store, enricher) = setup().await;
        let mut cached = UserProfile::placeholder("2");
        cached.first_name = "Cached".into();
        store.put_user_profile(&cached).await.unwrap();
        find_or_create_direct_room(store.as_ref(), "1", "2").await.unwrap();

        let rows = enricher.enrich(store.rooms_for_user("1", None).await.unwrap(), "1").await;
        assert_eq!(rows[0].title(), "Cached");
        assert!(!rows[0].profile_fallback);
    }

    #[tokio::test]
    async fn live_list_picks_up_new_rooms() {
        let (store, enricher) = setup().await;
        let mut live = enricher.user_rooms("1").await.unwrap();
        assert!(live.next().await.unwrap().is_empty());

        find_or_create_direct_room(store.as_ref(), "1", "2").await.unwrap();
        let rows = live.next().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].unread_count, 0);
    }
}
