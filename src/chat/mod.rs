pub mod identity;
pub mod messages;
pub mod read_state;
pub mod room_list;
pub mod rooms;
pub mod subscription;
pub mod timeline;

pub use self::subscription::Subscription;
pub use self::timeline::{ OptimisticTimeline, TimelineEntry, TimelineError };

use futures::stream::BoxStream;
use std::sync::Arc;

use self::room_list::RoomEnricher;
use self::subscription::spawn_subscription;
use crate::api::UserDirectory;
use crate::error::ChatResult;
use crate::models::{ Message, MessageType, RoomId, RoomListEntry, Timestamp, UserId };
use crate::session::Session;
use crate::store::ChatStore;

/// Entry point of the chat feature. Owns the session, the realtime store and
/// the user directory; screens call into this and nothing else.
#[derive(Clone)]
pub struct ChatService {
    session: Session,
    store: Arc<dyn ChatStore>,
    rooms: RoomEnricher,
    directory: Arc<dyn UserDirectory>,
}

impl ChatService {
    pub fn new(session: Session, store: Arc<dyn ChatStore>, directory: Arc<dyn UserDirectory>) -> Self {
        let rooms = RoomEnricher::new(store.clone(), directory.clone(), session.clone());
        Self {
            session,
            store,
            rooms,
            directory,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub async fn current_user_id(&self) -> ChatResult<UserId> {
        identity::resolve_current_user_id(&self.session, self.directory.as_ref()).await
    }

    pub async fn find_or_create_direct_room(&self, user_a: &str, user_b: &str) -> ChatResult<RoomId> {
        rooms::find_or_create_direct_room(self.store.as_ref(), user_a, user_b).await
    }

    /// The direct room between the logged-in user and `other`.
    pub async fn open_direct_room(&self, other: &str) -> ChatResult<RoomId> {
        let me = self.current_user_id().await?;
        self.find_or_create_direct_room(&me, other).await
    }

    pub async fn create_room(&self, participants: &[UserId], room_name: Option<&str>) -> ChatResult<RoomId> {
        rooms::create_room(self.store.as_ref(), participants, room_name).await
    }

    pub async fn messages(&self, room_id: &str) -> ChatResult<BoxStream<'static, Vec<Message>>> {
        messages::messages(self.store.as_ref(), room_id).await
    }

    pub async fn subscribe_messages<F>(&self, room_id: &str, on_update: F) -> ChatResult<Subscription>
        where F: FnMut(Vec<Message>) + Send + 'static
    {
        Ok(spawn_subscription(self.messages(room_id).await?, on_update))
    }

    pub async fn send_message(&self, room_id: &str, sender_id: &str, body: &str) -> ChatResult<Message> {
        self.send_message_with_type(room_id, sender_id, body, MessageType::Text).await
    }

    pub async fn send_message_with_type(
        &self,
        room_id: &str,
        sender_id: &str,
        body: &str,
        message_type: MessageType
    ) -> ChatResult<Message> {
        messages::send_message(self.store.as_ref(), room_id, sender_id, body, message_type).await
    }

    pub async fn send_optimistic(
        &self,
        timeline: &mut OptimisticTimeline,
        room_id: &str,
        sender_id: &str,
        body: &str
    ) -> ChatResult<Message> {
        messages::send_optimistic(self.store.as_ref(), timeline, room_id, sender_id, body).await
    }

    pub async fn mark_read(&self, room_id: &str, user_id: &str) -> ChatResult<Timestamp> {
        read_state::mark_read(self.store.as_ref(), room_id, user_id).await
    }

    pub async fn mark_messages_as_read(&self, room_id: &str, user_id: &str) -> ChatResult<usize> {
        read_state::mark_messages_as_read(self.store.as_ref(), room_id, user_id).await
    }

    pub async fn unread_count(&self, room_id: &str, user_id: &str) -> ChatResult<usize> {
        read_state::unread_count(self.store.as_ref(), room_id, user_id).await
    }

    pub async fn unread_counts(&self, room_id: &str, user_id: &str) -> ChatResult<BoxStream<'static, usize>> {
        read_state::unread_counts(self.store.clone(), room_id, user_id).await
    }

    pub async fn subscribe_unread_count<F>(&self, room_id: &str, user_id: &str, on_update: F) -> ChatResult<Subscription>
        where F: FnMut(usize) + Send + 'static
    {
        Ok(spawn_subscription(self.unread_counts(room_id, user_id).await?, on_update))
    }

    pub async fn user_rooms(&self, user_id: &str) -> ChatResult<BoxStream<'static, Vec<RoomListEntry>>> {
        self.rooms.user_rooms(user_id).await
    }

    pub async fn subscribe_user_rooms<F>(&self, user_id: &str, on_update: F) -> ChatResult<Subscription>
        where F: FnMut(Vec<RoomListEntry>) + Send + 'static
    {
        Ok(spawn_subscription(self.user_rooms(user_id).await?, on_update))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeDirectory;
    use super::*;
    use crate::storage::MemoryLocalStore;
    use crate::store::InMemoryChatStore;
    use serde_json::json;
    use tokio::sync::mpsc;

    async fn service_on(store: Arc<InMemoryChatStore>) -> ChatService {
        let session = Session::new(Arc::new(MemoryLocalStore::new()));
        session.store_login("tok", &json!({"id": 1, "first_name": "Hoa"})).await.unwrap();
        let directory = FakeDirectory::with_current_user(json!({"id": 1}))
            .with_user("2", json!({"id": 2, "first_name": "Lan"}));
        ChatService::new(session, store, Arc::new(directory))
    }

    async fn service() -> ChatService {
        service_on(Arc::new(InMemoryChatStore::new())).await
    }

    #[tokio::test]
    async fn conversation_round_trip() {
        let chat = service().await;
        let room = chat.open_direct_room("2").await.unwrap();
        assert_eq!(room, "direct_1_2");

        chat.send_message(&room, "2", "chào bạn").await.unwrap();
        assert_eq!(chat.unread_count(&room, "1").await.unwrap(), 1);

        let rows = futures::StreamExt::next(&mut chat.user_rooms("1").await.unwrap()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title(), "Lan");
        assert_eq!(rows[0].unread_count, 1);

        chat.mark_read(&room, "1").await.unwrap();
        assert_eq!(chat.unread_count(&room, "1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn one_shot_unread_count_leaves_nothing_listening() {
        let store = Arc::new(InMemoryChatStore::new());
        let chat = service_on(store.clone()).await;
        let room = chat.open_direct_room("2").await.unwrap();
        chat.send_message(&room, "2", "a").await.unwrap();
        chat.send_message(&room, "2", "b").await.unwrap();

        assert_eq!(chat.unread_count(&room, "1").await.unwrap(), 2);
        assert_eq!(chat.unread_count("direct_1_9", "1").await.unwrap(), 0);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn unread_subscription_reports_changes() {
        let chat = service().await;
        let room = chat.open_direct_room("2").await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = chat
            .subscribe_unread_count(&room, "1", move |count| {
                let _ = tx.send(count);
            }).await
            .unwrap();
        assert_eq!(rx.recv().await, Some(0));

        chat.send_message(&room, "2", "ping").await.unwrap();
        assert_eq!(rx.recv().await, Some(1));
        assert!(sub.is_active());
    }
}
