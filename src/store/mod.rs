mod memory;
mod redis;

pub use self::memory::InMemoryChatStore;
pub use self::redis::RedisChatStore;

use async_trait::async_trait;
use futures::stream::{ self, BoxStream, StreamExt };
use futures::Future;
use log::info;
use std::sync::Arc;

use crate::cli::Args;
use crate::error::StoreError;
use crate::models::{ ChatRoom, Message, MessageType, RoomId, Timestamp, UserId, UserProfile };

/// A live query: the full current result, then the full result again after
/// every change. Dropping the stream releases the listener.
pub type LiveQuery<T> = BoxStream<'static, Result<T, StoreError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub participants: Vec<UserId>,
    pub room_name: String,
    pub is_group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub message: String,
    pub message_type: MessageType,
}

/// The realtime document store behind the chat: `chatRooms`, their
/// `messages` subcollections and the `users` profile projections. All
/// timestamps are assigned by the store.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn server_time(&self) -> Result<Timestamp, StoreError>;

    async fn get_room(&self, room_id: &str) -> Result<Option<ChatRoom>, StoreError>;

    /// Rooms the user participates in, newest activity first. `is_group`
    /// narrows the result to group or direct rooms.
    async fn rooms_for_user(
        &self,
        user_id: &str,
        is_group: Option<bool>
    ) -> Result<Vec<ChatRoom>, StoreError>;

    /// Atomically creates the room unless one with this id exists. Returns the
    /// stored room and whether this call created it.
    async fn insert_room_if_absent(
        &self,
        room_id: &str,
        room: NewRoom
    ) -> Result<(ChatRoom, bool), StoreError>;

    /// Appends a message and updates the room's last-message summary in one
    /// atomic step. `None` when the room does not exist.
    async fn append_message(
        &self,
        room_id: &str,
        message: NewMessage
    ) -> Result<Option<Message>, StoreError>;

    /// Messages ordered by ascending server timestamp.
    async fn messages(&self, room_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Writes the current server time as the user's read watermark.
    /// `None` when the room does not exist.
    async fn set_last_read(&self, room_id: &str, user_id: &str) -> Result<Option<Timestamp>, StoreError>;

    /// Sets the legacy per-message read flag on everything `reader` did not send.
    async fn mark_messages_read(&self, room_id: &str, reader: &str) -> Result<usize, StoreError>;

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn put_user_profile(&self, profile: &UserProfile) -> Result<(), StoreError>;

    async fn watch_room(&self, room_id: &str) -> Result<LiveQuery<Option<ChatRoom>>, StoreError>;

    async fn watch_messages(&self, room_id: &str) -> Result<LiveQuery<Vec<Message>>, StoreError>;

    async fn watch_user_rooms(&self, user_id: &str) -> Result<LiveQuery<Vec<ChatRoom>>, StoreError>;
}

pub async fn create_chat_store(args: &Args) -> Result<Arc<dyn ChatStore>, StoreError> {
    match args.chat_store_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemoryChatStore::new())),
        "redis" => {
            let store = RedisChatStore::connect(&args.chat_store_url, &args.chat_store_prefix).await?;
            Ok(Arc::new(store))
        }
        other => Err(StoreError::Unsupported(other.to_string())),
    }
}

pub async fn initialize_chat_store(args: &Args) -> Result<Arc<dyn ChatStore>, StoreError> {
    info!("Chat rooms will be stored in: {} at {}", args.chat_store_type, args.chat_store_url);
    create_chat_store(args).await
}

struct SnapshotState<F, T> {
    notifications: BoxStream<'static, ()>,
    fetch: F,
    last: Option<T>,
    primed: bool,
}

/// Turns change notifications into a stream of query snapshots: one right
/// away, then one per notification whose result differs from the last one
/// emitted. Subscribe to `notifications` before calling this so no change
/// between subscription and the first fetch is lost.
pub(crate) fn snapshot_stream<T, F, Fut>(notifications: BoxStream<'static, ()>, fetch: F) -> LiveQuery<T>
    where
        T: PartialEq + Clone + Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static
{
    let state = SnapshotState {
        notifications,
        fetch,
        last: None,
        primed: false,
    };

    stream
        ::unfold(state, |mut st| async move {
            loop {
                if st.primed && st.notifications.next().await.is_none() {
                    return None;
                }
                st.primed = true;
                match (st.fetch)().await {
                    Ok(snapshot) => {
                        if st.last.as_ref() == Some(&snapshot) {
                            continue;
                        }
                        st.last = Some(snapshot.clone());
                        return Some((Ok(snapshot), st));
                    }
                    Err(e) => {
                        return Some((Err(e), st));
                    }
                }
            }
        })
        .boxed()
}

pub fn room_name_for(participants: &[UserId]) -> String {
    format!("Chat {}", participants.join(", "))
}

pub(crate) fn new_room_record(room_id: &str, room: NewRoom, created_at: Timestamp) -> ChatRoom {
    ChatRoom {
        id: room_id.to_string(),
        participants: room.participants,
        room_name: room.room_name,
        created_at,
        last_message: None,
        last_message_time: None,
        is_group: room.is_group,
        last_read_time: Default::default(),
    }
}

pub(crate) fn new_message_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub(crate) fn new_message_record(room_id: &RoomId, message: NewMessage, timestamp: Timestamp) -> Message {
    Message {
        id: new_message_id(),
        room_id: room_id.clone(),
        sender_id: message.sender_id,
        message: message.message,
        message_type: message.message_type,
        timestamp,
        is_read: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    #[tokio::test]
    async fn emits_initial_snapshot_then_only_changes() {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let counter = Arc::new(AtomicUsize::new(0));
        let source = counter.clone();
        let mut live = snapshot_stream(UnboundedReceiverStream::new(rx).boxed(), move || {
            let value = source.load(Ordering::SeqCst);
            async move { Ok::<_, StoreError>(value) }
        });

        assert_eq!(live.next().await.unwrap().unwrap(), 0);

        tx.send(()).unwrap();
        counter.store(2, Ordering::SeqCst);
        tx.send(()).unwrap();
        assert_eq!(live.next().await.unwrap().unwrap(), 2);

        drop(tx);
        assert!(live.next().await.is_none());
    }
}
