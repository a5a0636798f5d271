use async_trait::async_trait;
use chrono::{ Duration, Utc };
use futures::StreamExt;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{ watch, RwLock };
use tokio_stream::wrappers::WatchStream;

use super::{ new_message_record, new_room_record, snapshot_stream, ChatStore, LiveQuery, NewMessage, NewRoom };
use crate::error::StoreError;
use crate::models::chat::{ sort_messages, sort_rooms_by_activity };
use crate::models::{ ChatRoom, Message, RoomId, Timestamp, UserId, UserProfile };

#[derive(Default)]
struct State {
    rooms: HashMap<RoomId, ChatRoom>,
    messages: HashMap<RoomId, Vec<Message>>,
    users: HashMap<UserId, UserProfile>,
    clock: Option<Timestamp>,
}

impl State {
    /// Server clock: wall time, but never equal to or behind the last reading.
    fn tick(&mut self) -> Timestamp {
        let now = Utc::now();
        let next = match self.clock {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }

    fn rooms_for_user(&self, user_id: &str, is_group: Option<bool>) -> Vec<ChatRoom> {
        let mut rooms: Vec<ChatRoom> = self.rooms
            .values()
            .filter(|r| r.has_participant(user_id))
            .filter(|r| is_group.map_or(true, |g| r.is_group == g))
            .cloned()
            .collect();
        sort_rooms_by_activity(&mut rooms);
        rooms
    }

    fn messages(&self, room_id: &str) -> Vec<Message> {
        self.messages.get(room_id).cloned().unwrap_or_default()
    }
}

struct Inner {
    state: RwLock<State>,
    revision: watch::Sender<u64>,
}

impl Inner {
    fn changed(&self) {
        self.revision.send_modify(|rev| {
            *rev += 1;
        });
    }
}

/// In-process chat store. Every write bumps a revision counter that drives the
/// live queries.
#[derive(Clone)]
pub struct InMemoryChatStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                revision,
            }),
        }
    }

    /// Open live queries on this store.
    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.inner.revision.receiver_count()
    }

    fn live<T, F>(&self, query: F) -> LiveQuery<T>
        where T: PartialEq + Clone + Send + Sync + 'static, F: Fn(&State) -> T + Send + Sync + 'static
    {
        let notifications = WatchStream::from_changes(self.inner.revision.subscribe())
            .map(|_| ())
            .boxed();
        let inner = self.inner.clone();
        let query = Arc::new(query);
        snapshot_stream(notifications, move || {
            let inner = inner.clone();
            let query = query.clone();
            async move {
                let state = inner.state.read().await;
                Ok(query(&*state))
            }
        })
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn server_time(&self) -> Result<Timestamp, StoreError> {
        Ok(self.inner.state.write().await.tick())
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<ChatRoom>, StoreError> {
        Ok(self.inner.state.read().await.rooms.get(room_id).cloned())
    }

    async fn rooms_for_user(
        &self,
        user_id: &str,
        is_group: Option<bool>
    ) -> Result<Vec<ChatRoom>, StoreError> {
        Ok(self.inner.state.read().await.rooms_for_user(user_id, is_group))
    }

    async fn insert_room_if_absent(
        &self,
        room_id: &str,
        room: NewRoom
    ) -> Result<(ChatRoom, bool), StoreError> {
        let mut state = self.inner.state.write().await;
        if let Some(existing) = state.rooms.get(room_id) {
            return Ok((existing.clone(), false));
        }
        let created_at = state.tick();
        let record = new_room_record(room_id, room, created_at);
        state.rooms.insert(room_id.to_string(), record.clone());
        drop(state);

        debug!("created room {}", room_id);
        self.inner.changed();
        Ok((record, true))
    }

    async fn append_message(
        &self,
        room_id: &str,
        message: NewMessage
    ) -> Result<Option<Message>, StoreError> {
        let mut state = self.inner.state.write().await;
        if !state.rooms.contains_key(room_id) {
            return Ok(None);
        }
        let timestamp = state.tick();
        let record = new_message_record(&room_id.to_string(), message, timestamp);

        let messages = state.messages.entry(room_id.to_string()).or_default();
        messages.push(record.clone());
        sort_messages(messages);
        if let Some(room) = state.rooms.get_mut(room_id) {
            room.last_message = Some(record.message.clone());
            room.last_message_time = Some(timestamp);
        }
        drop(state);

        self.inner.changed();
        Ok(Some(record))
    }

    async fn messages(&self, room_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self.inner.state.read().await.messages(room_id))
    }

    async fn set_last_read(&self, room_id: &str, user_id: &str) -> Result<Option<Timestamp>, StoreError> {
        let mut state = self.inner.state.write().await;
        if !state.rooms.contains_key(room_id) {
            return Ok(None);
        }
        let now = state.tick();
        if let Some(room) = state.rooms.get_mut(room_id) {
            room.last_read_time.insert(user_id.to_string(), now);
        }
        drop(state);

        self.inner.changed();
        Ok(Some(now))
    }

    async fn mark_messages_read(&self, room_id: &str, reader: &str) -> Result<usize, StoreError> {
        let mut state = self.inner.state.write().await;
        let mut updated = 0;
        if let Some(messages) = state.messages.get_mut(room_id) {
            for message in messages.iter_mut().filter(|m| m.sender_id != reader && !m.is_read) {
                message.is_read = true;
                updated += 1;
            }
        }
        drop(state);

        if updated > 0 {
            self.inner.changed();
        }
        Ok(updated)
    }

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.inner.state.read().await.users.get(user_id).cloned())
    }

    async fn put_user_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.inner.state.write().await.users.insert(profile.id.clone(), profile.clone());
        self.inner.changed();
        Ok(())
    }

    async fn watch_room(&self, room_id: &str) -> Result<LiveQuery<Option<ChatRoom>>, StoreError> {
        let room_id = room_id.to_string();
        Ok(self.live(move |state| state.rooms.get(&room_id).cloned()))
    }

    async fn watch_messages(&self, room_id: &str) -> Result<LiveQuery<Vec<Message>>, StoreError> {
        let room_id = room_id.to_string();
        Ok(self.live(move |state| state.messages(&room_id)))
    }

    async fn watch_user_rooms(&self, user_id: &str) -> Result<LiveQuery<Vec<ChatRoom>>, StoreError> {
        let user_id = user_id.to_string();
        Ok(self.live(move |state| state.rooms_for_user(&user_id, None)))
    }
}
