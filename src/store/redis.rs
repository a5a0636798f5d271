use async_trait::async_trait;
use chrono::{ TimeZone, Utc };
use futures::StreamExt;
use log::{ debug, error };
use redis::aio::MultiplexedConnection;
use redis::{ AsyncCommands, Client, Script };
use serde::{ Deserialize, Serialize };
use std::collections::HashMap;
use std::sync::Arc;

use super::{ new_message_id, new_room_record, snapshot_stream, ChatStore, LiveQuery, NewMessage, NewRoom };
use crate::error::StoreError;
use crate::models::chat::{ sort_messages, sort_rooms_by_activity };
use crate::models::{ ChatRoom, Message, MessageType, Timestamp, UserProfile };

const DOC_FIELD: &str = "doc";
const LAST_READ_PREFIX: &str = "lastReadTime.";

// Prepended to both write scripts. Returns nil when the room has no doc,
// otherwise advances the room's `clock` field to max(TIME, clock + 1).
const ROOM_CLOCK_LUA: &str =
    r"
redis.replicate_commands()
local function advance_clock()
    if redis.call('HEXISTS', KEYS[1], 'doc') == 0 then
        return nil
    end
    local t = redis.call('TIME')
    local now = tonumber(t[1]) * 1000000 + tonumber(t[2])
    local last = tonumber(redis.call('HGET', KEYS[1], 'clock') or '0')
    if now <= last then
        now = last + 1
    end
    local stamp = string.format('%.0f', now)
    redis.call('HSET', KEYS[1], 'clock', stamp)
    return stamp
end
";

// KEYS: room, messages, messages channel, rooms channel
// ARGV: entry, last message text, message id, room id
const APPEND_MESSAGE_LUA: &str =
    r"
local stamp = advance_clock()
if not stamp then
    return false
end
redis.call('ZADD', KEYS[2], stamp, ARGV[1])
redis.call('HSET', KEYS[1], 'lastMessage', ARGV[2], 'lastMessageTime', stamp)
redis.call('PUBLISH', KEYS[3], ARGV[3])
redis.call('PUBLISH', KEYS[4], ARGV[4])
return stamp
";

// KEYS: room, rooms channel
// ARGV: lastReadTime field, room id
const SET_LAST_READ_LUA: &str =
    r"
local stamp = advance_clock()
if not stamp then
    return false
end
redis.call('HSET', KEYS[1], ARGV[1], stamp)
redis.call('PUBLISH', KEYS[2], ARGV[2])
return stamp
";

fn room_script(body: &str) -> Script {
    Script::new(&format!("{}{}", ROOM_CLOCK_LUA, body))
}

/// Chat store on Redis. Rooms are hashes (immutable fields in `doc`, the rest
/// under their document field names, `lastReadTime.<uid>` included),
/// messages live in a sorted set scored by server time, and every write
/// publishes on a channel that live queries listen to.
///
/// Writes that stamp a time run as Lua scripts, so reading `TIME` and the
/// write are one atomic step and a room's clock never goes backwards.
#[derive(Clone)]
pub struct RedisChatStore {
    client: Client,
    conn: MultiplexedConnection,
    key_prefix: String,
    append_script: Arc<Script>,
    last_read_script: Arc<Script>,
}

impl RedisChatStore {
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            client,
            conn,
            key_prefix: key_prefix.to_string(),
            append_script: Arc::new(room_script(APPEND_MESSAGE_LUA)),
            last_read_script: Arc::new(room_script(SET_LAST_READ_LUA)),
        })
    }

    fn get_connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    fn room_key(&self, room_id: &str) -> String {
        format!("{}room:{}", self.key_prefix, room_id)
    }

    fn user_rooms_key(&self, user_id: &str) -> String {
        format!("{}user_rooms:{}", self.key_prefix, user_id)
    }

    fn messages_key(&self, room_id: &str) -> String {
        format!("{}messages:{}", self.key_prefix, room_id)
    }

    fn user_key(&self, user_id: &str) -> String {
        format!("{}user:{}", self.key_prefix, user_id)
    }

    fn rooms_channel(&self) -> String {
        format!("{}events:rooms", self.key_prefix)
    }

    fn messages_channel(&self, room_id: &str) -> String {
        format!("{}events:messages:{}", self.key_prefix, room_id)
    }

    async fn notifications(&self, channel: String) -> Result<futures::stream::BoxStream<'static, ()>, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;
        debug!("listening on {}", channel);
        Ok(pubsub.into_on_message().map(|_| ()).boxed())
    }

    async fn load_room(&self, room_id: &str) -> Result<Option<ChatRoom>, StoreError> {
        let mut conn = self.get_connection();
        let fields: HashMap<String, String> = conn.hgetall(self.room_key(room_id)).await?;
        room_from_fields(room_id, &fields)
    }

    async fn load_user_rooms(&self, user_id: &str, is_group: Option<bool>) -> Result<Vec<ChatRoom>, StoreError> {
        let mut conn = self.get_connection();
        let room_ids: Vec<String> = conn.smembers(self.user_rooms_key(user_id)).await?;
        let mut rooms = Vec::with_capacity(room_ids.len());
        for room_id in &room_ids {
            match self.load_room(room_id).await {
                Ok(Some(room)) if is_group.map_or(true, |g| room.is_group == g) => rooms.push(room),
                Ok(_) => {}
                Err(e) => error!("Skipping unreadable room {}: {}", room_id, e),
            }
        }
        sort_rooms_by_activity(&mut rooms);
        Ok(rooms)
    }

    async fn load_messages(&self, room_id: &str) -> Result<Vec<Message>, StoreError> {
        let mut conn = self.get_connection();
        let entries: Vec<(String, f64)> = conn.zrange_withscores(self.messages_key(room_id), 0, -1).await?;
        let mut messages = Vec::with_capacity(entries.len());
        for (entry, score) in &entries {
            match message_from_entry(room_id, entry, *score) {
                Ok(message) => messages.push(message),
                Err(e) => error!("Error parsing message entry: {}", e),
            }
        }
        sort_messages(&mut messages);
        Ok(messages)
    }
}

/// A sorted-set member. The timestamp is the member's score.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageEntry {
    id: String,
    sender_id: String,
    message: String,
    #[serde(default)]
    message_type: MessageType,
    #[serde(default)]
    is_read: bool,
}

impl MessageEntry {
    fn into_message(self, room_id: &str, timestamp: Timestamp) -> Message {
        Message {
            id: self.id,
            room_id: room_id.to_string(),
            sender_id: self.sender_id,
            message: self.message,
            message_type: self.message_type,
            timestamp,
            is_read: self.is_read,
        }
    }
}

fn message_from_entry(room_id: &str, entry: &str, score: f64) -> Result<Message, StoreError> {
    let parsed: MessageEntry = serde_json::from_str(entry)?;
    let timestamp = from_micros_value(room_id, score as i64)?;
    Ok(parsed.into_message(room_id, timestamp))
}

fn to_micros(ts: Timestamp) -> i64 {
    ts.timestamp_micros()
}

fn from_micros_value(key: &str, micros: i64) -> Result<Timestamp, StoreError> {
    Utc.timestamp_micros(micros)
        .single()
        .ok_or_else(|| corrupt(key, format!("timestamp out of range '{}'", micros)))
}

fn from_micros(key: &str, raw: &str) -> Result<Timestamp, StoreError> {
    let micros: i64 = raw.parse().map_err(|_| corrupt(key, format!("bad timestamp '{}'", raw)))?;
    from_micros_value(key, micros)
}

fn corrupt(key: &str, reason: String) -> StoreError {
    StoreError::Corrupt { key: key.to_string(), reason }
}

/// The immutable part of a room, claimed with a single HSETNX so a room is
/// either fully present or absent.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomDoc {
    participants: Vec<String>,
    room_name: String,
    created_at: i64,
    is_group: bool,
}

fn room_doc(room: &ChatRoom) -> Result<String, StoreError> {
    let doc = RoomDoc {
        participants: room.participants.clone(),
        room_name: room.room_name.clone(),
        created_at: to_micros(room.created_at),
        is_group: room.is_group,
    };
    Ok(serde_json::to_string(&doc)?)
}

fn room_from_fields(room_id: &str, fields: &HashMap<String, String>) -> Result<Option<ChatRoom>, StoreError> {
    let Some(doc) = fields.get(DOC_FIELD) else {
        return Ok(None);
    };
    let doc: RoomDoc = serde_json::from_str(doc)?;
    let created_at = from_micros_value(room_id, doc.created_at)?;
    let last_message_time = fields
        .get("lastMessageTime")
        .map(|raw| from_micros(room_id, raw))
        .transpose()?;

    let mut last_read_time = HashMap::new();
    for (field, raw) in fields {
        if let Some(user) = field.strip_prefix(LAST_READ_PREFIX) {
            last_read_time.insert(user.to_string(), from_micros(room_id, raw)?);
        }
    }

    Ok(
        Some(ChatRoom {
            id: room_id.to_string(),
            participants: doc.participants,
            room_name: doc.room_name,
            created_at,
            last_message: fields.get("lastMessage").cloned(),
            last_message_time,
            is_group: doc.is_group,
            last_read_time,
        })
    )
}

#[async_trait]
impl ChatStore for RedisChatStore {
    async fn server_time(&self) -> Result<Timestamp, StoreError> {
        let mut conn = self.get_connection();
        let (secs, micros): (i64, i64) = redis::cmd("TIME").query_async(&mut conn).await?;
        Utc.timestamp_micros(secs * 1_000_000 + micros)
            .single()
            .ok_or_else(|| corrupt("TIME", "server time out of range".to_string()))
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<ChatRoom>, StoreError> {
        self.load_room(room_id).await
    }

    async fn rooms_for_user(
        &self,
        user_id: &str,
        is_group: Option<bool>
    ) -> Result<Vec<ChatRoom>, StoreError> {
        self.load_user_rooms(user_id, is_group).await
    }

    async fn insert_room_if_absent(
        &self,
        room_id: &str,
        room: NewRoom
    ) -> Result<(ChatRoom, bool), StoreError> {
        let created_at = self.server_time().await?;
        let record = new_room_record(room_id, room, created_at);
        let key = self.room_key(room_id);
        let mut conn = self.get_connection();

        let claimed: bool = conn.hset_nx(&key, DOC_FIELD, room_doc(&record)?).await?;
        if !claimed {
            return match self.load_room(room_id).await? {
                Some(existing) => Ok((existing, false)),
                None => Err(corrupt(&key, "room claimed but unreadable".to_string())),
            };
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for participant in &record.participants {
            pipe.sadd(self.user_rooms_key(participant), room_id).ignore();
        }
        pipe.publish(self.rooms_channel(), room_id).ignore();
        pipe.query_async::<_, ()>(&mut conn).await?;

        debug!("created room {}", room_id);
        Ok((record, true))
    }

    async fn append_message(
        &self,
        room_id: &str,
        message: NewMessage
    ) -> Result<Option<Message>, StoreError> {
        let entry = MessageEntry {
            id: new_message_id(),
            sender_id: message.sender_id,
            message: message.message,
            message_type: message.message_type,
            is_read: false,
        };
        let mut conn = self.get_connection();
        let stamp: Option<String> = self.append_script
            .key(self.room_key(room_id))
            .key(self.messages_key(room_id))
            .key(self.messages_channel(room_id))
            .key(self.rooms_channel())
            .arg(serde_json::to_string(&entry)?)
            .arg(&entry.message)
            .arg(&entry.id)
            .arg(room_id)
            .invoke_async(&mut conn).await?;

        match stamp {
            Some(raw) => Ok(Some(entry.into_message(room_id, from_micros(room_id, &raw)?))),
            None => Ok(None),
        }
    }

    async fn messages(&self, room_id: &str) -> Result<Vec<Message>, StoreError> {
        self.load_messages(room_id).await
    }

    async fn set_last_read(&self, room_id: &str, user_id: &str) -> Result<Option<Timestamp>, StoreError> {
        let mut conn = self.get_connection();
        let stamp: Option<String> = self.last_read_script
            .key(self.room_key(room_id))
            .key(self.rooms_channel())
            .arg(format!("{}{}", LAST_READ_PREFIX, user_id))
            .arg(room_id)
            .invoke_async(&mut conn).await?;

        stamp.map(|raw| from_micros(room_id, &raw)).transpose()
    }

    async fn mark_messages_read(&self, room_id: &str, reader: &str) -> Result<usize, StoreError> {
        let key = self.messages_key(room_id);
        let mut conn = self.get_connection();
        let entries: Vec<(String, f64)> = conn.zrange_withscores(&key, 0, -1).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        let mut updated = 0;
        for (raw, score) in &entries {
            let Ok(mut entry) = serde_json::from_str::<MessageEntry>(raw) else {
                continue;
            };
            if entry.sender_id == reader || entry.is_read {
                continue;
            }
            entry.is_read = true;
            pipe.zrem(&key, raw).ignore();
            pipe.zadd(&key, serde_json::to_string(&entry)?, *score as i64).ignore();
            updated += 1;
        }
        if updated > 0 {
            pipe.publish(self.messages_channel(room_id), "read").ignore();
            pipe.query_async::<_, ()>(&mut conn).await?;
        }
        Ok(updated)
    }

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let mut conn = self.get_connection();
        let raw: Option<String> = conn.get(self.user_key(user_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_user_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let mut conn = self.get_connection();
        conn.set::<_, _, ()>(self.user_key(&profile.id), serde_json::to_string(profile)?).await?;
        Ok(())
    }

    async fn watch_room(&self, room_id: &str) -> Result<LiveQuery<Option<ChatRoom>>, StoreError> {
        let notifications = self.notifications(self.rooms_channel()).await?;
        let store = self.clone();
        let room_id = room_id.to_string();
        Ok(
            snapshot_stream(notifications, move || {
                let store = store.clone();
                let room_id = room_id.clone();
                async move { store.load_room(&room_id).await }
            })
        )
    }

    async fn watch_messages(&self, room_id: &str) -> Result<LiveQuery<Vec<Message>>, StoreError> {
        let notifications = self.notifications(self.messages_channel(room_id)).await?;
        let store = self.clone();
        let room_id = room_id.to_string();
        Ok(
            snapshot_stream(notifications, move || {
                let store = store.clone();
                let room_id = room_id.clone();
                async move { store.load_messages(&room_id).await }
            })
        )
    }

    async fn watch_user_rooms(&self, user_id: &str) -> Result<LiveQuery<Vec<ChatRoom>>, StoreError> {
        let notifications = self.notifications(self.rooms_channel()).await?;
        let store = self.clone();
        let user_id = user_id.to_string();
        Ok(
            snapshot_stream(notifications, move || {
                let store = store.clone();
                let user_id = user_id.clone();
                async move { store.load_user_rooms(&user_id, None).await }
            })
        )
    }
}
