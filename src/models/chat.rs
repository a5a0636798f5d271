use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::user::{ UserId, UserProfile };

pub type RoomId = String;
pub type Timestamp = DateTime<Utc>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
        };
        f.write_str(s)
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "file" => Ok(MessageType::File),
            other => Err(format!("Unknown message type: '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: RoomId,
    pub participants: Vec<UserId>,
    pub room_name: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<Timestamp>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub last_read_time: HashMap<UserId, Timestamp>,
}

impl ChatRoom {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The other side of a direct room. `None` for group rooms.
    pub fn counterpart(&self, user_id: &str) -> Option<&UserId> {
        if self.is_group {
            return None;
        }
        self.participants.iter().find(|p| p.as_str() != user_id)
    }

    pub fn watermark(&self, user_id: &str) -> Option<Timestamp> {
        self.last_read_time.get(user_id).copied()
    }
}

/// Newest conversation first; rooms that never saw a message go last.
pub fn sort_rooms_by_activity(rooms: &mut [ChatRoom]) {
    rooms.sort_by(|a, b| {
        match (a.last_message_time, b.last_message_time) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.created_at.cmp(&a.created_at),
        }.then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub message: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub is_read: bool,
}

pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
}

/// A room as shown in the conversation list.
#[derive(Clone, Debug, PartialEq)]
pub struct RoomListEntry {
    pub room: ChatRoom,
    pub counterpart: Option<UserProfile>,
    pub profile_fallback: bool,
    pub unread_count: usize,
}

impl RoomListEntry {
    pub fn title(&self) -> String {
        match &self.counterpart {
            Some(profile) => profile.display_name(),
            None => self.room.room_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn room(id: &str, created: i64, last: Option<i64>) -> ChatRoom {
        ChatRoom {
            id: id.into(),
            participants: vec!["1".into(), "2".into()],
            room_name: format!("Chat {}", id),
            created_at: Utc.timestamp_opt(created, 0).unwrap(),
            last_message: None,
            last_message_time: last.map(|t| Utc.timestamp_opt(t, 0).unwrap()),
            is_group: false,
            last_read_time: HashMap::new(),
        }
    }

    #[test]
    fn orders_rooms_newest_message_first() {
        let mut rooms = vec![room("a", 10, Some(100)), room("b", 50, None), room("c", 20, Some(300))];
        sort_rooms_by_activity(&mut rooms);
        let ids: Vec<_> = rooms.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn counterpart_is_the_other_participant() {
        let r = room("a", 0, None);
        assert_eq!(r.counterpart("1").map(String::as_str), Some("2"));
        assert_eq!(r.counterpart("2").map(String::as_str), Some("1"));

        let mut group = r.clone();
        group.is_group = true;
        assert_eq!(group.counterpart("1"), None);
    }

    #[test]
    fn room_json_uses_store_field_names() {
        let json = serde_json::to_value(room("a", 0, Some(5))).unwrap();
        assert!(json.get("roomName").is_some());
        assert!(json.get("lastMessageTime").is_some());
        assert!(json.get("lastReadTime").is_some());
        assert!(json.get("isGroup").is_some());
    }
}
