pub mod chat;
pub mod health;
pub mod reminder;
pub mod user;

pub use chat::{ ChatRoom, Message, MessageType, RoomId, RoomListEntry, Timestamp };
pub use reminder::{ NotificationSettings, Reminder };
pub use user::{ Role, UserId, UserProfile };
