use log::{ debug, info, warn };

use crate::error::{ ChatError, ChatResult };
use crate::models::RoomId;
use crate::store::{ room_name_for, ChatStore, NewRoom };

/// `%` and `_` are escaped so the single `_` between the two ids is the only
/// one left and different pairs never share an id.
fn escape_id(user_id: &str) -> String {
    user_id.replace('%', "%25").replace('_', "%5F")
}

/// The id every client computes for the direct room of two users.
pub fn direct_room_id(user_a: &str, user_b: &str) -> RoomId {
    let (low, high) = if user_a <= user_b { (user_a, user_b) } else { (user_b, user_a) };
    format!("direct_{}_{}", escape_id(low), escape_id(high))
}

fn validate_pair(user_a: &str, user_b: &str) -> ChatResult<()> {
    if user_a.trim().is_empty() || user_b.trim().is_empty() {
        return Err(ChatError::InvalidInput("both user ids are required".to_string()));
    }
    if user_a == user_b {
        return Err(ChatError::InvalidInput("cannot open a conversation with yourself".to_string()));
    }
    Ok(())
}

/// Returns the direct room of the two users, creating it if needed.
///
/// Rooms created before ids were deterministic are found by scanning the
/// caller's direct rooms. New rooms get [`direct_room_id`] and are inserted
/// only if absent, so concurrent callers end up in the same room.
pub async fn find_or_create_direct_room(store: &dyn ChatStore, user_a: &str, user_b: &str) -> ChatResult<RoomId> {
    validate_pair(user_a, user_b)?;

    let existing = store.rooms_for_user(user_a, Some(false)).await?;
    if let Some(room) = existing.iter().find(|r| r.has_participant(user_b)) {
        debug!("Found direct room {} for {} and {}", room.id, user_a, user_b);
        return Ok(room.id.clone());
    }

    let participants = vec![user_a.to_string(), user_b.to_string()];
    let room_id = direct_room_id(user_a, user_b);
    let (room, created) = store.insert_room_if_absent(&room_id, NewRoom {
        room_name: room_name_for(&participants),
        participants,
        is_group: false,
    }).await?;
    if created {
        info!("Created direct room {}", room.id);
    } else if room.is_group || !room.has_participant(user_a) || !room.has_participant(user_b) {
        warn!("Direct room {} does not belong to {} and {}", room.id, user_a, user_b);
        return Err(ChatError::RoomConflict(room.id));
    }
    Ok(room.id)
}

/// Creates a room with a fresh id. More than two participants make it a group.
pub async fn create_room(store: &dyn ChatStore, participants: &[String], room_name: Option<&str>) -> ChatResult<RoomId> {
    let mut members: Vec<String> = Vec::with_capacity(participants.len());
    for p in participants.iter().map(|p| p.trim()) {
        if !p.is_empty() && !members.iter().any(|m| m == p) {
            members.push(p.to_string());
        }
    }
    if members.len() < 2 {
        return Err(ChatError::InvalidInput("a room needs at least two participants".to_string()));
    }

    let room_name = match room_name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => room_name_for(&members),
    };
    let room_id = uuid::Uuid::new_v4().simple().to_string();
    let (room, _) = store.insert_room_if_absent(&room_id, NewRoom {
        is_group: members.len() > 2,
        participants: members,
        room_name,
    }).await?;
    info!("Created room {} ({} participants)", room.id, room.participants.len());
    Ok(room.id)
}
