use futures::stream::{ BoxStream, StreamExt };
use log::{ debug, error };
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{ ChatError, ChatResult };
use crate::models::{ Message, Timestamp };
use crate::store::{ ChatStore, LiveQuery };

/// Messages from others the user has not seen: everything after the read
/// watermark, or everything when there is none.
pub fn count_unread(messages: &[Message], user_id: &str, watermark: Option<Timestamp>) -> usize {
    messages
        .iter()
        .filter(|m| m.sender_id != user_id)
        .filter(|m| watermark.map_or(true, |w| m.timestamp > w))
        .count()
}

/// Moves the user's read watermark to the store's current time.
pub async fn mark_read(store: &dyn ChatStore, room_id: &str, user_id: &str) -> ChatResult<Timestamp> {
    let at = store
        .set_last_read(room_id, user_id).await?
        .ok_or_else(|| ChatError::NotFound(format!("room {}", room_id)))?;
    debug!("{} read {} up to {}", user_id, room_id, at);
    Ok(at)
}

pub async fn unread_count(store: &dyn ChatStore, room_id: &str, user_id: &str) -> ChatResult<usize> {
    let Some(room) = store.get_room(room_id).await? else {
        return Ok(0);
    };
    let messages = store.messages(room_id).await?;
    Ok(count_unread(&messages, user_id, room.watermark(user_id)))
}

/// Sets the per-message read flag. Kept for older clients; unread counts
/// only look at the watermark.
pub async fn mark_messages_as_read(store: &dyn ChatStore, room_id: &str, user_id: &str) -> ChatResult<usize> {
    Ok(store.mark_messages_read(room_id, user_id).await?)
}

async fn next_snapshot(inner: &mut Option<LiveQuery<Vec<Message>>>) -> Option<ChatResult<Vec<Message>>> {
    match inner {
        Some(live) => live.next().await.map(|r| r.map_err(ChatError::from)),
        None => futures::future::pending().await,
    }
}

/// Live unread count for one user in one room.
///
/// The room's watermark is watched; every time it moves the message query is
/// dropped and reopened against the new watermark. Only changed counts are
/// emitted. Dropping the stream stops the background task.
pub async fn unread_counts(
    store: Arc<dyn ChatStore>,
    room_id: &str,
    user_id: &str
) -> ChatResult<BoxStream<'static, usize>> {
    let mut rooms = store.watch_room(room_id).await?;
    let room_id = room_id.to_string();
    let user_id = user_id.to_string();
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut watermark: Option<Option<Timestamp>> = None;
        let mut inner: Option<LiveQuery<Vec<Message>>> = None;
        let mut last_count: Option<usize> = None;

        loop {
            tokio::select! {
                room = rooms.next() => {
                    let room = match room {
                        Some(Ok(room)) => room,
                        Some(Err(e)) => {
                            error!("Watching room {} failed: {}", room_id, e);
                            continue;
                        }
                        None => break,
                    };
                    let mark = room.as_ref().and_then(|r| r.watermark(&user_id));
                    if watermark == Some(mark) {
                        continue;
                    }
                    watermark = Some(mark);
                    inner = None;
                    match store.watch_messages(&room_id).await {
                        Ok(live) => {
                            inner = Some(live);
                        }
                        Err(e) => error!("Watching messages of {} failed: {}", room_id, e),
                    }
                }
                snapshot = next_snapshot(&mut inner) => {
                    match snapshot {
                        Some(Ok(messages)) => {
                            let count = count_unread(&messages, &user_id, watermark.flatten());
                            if last_count == Some(count) {
                                continue;
                            }
                            last_count = Some(count);
                            if tx.send(count).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => error!("Message snapshot for {} failed: {}", room_id, e),
                        None => {
                            inner = None;
                        }
                    }
                }
                _ = tx.closed() => break,
            }
        }
        debug!("Stopped unread counter for {} in {}", user_id, room_id);
    });

    Ok(ReceiverStream::new(rx).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::messages::send_message;
    use crate::models::MessageType;
    use crate::store::{ InMemoryChatStore, NewRoom };

    async fn store_with_room() -> Arc<InMemoryChatStore> {
        let store = Arc::new(InMemoryChatStore::new());
        store
            .insert_room_if_absent("direct_1_2", NewRoom {
                participants: vec!["1".into(), "2".into()],
                room_name: "Chat 1, 2".into(),
                is_group: false,
            }).await
            .unwrap();
        store
    }

    async fn send(store: &InMemoryChatStore, sender: &str, body: &str) {
        send_message(store, "direct_1_2", sender, body, MessageType::Text).await.unwrap();
    }

    #[tokio::test]
    async fn nothing_is_unread_right_after_mark_read() {
        let store = store_with_room().await;
        send(&store, "2", "a").await;
        send(&store, "2", "b").await;
        assert_eq!(unread_count(store.as_ref(), "direct_1_2", "1").await.unwrap(), 2);

        mark_read(store.as_ref(), "direct_1_2", "1").await.unwrap();
        assert_eq!(unread_count(store.as_ref(), "direct_1_2", "1").await.unwrap(), 0);

        send(&store, "2", "c").await;
        send(&store, "2", "d").await;
        send(&store, "2", "e").await;
        assert_eq!(unread_count(store.as_ref(), "direct_1_2", "1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn own_messages_are_never_unread() {
        let store = store_with_room().await;
        send(&store, "1", "mine").await;
        send(&store, "1", "also mine").await;
        assert_eq!(unread_count(store.as_ref(), "direct_1_2", "1").await.unwrap(), 0);
        assert_eq!(unread_count(store.as_ref(), "direct_1_2", "2").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_rooms_count_zero_but_cannot_be_marked() {
        let store = InMemoryChatStore::new();
        assert_eq!(unread_count(&store, "ghost", "1").await.unwrap(), 0);
        assert!(matches!(mark_read(&store, "ghost", "1").await, Err(ChatError::NotFound(_))));
    }

    #[tokio::test]
    async fn legacy_flag_leaves_the_count_alone() {
        let store = store_with_room().await;
        send(&store, "2", "a").await;
        assert_eq!(mark_messages_as_read(store.as_ref(), "direct_1_2", "1").await.unwrap(), 1);
        assert_eq!(unread_count(store.as_ref(), "direct_1_2", "1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn live_count_follows_messages_and_watermark() {
        let store = store_with_room().await;
        let mut counts = unread_counts(store.clone(), "direct_1_2", "1").await.unwrap();
        assert_eq!(counts.next().await, Some(0));

        send(&store, "2", "a").await;
        assert_eq!(counts.next().await, Some(1));
        send(&store, "2", "b").await;
        assert_eq!(counts.next().await, Some(2));

        mark_read(store.as_ref(), "direct_1_2", "1").await.unwrap();
        assert_eq!(counts.next().await, Some(0));

        send(&store, "1", "reply").await;
        send(&store, "2", "c").await;
        assert_eq!(counts.next().await, Some(1));
    }

    #[tokio::test]
    async fn reopening_the_message_query_releases_the_old_one() {
        let store = store_with_room().await;
        let mut counts = unread_counts(store.clone(), "direct_1_2", "1").await.unwrap();
        assert_eq!(counts.next().await, Some(0));
        let baseline = store.listener_count();
        assert_eq!(baseline, 2);

        for _ in 0..5 {
            send(&store, "2", "ping").await;
            assert_eq!(counts.next().await, Some(1));
            mark_read(store.as_ref(), "direct_1_2", "1").await.unwrap();
            assert_eq!(counts.next().await, Some(0));
            assert_eq!(store.listener_count(), baseline);
        }

        drop(counts);
        for _ in 0..100 {
            if store.listener_count() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn watermark_is_exclusive() {
        use chrono::{ TimeZone, Utc };
        let at = |s| Utc.timestamp_opt(s, 0).unwrap();
        let msg = |sender: &str, ts| Message {
            id: format!("{}-{}", sender, ts),
            room_id: "r".into(),
            sender_id: sender.into(),
            message: "x".into(),
            message_type: MessageType::Text,
            timestamp: at(ts),
            is_read: false,
        };
        let messages = vec![msg("2", 10), msg("2", 20), msg("1", 30), msg("2", 30)];
        assert_eq!(count_unread(&messages, "1", None), 3);
        assert_eq!(count_unread(&messages, "1", Some(at(20))), 1);
        assert_eq!(count_unread(&messages, "1", Some(at(10))), 2);
    }
}
