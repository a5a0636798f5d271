use futures::stream::{ BoxStream, StreamExt };
use log::{ debug, error, warn };

use super::timeline::OptimisticTimeline;
use crate::error::{ ChatError, ChatResult };
use crate::models::{ Message, MessageType };
use crate::store::{ ChatStore, LiveQuery, NewMessage };

/// Drops failed snapshots from a live query after logging them.
pub(crate) fn log_errors<T: Send + 'static>(live: LiveQuery<T>, what: &'static str) -> BoxStream<'static, T> {
    live.filter_map(move |item| async move {
        match item {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Live {} query failed: {}", what, e);
                None
            }
        }
    }).boxed()
}

/// The room's messages, oldest first, re-emitted in full on every change.
pub async fn messages(store: &dyn ChatStore, room_id: &str) -> ChatResult<BoxStream<'static, Vec<Message>>> {
    let live = store.watch_messages(room_id).await?;
    Ok(log_errors(live, "messages"))
}

pub async fn send_message(
    store: &dyn ChatStore,
    room_id: &str,
    sender_id: &str,
    body: &str,
    message_type: MessageType
) -> ChatResult<Message> {
    if body.trim().is_empty() {
        return Err(ChatError::InvalidInput("message body is empty".to_string()));
    }
    if sender_id.trim().is_empty() {
        return Err(ChatError::InvalidInput("sender id is empty".to_string()));
    }

    let sent = store.append_message(room_id, NewMessage {
        sender_id: sender_id.to_string(),
        message: body.to_string(),
        message_type,
    }).await?;
    let message = sent.ok_or_else(|| ChatError::NotFound(format!("room {}", room_id)))?;
    debug!("Sent message {} to {}", message.id, room_id);
    Ok(message)
}

/// Shows the message as pending right away and settles it once the store
/// answers: confirmed on success, rolled back on failure.
pub async fn send_optimistic(
    store: &dyn ChatStore,
    timeline: &mut OptimisticTimeline,
    room_id: &str,
    sender_id: &str,
    body: &str
) -> ChatResult<Message> {
    let local_id = timeline.push_pending(sender_id, body);
    match send_message(store, room_id, sender_id, body, MessageType::Text).await {
        Ok(message) => {
            timeline.confirm(&local_id, message.clone())?;
            Ok(message)
        }
        Err(e) => {
            warn!("Rolling back unsent message in {}: {}", room_id, e);
            timeline.rollback(&local_id)?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::subscription::spawn_subscription;
    use crate::store::{ InMemoryChatStore, NewRoom };
    use tokio::sync::mpsc;

    async fn store_with_room() -> InMemoryChatStore {
        let store = InMemoryChatStore::new();
        store
            .insert_room_if_absent("direct_1_2", NewRoom {
                participants: vec!["1".into(), "2".into()],
                room_name: "Chat 1, 2".into(),
                is_group: false,
            }).await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn subscribers_see_messages_in_send_order() {
        let store = store_with_room().await;
        let mut live = messages(&store, "direct_1_2").await.unwrap();
        assert!(live.next().await.unwrap().is_empty());

        send_message(&store, "direct_1_2", "1", "first", MessageType::Text).await.unwrap();
        live.next().await.unwrap();
        send_message(&store, "direct_1_2", "2", "second", MessageType::Text).await.unwrap();
        let snapshot = live.next().await.unwrap();

        let bodies: Vec<_> = snapshot.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, ["first", "second"]);
        assert!(snapshot[0].timestamp < snapshot[1].timestamp);

        let room = store.get_room("direct_1_2").await.unwrap().unwrap();
        assert_eq!(room.last_message.as_deref(), Some("second"));
        assert_eq!(room.last_message_time, Some(snapshot[1].timestamp));
    }

    #[tokio::test]
    async fn rejects_empty_bodies_and_unknown_rooms() {
        let store = store_with_room().await;
        let err = send_message(&store, "direct_1_2", "1", "   ", MessageType::Text)
            .await
            .expect_err("blank body");
        assert!(matches!(err, ChatError::InvalidInput(_)));

        let err = send_message(&store, "nope", "1", "hi", MessageType::Text).await.expect_err("no such room");
        assert!(matches!(err, ChatError::NotFound(_)));
        assert!(store.messages("direct_1_2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsubscribed_callbacks_stay_quiet() {
        let store = store_with_room().await;
        let (tx, mut rx) = mpsc::unbounded_channel::<usize>();
        let live = messages(&store, "direct_1_2").await.unwrap();
        let mut sub = spawn_subscription(live, move |snapshot: Vec<Message>| {
            let _ = tx.send(snapshot.len());
        });
        assert_eq!(rx.recv().await, Some(0));

        sub.unsubscribe();
        send_message(&store, "direct_1_2", "1", "after", MessageType::Text).await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn optimistic_send_settles_the_timeline() {
        let store = store_with_room().await;
        let mut timeline = OptimisticTimeline::new();

        let sent = send_optimistic(&store, &mut timeline, "direct_1_2", "1", "hello").await.unwrap();
        assert_eq!(timeline.pending_count(), 0);
        timeline.apply_snapshot(store.messages("direct_1_2").await.unwrap());
        assert_eq!(timeline.entries().len(), 1);
        assert_eq!(timeline.entries()[0].body(), sent.message);

        send_optimistic(&store, &mut timeline, "missing", "1", "lost").await.expect_err("no such room");
        assert_eq!(timeline.entries().len(), 1);
    }
}
