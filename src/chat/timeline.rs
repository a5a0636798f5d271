use chrono::Utc;
use thiserror::Error;

use crate::models::{ Message, Timestamp, UserId };

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("no pending message with local id '{0}'")]
    UnknownLocalId(String),
}

/// A message the user sent that the store has not echoed back yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    pub local_id: String,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: Timestamp,
    /// Set once the store accepted the write.
    pub confirmed: Option<Message>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEntry {
    Confirmed(Message),
    Pending(PendingMessage),
}

impl TimelineEntry {
    pub fn body(&self) -> &str {
        match self {
            TimelineEntry::Confirmed(m) => &m.message,
            TimelineEntry::Pending(p) => &p.body,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TimelineEntry::Pending(p) if p.confirmed.is_none())
    }
}

/// What a conversation screen shows: the last store snapshot plus the
/// messages sent from this device that the snapshot does not contain yet.
#[derive(Debug, Clone, Default)]
pub struct OptimisticTimeline {
    confirmed: Vec<Message>,
    pending: Vec<PendingMessage>,
    next_local: u64,
}

impl OptimisticTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_pending(&mut self, sender_id: &str, body: &str) -> String {
        self.next_local += 1;
        let local_id = format!("local-{}", self.next_local);
        self.pending.push(PendingMessage {
            local_id: local_id.clone(),
            sender_id: sender_id.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
            confirmed: None,
        });
        local_id
    }

    /// Records the stored message for a pending entry. The entry disappears
    /// once a snapshot containing the message is applied.
    pub fn confirm(&mut self, local_id: &str, message: Message) -> Result<(), TimelineError> {
        if self.confirmed.iter().any(|m| m.id == message.id) {
            self.remove_pending(local_id)?;
            return Ok(());
        }
        let entry = self.pending
            .iter_mut()
            .find(|p| p.local_id == local_id)
            .ok_or_else(|| TimelineError::UnknownLocalId(local_id.to_string()))?;
        entry.confirmed = Some(message);
        Ok(())
    }

    pub fn rollback(&mut self, local_id: &str) -> Result<PendingMessage, TimelineError> {
        self.remove_pending(local_id)
    }

    pub fn apply_snapshot(&mut self, messages: Vec<Message>) {
        self.pending.retain(|p| {
            match &p.confirmed {
                Some(sent) => !messages.iter().any(|m| m.id == sent.id),
                None => true,
            }
        });
        self.confirmed = messages;
    }

    pub fn entries(&self) -> Vec<TimelineEntry> {
        let confirmed = self.confirmed.iter().cloned().map(TimelineEntry::Confirmed);
        let pending = self.pending.iter().map(|p| {
            match &p.confirmed {
                Some(sent) => TimelineEntry::Confirmed(sent.clone()),
                None => TimelineEntry::Pending(p.clone()),
            }
        });
        confirmed.chain(pending).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|p| p.confirmed.is_none()).count()
    }

    fn remove_pending(&mut self, local_id: &str) -> Result<PendingMessage, TimelineError> {
        let idx = self.pending
            .iter()
            .position(|p| p.local_id == local_id)
            .ok_or_else(|| TimelineError::UnknownLocalId(local_id.to_string()))?;
        Ok(self.pending.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageType;

    fn stored(id: &str, body: &str) -> Message {
        Message {
            id: id.to_owned(),
            room_id: "direct_1_2".to_owned(),
            sender_id: "1".to_owned(),
            message: body.to_owned(),
            message_type: MessageType::Text,
            timestamp: Utc::now(),
            is_read: false,
        }
    }

    #[test]
    fn pending_entries_follow_the_snapshot() {
        let mut timeline = OptimisticTimeline::new();
        timeline.apply_snapshot(vec![stored("a", "hi")]);
        timeline.push_pending("1", "on its way");

        let entries = timeline.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].body(), "hi");
        assert!(entries[1].is_pending());
        assert_eq!(timeline.pending_count(), 1);
    }

    #[test]
    fn confirmed_entry_is_replaced_by_the_snapshot_copy() {
        let mut timeline = OptimisticTimeline::new();
        let local = timeline.push_pending("1", "hello");
        timeline.confirm(&local, stored("m1", "hello")).expect("local id exists");
        assert_eq!(timeline.pending_count(), 0);
        assert_eq!(timeline.entries().len(), 1);

        timeline.apply_snapshot(vec![stored("m1", "hello")]);
        let entries = timeline.entries();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_pending());
    }

    #[test]
    fn confirm_after_snapshot_does_not_duplicate() {
        let mut timeline = OptimisticTimeline::new();
        let local = timeline.push_pending("1", "fast");
        timeline.apply_snapshot(vec![stored("m1", "fast")]);
        timeline.confirm(&local, stored("m1", "fast")).expect("local id exists");
        assert_eq!(timeline.entries().len(), 1);
    }

    #[test]
    fn rollback_removes_the_pending_entry() {
        let mut timeline = OptimisticTimeline::new();
        let local = timeline.push_pending("1", "lost");
        let removed = timeline.rollback(&local).expect("local id exists");
        assert_eq!(removed.body, "lost");
        assert!(timeline.entries().is_empty());

        let err = timeline.rollback(&local).expect_err("already rolled back");
        assert_eq!(err, TimelineError::UnknownLocalId(local));
    }
}
