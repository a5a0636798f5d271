use chrono::{ DateTime, Utc };
use log::{ info, warn };
use serde::de::DeserializeOwned;

use crate::error::{ ChatError, ChatResult, StorageError };
use crate::models::reminder::next_trigger;
use crate::models::{ NotificationSettings, Reminder };
use crate::session::Session;
use crate::storage::{ NOTIFICATION_SETTINGS_KEY, REMINDERS_KEY };

async fn load_json<T: DeserializeOwned>(session: &Session, key: &str) -> Result<Option<T>, StorageError> {
    let Some(raw) = session.local_store().get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Ignoring unreadable '{}' entry: {}", key, e);
            Ok(None)
        }
    }
}

/// Daily reminders kept on the device.
pub struct ReminderBook {
    session: Session,
}

impl ReminderBook {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub async fn list(&self) -> Result<Vec<Reminder>, StorageError> {
        Ok(load_json(&self.session, REMINDERS_KEY).await?.unwrap_or_default())
    }

    async fn save(&self, reminders: &[Reminder]) -> Result<(), StorageError> {
        self.session.local_store().set(REMINDERS_KEY, &serde_json::to_string(reminders)?).await
    }

    pub async fn add(&self, time: DateTime<Utc>, action: &str, now: DateTime<Utc>) -> ChatResult<Reminder> {
        let action = action.trim();
        if action.is_empty() {
            return Err(ChatError::InvalidInput("reminder action is empty".to_string()));
        }
        let mut reminders = self.list().await?;
        let mut id = format!("reminder_{}", now.timestamp_millis());
        if reminders.iter().any(|r| r.id == id) {
            id = format!("{}_{}", id, reminders.len());
        }
        let reminder = Reminder {
            id,
            time: next_trigger(time, now),
            action: action.to_string(),
            enabled: true,
        };
        reminders.push(reminder.clone());
        self.save(&reminders).await?;
        info!("Reminder '{}' set for {}", reminder.action, reminder.time.format("%H:%M"));
        Ok(reminder)
    }

    /// Flips `enabled`. Returns the updated reminder, `None` if unknown.
    pub async fn toggle(&self, id: &str) -> Result<Option<Reminder>, StorageError> {
        let mut reminders = self.list().await?;
        let Some(reminder) = reminders.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        reminder.enabled = !reminder.enabled;
        let updated = reminder.clone();
        self.save(&reminders).await?;
        Ok(Some(updated))
    }

    pub async fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let mut reminders = self.list().await?;
        let before = reminders.len();
        reminders.retain(|r| r.id != id);
        if reminders.len() == before {
            return Ok(false);
        }
        self.save(&reminders).await?;
        Ok(true)
    }
}

pub async fn load_notification_settings(session: &Session) -> Result<NotificationSettings, StorageError> {
    Ok(load_json(session, NOTIFICATION_SETTINGS_KEY).await?.unwrap_or_default())
}

pub async fn save_notification_settings(session: &Session, settings: &NotificationSettings) -> Result<(), StorageError> {
    session.local_store().set(NOTIFICATION_SETTINGS_KEY, &serde_json::to_string(settings)?).await
}

/// Flips one setting by its stored key and persists the result.
pub async fn toggle_notification_setting(session: &Session, key: &str) -> ChatResult<NotificationSettings> {
    let mut settings = load_notification_settings(session).await?;
    if settings.toggle(key).is_none() {
        return Err(ChatError::InvalidInput(format!("unknown notification setting '{}'", key)));
    }
    save_notification_settings(session, &settings).await?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLocalStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn session() -> Session {
        Session::new(Arc::new(MemoryLocalStore::new()))
    }

    #[tokio::test]
    async fn add_toggle_remove() {
        let book = ReminderBook::new(session());
        let now = Utc.with_ymd_and_hms(2025, 5, 2, 12, 0, 0).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 5, 2, 8, 30, 15).unwrap();

        let reminder = book.add(at, "Uống nước", now).await.unwrap();
        assert_eq!(reminder.id, format!("reminder_{}", now.timestamp_millis()));
        assert_eq!(reminder.time, Utc.with_ymd_and_hms(2025, 5, 3, 8, 30, 0).unwrap());
        assert_eq!(book.list().await.unwrap(), vec![reminder.clone()]);

        let toggled = book.toggle(&reminder.id).await.unwrap().unwrap();
        assert!(!toggled.enabled);
        assert!(book.toggle("nope").await.unwrap().is_none());

        assert!(book.remove(&reminder.id).await.unwrap());
        assert!(!book.remove(&reminder.id).await.unwrap());
        assert!(book.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_action_is_rejected() {
        let book = ReminderBook::new(session());
        let now = Utc::now();
        assert!(matches!(book.add(now, "  ", now).await, Err(ChatError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn corrupt_entries_read_as_defaults() {
        let session = session();
        session.local_store().set(REMINDERS_KEY, "[oops").await.unwrap();
        session.local_store().set(NOTIFICATION_SETTINGS_KEY, "nope").await.unwrap();

        assert!(ReminderBook::new(session.clone()).list().await.unwrap().is_empty());
        assert_eq!(load_notification_settings(&session).await.unwrap(), NotificationSettings::default());
    }

    #[tokio::test]
    async fn toggling_a_setting_persists_it() {
        let session = session();
        let settings = toggle_notification_setting(&session, "healthTips").await.unwrap();
        assert!(!settings.health_tips);
        assert!(!load_notification_settings(&session).await.unwrap().health_tips);

        let err = toggle_notification_setting(&session, "bogus").await.expect_err("unknown key");
        assert!(matches!(err, ChatError::InvalidInput(_)));
    }
}
