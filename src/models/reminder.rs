use chrono::{ DateTime, Duration, Timelike, Utc };
use serde::{ Deserialize, Serialize };

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub time: DateTime<Utc>,
    pub action: String,
    pub enabled: bool,
}

/// Zeroes the seconds and rolls a time that is not in the future to the next day.
pub fn next_trigger(selected: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let trigger = selected
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(selected);
    if trigger <= now {
        trigger + Duration::days(1)
    } else {
        trigger
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub medication_reminder: bool,
    pub appointment_reminder: bool,
    pub health_tips: bool,
    pub exercise_reminder: bool,
    pub water_reminder: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            medication_reminder: true,
            appointment_reminder: true,
            health_tips: true,
            exercise_reminder: true,
            water_reminder: true,
        }
    }
}

impl NotificationSettings {
    /// Flips the setting stored under its JSON key. Returns the new value.
    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        let slot = match key {
            "medicationReminder" => &mut self.medication_reminder,
            "appointmentReminder" => &mut self.appointment_reminder,
            "healthTips" => &mut self.health_tips,
            "exerciseReminder" => &mut self.exercise_reminder,
            "waterReminder" => &mut self.water_reminder,
            _ => return None,
        };
        *slot = !*slot;
        Some(*slot)
    }
}
