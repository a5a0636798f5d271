use serde::{ Deserialize, Serialize };
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub password2: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl StatisticsPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticsPeriod::Weekly => "weekly",
            StatisticsPeriod::Monthly => "monthly",
            StatisticsPeriod::Yearly => "yearly",
        }
    }
}

impl fmt::Display for StatisticsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatisticsPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" | "week" => Ok(StatisticsPeriod::Weekly),
            "monthly" | "month" => Ok(StatisticsPeriod::Monthly),
            "yearly" | "year" => Ok(StatisticsPeriod::Yearly),
            other => Err(format!("Unknown statistics period: '{}'", other)),
        }
    }
}

/// Selects which week/month/year a statistics request covers.
/// Values use the backend's formats: `2025-W07`, `2025-02`, `2025`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsQuery {
    pub week: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
    pub user_id: Option<String>,
    pub current_time_only: bool,
}

impl StatisticsQuery {
    pub fn to_params(&self, period: StatisticsPeriod) -> Vec<(&'static str, String)> {
        let mut params = vec![("period", period.as_str().to_string())];
        if let Some(week) = &self.week {
            params.push(("week", week.clone()));
        } else if let Some(month) = &self.month {
            params.push(("month", month.clone()));
        } else if let Some(year) = &self.year {
            params.push(("year", year.clone()));
        }
        if let Some(user_id) = &self.user_id {
            params.push(("user_id", user_id.clone()));
        }
        if self.current_time_only {
            params.push(("current_time_only", "true".to_string()));
        }
        params
    }
}

/// Statistics payloads vary per period, so the body is kept as JSON.
#[derive(Debug, Clone)]
pub struct PersonalStatistics {
    pub period: StatisticsPeriod,
    pub data: JsonValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStat {
    #[serde(default, skip_serializing)]
    pub id: Option<i64>,
    #[serde(default, skip_serializing)]
    pub date: Option<String>,
    #[serde(default, skip_serializing)]
    pub bmi: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub water_intake: f64,
    #[serde(default)]
    pub step_count: i64,
    #[serde(default)]
    pub heart_rate: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuscleGroup {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    #[serde(default)]
    pub is_active: bool,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<String>,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub repetition: Option<i64>,
    #[serde(default)]
    pub sets: Option<i64>,
    #[serde(default)]
    pub calories_burned: Option<f64>,
    #[serde(default)]
    pub muscle_groups: Vec<MuscleGroup>,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: i64,
    pub name: String,
    pub schedule: String,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub total_duration: i64,
    #[serde(default)]
    pub exercise: Vec<Exercise>,
    #[serde(default)]
    pub bpm: Option<i64>,
    #[serde(default)]
    pub steps: Option<i64>,
    #[serde(default)]
    pub calories_burned: f64,
}

/// Write shape of a workout session: exercises by primary key.
#[derive(Debug, Clone, Serialize)]
pub struct NewWorkoutSession {
    pub name: String,
    pub schedule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub exercise: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diary {
    #[serde(default, skip_serializing)]
    pub id: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub workout_session: Option<i64>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_params_prefer_the_most_specific_selector() {
        let query = StatisticsQuery {
            week: Some("2025-W07".into()),
            month: Some("2025-02".into()),
            user_id: Some("42".into()),
            ..Default::default()
        };
        let params = query.to_params(StatisticsPeriod::Weekly);
        assert_eq!(
            params,
            vec![
                ("period", "weekly".to_string()),
                ("week", "2025-W07".to_string()),
                ("user_id", "42".to_string()),
            ]
        );
    }

    #[test]
    fn exercise_tolerates_missing_optional_fields() {
        let exercise: Exercise = serde_json::from_str(
            r#"{"id": 3, "name": "Squat", "duration": 10, "muscle_groups": [{"id": 1, "name": "Legs"}]}"#
        ).unwrap();
        assert_eq!(exercise.name, "Squat");
        assert_eq!(exercise.muscle_groups.len(), 1);
        assert_eq!(exercise.rating, None);
    }
}
