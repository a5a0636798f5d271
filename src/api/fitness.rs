use super::{ endpoints, ApiClient };
use crate::error::ApiError;
use crate::models::health::{ Diary, Exercise, MuscleGroup, NewWorkoutSession, WorkoutSession };

impl ApiClient {
    pub async fn exercises(&self, token: &str) -> Result<Vec<Exercise>, ApiError> {
        self.get_json(token, endpoints::EXERCISES, &[]).await
    }

    pub async fn exercise(&self, token: &str, id: i64) -> Result<Exercise, ApiError> {
        self.get_json(token, &endpoints::exercise(id), &[]).await
    }

    pub async fn muscle_groups(&self, token: &str) -> Result<Vec<MuscleGroup>, ApiError> {
        self.get_json(token, endpoints::MUSCLE_GROUPS, &[]).await
    }

    pub async fn workout_sessions(&self, token: &str) -> Result<Vec<WorkoutSession>, ApiError> {
        self.get_json(token, endpoints::WORKOUT_SESSIONS, &[]).await
    }

    pub async fn workout_session(&self, token: &str, id: i64) -> Result<WorkoutSession, ApiError> {
        self.get_json(token, &endpoints::workout_session(id), &[]).await
    }

    pub async fn create_workout_session(
        &self,
        token: &str,
        session: &NewWorkoutSession
    ) -> Result<serde_json::Value, ApiError> {
        self.post_json(token, endpoints::WORKOUT_SESSIONS, session).await
    }

    pub async fn diaries(&self, token: &str) -> Result<Vec<Diary>, ApiError> {
        self.get_json(token, endpoints::DIARIES, &[]).await
    }

    pub async fn create_diary(&self, token: &str, diary: &Diary) -> Result<Diary, ApiError> {
        self.post_json(token, endpoints::DIARIES, diary).await
    }
}
