pub mod auth;
pub mod fitness;
pub mod health;
pub mod normalize;
pub mod users;

use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, RequestBuilder, Response, StatusCode };
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::cli::Args;
use crate::error::ApiError;

pub mod endpoints {
    pub const LOGIN: &str = "o/token/";
    pub const CURRENT_USER: &str = "users/current-user/";
    pub const REGISTER: &str = "api/auth/register/";
    pub const MY_STATISTICS: &str = "api/my-statistics/";
    pub const HEALTH_STATISTIC: &str = "health-statistic/";
    pub const HEALTH_TRACK_CHANGES: &str = "health-statistic/track-changes/";
    pub const EXPERTS_COACHES: &str = "api/experts-coaches";
    pub const USER_INFO: &str = "user-infor/";
    pub const EXERCISES: &str = "/exercises/";
    pub const MUSCLE_GROUPS: &str = "/muscle-groups/";
    pub const WORKOUT_SESSIONS: &str = "/workout-sessions/";
    pub const DIARIES: &str = "/diaries/";

    pub fn user_info(id: &str) -> String {
        format!("{}{}/", USER_INFO, id)
    }

    pub fn exercise(id: i64) -> String {
        format!("{}{}/", EXERCISES, id)
    }

    pub fn workout_session(id: i64) -> String {
        format!("{}{}/", WORKOUT_SESSIONS, id)
    }
}

/// Lookups the chat core needs from the backend's user service.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn current_user(&self, token: &str) -> Result<JsonValue, ApiError>;

    async fn user_info(&self, token: &str, user_id: &str) -> Result<JsonValue, ApiError>;
}

/// REST client for the healthcare backend.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>
    ) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn from_args(args: &Args) -> Self {
        Self::new(args.api_base_url.clone(), args.oauth_client_id.clone(), args.oauth_client_secret.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn get(&self, token: &str, path: &str) -> RequestBuilder {
        self.http.get(self.url(path)).bearer_auth(token)
    }

    fn post(&self, token: &str, path: &str) -> RequestBuilder {
        self.http.post(self.url(path)).bearer_auth(token)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        read_json(response).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)]
    ) -> Result<T, ApiError> {
        debug!("GET {}", path);
        self.send(self.get(token, path).query(query)).await
    }

    pub(crate) async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        body: &B
    ) -> Result<T, ApiError> {
        debug!("POST {}", path);
        self.send(self.post(token, path).json(body)).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status { status: status.as_u16(), body });
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(format!("{}: {}", e, body)))
}

#[async_trait]
impl UserDirectory for ApiClient {
    async fn current_user(&self, token: &str) -> Result<JsonValue, ApiError> {
        self.current_user_json(token).await
    }

    async fn user_info(&self, token: &str, user_id: &str) -> Result<JsonValue, ApiError> {
        self.user_info_json(token, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_with_a_single_slash() {
        let api = ApiClient::new("http://10.0.2.2:8000/", "id", "secret");
        assert_eq!(api.url("o/token/"), "http://10.0.2.2:8000/o/token/");
        assert_eq!(api.url(endpoints::EXERCISES), "http://10.0.2.2:8000/exercises/");
        assert_eq!(api.url(&endpoints::user_info("5")), "http://10.0.2.2:8000/user-infor/5/");
        assert_eq!(endpoints::workout_session(8), "/workout-sessions/8/");
    }
}
