use log::info;
use serde_json::Value as JsonValue;

use super::{ endpoints, read_json, ApiClient };
use crate::error::ApiError;
use crate::models::health::{ RegisterRequest, TokenResponse };

impl ApiClient {
    /// OAuth2 password grant against the backend's token endpoint.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let form = [
            ("username", username),
            ("password", password),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "password"),
        ];
        let response = self.http.post(self.url(endpoints::LOGIN)).form(&form).send().await?;
        let token: TokenResponse = read_json(response).await?;
        if token.access_token.is_empty() {
            return Err(ApiError::Decode("access token is missing".to_string()));
        }
        info!("Obtained access token for {}", username);
        Ok(token)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<JsonValue, ApiError> {
        let response = self.http.post(self.url(endpoints::REGISTER)).json(request).send().await?;
        read_json(response).await
    }

    pub async fn current_user_json(&self, token: &str) -> Result<JsonValue, ApiError> {
        self.get_json(token, endpoints::CURRENT_USER, &[]).await
    }
}
