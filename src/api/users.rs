use log::{ info, warn };
use serde_json::Value as JsonValue;

use super::{ endpoints, normalize, ApiClient };
use crate::error::ApiError;
use crate::models::{ Role, UserProfile };

impl ApiClient {
    pub async fn user_info_json(&self, token: &str, user_id: &str) -> Result<JsonValue, ApiError> {
        self.get_json(token, &endpoints::user_info(user_id), &[]).await
    }

    pub async fn experts_coaches(&self, token: &str) -> Result<Vec<UserProfile>, ApiError> {
        let body: JsonValue = self.get_json(token, endpoints::EXPERTS_COACHES, &[]).await?;
        normalize::user_list(&body).ok_or_else(|| {
            ApiError::Decode("experts listing is not a list".to_string())
        })
    }

    /// Users with the given role. The listing endpoint's shape is not stable:
    /// when it is unrecognized, or the endpoint is missing, the experts
    /// listing is filtered instead.
    pub async fn list_users(&self, token: &str, role: Role) -> Result<Vec<UserProfile>, ApiError> {
        let users = match self.get_json::<JsonValue>(token, endpoints::USER_INFO, &[]).await {
            Ok(body) => match normalize::user_list(&body) {
                Some(users) => users,
                None => {
                    warn!("Unrecognized user listing shape, falling back to experts listing");
                    self.experts_coaches(token).await?
                }
            },
            Err(e) if matches!(e.status_code(), Some(404) | Some(405)) => {
                warn!("User listing unavailable ({}), falling back to experts listing", e);
                self.experts_coaches(token).await?
            }
            Err(e) => return Err(e),
        };
        Ok(users.into_iter().filter(|u| u.role == role).collect())
    }

    /// People the current user can start a conversation with: staff for plain
    /// users, plain users for staff.
    pub async fn chat_contacts(&self, token: &str, my_role: Role) -> Result<Vec<UserProfile>, ApiError> {
        let contacts = if my_role.is_staff() {
            self.list_users(token, Role::User).await?
        } else {
            self.experts_coaches(token).await?
        };
        info!("Loaded {} chat contacts", contacts.len());
        Ok(contacts)
    }
}
