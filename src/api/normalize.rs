//! The one place where the backend's inconsistent response shapes are handled.
//!
//! The identifier may come back as `id`, `user_id` or `pk`, as a number or a
//! string, and listings may be bare arrays or wrapped in a `results`, `data` or
//! `users` envelope. Everything past this module sees [`UserProfile`] only.

use serde_json::Value as JsonValue;

use crate::models::{ Role, UserId, UserProfile };

const ID_FIELDS: [&str; 3] = ["id", "user_id", "pk"];
const LIST_ENVELOPES: [&str; 3] = ["results", "data", "users"];

fn id_from_value(value: &JsonValue) -> Option<UserId> {
    match value {
        JsonValue::Number(n) => {
            if n.as_i64() == Some(0) {
                None
            } else {
                Some(n.to_string())
            }
        }
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

pub fn extract_user_id(record: &JsonValue) -> Option<UserId> {
    ID_FIELDS.iter().find_map(|field| record.get(*field).and_then(id_from_value))
}

fn str_field(record: &JsonValue, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn user_record(record: &JsonValue) -> Option<UserProfile> {
    let id = extract_user_id(record)?;
    let role = str_field(record, "role")
        .and_then(|r| r.parse::<Role>().ok())
        .unwrap_or_default();
    Some(UserProfile {
        id,
        username: str_field(record, "username"),
        first_name: str_field(record, "first_name").unwrap_or_default(),
        last_name: str_field(record, "last_name").unwrap_or_default(),
        avatar: str_field(record, "avatar").or_else(|| str_field(record, "avatar_url")),
        email: str_field(record, "email"),
        role,
    })
}

/// Unwraps a user listing. `None` means the shape is not recognized at all.
pub fn user_list(body: &JsonValue) -> Option<Vec<UserProfile>> {
    let items = match body {
        JsonValue::Array(items) => items,
        JsonValue::Object(_) => LIST_ENVELOPES
            .iter()
            .find_map(|key| body.get(*key).and_then(JsonValue::as_array))?,
        _ => return None,
    };
    Some(items.iter().filter_map(user_record).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_ids_from_every_known_field() {
        assert_eq!(extract_user_id(&json!({"id": 42})).as_deref(), Some("42"));
        assert_eq!(extract_user_id(&json!({"user_id": "17"})).as_deref(), Some("17"));
        assert_eq!(extract_user_id(&json!({"pk": 9, "name": "x"})).as_deref(), Some("9"));
        assert_eq!(extract_user_id(&json!({"id": 0, "pk": 5})).as_deref(), Some("5"));
        assert_eq!(extract_user_id(&json!({"id": null, "username": "a"})), None);
        assert_eq!(extract_user_id(&json!({"id": ""})), None);
    }

    #[test]
    fn maps_user_record_with_avatar_url_fallback() {
        let profile = user_record(&json!({
            "pk": 3,
            "first_name": "Minh",
            "last_name": "Le",
            "avatar_url": "image/upload/m.png",
            "role": "expert"
        })).expect("record has an id");

        assert_eq!(profile.id, "3");
        assert_eq!(profile.display_name(), "Minh Le");
        assert_eq!(profile.avatar.as_deref(), Some("image/upload/m.png"));
        assert_eq!(profile.role, Role::Expert);
    }

    #[test]
    fn unknown_role_defaults_to_user() {
        let profile = user_record(&json!({"id": 1, "role": "nurse"})).unwrap();
        assert_eq!(profile.role, Role::User);
    }

    #[test]
    fn unwraps_list_envelopes() {
        let bare = json!([{"id": 1}, {"id": 2}]);
        let paged = json!({"count": 2, "results": [{"id": 1}, {"id": 2}]});
        let data = json!({"data": [{"id": 1}]});
        let users = json!({"users": [{"id": 1}, {"name": "no id"}]});

        assert_eq!(user_list(&bare).unwrap().len(), 2);
        assert_eq!(user_list(&paged).unwrap().len(), 2);
        assert_eq!(user_list(&data).unwrap().len(), 1);
        assert_eq!(user_list(&users).unwrap().len(), 1);
        assert!(user_list(&json!({"detail": "nope"})).is_none());
        assert!(user_list(&json!("text")).is_none());
    }
}
