use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

pub type UserId = String;

pub const DEFAULT_AVATAR: &str = "https://ui-avatars.com/api/?background=0D8ABC&color=fff&name=User";
pub const CLOUDINARY_BASE: &str = "https://res.cloudinary.com/dsfghzlat/";
pub const PLACEHOLDER_NAME: &str = "Người dùng";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Coach,
    Expert,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Coach => "coach",
            Role::Expert => "expert",
            Role::Admin => "admin",
        }
    }

    /// Coaches and experts chat with plain users; plain users chat with them.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Coach | Role::Expert)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "coach" => Ok(Role::Coach),
            "expert" => Ok(Role::Expert),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: '{}'", other)),
        }
    }
}

/// Read-only projection of a backend user, as shown next to a conversation.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, alias = "avatar_url")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl UserProfile {
    /// Stand-in used when a counterpart's profile cannot be resolved.
    pub fn placeholder(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        match self.username.as_deref() {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => PLACEHOLDER_NAME.to_string(),
        }
    }

    pub fn avatar_url(&self) -> String {
        normalize_avatar(self.avatar.as_deref())
    }
}

pub fn normalize_avatar(avatar: Option<&str>) -> String {
    match avatar.map(str::trim) {
        None | Some("") => DEFAULT_AVATAR.to_string(),
        Some(a) if a.starts_with("http") => a.to_string(),
        Some(a) if a.contains("image/upload/") || a.contains("cloudinary") => {
            format!("{}{}", CLOUDINARY_BASE, a.trim_start_matches('/'))
        }
        Some(a) => a.to_string(),
    }
}
