use thiserror::Error;

/// Failures talking to the healthcare REST backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not authorized, please log in again")]
    Unauthorized,

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(401),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) => None,
        }
    }
}

/// Failures of the realtime document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt record '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("unsupported chat store type: {0}")]
    Unsupported(String),
}

/// Failures of the device-local key/value storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported storage type: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no auth token stored, please log in")]
    Unauthenticated,

    #[error("could not determine the current user, please log in again")]
    IdentityNotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("room {0} belongs to other participants")]
    RoomConflict(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Timeline(#[from] crate::chat::timeline::TimelineError),
}

pub type ChatResult<T> = Result<T, ChatError>;
