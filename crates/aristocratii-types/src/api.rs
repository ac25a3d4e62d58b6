use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{User, VerificationKind};

// -- Users --

/// Body of `POST /register` and `POST /users`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(rename = "isVerified")]
    pub is_verified: VerificationKind,
    #[serde(rename = "isVisible", default = "default_visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub avatar: Option<String>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: User,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organizer_id: i64,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinEventRequest {
    pub user_id: i64,
}

// -- Chats --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChatRequest {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub participants: Vec<i64>,
}

// -- Entries --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEntryRequest {
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
}

// -- Images --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub filename: String,
    pub size: u64,
}

// -- Errors --

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_rejects_unlisted_columns() {
        let body = r#"{"username":"a","password":"p","email":"a@x.com","isVerified":"PERSON","id":7}"#;
        assert!(serde_json::from_str::<RegisterRequest>(body).is_err());
    }

    #[test]
    fn register_request_defaults() {
        let body = r#"{"username":"a","password":"p","email":"a@x.com","isVerified":"NGO"}"#;
        let req: RegisterRequest = serde_json::from_str(body).unwrap();
        assert!(req.is_visible);
        assert_eq!(req.balance, 0.0);
        assert_eq!(req.avatar, None);
        assert_eq!(req.is_verified, VerificationKind::Ngo);
    }
}
