use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verification category of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationKind {
    Ngo,
    Sponsor,
    Person,
}

impl VerificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ngo => "NGO",
            Self::Sponsor => "SPONSOR",
            Self::Person => "PERSON",
        }
    }
}

impl fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVerificationKind(pub String);

impl fmt::Display for UnknownVerificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown verification kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownVerificationKind {}

impl FromStr for VerificationKind {
    type Err = UnknownVerificationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NGO" => Ok(Self::Ngo),
            "SPONSOR" => Ok(Self::Sponsor),
            "PERSON" => Ok(Self::Person),
            other => Err(UnknownVerificationKind(other.to_string())),
        }
    }
}

/// Public representation of an account. The password hash never leaves the
/// persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub balance: f64,
    #[serde(rename = "isVerified")]
    pub is_verified: VerificationKind,
    #[serde(rename = "isVisible")]
    pub is_visible: bool,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    pub description: String,
    pub organizer_id: i64,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub images: Vec<String>,
    pub attendees: Vec<i64>,
    pub attendee_count: usize,
}

/// Snapshot of the most recent entry of a chat, resolved at read time from
/// the chat's `last_entry_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub participants: Vec<i64>,
    pub last_message: Option<LastMessage>,
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_kind_uses_uppercase_names() {
        let json = serde_json::to_string(&VerificationKind::Ngo).unwrap();
        assert_eq!(json, "\"NGO\"");

        let parsed: VerificationKind = serde_json::from_str("\"SPONSOR\"").unwrap();
        assert_eq!(parsed, VerificationKind::Sponsor);
        assert_eq!("PERSON".parse::<VerificationKind>().unwrap(), VerificationKind::Person);
        assert!("person".parse::<VerificationKind>().is_err());
    }
}
