//! Database row types. These map directly to SQLite rows and are converted
//! into the `aristocratii-types` wire models at the edge.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use aristocratii_types::models::{Chat, Entry, Event, Image, LastMessage, User, VerificationKind};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
    pub balance: f64,
    pub is_verified: String,
    pub is_visible: bool,
    pub avatar: Option<String>,
    pub created_at: String,
}

/// Columns of a user insert. `password` is already hashed.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub email: &'a str,
    pub balance: f64,
    pub is_verified: VerificationKind,
    pub is_visible: bool,
    pub avatar: Option<&'a str>,
}

pub struct EventRow {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    pub description: String,
    pub organizer_id: i64,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub start_time: String,
    pub end_time: String,
    /// JSON array of image references
    pub images: String,
    pub attendees: Vec<i64>,
}

pub struct NewEvent<'a> {
    pub lat: f64,
    pub lon: f64,
    pub name: &'a str,
    pub description: &'a str,
    pub organizer_id: i64,
    pub contact_email: Option<&'a str>,
    pub contact_phone: Option<&'a str>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub images: &'a [String],
}

pub struct ChatRow {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub last_entry_id: Option<i64>,
    pub participants: Vec<i64>,
    pub last_entry: Option<EntryRow>,
}

pub struct EntryRow {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub timestamp: String,
}

/// Result of asking for a chat row to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSlot {
    Existing,
    Created,
    /// Not created: the id is not positive or too far past the highest id.
    OutOfRange,
}

/// Result of posting an entry. Nothing is written unless it is `Posted`.
pub enum EntryOutcome {
    Posted {
        entry: EntryRow,
        /// Participants at the moment the entry committed
        participants: Vec<i64>,
    },
    UnknownChat,
    NotParticipant,
}

pub struct ImageRow {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: String,
}

/// Current server time in the format every timestamp column uses.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt {} timestamp '{}': {}", what, raw, e);
            DateTime::default()
        })
}

impl UserRow {
    pub fn into_user(self) -> User {
        let is_verified = self.is_verified.parse().unwrap_or_else(|e| {
            warn!("User {}: {}", self.id, e);
            VerificationKind::Person
        });

        User {
            id: self.id,
            username: self.username,
            email: self.email,
            balance: self.balance,
            is_verified,
            is_visible: self.is_visible,
            avatar: self.avatar,
            created_at: parse_timestamp(&self.created_at, "user"),
        }
    }
}

impl EventRow {
    pub fn into_event(self) -> Event {
        let images = serde_json::from_str(&self.images).unwrap_or_else(|e| {
            warn!("Corrupt images on event {}: {}", self.id, e);
            Vec::new()
        });

        Event {
            id: self.id,
            lat: self.lat,
            lon: self.lon,
            name: self.name,
            description: self.description,
            organizer_id: self.organizer_id,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            start_time: parse_timestamp(&self.start_time, "event start"),
            end_time: parse_timestamp(&self.end_time, "event end"),
            images,
            attendee_count: self.attendees.len(),
            attendees: self.attendees,
        }
    }
}

impl EntryRow {
    pub fn into_entry(self) -> Entry {
        Entry {
            id: self.id,
            chat_id: self.chat_id,
            user_id: self.user_id,
            username: self.username,
            text: self.text,
            timestamp: parse_timestamp(&self.timestamp, "entry"),
        }
    }
}

impl ChatRow {
    pub fn into_chat(self) -> Chat {
        let last_message = self.last_entry.map(|e| LastMessage {
            id: e.id,
            user_id: e.user_id,
            username: e.username,
            text: e.text,
            timestamp: parse_timestamp(&e.timestamp, "entry"),
        });

        Chat {
            id: self.id,
            name: self.name,
            image: self.image,
            participants: self.participants,
            last_message,
        }
    }
}

impl ImageRow {
    pub fn into_image(self) -> Image {
        Image {
            size: self.size.max(0) as u64,
            created_at: parse_timestamp(&self.created_at, "image"),
            id: self.id,
            filename: self.filename,
            content_type: self.content_type,
        }
    }
}
