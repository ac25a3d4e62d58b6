use serde::{Deserialize, Serialize};

use crate::models::{Chat, Entry};

/// Commands sent FROM client TO server over the socket.
///
/// Frames look like `{"event": "join", "data": {"user_id": 1, "chat_id": 5}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Become a participant of a chat and join its room.
    Join { user_id: i64, chat_id: i64 },

    /// Leave a chat's room. Participation is kept.
    Leave { chat_id: i64 },

    /// Join the personal room of a user and receive a snapshot of their chats.
    Listen { user_id: i64 },

    /// Post a message to a chat.
    Message(MessagePayload),
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Listen { .. } => "listen",
            Self::Message(_) => "message",
        }
    }
}

/// Fields are optional on the wire so that a frame with a missing field is
/// still parsed and rejected with a precise reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub user_id: Option<i64>,
    pub chat_id: Option<i64>,
    pub text: Option<String>,
}

/// Events sent FROM server TO client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A new entry was posted to a chat.
    Message(Entry),

    /// Snapshot of a chat the listening user participates in.
    Chat(Chat),

    Joined { chat_id: i64 },

    Left { chat_id: i64 },

    Listening { user_id: i64, chats: usize },

    /// The sender's message was persisted and fanned out.
    Delivered { entry_id: i64, chat_id: i64 },

    /// A command was rejected. Nothing was persisted or broadcast.
    Error {
        command: Option<String>,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_frame() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"event":"join","data":{"user_id":1,"chat_id":5}}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Join { user_id: 1, chat_id: 5 });
        assert_eq!(cmd.name(), "join");
    }

    #[test]
    fn message_frame_with_missing_field_still_parses() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"event":"message","data":{"user_id":1,"chat_id":5}}"#).unwrap();
        match cmd {
            ClientCommand::Message(payload) => {
                assert_eq!(payload.user_id, Some(1));
                assert_eq!(payload.text, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn server_events_are_adjacently_tagged() {
        let json = serde_json::to_value(ServerEvent::Joined { chat_id: 5 }).unwrap();
        assert_eq!(json["event"], "joined");
        assert_eq!(json["data"]["chat_id"], 5);
    }
}
