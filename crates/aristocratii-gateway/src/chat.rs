use std::sync::Arc;

use tracing::{debug, error, info, warn};

use aristocratii_db::models::{ChatSlot, EntryOutcome};
use aristocratii_db::{Database, blocking};
use aristocratii_types::events::{ClientCommand, MessagePayload, ServerEvent};
use aristocratii_types::models::{Chat, Entry};

use crate::dispatcher::Dispatcher;
use crate::error::GatewayError;
use crate::rooms::{ConnId, Room};

/// Chat-side handlers for socket commands, shared with the HTTP API so that
/// entries created over HTTP are fanned out the same way.
#[derive(Clone)]
pub struct ChatGateway {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

/// A message that passed validation.
struct NewMessage {
    user_id: i64,
    chat_id: i64,
    text: String,
}

impl TryFrom<MessagePayload> for NewMessage {
    type Error = GatewayError;

    fn try_from(payload: MessagePayload) -> Result<Self, Self::Error> {
        let user_id = payload.user_id.ok_or_else(|| missing("user_id"))?;
        let chat_id = payload.chat_id.ok_or_else(|| missing("chat_id"))?;
        let text = payload.text.ok_or_else(|| missing("text"))?;
        if text.trim().is_empty() {
            return Err(GatewayError::Invalid("text must not be empty".into()));
        }
        Ok(NewMessage {
            user_id,
            chat_id,
            text,
        })
    }
}

fn missing(field: &str) -> GatewayError {
    GatewayError::Invalid(format!("missing field `{}`", field))
}

impl ChatGateway {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run one command for `conn_id` and answer it with either an
    /// acknowledgement or an `error` event.
    pub async fn handle_command(&self, conn_id: ConnId, cmd: ClientCommand) {
        let command = cmd.name();

        let outcome = match cmd {
            ClientCommand::Join { user_id, chat_id } => self
                .join(conn_id, user_id, chat_id)
                .await
                .map(|()| ServerEvent::Joined { chat_id }),

            ClientCommand::Leave { chat_id } => {
                self.leave(conn_id, chat_id).await;
                Ok(ServerEvent::Left { chat_id })
            }

            ClientCommand::Listen { user_id } => self
                .listen(conn_id, user_id)
                .await
                .map(|chats| ServerEvent::Listening { user_id, chats }),

            ClientCommand::Message(payload) => self.post_message(payload).await.map(|entry| {
                ServerEvent::Delivered {
                    entry_id: entry.id,
                    chat_id: entry.chat_id,
                }
            }),
        };

        let reply = match outcome {
            Ok(ack) => ack,
            Err(e) => {
                if let GatewayError::Internal(inner) = &e {
                    error!("{} command from {} failed: {:#}", command, conn_id, inner);
                } else {
                    warn!("{} command from {} rejected: {}", command, conn_id, e);
                }
                ServerEvent::Error {
                    command: Some(command.to_string()),
                    reason: e.to_string(),
                }
            }
        };

        self.dispatcher.send_to_connection(conn_id, reply).await;
    }

    /// Make `user_id` a participant of `chat_id` (creating a placeholder chat
    /// if needed) and put the connection in the chat's room.
    pub async fn join(&self, conn_id: ConnId, user_id: i64, chat_id: i64) -> Result<(), GatewayError> {
        blocking(&self.db, move |db| {
            if !db.user_exists(user_id)? {
                return Ok(Err(GatewayError::NotFound(format!("User {} not found", user_id))));
            }
            match db.ensure_chat(chat_id)? {
                ChatSlot::Existing => {}
                ChatSlot::Created => info!("Created placeholder chat {}", chat_id),
                ChatSlot::OutOfRange => {
                    return Ok(Err(GatewayError::Invalid(format!(
                        "chat id {} is out of range",
                        chat_id
                    ))));
                }
            }
            db.add_participant(chat_id, user_id)?;
            Ok(Ok(()))
        })
        .await??;

        self.dispatcher.join(conn_id, Room::Chat(chat_id)).await;
        debug!("{} joined {}", conn_id, Room::Chat(chat_id));
        Ok(())
    }

    /// Take the connection out of the chat's room. Participation is untouched.
    pub async fn leave(&self, conn_id: ConnId, chat_id: i64) {
        if self.dispatcher.leave(conn_id, Room::Chat(chat_id)).await {
            debug!("{} left {}", conn_id, Room::Chat(chat_id));
        }
    }

    /// Join the user's personal room and push a snapshot of every chat they
    /// participate in. Returns how many snapshots were sent.
    pub async fn listen(&self, conn_id: ConnId, user_id: i64) -> Result<usize, GatewayError> {
        let chats: Option<Vec<Chat>> = blocking(&self.db, move |db| {
            if !db.user_exists(user_id)? {
                return Ok(None);
            }
            let rows = db.chats_for_user(user_id)?;
            Ok(Some(rows.into_iter().map(|row| row.into_chat()).collect()))
        })
        .await?;

        let chats = chats.ok_or_else(|| GatewayError::NotFound(format!("User {} not found", user_id)))?;

        self.dispatcher.join(conn_id, Room::User(user_id)).await;

        let count = chats.len();
        for chat in chats {
            self.dispatcher
                .send_to_connection(conn_id, ServerEvent::Chat(chat))
                .await;
        }

        debug!("{} listening as {} ({} chats)", conn_id, Room::User(user_id), count);
        Ok(count)
    }

    /// Validate, persist, then fan out a message. The entry is committed
    /// before anything is sent; a failed write sends nothing.
    pub async fn post_message(&self, payload: MessagePayload) -> Result<Entry, GatewayError> {
        let msg = NewMessage::try_from(payload)?;
        let (user_id, chat_id) = (msg.user_id, msg.chat_id);

        let outcome = blocking(&self.db, move |db| db.create_entry(chat_id, user_id, &msg.text)).await?;

        let (entry, participants) = match outcome {
            EntryOutcome::Posted {
                entry,
                participants,
            } => (entry.into_entry(), participants),
            EntryOutcome::UnknownChat => {
                return Err(GatewayError::NotFound(format!("Chat {} not found", chat_id)));
            }
            EntryOutcome::NotParticipant => {
                return Err(GatewayError::Forbidden(format!(
                    "User {} is not a participant of chat {}",
                    user_id, chat_id
                )));
            }
        };

        self.fan_out(&entry, &participants).await;
        Ok(entry)
    }

    /// Send an entry to its chat's room, then to the personal room of every
    /// participant except the author.
    async fn fan_out(&self, entry: &Entry, participants: &[i64]) -> usize {
        let event = ServerEvent::Message(entry.clone());

        let mut delivered = self
            .dispatcher
            .send_to_room(Room::Chat(entry.chat_id), &event)
            .await;

        for &user_id in participants.iter().filter(|&&p| p != entry.user_id) {
            delivered += self.dispatcher.send_to_room(Room::User(user_id), &event).await;
        }

        debug!(
            "Entry {} in chat {} handed to {} connections",
            entry.id, entry.chat_id, delivered
        );
        delivered
    }
}
