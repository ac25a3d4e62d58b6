use crate::Database;
use crate::models::{
    ChatRow, ChatSlot, EntryOutcome, EntryRow, EventRow, ImageRow, NewEvent, NewUser, UserRow,
    format_timestamp, now_timestamp,
};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, params};

const USER_COLUMNS: &str =
    "id, username, password, email, balance, is_verified, is_visible, avatar, created_at";

const EVENT_COLUMNS: &str = "id, lat, lon, name, description, organizer_id, contact_email, \
     contact_phone, start_time, end_time, images";

/// How far past the highest chat id a placeholder may be created.
pub const PLACEHOLDER_ID_WINDOW: i64 = 100;

// JOIN users to fetch the author username in the same query
const ENTRY_SELECT: &str = "SELECT e.id, e.chat_id, e.user_id, u.username, e.text, e.timestamp
     FROM entries e
     LEFT JOIN users u ON e.user_id = u.id";

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the username is already taken.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, password, email, balance, is_verified, is_visible, avatar, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.username,
                    user.password_hash,
                    user.email,
                    user.balance,
                    user.is_verified.as_str(),
                    user.is_visible,
                    user.avatar,
                    now_timestamp(),
                ],
            );

            match inserted {
                Ok(_) => query_user_by_id(conn, conn.last_insert_rowid()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
            conn.query_row(&sql, [username], map_user).optional()
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn user_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| exists(conn, "SELECT 1 FROM users WHERE id = ?1", id))
    }

    // -- Events --

    pub fn create_event(&self, event: &NewEvent<'_>) -> Result<EventRow> {
        let images = serde_json::to_string(event.images)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (lat, lon, name, description, organizer_id, contact_email, contact_phone, start_time, end_time, images)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    event.lat,
                    event.lon,
                    event.name,
                    event.description,
                    event.organizer_id,
                    event.contact_email,
                    event.contact_phone,
                    format_timestamp(event.start_time),
                    format_timestamp(event.end_time),
                    images,
                ],
            )?;

            let id = conn.last_insert_rowid();
            query_event(conn, id)?.ok_or_else(|| anyhow!("Event vanished after insert: {}", id))
        })
    }

    pub fn get_event(&self, id: i64) -> Result<Option<EventRow>> {
        self.with_conn(|conn| query_event(conn, id))
    }

    pub fn list_events(&self) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM events ORDER BY id", EVENT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map([], map_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            for row in &mut rows {
                row.attendees = query_attendees(conn, row.id)?;
            }
            Ok(rows)
        })
    }

    /// Add a user to an event's attendee set. Returns false if they already attend.
    pub fn add_attendee(&self, event_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO event_attendees (event_id, user_id) VALUES (?1, ?2)",
                params![event_id, user_id],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Chats --

    /// Create a chat and its initial participant set in one transaction.
    pub fn create_chat(&self, name: &str, image: Option<&str>, participants: &[i64]) -> Result<ChatRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO chats (name, image) VALUES (?1, ?2)",
                params![name, image],
            )?;
            let chat_id = tx.last_insert_rowid();

            for user_id in participants {
                tx.execute(
                    "INSERT OR IGNORE INTO chat_participants (chat_id, user_id) VALUES (?1, ?2)",
                    params![chat_id, user_id],
                )?;
            }

            let chat = query_chat(&tx, chat_id)?
                .ok_or_else(|| anyhow!("Chat vanished after insert: {}", chat_id))?;
            tx.commit()?;
            Ok(chat)
        })
    }

    /// Make sure a chat row with this id exists, inserting a placeholder if not.
    ///
    /// Placeholder ids must be positive and at most `PLACEHOLDER_ID_WINDOW`
    /// past the highest existing id, so a client cannot push the id sequence
    /// to its limit.
    pub fn ensure_chat(&self, id: i64) -> Result<ChatSlot> {
        self.with_conn(|conn| {
            if exists(conn, "SELECT 1 FROM chats WHERE id = ?1", id)? {
                return Ok(ChatSlot::Existing);
            }

            let highest: i64 =
                conn.query_row("SELECT COALESCE(MAX(id), 0) FROM chats", [], |row| row.get(0))?;
            if id <= 0 || id > highest.saturating_add(PLACEHOLDER_ID_WINDOW) {
                return Ok(ChatSlot::OutOfRange);
            }

            conn.execute(
                "INSERT INTO chats (id, name) VALUES (?1, ?2)",
                params![id, format!("Chat {}", id)],
            )?;
            Ok(ChatSlot::Created)
        })
    }

    pub fn get_chat(&self, id: i64) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| query_chat(conn, id))
    }

    pub fn chat_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| exists(conn, "SELECT 1 FROM chats WHERE id = ?1", id))
    }

    pub fn list_chats(&self) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| {
            query_chats(
                conn,
                "SELECT id, name, image, last_entry_id FROM chats ORDER BY id",
                None,
            )
        })
    }

    /// All chats the user is currently a participant of.
    pub fn chats_for_user(&self, user_id: i64) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| {
            query_chats(
                conn,
                "SELECT c.id, c.name, c.image, c.last_entry_id
                 FROM chats c
                 JOIN chat_participants p ON p.chat_id = c.id
                 WHERE p.user_id = ?1
                 ORDER BY c.id",
                Some(user_id),
            )
        })
    }

    /// Add a user to a chat's participant set. Returns false if already present.
    pub fn add_participant(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO chat_participants (chat_id, user_id) VALUES (?1, ?2)",
                params![chat_id, user_id],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn participants(&self, chat_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| query_participants(conn, chat_id))
    }

    // -- Entries --

    /// Post an entry stamped with the server clock and point the chat's
    /// `last_entry_id` at it. The participant check, both writes and the
    /// participant list handed back for fan-out all come from one transaction.
    pub fn create_entry(&self, chat_id: i64, user_id: i64, text: &str) -> Result<EntryOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !exists(&tx, "SELECT 1 FROM chats WHERE id = ?1", chat_id)? {
                return Ok(EntryOutcome::UnknownChat);
            }
            let participants = query_participants(&tx, chat_id)?;
            if !participants.contains(&user_id) {
                return Ok(EntryOutcome::NotParticipant);
            }

            tx.execute(
                "INSERT INTO entries (chat_id, user_id, timestamp, text) VALUES (?1, ?2, ?3, ?4)",
                params![chat_id, user_id, now_timestamp(), text],
            )?;
            let entry_id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE chats SET last_entry_id = ?1 WHERE id = ?2",
                params![entry_id, chat_id],
            )?;

            let entry = query_entry(&tx, entry_id)?
                .ok_or_else(|| anyhow!("Entry vanished after insert: {}", entry_id))?;
            tx.commit()?;
            Ok(EntryOutcome::Posted {
                entry,
                participants,
            })
        })
    }

    pub fn list_entries(&self) -> Result<Vec<EntryRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} ORDER BY e.id", ENTRY_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// History of one chat, oldest first.
    pub fn entries_for_chat(&self, chat_id: i64) -> Result<Vec<EntryRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE e.chat_id = ?1 ORDER BY e.id", ENTRY_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([chat_id], map_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Images --

    pub fn insert_image(&self, image: &ImageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO images (id, filename, content_type, size, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    image.id,
                    image.filename,
                    image.content_type,
                    image.size,
                    image.created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_image(&self, id: &str) -> Result<Option<ImageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, filename, content_type, size, created_at FROM images WHERE id = ?1",
                [id],
                map_image,
            )
            .optional()
        })
    }

    pub fn list_images(&self) -> Result<Vec<ImageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, filename, content_type, size, created_at FROM images ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([], map_image)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn exists(conn: &Connection, sql: &str, id: i64) -> Result<bool> {
    let found: Option<i64> = conn.query_row(sql, [id], |row| row.get(0)).optional()?;
    Ok(found.is_some())
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        email: row.get(3)?,
        balance: row.get(4)?,
        is_verified: row.get(5)?,
        is_visible: row.get(6)?,
        avatar: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn map_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        lat: row.get(1)?,
        lon: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        organizer_id: row.get(5)?,
        contact_email: row.get(6)?,
        contact_phone: row.get(7)?,
        start_time: row.get(8)?,
        end_time: row.get(9)?,
        images: row.get(10)?,
        attendees: Vec::new(),
    })
}

fn map_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        text: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

fn map_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        name: row.get(1)?,
        image: row.get(2)?,
        last_entry_id: row.get(3)?,
        participants: Vec::new(),
        last_entry: None,
    })
}

fn map_image(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRow> {
    Ok(ImageRow {
        id: row.get(0)?,
        filename: row.get(1)?,
        content_type: row.get(2)?,
        size: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    conn.query_row(&sql, [id], map_user).optional()
}

fn query_event(conn: &Connection, id: i64) -> Result<Option<EventRow>> {
    let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
    let Some(mut row) = conn.query_row(&sql, [id], map_event).optional()? else {
        return Ok(None);
    };
    row.attendees = query_attendees(conn, id)?;
    Ok(Some(row))
}

fn query_attendees(conn: &Connection, event_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT user_id FROM event_attendees WHERE event_id = ?1 ORDER BY user_id")?;
    let ids = stmt
        .query_map([event_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

fn query_participants(conn: &Connection, chat_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT user_id FROM chat_participants WHERE chat_id = ?1 ORDER BY user_id")?;
    let ids = stmt
        .query_map([chat_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

fn query_entry(conn: &Connection, id: i64) -> Result<Option<EntryRow>> {
    let sql = format!("{} WHERE e.id = ?1", ENTRY_SELECT);
    conn.query_row(&sql, [id], map_entry).optional()
}

fn query_chat(conn: &Connection, id: i64) -> Result<Option<ChatRow>> {
    let mut rows = query_chats(
        conn,
        "SELECT id, name, image, last_entry_id FROM chats WHERE id = ?1",
        Some(id),
    )?;
    Ok(rows.pop())
}

/// Load chat rows for `sql` (which selects id, name, image, last_entry_id and
/// takes at most one parameter), then resolve participants and last entry.
fn query_chats(conn: &Connection, sql: &str, param: Option<i64>) -> Result<Vec<ChatRow>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = match param {
        Some(p) => stmt.query_map([p], map_chat)?.collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map_chat)?.collect::<std::result::Result<Vec<_>, _>>()?,
    };

    for row in &mut rows {
        row.participants = query_participants(conn, row.id)?;
        if let Some(entry_id) = row.last_entry_id {
            row.last_entry = query_entry(conn, entry_id)?;
        }
    }

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aristocratii_types::models::VerificationKind;
    use chrono::{Duration, Utc};

    fn posted(outcome: EntryOutcome) -> (EntryRow, Vec<i64>) {
        match outcome {
            EntryOutcome::Posted {
                entry,
                participants,
            } => (entry, participants),
            EntryOutcome::UnknownChat => panic!("chat should exist"),
            EntryOutcome::NotParticipant => panic!("author should participate"),
        }
    }

    fn add_user(db: &Database, username: &str) -> i64 {
        db.create_user(&NewUser {
            username,
            password_hash: "$argon2id$stub",
            email: "someone@example.com",
            balance: 0.0,
            is_verified: VerificationKind::Person,
            is_visible: true,
            avatar: None,
        })
        .unwrap()
        .expect("username should be free")
        .id
    }

    #[test]
    fn duplicate_username_is_reported_not_inserted() {
        let db = Database::open_in_memory().unwrap();
        add_user(&db, "alice");

        let second = db
            .create_user(&NewUser {
                username: "alice",
                password_hash: "other",
                email: "other@example.com",
                balance: 1.0,
                is_verified: VerificationKind::Ngo,
                is_visible: false,
                avatar: None,
            })
            .unwrap();

        assert!(second.is_none());
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn participants_have_set_semantics() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");
        let chat = db.create_chat("general", None, &[alice, alice]).unwrap();

        assert_eq!(chat.participants, vec![alice]);
        assert!(!db.add_participant(chat.id, alice).unwrap());
        assert_eq!(db.participants(chat.id).unwrap(), vec![alice]);
    }

    #[test]
    fn chats_for_user_returns_exactly_their_chats() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");

        let a = db.create_chat("a", None, &[alice, bob]).unwrap();
        let b = db.create_chat("b", None, &[bob]).unwrap();
        let c = db.create_chat("c", None, &[alice]).unwrap();

        let ids: Vec<i64> = db.chats_for_user(alice).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);

        let ids: Vec<i64> = db.chats_for_user(bob).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[test]
    fn last_entry_tracks_latest_entry() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let chat = db.create_chat("general", None, &[alice, bob]).unwrap();
        let other = db.create_chat("other", None, &[alice]).unwrap();

        assert!(db.get_chat(chat.id).unwrap().unwrap().last_entry.is_none());

        for (author, text) in [(alice, "one"), (bob, "two"), (alice, "three")] {
            let (entry, _) = posted(db.create_entry(chat.id, author, text).unwrap());
            posted(db.create_entry(other.id, alice, "noise").unwrap());

            let latest = db.entries_for_chat(chat.id).unwrap().pop().unwrap();
            let stored = db.get_chat(chat.id).unwrap().unwrap();
            assert_eq!(stored.last_entry_id, Some(latest.id));
            assert_eq!(latest.id, entry.id);
            assert_eq!(stored.last_entry.unwrap().text, text);
        }

        let last = db.get_chat(chat.id).unwrap().unwrap().last_entry.unwrap();
        assert_eq!(last.username, "alice");
    }

    #[test]
    fn entry_for_unknown_chat_or_outsider_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");
        let eve = add_user(&db, "eve");
        let chat = db.create_chat("general", None, &[alice]).unwrap();

        assert!(matches!(
            db.create_entry(42, alice, "lost").unwrap(),
            EntryOutcome::UnknownChat
        ));
        assert!(matches!(
            db.create_entry(chat.id, eve, "let me in").unwrap(),
            EntryOutcome::NotParticipant
        ));
        assert!(db.list_entries().unwrap().is_empty());
        assert!(db.get_chat(chat.id).unwrap().unwrap().last_entry_id.is_none());
    }

    #[test]
    fn posted_entry_reports_participants_at_commit() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let chat = db.create_chat("general", None, &[alice]).unwrap();

        let (_, participants) = posted(db.create_entry(chat.id, alice, "one").unwrap());
        assert_eq!(participants, vec![alice]);

        db.add_participant(chat.id, bob).unwrap();
        let (_, participants) = posted(db.create_entry(chat.id, alice, "two").unwrap());
        assert_eq!(participants, vec![alice, bob]);
    }

    #[test]
    fn ensure_chat_creates_placeholder_once() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.ensure_chat(5).unwrap(), ChatSlot::Created);
        assert_eq!(db.ensure_chat(5).unwrap(), ChatSlot::Existing);

        let chat = db.get_chat(5).unwrap().unwrap();
        assert_eq!(chat.name, "Chat 5");
        assert!(chat.participants.is_empty());
    }

    #[test]
    fn placeholder_ids_stay_near_the_end() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.ensure_chat(i64::MAX).unwrap(), ChatSlot::OutOfRange);
        assert_eq!(db.ensure_chat(0).unwrap(), ChatSlot::OutOfRange);
        assert_eq!(db.ensure_chat(-3).unwrap(), ChatSlot::OutOfRange);
        assert_eq!(
            db.ensure_chat(PLACEHOLDER_ID_WINDOW + 1).unwrap(),
            ChatSlot::OutOfRange
        );
        assert!(db.list_chats().unwrap().is_empty());

        // Regular chats still get ids after rejected placeholders
        let chat = db.create_chat("after", None, &[]).unwrap();
        assert_eq!(chat.id, 1);

        assert_eq!(
            db.ensure_chat(1 + PLACEHOLDER_ID_WINDOW).unwrap(),
            ChatSlot::Created
        );
        let next = db.create_chat("next", None, &[]).unwrap();
        assert_eq!(next.id, 2 + PLACEHOLDER_ID_WINDOW);
    }

    #[test]
    fn attendees_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");
        let start = Utc::now();
        let event = db
            .create_event(&NewEvent {
                lat: 44.43,
                lon: 26.1,
                name: "Cleanup",
                description: "Park cleanup",
                organizer_id: alice,
                contact_email: None,
                contact_phone: Some("0700"),
                start_time: start,
                end_time: start + Duration::hours(2),
                images: &["a.png".to_string()],
            })
            .unwrap();

        assert!(db.add_attendee(event.id, alice).unwrap());
        assert!(!db.add_attendee(event.id, alice).unwrap());

        let event = db.get_event(event.id).unwrap().unwrap().into_event();
        assert_eq!(event.attendees, vec![alice]);
        assert_eq!(event.attendee_count, 1);
        assert_eq!(event.images, vec!["a.png".to_string()]);
    }
}
