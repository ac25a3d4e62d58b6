use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            email       TEXT NOT NULL,
            balance     REAL NOT NULL DEFAULT 0,
            is_verified TEXT NOT NULL CHECK (is_verified IN ('NGO', 'SPONSOR', 'PERSON')),
            is_visible  INTEGER NOT NULL DEFAULT 1,
            avatar      TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            lat             REAL NOT NULL,
            lon             REAL NOT NULL,
            name            TEXT NOT NULL,
            description     TEXT NOT NULL DEFAULT '',
            organizer_id    INTEGER NOT NULL REFERENCES users(id),
            contact_email   TEXT,
            contact_phone   TEXT,
            start_time      TEXT NOT NULL,
            end_time        TEXT NOT NULL,
            images          TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS event_attendees (
            event_id    INTEGER NOT NULL REFERENCES events(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            PRIMARY KEY (event_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS chats (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL,
            image           TEXT,
            last_entry_id   INTEGER REFERENCES entries(id)
        );

        CREATE TABLE IF NOT EXISTS chat_participants (
            chat_id     INTEGER NOT NULL REFERENCES chats(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            PRIMARY KEY (chat_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_chat_participants_user
            ON chat_participants(user_id);

        CREATE TABLE IF NOT EXISTS entries (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id     INTEGER NOT NULL REFERENCES chats(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            timestamp   TEXT NOT NULL,
            text        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_entries_chat
            ON entries(chat_id, id);

        CREATE TABLE IF NOT EXISTS images (
            id              TEXT PRIMARY KEY,
            filename        TEXT NOT NULL UNIQUE,
            content_type    TEXT NOT NULL,
            size            INTEGER NOT NULL,
            created_at      TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
