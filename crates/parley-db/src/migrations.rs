use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS rooms (
            id              INTEGER PRIMARY KEY,
            name            TEXT NOT NULL UNIQUE,
            symmetric_key   TEXT
        );

        CREATE TABLE IF NOT EXISTS room_members (
            id          INTEGER PRIMARY KEY,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            room_id     INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            joined_at   TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, room_id)
        );

        CREATE TABLE IF NOT EXISTS room_settings (
            id              INTEGER PRIMARY KEY,
            user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            room_id         INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            filter_enabled  INTEGER NOT NULL DEFAULT 0,
            UNIQUE(user_id, room_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY,
            room_id         INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            sender_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            ciphertext      TEXT NOT NULL,
            is_toxic        INTEGER NOT NULL DEFAULT 0,
            toxicity_prob   REAL NOT NULL DEFAULT 0.0,
            timestamp       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON messages(room_id, timestamp);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
