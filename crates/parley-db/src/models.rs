//! Database row types mapping directly to SQLite rows. Kept separate from
//! the wire/API types so the storage layer stays independent of frame
//! shapes.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct RoomRow {
    pub id: i64,
    pub name: String,
    /// Base64-encoded 32-byte key. Guaranteed non-empty by
    /// `get_or_create_room`; empty only for legacy rows before backfill.
    pub symmetric_key: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub ciphertext: String,
    pub is_toxic: bool,
    pub toxicity_prob: f64,
    /// RFC 3339, assigned by the store at append time.
    pub timestamp: String,
}

/// History row with the sender's username joined in.
pub struct HistoryRow {
    pub message: MessageRow,
    pub sender_username: String,
}
