use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;

use parley_crypto::keys::{generate_room_key, key_to_base64};

use crate::models::{HistoryRow, MessageRow, RoomRow, UserRow};
use crate::{Database, Result, StoreError};

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password) VALUES (?1, ?2)",
                (username, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;
            stmt.query_row([username], map_user).optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, username, password, created_at FROM users WHERE id = ?1")?;
            stmt.query_row([id], map_user).optional()
        })
    }

    /// Rename a user. The unique-username constraint still applies, so a
    /// racing rename to a just-taken name surfaces as a store error.
    pub fn update_username(&self, user_id: i64, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET username = ?1 WHERE id = ?2",
                (username, user_id),
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("user"));
            }
            Ok(())
        })
    }

    pub fn get_username_by_id(&self, id: i64) -> Result<String> {
        self.with_conn(|conn| {
            conn.query_row("SELECT username FROM users WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .map_err(|_| StoreError::NotFound("user"))
        })
    }

    // -- Rooms --

    /// Fetch a room by name, creating it with a fresh key on first
    /// reference. Creation goes through the unique-name constraint
    /// (INSERT OR IGNORE then refetch), so two concurrent first-time
    /// callers converge on a single key. Legacy rows without a key are
    /// backfilled once.
    pub fn get_or_create_room(&self, name: &str) -> Result<RoomRow> {
        self.with_conn(|conn| {
            let fresh = key_to_base64(&generate_room_key());
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO rooms (name, symmetric_key) VALUES (?1, ?2)",
                (name, &fresh),
            )?;
            if inserted > 0 {
                debug!(room = name, "created room");
            }

            let room = query_room_by_name(conn, name)?.ok_or(StoreError::NotFound("room"))?;
            if !room.symmetric_key.is_empty() {
                return Ok(room);
            }

            let backfill = key_to_base64(&generate_room_key());
            conn.execute(
                "UPDATE rooms SET symmetric_key = ?1
                 WHERE id = ?2 AND (symmetric_key IS NULL OR symmetric_key = '')",
                (&backfill, room.id),
            )?;
            query_room_by_name(conn, name)?.ok_or(StoreError::NotFound("room"))
        })
    }

    pub fn get_room_by_name(&self, name: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| query_room_by_name(conn, name))
    }

    pub fn get_room_by_id(&self, id: i64) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, symmetric_key FROM rooms WHERE id = ?1")?;
            stmt.query_row([id], map_room).optional()
        })
    }

    pub fn list_rooms(&self, search: Option<&str>) -> Result<Vec<RoomRow>> {
        self.with_conn(|conn| {
            let (sql, pattern);
            match search {
                Some(term) => {
                    sql = "SELECT id, name, symmetric_key FROM rooms WHERE name LIKE ?1 ORDER BY name";
                    pattern = format!("%{term}%");
                }
                None => {
                    sql = "SELECT id, name, symmetric_key FROM rooms ORDER BY name";
                    pattern = String::new();
                }
            }

            let mut stmt = conn.prepare(sql)?;
            let rows = if search.is_some() {
                stmt.query_map([&pattern], map_room)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            } else {
                stmt.query_map([], map_room)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };
            Ok(rows)
        })
    }

    pub fn join_room(&self, user_id: i64, room_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO room_members (user_id, room_id) VALUES (?1, ?2)",
                (user_id, room_id),
            )?;
            Ok(())
        })
    }

    // -- Filter settings --

    /// Read the per-user, per-room filter preference, creating the default
    /// (off) row on first lookup.
    pub fn get_filter_setting(&self, user_id: i64, room_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO room_settings (user_id, room_id, filter_enabled)
                 VALUES (?1, ?2, 0)",
                (user_id, room_id),
            )?;
            let enabled: bool = conn.query_row(
                "SELECT filter_enabled FROM room_settings WHERE user_id = ?1 AND room_id = ?2",
                (user_id, room_id),
                |row| row.get(0),
            )?;
            Ok(enabled)
        })
    }

    pub fn set_filter_setting(&self, user_id: i64, room_id: i64, enabled: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO room_settings (user_id, room_id, filter_enabled)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, room_id) DO UPDATE SET filter_enabled = excluded.filter_enabled",
                (user_id, room_id, enabled),
            )?;
            Ok(())
        })
    }

    // -- Messages --

    /// Append one message row. The timestamp is assigned here, at persist
    /// time, so per-room order follows persistence order.
    pub fn append_message(
        &self,
        room_id: i64,
        sender_id: i64,
        ciphertext: &str,
        is_toxic: bool,
        toxicity_prob: f64,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            let timestamp = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO messages (room_id, sender_id, ciphertext, is_toxic, toxicity_prob, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (room_id, sender_id, ciphertext, is_toxic, toxicity_prob, &timestamp),
            )?;
            Ok(MessageRow {
                id: conn.last_insert_rowid(),
                room_id,
                sender_id,
                ciphertext: ciphertext.to_string(),
                is_toxic,
                toxicity_prob,
                timestamp,
            })
        })
    }

    /// Room history in timestamp order, with sender usernames joined in.
    /// With `hide_toxic`, flagged rows are elided entirely.
    pub fn get_history(&self, room_id: i64, hide_toxic: bool) -> Result<Vec<HistoryRow>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT m.id, m.room_id, m.sender_id, m.ciphertext, m.is_toxic,
                        m.toxicity_prob, m.timestamp, u.username
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.room_id = ?1",
            );
            if hide_toxic {
                sql.push_str(" AND m.is_toxic = 0");
            }
            sql.push_str(" ORDER BY m.timestamp ASC, m.id ASC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([room_id], |row| {
                    Ok(HistoryRow {
                        message: MessageRow {
                            id: row.get(0)?,
                            room_id: row.get(1)?,
                            sender_id: row.get(2)?,
                            ciphertext: row.get(3)?,
                            is_toxic: row.get(4)?,
                            toxicity_prob: row.get(5)?,
                            timestamp: row.get(6)?,
                        },
                        sender_username: row
                            .get::<_, Option<String>>(7)?
                            .unwrap_or_else(|| "unknown".to_string()),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_user(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn query_room_by_name(conn: &Connection, name: &str) -> Result<Option<RoomRow>> {
    let mut stmt = conn.prepare("SELECT id, name, symmetric_key FROM rooms WHERE name = ?1")?;
    stmt.query_row([name], map_room).optional()
}

fn map_room(row: &rusqlite::Row<'_>) -> std::result::Result<RoomRow, rusqlite::Error> {
    Ok(RoomRow {
        id: row.get(0)?,
        name: row.get(1)?,
        symmetric_key: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
    })
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

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, name: &str) -> i64 {
        db.create_user(name, "argon2-hash").unwrap()
    }

    #[test]
    fn room_creation_is_idempotent() {
        let db = db();
        let first = db.get_or_create_room("general").unwrap();
        let second = db.get_or_create_room("general").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.symmetric_key, second.symmetric_key);
        assert!(!first.symmetric_key.is_empty());
    }

    #[test]
    fn distinct_rooms_get_distinct_keys() {
        let db = db();
        let a = db.get_or_create_room("a").unwrap();
        let b = db.get_or_create_room("b").unwrap();
        assert_ne!(a.symmetric_key, b.symmetric_key);
    }

    #[test]
    fn missing_key_is_backfilled_once() {
        let db = db();
        db.with_conn(|conn| {
            conn.execute("INSERT INTO rooms (name, symmetric_key) VALUES ('legacy', NULL)", [])?;
            Ok(())
        })
        .unwrap();

        let room = db.get_or_create_room("legacy").unwrap();
        assert!(!room.symmetric_key.is_empty());
        let again = db.get_or_create_room("legacy").unwrap();
        assert_eq!(room.symmetric_key, again.symmetric_key);
    }

    #[test]
    fn filter_setting_defaults_false_and_persists() {
        let db = db();
        let user = seed_user(&db, "alice");
        let room = db.get_or_create_room("general").unwrap();

        assert!(!db.get_filter_setting(user, room.id).unwrap());

        db.set_filter_setting(user, room.id, true).unwrap();
        assert!(db.get_filter_setting(user, room.id).unwrap());

        // Upsert path: flipping back updates the existing row.
        db.set_filter_setting(user, room.id, false).unwrap();
        assert!(!db.get_filter_setting(user, room.id).unwrap());
    }

    #[test]
    fn append_assigns_ids_and_timestamps() {
        let db = db();
        let user = seed_user(&db, "alice");
        let room = db.get_or_create_room("general").unwrap();

        let first = db.append_message(room.id, user, "Y2lwaGVy", false, 0.1).unwrap();
        let second = db.append_message(room.id, user, "dGV4dA==", true, 0.9).unwrap();
        assert!(second.id > first.id);
        assert!(
            chrono::DateTime::parse_from_rfc3339(&first.timestamp).is_ok(),
            "timestamp must be RFC 3339"
        );
    }

    #[test]
    fn history_joins_usernames_and_hides_toxic() {
        let db = db();
        let user = seed_user(&db, "alice");
        let room = db.get_or_create_room("general").unwrap();
        db.append_message(room.id, user, "Y2xlYW4=", false, 0.0).unwrap();
        db.append_message(room.id, user, "dG94aWM=", true, 0.95).unwrap();

        let all = db.get_history(room.id, false).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].sender_username, "alice");

        let filtered = db.get_history(room.id, true).unwrap();
        assert_eq!(filtered.len(), 1);
        assert!(!filtered[0].message.is_toxic);
    }

    #[test]
    fn update_username_persists() {
        let db = db();
        let user = seed_user(&db, "alice");
        db.update_username(user, "alicia").unwrap();
        assert_eq!(db.get_user_by_id(user).unwrap().unwrap().username, "alicia");
        assert!(db.get_user_by_username("alice").unwrap().is_none());
    }

    #[test]
    fn update_username_respects_uniqueness() {
        let db = db();
        let alice = seed_user(&db, "alice");
        seed_user(&db, "bob");
        assert!(db.update_username(alice, "bob").is_err());
    }

    #[test]
    fn update_username_for_unknown_user_is_not_found() {
        let db = db();
        assert!(matches!(
            db.update_username(999, "ghost"),
            Err(StoreError::NotFound("user"))
        ));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = db();
        seed_user(&db, "alice");
        assert!(db.create_user("alice", "other-hash").is_err());
    }

    #[test]
    fn list_rooms_matches_search() {
        let db = db();
        db.get_or_create_room("general").unwrap();
        db.get_or_create_room("generators").unwrap();
        db.get_or_create_room("random").unwrap();

        assert_eq!(db.list_rooms(None).unwrap().len(), 3);
        assert_eq!(db.list_rooms(Some("gen")).unwrap().len(), 2);
        assert!(db.list_rooms(Some("zzz")).unwrap().is_empty());
    }
}
