//! SQLite-backed persistence layer (`C5`).
//!
//! Grounded on `examples/Humans-Not-Required-local-agent-chat/src/db.rs`
//! (`Db { conn: Mutex<Connection> }`, WAL + foreign_keys pragmas,
//! `execute_batch` migration) — the teacher crate itself has no database
//! dependency, so this module's idiom is borrowed from elsewhere in the
//! reference pack. Column names and semantics follow
//! `examples/original_source/db_helper.c` and `chat_server.h`, extended with
//! the `room_user` junction table and a `timestamp` column on messages
//! (both required by history replay, `I7`).

mod types;

pub use types::{RoomRow, UserRow};

use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::ChatError;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self, ChatError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )?;
        let store = Store {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL UNIQUE,
                connected INTEGER NOT NULL DEFAULT 0,
                timestamp DATETIME DEFAULT (DATETIME('now', 'localtime'))
            );

            CREATE TABLE IF NOT EXISTS room (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                room_no INTEGER NOT NULL UNIQUE,
                room_name TEXT NOT NULL UNIQUE,
                manager_id TEXT NOT NULL,
                member_count INTEGER NOT NULL DEFAULT 0,
                created_time DATETIME DEFAULT (DATETIME('now', 'localtime'))
            );

            CREATE TABLE IF NOT EXISTS room_user (
                room_no INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                join_time DATETIME DEFAULT (DATETIME('now', 'localtime')),
                PRIMARY KEY (room_no, user_id),
                FOREIGN KEY (room_no) REFERENCES room(room_no) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES user(user_id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS message (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                room_no INTEGER NOT NULL,
                sender_id TEXT NOT NULL,
                context TEXT NOT NULL,
                timestamp DATETIME DEFAULT (DATETIME('now', 'localtime')),
                FOREIGN KEY (room_no) REFERENCES room(room_no) ON DELETE CASCADE,
                FOREIGN KEY (sender_id) REFERENCES user(user_id) ON UPDATE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_message_room_ts ON message(room_no, timestamp);
            CREATE INDEX IF NOT EXISTS idx_room_user_user ON room_user(user_id);",
        )?;
        Ok(())
    }

    /// Run at startup: clear stale `connected` flags left by a previous,
    /// uncleanly-terminated run, and return the highest persisted room id
    /// so the in-memory id counter can resume above it.
    pub fn reconcile_on_startup(&self) -> Result<u32, ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE user SET connected = 0", [])?;
        let max_room: Option<i64> = conn
            .query_row("SELECT MAX(room_no) FROM room", [], |r| r.get(0))
            .optional()?
            .flatten();
        Ok(max_room.unwrap_or(0) as u32)
    }

    // ---- users ----------------------------------------------------------

    pub fn user_exists(&self, nickname: &str) -> Result<bool, ChatError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user WHERE user_id = ?1",
            params![nickname],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_user(&self, nickname: &str) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user (user_id, connected) VALUES (?1, 1)",
            params![nickname],
        )?;
        Ok(())
    }

    pub fn rename_user(&self, old_nickname: &str, new_nickname: &str) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE user SET user_id = ?1 WHERE user_id = ?2",
            params![new_nickname, old_nickname],
        )?;
        Ok(())
    }

    pub fn set_connected(&self, nickname: &str, connected: bool) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE user SET connected = ?1 WHERE user_id = ?2",
            params![connected as i64, nickname],
        )?;
        Ok(())
    }

    pub fn delete_user(&self, nickname: &str) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM user WHERE user_id = ?1", params![nickname])?;
        Ok(())
    }

    pub fn all_users(&self) -> Result<Vec<UserRow>, ChatError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT user_id, connected, timestamp FROM user ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(UserRow {
                    user_id: r.get(0)?,
                    connected: r.get::<_, i64>(1)? != 0,
                    timestamp: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn recent_users(&self, limit: u32) -> Result<Vec<UserRow>, ChatError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, connected, timestamp FROM user ORDER BY timestamp DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |r| {
                Ok(UserRow {
                    user_id: r.get(0)?,
                    connected: r.get::<_, i64>(1)? != 0,
                    timestamp: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn user_info(&self, nickname: &str) -> Result<Option<UserRow>, ChatError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT user_id, connected, timestamp FROM user WHERE user_id = ?1",
                params![nickname],
                |r| {
                    Ok(UserRow {
                        user_id: r.get(0)?,
                        connected: r.get::<_, i64>(1)? != 0,
                        timestamp: r.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ---- rooms ------------------------------------------------------------

    pub fn room_name_exists(&self, name: &str) -> Result<bool, ChatError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM room WHERE room_name = ?1",
            params![name],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_room(&self, room_no: u32, name: &str, manager: &str) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO room (room_no, room_name, manager_id, member_count) VALUES (?1, ?2, ?3, 0)",
            params![room_no, name, manager],
        )?;
        Ok(())
    }

    pub fn delete_room(&self, room_no: u32) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM room WHERE room_no = ?1", params![room_no])?;
        Ok(())
    }

    pub fn rename_room(&self, room_no: u32, new_name: &str) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE room SET room_name = ?1 WHERE room_no = ?2",
            params![new_name, room_no],
        )?;
        Ok(())
    }

    pub fn set_room_manager(&self, room_no: u32, manager: &str) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE room SET manager_id = ?1 WHERE room_no = ?2",
            params![manager, room_no],
        )?;
        Ok(())
    }

    pub fn set_room_member_count(&self, room_no: u32, count: u32) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE room SET member_count = ?1 WHERE room_no = ?2",
            params![count, room_no],
        )?;
        Ok(())
    }

    pub fn all_rooms(&self) -> Result<Vec<RoomRow>, ChatError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT room_no, room_name, manager_id, member_count, created_time FROM room ORDER BY room_no ASC",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(RoomRow {
                    room_no: r.get::<_, i64>(0)? as u32,
                    room_name: r.get(1)?,
                    manager_id: r.get(2)?,
                    member_count: r.get::<_, i64>(3)? as u32,
                    created_time: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn room_info_by_name(&self, name: &str) -> Result<Option<RoomRow>, ChatError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT room_no, room_name, manager_id, member_count, created_time FROM room WHERE room_name = ?1",
                params![name],
                |r| {
                    Ok(RoomRow {
                        room_no: r.get::<_, i64>(0)? as u32,
                        room_name: r.get(1)?,
                        manager_id: r.get(2)?,
                        member_count: r.get::<_, i64>(3)? as u32,
                        created_time: r.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ---- room_user ---------------------------------------------------------

    /// Records `nickname`'s join of `room_no`. Ignored if a row already
    /// exists, so a rejoin after leaving never overwrites the original
    /// `join_time` — history replay always windows from the first join (I7).
    pub fn join_room(&self, room_no: u32, nickname: &str) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO room_user (room_no, user_id) VALUES (?1, ?2)",
            params![room_no, nickname],
        )?;
        Ok(())
    }

    pub fn earliest_join_time(
        &self,
        room_no: u32,
        nickname: &str,
    ) -> Result<Option<String>, ChatError> {
        let conn = self.conn.lock().unwrap();
        let ts: Option<String> = conn
            .query_row(
                "SELECT join_time FROM room_user WHERE room_no = ?1 AND user_id = ?2",
                params![room_no, nickname],
                |r| r.get(0),
            )
            .optional()?;
        Ok(ts)
    }

    // ---- messages -----------------------------------------------------------

    pub fn insert_message(
        &self,
        room_no: u32,
        sender: &str,
        context: &str,
    ) -> Result<i64, ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO message (room_no, sender_id, context) VALUES (?1, ?2, ?3)",
            params![room_no, sender, context],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Returns `(sender_id, room_no)` for authorization checks before deletion.
    pub fn message_owner(&self, message_id: u64) -> Result<Option<(String, u32)>, ChatError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT sender_id, room_no FROM message WHERE id = ?1",
                params![message_id as i64],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as u32)),
            )
            .optional()?;
        Ok(row)
    }

    pub fn delete_message(&self, message_id: u64) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM message WHERE id = ?1", params![message_id as i64])?;
        Ok(())
    }

    /// Messages of `room_no` with `timestamp >= since`, oldest first.
    pub fn messages_since(
        &self,
        room_no: u32,
        since: &str,
    ) -> Result<Vec<(String, String)>, ChatError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT sender_id, context FROM message
             WHERE room_no = ?1 AND timestamp >= ?2
             ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![room_no, since], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open(":memory:").unwrap()
    }

    #[test]
    fn insert_and_find_user() {
        let s = store();
        assert!(!s.user_exists("alice").unwrap());
        s.insert_user("alice").unwrap();
        assert!(s.user_exists("alice").unwrap());
    }

    #[test]
    fn room_lifecycle() {
        let s = store();
        s.insert_user("alice").unwrap();
        s.insert_room(1, "lobby", "alice").unwrap();
        assert!(s.room_name_exists("lobby").unwrap());
        s.join_room(1, "alice").unwrap();
        let earliest = s.earliest_join_time(1, "alice").unwrap();
        assert!(earliest.is_some());
        s.delete_room(1).unwrap();
        assert!(!s.room_name_exists("lobby").unwrap());
    }

    #[test]
    fn reconcile_resets_connected_and_finds_max_room() {
        let s = store();
        s.insert_user("alice").unwrap();
        s.insert_room(5, "lobby", "alice").unwrap();
        let max = s.reconcile_on_startup().unwrap();
        assert_eq!(max, 5);
        let info = s.user_info("alice").unwrap().unwrap();
        assert!(!info.connected);
    }

    #[test]
    fn message_history_window() {
        let s = store();
        s.insert_user("alice").unwrap();
        s.insert_room(1, "lobby", "alice").unwrap();
        s.join_room(1, "alice").unwrap();
        s.insert_message(1, "alice", "hi").unwrap();
        let since = s.earliest_join_time(1, "alice").unwrap().unwrap();
        let msgs = s.messages_since(1, &since).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].1, "hi");
    }
}
