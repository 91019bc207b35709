//! SQLite-based durable storage.
//!
//! Provides persistent storage for:
//! - Pending classification records, in insertion order
//! - Key-value store for session state (counters, session id, wallet)

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::data_dir;
use crate::error::StorageError;
use crate::session::ClassificationRecord;

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/haven/haven.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns `StorageError::Unavailable` if the file cannot be opened.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()
            .map_err(|e| StorageError::Unavailable {
                path: "~/.config/haven".into(),
                message: e.to_string(),
            })?
            .join("haven.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|e| StorageError::Unavailable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Unavailable {
            path: ":memory:".into(),
            message: e.to_string(),
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS classifications (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id         TEXT NOT NULL,
                selected_action_id TEXT NOT NULL,
                timestamp_ms       INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Run `f` inside a single IMMEDIATE transaction; rolled back on error.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Append a classification record.
    pub fn insert_classification(
        conn: &Connection,
        record: &ClassificationRecord,
    ) -> Result<i64, StorageError> {
        conn.execute(
            "INSERT INTO classifications (content_id, selected_action_id, timestamp_ms)
             VALUES (?1, ?2, ?3)",
            params![
                record.content_id,
                record.selected_action_id,
                record.timestamp as i64
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All pending records, oldest first.
    pub fn list_classifications(&self) -> Result<Vec<ClassificationRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT content_id, selected_action_id, timestamp_ms
             FROM classifications
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ClassificationRecord {
                content_id: row.get(0)?,
                selected_action_id: row.get(1)?,
                timestamp: row.get::<_, i64>(2)? as u64,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn count_classifications(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM classifications", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Id of the newest pending record.
    pub fn last_classification_id(&self) -> Result<Option<i64>, StorageError> {
        Ok(self
            .conn
            .query_row("SELECT MAX(id) FROM classifications", [], |row| row.get(0))?)
    }

    pub(crate) fn count_classifications_in(conn: &Connection) -> Result<u64, StorageError> {
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM classifications", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete records with `id <= through_id`, or every record when `None`.
    pub fn delete_classifications(
        conn: &Connection,
        through_id: Option<i64>,
    ) -> Result<usize, StorageError> {
        let removed = match through_id {
            Some(id) => conn.execute(
                "DELETE FROM classifications WHERE id <= ?1",
                params![id],
            )?,
            None => conn.execute("DELETE FROM classifications", [])?,
        };
        Ok(removed)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::kv_get_in(&self.conn, key)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::kv_set_in(&self.conn, key, value)
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub(crate) fn kv_get_in(conn: &Connection, key: &str) -> Result<Option<String>, StorageError> {
        Ok(conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    pub(crate) fn kv_set_in(conn: &Connection, key: &str, value: &str) -> Result<(), StorageError> {
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}
