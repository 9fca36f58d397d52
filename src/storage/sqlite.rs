//! SQLite backend.
//!
//! Entries live in a single `entries` table. Batched writes run in one
//! transaction, so both metadata mappings land together or not at all.

use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::{KeyValueStore, StorageError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

const UPSERT: &str = r#"
INSERT INTO entries (key, value, updated_at)
VALUES (?1, ?2, CURRENT_TIMESTAMP)
ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Setup {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let value = conn
            .query_row("SELECT value FROM entries WHERE key = ?", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(UPSERT, rusqlite::params![key, value])?;
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let tx = conn.transaction()?;
        for (key, value) in entries {
            tx.execute(UPSERT, rusqlite::params![key, value])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_upsert_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_set_many_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db/notes.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .set_many(&[
                    ("photoDescriptions", r#"{"a":"x"}"#.to_string()),
                    ("photoLocations", r#"{"a":"y"}"#.to_string()),
                ])
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get("photoDescriptions").unwrap().as_deref(),
            Some(r#"{"a":"x"}"#)
        );
        assert_eq!(
            store.get("photoLocations").unwrap().as_deref(),
            Some(r#"{"a":"y"}"#)
        );
    }
}
