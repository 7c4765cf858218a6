//! SQLite persistence for partition files.
//!
//! One row per object. Each put is a single statement, so a reader
//! sees either the complete body or no row at all.

use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::ObjectStore;
use crate::error::{SimError, SimResult};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: readers never block the writer.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: path.to_string(),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: ":memory:".into(),
        })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.lock()?
            .execute_batch(include_str!("../../migrations/001_object_store.sql"))?;
        Ok(())
    }

    fn lock(&self) -> SimResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SimError::Other(anyhow::anyhow!("sqlite connection mutex poisoned")))
    }
}

impl ObjectStore for SqliteStore {
    fn list(&self, prefix: &str) -> SimResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM object
             WHERE substr(name, 1, ?2) = ?1
             ORDER BY name ASC",
        )?;
        let names = stmt
            .query_map(params![prefix, prefix.chars().count() as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn get(&self, name: &str) -> SimResult<String> {
        let conn = self.lock()?;
        let body = conn.query_row(
            "SELECT body FROM object WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(body)
    }

    fn exists(&self, name: &str) -> SimResult<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM object WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn put(&self, name: &str, body: &str, overwrite: bool) -> SimResult<()> {
        let conn = self.lock()?;
        let written_at = chrono::Utc::now().to_rfc3339();
        let sql = if overwrite {
            "INSERT OR REPLACE INTO object (name, body, written_at) VALUES (?1, ?2, ?3)"
        } else {
            "INSERT OR IGNORE INTO object (name, body, written_at) VALUES (?1, ?2, ?3)"
        };
        let changed = conn.execute(sql, params![name, body, written_at])?;
        if changed == 0 {
            return Err(SimError::WriteConflict {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.location)
    }
}
