//! Key/value session store over the `kv_store` table.
//!
//! # Responsibility
//! - Load, save and delete the tab session blob under a storage key.
//!
//! # Invariants
//! - `save_blob` is an upsert; one row per key.
//! - Blank keys are rejected before touching SQL.

use crate::db::DbError;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Session store error.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid session store data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract for persisted session blobs.
pub trait SessionRepository {
    fn load_blob(&self, key: &str) -> RepoResult<Option<String>>;
    fn save_blob(&self, key: &str, blob: &str) -> RepoResult<()>;
    /// Returns whether a row was removed.
    fn delete_blob(&self, key: &str) -> RepoResult<bool>;
}

/// SQLite-backed session repository.
///
/// Owns its connection so a session can live in a process-wide slot.
pub struct SqliteSessionRepository {
    conn: Connection,
}

impl SqliteSessionRepository {
    /// Wraps a connection returned by `db::open_db*` (migrations applied).
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SessionRepository for SqliteSessionRepository {
    fn load_blob(&self, key: &str) -> RepoResult<Option<String>> {
        let key = checked_key(key)?;
        let blob = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1;", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        debug!(
            "event=kv_load module=repo status=ok key={} found={}",
            key,
            blob.is_some()
        );
        Ok(blob)
    }

    fn save_blob(&self, key: &str, blob: &str) -> RepoResult<()> {
        let key = checked_key(key)?;
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, CAST(strftime('%s', 'now') AS INTEGER) * 1000)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, blob],
        )?;
        debug!(
            "event=kv_save module=repo status=ok key={} bytes={}",
            key,
            blob.len()
        );
        Ok(())
    }

    fn delete_blob(&self, key: &str) -> RepoResult<bool> {
        let key = checked_key(key)?;
        let removed = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1;", [key])?;
        Ok(removed > 0)
    }
}

fn checked_key(key: &str) -> RepoResult<&str> {
    let key = key.trim();
    if key.is_empty() {
        return Err(RepoError::InvalidData("storage key must not be blank".to_string()));
    }
    Ok(key)
}
