//! CredentialStore: SQLite-backed credential counters.
//!
//! Provides the atomic compare-and-advance the counter protocol relies on:
//! - Expiring records (absent or expired reads as absent)
//! - Revocation sentinel (negative values are never advanced)
//! - Single-writer advance under `BEGIN IMMEDIATE`

use super::schema::CREDENTIAL_SCHEMA;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Time a second connection waits for the write lock before failing.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Credential store errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Credential store lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Result of an atomic counter advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The counter moved from `previous` to `previous + 1`.
    Advanced { previous: i64 },
    /// The counter holds the revocation sentinel and was left untouched.
    Revoked { value: i64 },
}

/// Persistent per-credential counter with time-to-live.
pub trait CredentialStore: Send + Sync {
    /// Live value for `id`, or `None` when absent or expired.
    fn get(&self, id: &str, now: DateTime<Utc>) -> Result<Option<i64>, StoreError>;

    /// Overwrite the value for `id`, expiring `ttl` after `now`.
    fn set(&self, id: &str, value: i64, ttl: Duration, now: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// Atomically read the live value (absent = 0) and, unless it is negative,
    /// write `value + 1` expiring `ttl` after `now`.
    fn advance(&self, id: &str, ttl: Duration, now: DateTime<Utc>) -> Result<Advance, StoreError>;
}

/// SQLite-backed credential store.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    /// Open a file-backed store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Create store from existing connection (for multi-connection tests).
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()));
        conn.execute_batch(CREDENTIAL_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Remove expired rows. Returns the number of rows deleted.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM credential_counters WHERE expires_at <= ?1",
            [now.timestamp()],
        )?;
        Ok(removed)
    }

    fn advance_inner(
        conn: &Connection,
        id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Advance, StoreError> {
        let current = live_value(conn, id, now)?.unwrap_or(0);
        if current < 0 {
            return Ok(Advance::Revoked { value: current });
        }

        upsert(conn, id, current + 1, ttl, now)?;
        Ok(Advance::Advanced { previous: current })
    }
}

fn live_value(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<Option<i64>, StoreError> {
    let value = conn
        .query_row(
            "SELECT value FROM credential_counters WHERE credential_id = ?1 AND expires_at > ?2",
            params![id, now.timestamp()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

fn upsert(
    conn: &Connection,
    id: &str,
    value: i64,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let expires_at = (now + ttl).timestamp();
    conn.execute(
        r#"
        INSERT INTO credential_counters (credential_id, value, expires_at, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(credential_id) DO UPDATE SET
            value = excluded.value,
            expires_at = excluded.expires_at,
            updated_at = excluded.updated_at
        "#,
        params![id, value, expires_at, now.to_rfc3339()],
    )?;
    Ok(())
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, id: &str, now: DateTime<Utc>) -> Result<Option<i64>, StoreError> {
        let conn = self.lock()?;
        live_value(&conn, id, now)
    }

    fn set(
        &self,
        id: &str,
        value: i64,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        upsert(&conn, id, value, ttl, now)
    }

    fn advance(&self, id: &str, ttl: Duration, now: DateTime<Utc>) -> Result<Advance, StoreError> {
        let conn = self.lock()?;

        // BEGIN IMMEDIATE acquires write lock immediately
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = Self::advance_inner(&conn, id, ttl, now);

        match &result {
            Ok(_) => {
                conn.execute("COMMIT", [])?;
            }
            Err(_) => {
                let _ = conn.execute("ROLLBACK", []);
            }
        }

        result
    }
}
