//! SQLite schema for credential counters.
//!
//! Tables:
//! - `credential_counters`: one row per credential identity, expiring

/// DDL for the credential counter store.
///
/// Schema version: 1
pub const CREDENTIAL_SCHEMA: &str = r#"
-- One counter per credential identity (hex sha256 of the secret)
CREATE TABLE IF NOT EXISTS credential_counters (
    credential_id    TEXT PRIMARY KEY,
    value            INTEGER NOT NULL,
    expires_at       INTEGER NOT NULL,
    updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_credential_counters_expires_at
    ON credential_counters(expires_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREDENTIAL_SCHEMA).unwrap();
        conn.execute_batch(CREDENTIAL_SCHEMA).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'credential_counters'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }
}
