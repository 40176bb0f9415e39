//! SQLite schema for the local key-value store.

use rusqlite::Connection;
use zephra_core::error::{ZephraError, ZephraResult};

/// Current schema version, recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// Create all tables if they don't exist.
pub fn create_tables(conn: &Connection) -> ZephraResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now') * 1000)
        );",
    )
    .map_err(|e| ZephraError::Database(format!("failed to create tables: {e}")))?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|e| ZephraError::Database(e.to_string()))?;
    Ok(())
}

/// Read the recorded schema version.
pub fn schema_version(conn: &Connection) -> ZephraResult<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| ZephraError::Database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
