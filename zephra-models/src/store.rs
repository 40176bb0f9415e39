//! Key-value persistence for client state.
//!
//! `KeyValueStore` is the storage port every service persists through.
//! `SqliteStore` backs it with the pooled database; `MemoryStore` keeps
//! everything in process for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::params;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use zephra_core::error::{ZephraError, ZephraResult};

use crate::db::Database;

/// String-keyed storage of string values.
pub trait KeyValueStore: Send + Sync {
    /// Get the raw value for a key.
    fn get(&self, key: &str) -> ZephraResult<Option<String>>;

    /// Set the raw value for a key (upsert).
    fn set(&self, key: &str, value: &str) -> ZephraResult<()>;

    /// Delete a key. Returns whether it existed.
    fn remove(&self, key: &str) -> ZephraResult<bool>;

    /// All stored keys, sorted.
    fn keys(&self) -> ZephraResult<Vec<String>>;
}

/// Key-value store backed by the `kv_store` table.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> ZephraResult<Option<String>> {
        let conn = self.db.conn()?;
        match conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            [key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ZephraError::Database(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> ZephraResult<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )
        .map_err(|e| ZephraError::Database(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> ZephraResult<bool> {
        let conn = self.db.conn()?;
        let changed = conn
            .execute("DELETE FROM kv_store WHERE key = ?1", [key])
            .map_err(|e| ZephraError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    fn keys(&self) -> ZephraResult<Vec<String>> {
        let conn = self.db.conn()?;
        let mut stmt = conn
            .prepare("SELECT key FROM kv_store ORDER BY key")
            .map_err(|e| ZephraError::Database(e.to_string()))?;

        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| ZephraError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(keys)
    }
}

/// In-process key-value store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ZephraResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| ZephraError::Storage("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> ZephraResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ZephraResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ZephraResult<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn keys(&self) -> ZephraResult<Vec<String>> {
        let mut keys: Vec<String> = self.lock()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Load a JSON value stored under `key`, falling back to `T::default()`.
///
/// A missing key yields the default silently. An unreadable store yields the
/// default with a warning. Unparsable JSON is treated as corruption: the key
/// is reset and the default returned.
pub fn load_json_or_default<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!("failed to read {key} from store: {e}");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("discarding corrupt value under {key}: {e}");
            if let Err(e) = store.remove(key) {
                warn!("failed to reset {key}: {e}");
            }
            T::default()
        }
    }
}

/// Serialize `value` as JSON and store it under `key`.
pub fn save_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> ZephraResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)?;
    debug!("persisted {key} ({} bytes)", raw.len());
    Ok(())
}
