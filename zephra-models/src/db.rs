//! Database initialization, connection pooling, and lifecycle management.
//!
//! Uses SQLite in WAL mode with r2d2 connection pooling.
//! Runs an integrity check on startup and creates the key-value schema.

use std::path::Path;
use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{error, info};

use zephra_core::config::StorageConfig;
use zephra_core::error::{ZephraError, ZephraResult};

use crate::schema;

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database wrapper providing initialization, pooling, and lifecycle management.
#[derive(Clone)]
pub struct Database {
    pool: Arc<DbPool>,
}

impl Database {
    /// Initialize the database at the given path with the provided configuration.
    ///
    /// This:
    /// 1. Creates the database file and parent directories if needed
    /// 2. Enables WAL mode for concurrent read/write
    /// 3. Sets up connection pooling
    /// 4. Runs an integrity check if configured
    /// 5. Creates the schema tables
    pub fn init(db_path: &Path, config: &StorageConfig) -> ZephraResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("initializing store at {}", db_path.display());

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .connection_customizer(Box::new(ConnectionCustomizer {
                wal_mode: config.wal_mode,
            }))
            .build(manager)
            .map_err(|e| ZephraError::Pool(e.to_string()))?;

        let db = Self {
            pool: Arc::new(pool),
        };

        if config.integrity_check_on_startup {
            db.run_integrity_check()?;
        }

        {
            let conn = db.conn()?;
            schema::create_tables(&conn)?;
        }

        info!("store initialized successfully");
        Ok(db)
    }

    /// Open a private in-memory database.
    ///
    /// The pool is capped at one connection since every SQLite memory
    /// connection is its own database.
    pub fn open_in_memory() -> ZephraResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| ZephraError::Pool(e.to_string()))?;

        let db = Self {
            pool: Arc::new(pool),
        };
        schema::create_tables(&*db.conn()?)?;
        Ok(db)
    }

    /// Get a connection from the pool.
    pub fn conn(&self) -> ZephraResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| ZephraError::Pool(e.to_string()))
    }

    /// Run a SQLite integrity check.
    pub fn run_integrity_check(&self) -> ZephraResult<()> {
        let conn = self.conn()?;
        let result: String = conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(|e| ZephraError::Database(e.to_string()))?;

        if result != "ok" {
            error!("store integrity check failed: {result}");
            return Err(ZephraError::IntegrityCheck(result));
        }

        info!("store integrity check passed");
        Ok(())
    }

    /// Number of entries and total value bytes in the key-value table.
    pub fn stats(&self) -> ZephraResult<DatabaseStats> {
        let conn = self.conn()?;
        let (entries, bytes) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(value)), 0) FROM kv_store",
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .map_err(|e| ZephraError::Database(e.to_string()))?;

        Ok(DatabaseStats { entries, bytes })
    }
}

/// Key-value table statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    pub entries: i64,
    pub bytes: i64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entries={}, bytes={}", self.entries, self.bytes)
    }
}

/// r2d2 connection customizer that applies PRAGMA settings.
#[derive(Debug)]
struct ConnectionCustomizer {
    wal_mode: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        if self.wal_mode {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }

        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA busy_timeout=5000;",
        )?;

        Ok(())
    }
}
