use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::Result;

const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed catalog. One connection behind a mutex; readers from
/// worker threads serialize on it.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        configure_pragmas(&conn)?;
        migrate_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn truncate_all(&self) -> Result<()> {
        self.connection().execute_batch(
            "DELETE FROM asset;
             DELETE FROM scan_folder;",
        )?;
        debug!("All tables truncated");
        Ok(())
    }
}

fn configure_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA cache_size = -64000;
         PRAGMA busy_timeout = 5000;",
    )?;
    debug!("SQLite pragmas configured (WAL mode, 64MB cache)");
    Ok(())
}

fn migrate_schema(conn: &Connection) -> rusqlite::Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        debug!("Schema version {} < {}, initializing", version, SCHEMA_VERSION);
    }
    conn.execute_batch(include_str!("schema.sql"))?;
    Ok(())
}
