//! SQLite implementation of the jotter key-value store.

mod migrations;

pub use migrations::SCHEMA_VERSION;

use jotter_core::{validate_key, Error, KeyValueStore};
use migrations::get_pending_migrations;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

fn db_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

/// SQLite-backed key-value store. One row per key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database at the given path and run any pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database and run migrations.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, Error> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("sqlite connection lock poisoned".into()))
    }

    /// Schema version currently recorded in the database.
    pub fn schema_version(&self) -> Result<i64, Error> {
        let conn = self.conn()?;
        Self::read_version(&conn)
    }

    fn read_version(conn: &Connection) -> Result<i64, Error> {
        let version = conn
            .query_row(
                "SELECT value FROM _jotter_meta WHERE key = 'schema_version'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(version.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Run any pending database migrations.
    fn run_migrations(&self) -> Result<(), Error> {
        let conn = self.conn()?;

        // Ensure _jotter_meta exists before reading the version from it
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _jotter_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(db_err)?;

        let current_version = Self::read_version(&conn)?;
        if current_version >= SCHEMA_VERSION {
            return Ok(());
        }

        for migration in get_pending_migrations(current_version) {
            debug!(version = migration.version, name = migration.name, "running migration");
            for statement in migration.statements {
                if statement.contains("_jotter_meta") {
                    continue;
                }
                conn.execute(statement, []).map_err(|e| {
                    Error::Storage(format!("Migration {} failed: {}", migration.name, e))
                })?;
            }
        }

        conn.execute(
            "INSERT OR REPLACE INTO _jotter_meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )
        .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait::async_trait(?Send)]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        validate_key(key)?;
        let conn = self.conn()?;

        conn.query_row(
            "SELECT value FROM entries WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        validate_key(key)?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO entries (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            params![key, value],
        )
        .map_err(db_err)?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        validate_key(key)?;
        let conn = self.conn()?;

        let rows = conn
            .execute("DELETE FROM entries WHERE key = ?1", params![key])
            .map_err(db_err)?;

        Ok(rows > 0)
    }

    async fn clear(&self) -> Result<(), Error> {
        let conn = self.conn()?;

        let rows = conn.execute("DELETE FROM entries", []).map_err(db_err)?;
        debug!(removed = rows, "store cleared");

        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT key FROM entries ORDER BY key")
            .map_err(db_err)?;

        let keys = stmt
            .query_map([], |row| row.get(0))
            .map_err(db_err)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(db_err)?;

        Ok(keys)
    }
}
