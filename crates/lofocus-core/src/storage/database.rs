//! SQLite-backed local tier.
//!
//! Everything the engine keeps on the device goes through the `kv` table:
//! aggregate records, preferences and the persisted sequencer snapshot.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{data_dir, migrations, LocalStore, UpdateFn};
use crate::error::StorageError;

const KV_SELECT: &str = "SELECT value FROM kv WHERE key = ?1";
const KV_UPSERT: &str = "INSERT INTO kv (key, value, updated_at)
     VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

/// How long a writer waits on another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database holding the local key-value tier.
///
/// Several processes may open the same file; [`Database::kv_update`] is
/// the only safe way for them to change a shared value.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/lofocus/lofocus.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened
    /// or migrated.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("lofocus.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(KV_SELECT, params![key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(KV_UPSERT, params![key, value])?;
        Ok(())
    }

    /// Read-modify-write of one key inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken before the read, so a concurrent updater in
    /// another process waits (up to the busy timeout) instead of reading
    /// the same old value.
    pub fn kv_update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<Option<String>, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = tx
            .query_row(KV_SELECT, params![key], |row| row.get::<_, String>(0))
            .optional()?;
        // an error drops `tx`, which rolls back
        let next = apply(current)?;
        match &next {
            Some(value) => tx.execute(KV_UPSERT, params![key, value])?,
            None => tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?,
        };
        tx.commit()?;
        Ok(next)
    }
}

impl LocalStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.kv_get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.kv_set(key, value)
    }

    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<Option<String>, StorageError> {
        self.kv_update(key, apply)
    }
}
