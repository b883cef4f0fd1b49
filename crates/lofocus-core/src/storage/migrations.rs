//! Schema migrations for the local database.
//!
//! Migrations are versioned and applied when the database is opened. The
//! `schema_version` table holds the current version.

use rusqlite::{Connection, Result as SqliteResult};

/// Latest schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if a migration statement fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )?;

    let current = schema_version(conn);
    if current < 1 {
        migrate_v1(conn)?;
    }
    Ok(())
}

/// Returns 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| row.get::<_, i32>(0))
        .unwrap_or_else(|e| {
            if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
                tracing::warn!(error = %e, "failed to read schema_version");
            }
            0
        })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// v1: key-value table backing the local tier.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn), 0);
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn), CURRENT_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute("INSERT INTO kv (key, value) VALUES ('a', '1')", []).unwrap();
        migrate(&conn).unwrap();
        let v: String = conn
            .query_row("SELECT value FROM kv WHERE key = 'a'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(v, "1");
    }
}
