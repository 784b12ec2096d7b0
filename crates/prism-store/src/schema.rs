use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    // checkpoint every ~400KB instead of the default ~4MB
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Fold any stale WAL into the main file. In-memory and fresh databases
    // legitimately fail this, so the error is ignored.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::info!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id           TEXT PRIMARY KEY,
            session_id   TEXT NOT NULL,
            channel      TEXT NOT NULL,
            timestamp    INTEGER NOT NULL DEFAULT 0,
            version      TEXT NOT NULL DEFAULT '',
            metrics_json TEXT NOT NULL DEFAULT '{}',
            imported_at  INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS constraints (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            session_row     TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            id              TEXT NOT NULL,
            constraint_type TEXT NOT NULL,
            channel         TEXT NOT NULL,
            dimensions_json TEXT NOT NULL,
            severity        REAL NOT NULL,
            weight          REAL NOT NULL DEFAULT 1.0,
            label           TEXT NOT NULL DEFAULT '',
            entities_json   TEXT NOT NULL DEFAULT '{}',
            metadata_json   TEXT NOT NULL DEFAULT '{}',
            timestamp       INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS channel_payloads (
            channel      TEXT PRIMARY KEY,
            payload_json TEXT NOT NULL,
            updated_at   INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_constraints_session ON constraints(session_row);
        CREATE INDEX IF NOT EXISTS idx_sessions_channel ON sessions(channel);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}
