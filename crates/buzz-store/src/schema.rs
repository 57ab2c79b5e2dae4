use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    // The scheduler and one-shot CLI commands may hold the same file open.
    conn.pragma_update(None, "busy_timeout", 5000)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS targets (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL UNIQUE,
            search_term      TEXT NOT NULL,
            is_active        INTEGER NOT NULL DEFAULT 1,
            created_at       INTEGER NOT NULL,
            current_score    REAL,
            current_score_at INTEGER
        );

        CREATE TABLE IF NOT EXISTS score_history (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            target_id  TEXT NOT NULL REFERENCES targets(id),
            score      REAL NOT NULL,
            timestamp  INTEGER NOT NULL,
            source     TEXT NOT NULL,
            confidence REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_history_target_ts ON score_history(target_id, timestamp);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}
