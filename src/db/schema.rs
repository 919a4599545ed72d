// Database schema: table creation.
//
// The corpus is append-only and rebuilt wholesale when its shape changes,
// so there is a single schema version and no migration chain.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

/// Create all tables if they don't exist yet. Safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Labeled fingerprints. Rows are never updated or deleted.
        CREATE TABLE IF NOT EXISTS fingerprints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,   -- insertion order
            series TEXT NOT NULL,
            season TEXT NOT NULL,
            episode TEXT NOT NULL,
            fingerprint TEXT NOT NULL,              -- JSON array of sorted n-grams
            ngram_width INTEGER NOT NULL,
            embedding BLOB,                         -- little-endian f32, optional
            source_format TEXT NOT NULL,            -- text / pgs / vobsub
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Engine bookkeeping (last index rebuild and the like)
        CREATE TABLE IF NOT EXISTS engine_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_fingerprints_label
            ON fingerprints(series, season, episode);
        ",
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

/// Count the user tables in the database (shown after `init`).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
