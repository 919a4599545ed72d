// Database layer: the append-only corpus of labeled fingerprints.
//
// We use rusqlite with the "bundled" feature so there's no system SQLite
// dependency. The database file lives wherever SUBPRINT_DB_PATH points.

pub mod memory;
pub mod models;
pub mod queries;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryFingerprintStore;
pub use sqlite::SqliteFingerprintStore;
pub use traits::FingerprintStore;

use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

use crate::error::{MatchError, Result};

/// Open (or create) the database and create its tables.
pub fn initialize(db_path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MatchError::Storage(format!("failed to create directory for {db_path}: {e}"))
            })?;
        }
    }

    let conn = Connection::open(db_path)?;

    // WAL lets scans read while an insert commits
    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing database (fails if it doesn't exist yet).
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(MatchError::Storage(format!(
            "database not found at {db_path}; run `subprint init` first"
        )));
    }

    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Create the SQLite database if needed and wrap it as a store.
pub fn initialize_sqlite(db_path: &str, embedding_dim: usize) -> Result<Arc<SqliteFingerprintStore>> {
    let conn = initialize(db_path)?;
    Ok(Arc::new(SqliteFingerprintStore::new(conn, embedding_dim)))
}

/// Open an existing SQLite database as a store.
pub fn open_sqlite(db_path: &str, embedding_dim: usize) -> Result<Arc<dyn FingerprintStore>> {
    let conn = open(db_path)?;
    Ok(Arc::new(SqliteFingerprintStore::new(conn, embedding_dim)))
}
