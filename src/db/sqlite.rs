// SqliteFingerprintStore: rusqlite backend implementing FingerprintStore.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is not
// Sync. Each trait method locks, runs one synchronous statement and returns;
// scans lock once per page. The engine adds no locking beyond that: single-row
// INSERTs are atomic in SQLite, and WAL mode lets readers proceed while a
// write commits.

use async_trait::async_trait;
use futures::stream::BoxStream;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::debug;

use super::models::{LabeledFingerprint, NewFingerprint, SourceFormat};
use super::queries;
use super::traits::{paged_scan, FingerprintStore, SCAN_PAGE_SIZE};
use crate::error::Result;

pub struct SqliteFingerprintStore {
    conn: Mutex<Connection>,
    embedding_dim: usize,
}

impl SqliteFingerprintStore {
    /// Wrap an already-opened Connection whose tables exist.
    pub fn new(conn: Connection, embedding_dim: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            embedding_dim,
        }
    }

    /// Count user tables (shown after `init`).
    pub async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }
}

#[async_trait]
impl FingerprintStore for SqliteFingerprintStore {
    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    async fn insert(&self, entry: &NewFingerprint) -> Result<i64> {
        entry.validate(self.embedding_dim)?;
        let conn = self.conn.lock().await;
        let id = queries::insert_fingerprint(&conn, entry)?;
        debug!(id, label = %entry.label, grams = entry.fingerprint.len(), "Stored fingerprint");
        Ok(id)
    }

    fn scan_all(&self) -> BoxStream<'_, Result<LabeledFingerprint>> {
        paged_scan(move |after_id| async move {
            let conn = self.conn.lock().await;
            queries::fetch_page(&conn, after_id, SCAN_PAGE_SIZE)
        })
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        queries::count_fingerprints(&conn)
    }

    async fn count_by_format(&self) -> Result<Vec<(SourceFormat, u64)>> {
        let conn = self.conn.lock().await;
        queries::count_by_format(&conn)
    }

    async fn embedding_count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        queries::count_embeddings(&conn)
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        queries::get_meta(&conn, key)
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::set_meta(&conn, key, value)
    }
}
