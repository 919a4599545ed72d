// MemoryFingerprintStore: an in-process FingerprintStore.
//
// Used by tests and by callers that build a throwaway corpus without a
// database file. Rows live in a Vec behind an RwLock; ids start at 1 and
// follow insertion order, matching the SQLite store.

use std::collections::HashMap;
use std::future;
use std::sync::RwLock;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::models::{LabeledFingerprint, NewFingerprint, SourceFormat};
use super::traits::{paged_scan, FingerprintStore, SCAN_PAGE_SIZE};
use crate::error::{MatchError, Result};

pub struct MemoryFingerprintStore {
    rows: RwLock<Vec<LabeledFingerprint>>,
    meta: RwLock<HashMap<String, String>>,
    embedding_dim: usize,
}

impl MemoryFingerprintStore {
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            meta: RwLock::new(HashMap::new()),
            embedding_dim,
        }
    }

    fn page_after(&self, after_id: i64) -> Result<Vec<LabeledFingerprint>> {
        let rows = self.rows.read().map_err(poisoned)?;
        // Ids are dense and 1-based, so row `id` sits at index `id - 1`.
        let start = usize::try_from(after_id).unwrap_or(0).min(rows.len());
        Ok(rows[start..].iter().take(SCAN_PAGE_SIZE).cloned().collect())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> MatchError {
    MatchError::Storage("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl FingerprintStore for MemoryFingerprintStore {
    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    async fn insert(&self, entry: &NewFingerprint) -> Result<i64> {
        entry.validate(self.embedding_dim)?;
        let mut rows = self.rows.write().map_err(poisoned)?;
        let id = rows.len() as i64 + 1;
        rows.push(LabeledFingerprint {
            id,
            label: entry.label.clone(),
            fingerprint: entry.fingerprint.clone(),
            embedding: entry.embedding.clone(),
            source_format: entry.source_format,
        });
        Ok(id)
    }

    fn scan_all(&self) -> BoxStream<'_, Result<LabeledFingerprint>> {
        paged_scan(move |after_id| future::ready(self.page_after(after_id)))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.rows.read().map_err(poisoned)?.len() as u64)
    }

    async fn count_by_format(&self) -> Result<Vec<(SourceFormat, u64)>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(SourceFormat::ALL
            .iter()
            .map(|format| {
                let n = rows.iter().filter(|r| r.source_format == *format).count() as u64;
                (*format, n)
            })
            .filter(|(_, n)| *n > 0)
            .collect())
    }

    async fn embedding_count(&self) -> Result<u64> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.iter().filter(|r| r.embedding.is_some()).count() as u64)
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self.meta.read().map_err(poisoned)?.get(key).cloned())
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.meta
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
