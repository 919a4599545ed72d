// FingerprintStore trait: backend-agnostic async interface to the corpus.
//
// Implementors: SqliteFingerprintStore (rusqlite behind a tokio Mutex) and
// MemoryFingerprintStore (in-process). Matching code only ever holds an
// `Arc<dyn FingerprintStore>`.

use std::future::Future;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use super::models::{LabeledFingerprint, NewFingerprint, SourceFormat};
use crate::error::Result;

/// Rows fetched per page while scanning the corpus.
pub const SCAN_PAGE_SIZE: usize = 256;

#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// The fixed embedding dimension D every stored embedding has.
    fn embedding_dim(&self) -> usize;

    /// Append one row and return its id.
    ///
    /// Fails with `MatchError::Validation` when the fingerprint is empty or
    /// the embedding is not a valid D-length vector.
    async fn insert(&self, entry: &NewFingerprint) -> Result<i64>;

    /// Lazily stream every row in insertion order.
    ///
    /// Nothing is read until the stream is polled; calling `scan_all` again
    /// starts a fresh pass from the first row.
    fn scan_all(&self) -> BoxStream<'_, Result<LabeledFingerprint>>;

    /// Total number of rows.
    async fn count(&self) -> Result<u64>;

    /// Rows per source format (formats without rows omitted).
    async fn count_by_format(&self) -> Result<Vec<(SourceFormat, u64)>>;

    /// Number of rows that carry an embedding.
    async fn embedding_count(&self) -> Result<u64>;

    /// Get an engine bookkeeping value.
    async fn get_meta(&self, key: &str) -> Result<Option<String>>;

    /// Set an engine bookkeeping value (upsert).
    async fn set_meta(&self, key: &str, value: &str) -> Result<()>;
}

type Page = stream::Iter<std::vec::IntoIter<Result<LabeledFingerprint>>>;

/// Turn a "rows after id N" fetcher into a lazy keyset-paginated stream.
///
/// No lock or cursor is held between pages, so a long scan never blocks
/// inserts for longer than one page read.
pub(crate) fn paged_scan<'a, F, Fut>(fetch: F) -> BoxStream<'a, Result<LabeledFingerprint>>
where
    F: Fn(i64) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Vec<LabeledFingerprint>>> + Send + 'a,
{
    stream::try_unfold(Some(0_i64), move |cursor| next_page(cursor.map(&fetch)))
        .try_flatten()
        .boxed()
}

async fn next_page<Fut>(pending: Option<Fut>) -> Result<Option<(Page, Option<i64>)>>
where
    Fut: Future<Output = Result<Vec<LabeledFingerprint>>>,
{
    let Some(pending) = pending else {
        return Ok(None);
    };

    let rows = pending.await?;
    if rows.is_empty() {
        return Ok(None);
    }

    // A short page means we reached the end; skip the extra empty read.
    let cursor = if rows.len() < SCAN_PAGE_SIZE {
        None
    } else {
        rows.last().map(|row| row.id)
    };
    let items: Vec<Result<LabeledFingerprint>> = rows.into_iter().map(Ok).collect();

    Ok(Some((stream::iter(items), cursor)))
}
