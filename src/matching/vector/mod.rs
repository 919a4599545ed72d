// Vector index: nearest-neighbour search over stored embeddings.
//
// The index is built from the store at most once per process (lazily on the
// first search, or eagerly via VectorIndex::initialize). If the backend is
// disabled or the build fails, the index stays unloaded and every search
// returns no candidates, so identification falls back to fuzzy matching.
//
// Searches read an Arc to the current snapshot. rebuild() constructs a fresh
// snapshot off to the side and swaps the pointer, so a concurrent search sees
// either the old snapshot or the new one, never a partial build.

pub mod backend;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use self::backend::{AnnBackend, ExactBackend, HnswBackend, HnswParams};
use super::calibration::FormatWeights;
use super::traits::{
    assign_ranks, validate_threshold, MatchMethod, QueryFingerprint, SimilarityCandidate,
    SimilarityProvider,
};
use crate::db::models::{EpisodeLabel, SourceFormat};
use crate::db::FingerprintStore;
use crate::error::{MatchError, Result};
use crate::fingerprint::embeddings::{similarity_from_distance, validate_embedding};

pub const DEFAULT_TOP_K: usize = 10;

/// Which nearest-neighbour backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackendKind {
    /// HNSW graph, with an exact scan for small corpora.
    Hnsw,
    /// Always compare against every stored embedding.
    Exact,
    /// Never load; identification is fuzzy-only.
    Disabled,
}

impl VectorBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorBackendKind::Hnsw => "hnsw",
            VectorBackendKind::Exact => "exact",
            VectorBackendKind::Disabled => "disabled",
        }
    }
}

impl fmt::Display for VectorBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VectorBackendKind {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hnsw" => Ok(VectorBackendKind::Hnsw),
            "exact" => Ok(VectorBackendKind::Exact),
            "disabled" | "off" | "none" => Ok(VectorBackendKind::Disabled),
            other => Err(MatchError::validation(format!(
                "unknown vector backend '{other}' (expected hnsw, exact or disabled)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorConfig {
    pub dimension: usize,
    pub backend: VectorBackendKind,
    pub weights: FormatWeights,
    pub hnsw: HnswParams,
}

impl VectorConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            backend: VectorBackendKind::Hnsw,
            weights: FormatWeights::default(),
            hnsw: HnswParams::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(MatchError::validation("embedding dimension must be positive"));
        }
        self.weights.validate()
    }
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildReport {
    pub version: u64,
    pub indexed: usize,
    /// Rows whose stored embedding has the wrong dimension.
    pub skipped: usize,
    pub backend: &'static str,
}

struct IndexedEntry {
    entry_id: i64,
    label: EpisodeLabel,
    source_format: SourceFormat,
}

/// One immutable build of the index. Slot i of `backend` is `entries[i]`.
struct IndexSnapshot {
    version: u64,
    backend: Box<dyn AnnBackend>,
    entries: Vec<IndexedEntry>,
    skipped: usize,
}

impl IndexSnapshot {
    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_similarity: f64,
        weights: &FormatWeights,
    ) -> Vec<SimilarityCandidate> {
        let mut found: Vec<SimilarityCandidate> = self
            .backend
            .search(query, top_k)
            .into_iter()
            .filter_map(|(slot, distance)| {
                let entry = self.entries.get(slot)?;
                let similarity = similarity_from_distance(distance);
                if similarity < min_similarity {
                    return None;
                }
                Some(SimilarityCandidate {
                    entry_id: entry.entry_id,
                    label: entry.label.clone(),
                    source_format: entry.source_format,
                    similarity,
                    confidence: weights.calibrate(similarity, entry.source_format),
                    method: MatchMethod::Vector,
                    rank: 0,
                })
            })
            .collect();

        found.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(a.entry_id.cmp(&b.entry_id))
        });
        assign_ranks(&mut found);
        found
    }
}

pub struct VectorIndex {
    store: Arc<dyn FingerprintStore>,
    config: VectorConfig,
    /// Set exactly once: Some(current snapshot) when loaded, None when the
    /// backend is disabled or the first build failed.
    state: OnceCell<Option<RwLock<Arc<IndexSnapshot>>>>,
    rebuild_lock: Mutex<()>,
    versions: AtomicU64,
}

impl VectorIndex {
    /// An index that builds itself on first use.
    pub fn lazy(store: Arc<dyn FingerprintStore>, config: VectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            state: OnceCell::new(),
            rebuild_lock: Mutex::new(()),
            versions: AtomicU64::new(0),
        })
    }

    /// Build the index now. Fails with NotAvailable when the backend is
    /// disabled, or with the underlying error when the build fails.
    pub async fn initialize(store: Arc<dyn FingerprintStore>, config: VectorConfig) -> Result<Self> {
        let index = Self::lazy(store, config)?;
        let snapshot = index.load_snapshot().await?;
        let state = OnceCell::new_with(Some(Some(RwLock::new(Arc::new(snapshot)))));
        Ok(Self { state, ..index })
    }

    /// Version of the snapshot currently served, if loaded.
    pub async fn version(&self) -> Option<u64> {
        let slot = self.loaded().await?;
        let current = slot.read().ok()?;
        Some(current.version)
    }

    /// Number of embeddings in the current snapshot, if loaded.
    pub async fn len(&self) -> Option<usize> {
        let slot = self.loaded().await?;
        let current = slot.read().ok()?;
        Some(current.entries.len())
    }

    /// The `top_k` stored rows nearest to `query`, keeping those whose
    /// similarity is at least `min_similarity`, ordered by similarity.
    /// Confidence is calibrated by each stored row's source format. An
    /// unloaded backend yields an empty list.
    pub async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarityCandidate>> {
        if query.len() != self.config.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.len(),
            });
        }
        if top_k == 0 {
            return Err(MatchError::validation("top_k must be positive"));
        }
        validate_threshold(min_similarity, "min_similarity")?;
        validate_embedding(query, self.config.dimension)?;

        let Some(slot) = self.loaded().await else {
            debug!("Vector backend unavailable, returning no candidates");
            return Ok(Vec::new());
        };
        let snapshot = match slot.read() {
            Ok(current) => Arc::clone(&current),
            Err(_) => {
                warn!("Vector index lock poisoned, returning no candidates");
                return Ok(Vec::new());
            }
        };

        Ok(snapshot.search(
            query,
            top_k,
            min_similarity,
            &self.config.weights,
        ))
    }

    /// Rebuild from the store's current contents and swap the new snapshot
    /// in atomically. Rebuilds are serialized; searches are never blocked
    /// for the duration of a build.
    ///
    /// On an index that was never loaded, the first load reads the store's
    /// current contents and is reported as the rebuild.
    pub async fn rebuild(&self) -> Result<RebuildReport> {
        let mut loaded_now = false;
        let first_load = &mut loaded_now;
        let state = self
            .state
            .get_or_init(|| async move {
                *first_load = true;
                self.try_load().await
            })
            .await;
        let Some(slot) = state.as_ref() else {
            return Err(MatchError::NotAvailable(format!(
                "cannot rebuild: {} backend is not loaded",
                self.config.backend
            )));
        };

        let _guard = self.rebuild_lock.lock().await;
        let snapshot = if loaded_now {
            slot.read()
                .map(|current| Arc::clone(&current))
                .map_err(|_| MatchError::Storage("vector index lock poisoned".to_string()))?
        } else {
            let fresh = Arc::new(self.build_snapshot().await?);
            let mut current = slot
                .write()
                .map_err(|_| MatchError::Storage("vector index lock poisoned".to_string()))?;
            *current = Arc::clone(&fresh);
            fresh
        };
        let report = RebuildReport {
            version: snapshot.version,
            indexed: snapshot.entries.len(),
            skipped: snapshot.skipped,
            backend: snapshot.backend.name(),
        };

        self.store
            .set_meta("index_rebuilt_at", &chrono::Utc::now().to_rfc3339())
            .await?;
        self.store
            .set_meta("index_size", &report.indexed.to_string())
            .await?;

        info!(
            version = report.version,
            indexed = report.indexed,
            skipped = report.skipped,
            backend = report.backend,
            "Rebuilt vector index"
        );
        Ok(report)
    }

    async fn loaded(&self) -> Option<&RwLock<Arc<IndexSnapshot>>> {
        self.state.get_or_init(|| self.try_load()).await.as_ref()
    }

    async fn try_load(&self) -> Option<RwLock<Arc<IndexSnapshot>>> {
        match self.load_snapshot().await {
            Ok(snapshot) => Some(RwLock::new(Arc::new(snapshot))),
            Err(e) => {
                warn!(error = %e, "Vector index unavailable, matching will be fuzzy-only");
                None
            }
        }
    }

    async fn load_snapshot(&self) -> Result<IndexSnapshot> {
        if self.config.backend == VectorBackendKind::Disabled {
            return Err(MatchError::NotAvailable(
                "vector backend disabled by configuration".to_string(),
            ));
        }
        let snapshot = self.build_snapshot().await?;
        info!(
            version = snapshot.version,
            indexed = snapshot.entries.len(),
            backend = snapshot.backend.name(),
            "Loaded vector index"
        );
        Ok(snapshot)
    }

    async fn build_snapshot(&self) -> Result<IndexSnapshot> {
        let mut entries = Vec::new();
        let mut vectors = Vec::new();
        let mut skipped = 0usize;

        let mut rows = self.store.scan_all();
        while let Some(row) = rows.try_next().await? {
            let Some(embedding) = row.embedding else {
                continue;
            };
            if embedding.len() != self.config.dimension {
                warn!(
                    id = row.id,
                    expected = self.config.dimension,
                    actual = embedding.len(),
                    "Skipping stored embedding with wrong dimension"
                );
                skipped += 1;
                continue;
            }
            entries.push(IndexedEntry {
                entry_id: row.id,
                label: row.label,
                source_format: row.source_format,
            });
            vectors.push(embedding);
        }

        let use_exact = self.config.backend == VectorBackendKind::Exact
            || vectors.len() <= self.config.hnsw.exact_below;
        let backend: Box<dyn AnnBackend> = if use_exact {
            Box::new(ExactBackend::build(vectors))
        } else {
            let params = self.config.hnsw;
            let built = tokio::task::spawn_blocking(move || HnswBackend::build(&vectors, &params))
                .await
                .map_err(|e| MatchError::NotAvailable(format!("index build task failed: {e}")))?;
            Box::new(built)
        };

        Ok(IndexSnapshot {
            version: self.versions.fetch_add(1, Ordering::SeqCst) + 1,
            backend,
            entries,
            skipped,
        })
    }
}

/// Vector retrieval as a SimilarityProvider. Queries without an embedding
/// produce no candidates.
pub struct VectorProvider {
    index: Arc<VectorIndex>,
    top_k: usize,
}

impl VectorProvider {
    pub fn new(index: Arc<VectorIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }
}

#[async_trait]
impl SimilarityProvider for VectorProvider {
    fn method(&self) -> MatchMethod {
        MatchMethod::Vector
    }

    async fn candidates(
        &self,
        query: &QueryFingerprint,
        threshold: f64,
    ) -> Result<Vec<SimilarityCandidate>> {
        let Some(embedding) = query.embedding.as_deref() else {
            return Ok(Vec::new());
        };
        // Confidence never exceeds similarity, so `threshold` is also a safe
        // similarity floor for the index.
        let mut found = self.index.search(embedding, self.top_k, threshold).await?;
        found.retain(|c| c.confidence >= threshold);
        assign_ranks(&mut found);
        Ok(found)
    }

    async fn best_overall(&self, query: &QueryFingerprint) -> Result<Option<SimilarityCandidate>> {
        let Some(embedding) = query.embedding.as_deref() else {
            return Ok(None);
        };
        // Weights differ per row, so the nearest row is not always the most
        // confident one.
        let found = self.index.search(embedding, self.top_k, 0.0).await?;
        Ok(found
            .into_iter()
            .reduce(|best, c| if c.confidence > best.confidence { c } else { best }))
    }
}
