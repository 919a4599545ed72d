// Similarity provider trait: one retrieval strategy behind a common interface.
//
// FuzzyMatcher (Jaccard over n-grams) and VectorProvider (cosine over
// embeddings) both implement it, so the orchestrator merges their ranked
// output with a single rule instead of branching per strategy.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::db::models::{EpisodeLabel, SourceFormat};
use crate::error::{MatchError, Result};
use crate::fingerprint::Fingerprint;

/// Which retrieval path produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Fuzzy,
    Vector,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Fuzzy => "fuzzy",
            MatchMethod::Vector => "vector",
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One stored row proposed as the answer to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityCandidate {
    /// Id of the stored row this candidate came from.
    pub entry_id: i64,
    pub label: EpisodeLabel,
    /// Source format of the stored row.
    pub source_format: SourceFormat,
    /// Raw similarity in [0.0, 1.0].
    pub similarity: f64,
    /// Calibrated similarity in [0.0, 1.0]. Equal to `similarity` for fuzzy
    /// matches; scaled by the source-format weight for vector matches.
    pub confidence: f64,
    pub method: MatchMethod,
    /// 1-based position within the provider's own ranking.
    pub rank: usize,
}

/// What the engine knows about the text being identified.
#[derive(Debug, Clone)]
pub struct QueryFingerprint {
    pub fingerprint: Fingerprint,
    pub embedding: Option<Vec<f32>>,
    pub source_format: SourceFormat,
}

#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    fn method(&self) -> MatchMethod;

    /// Every candidate whose confidence is at least `threshold`, best first.
    async fn candidates(
        &self,
        query: &QueryFingerprint,
        threshold: f64,
    ) -> Result<Vec<SimilarityCandidate>>;

    /// The single closest row regardless of threshold. Diagnostic only: the
    /// orchestrator reports its confidence but never adopts its label.
    async fn best_overall(&self, query: &QueryFingerprint) -> Result<Option<SimilarityCandidate>>;
}

/// Thresholds are probabilities-like scores and must lie in [0.0, 1.0].
pub(crate) fn validate_threshold(value: f64, what: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(MatchError::validation(format!(
            "{what} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

/// Number candidates 1..n in their current order.
pub(crate) fn assign_ranks(candidates: &mut [SimilarityCandidate]) {
    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = i + 1;
    }
}
