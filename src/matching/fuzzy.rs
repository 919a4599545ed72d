// Fuzzy matching: Jaccard overlap between a query fingerprint and every
// stored fingerprint.
//
// The corpus is streamed page by page from the store, so memory stays flat
// no matter how many episodes are indexed. Confidence on this path is the
// raw Jaccard similarity; n-gram overlap is format-agnostic once text has
// been normalized.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::debug;

use super::traits::{
    assign_ranks, validate_threshold, MatchMethod, QueryFingerprint, SimilarityCandidate,
    SimilarityProvider,
};
use crate::db::models::LabeledFingerprint;
use crate::db::FingerprintStore;
use crate::error::Result;
use crate::fingerprint::{jaccard, Fingerprint};

/// The fuzzy retrieval path. Always available: it needs nothing but the store.
pub type FuzzyProvider = FuzzyMatcher;

pub struct FuzzyMatcher {
    store: Arc<dyn FingerprintStore>,
}

impl FuzzyMatcher {
    pub fn new(store: Arc<dyn FingerprintStore>) -> Self {
        Self { store }
    }

    /// Every stored row whose Jaccard similarity to `query` is at least
    /// `threshold`, sorted by similarity descending. Equal scores keep
    /// insertion order.
    pub async fn find_matches(
        &self,
        query: &Fingerprint,
        threshold: f64,
    ) -> Result<Vec<SimilarityCandidate>> {
        validate_threshold(threshold, "fuzzy threshold")?;

        let mut matches = Vec::new();
        let mut scanned = 0usize;
        let mut rows = self.store.scan_all();
        while let Some(row) = rows.try_next().await? {
            scanned += 1;
            let similarity = jaccard(query, &row.fingerprint);
            if similarity >= threshold {
                matches.push(candidate(row, similarity));
            }
        }

        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        assign_ranks(&mut matches);

        debug!(scanned, matched = matches.len(), threshold, "Fuzzy scan complete");
        Ok(matches)
    }

    /// The single most similar row, or None when no stored row shares a
    /// gram with the query. Ties resolve to the earliest inserted row.
    pub async fn best_match(&self, query: &Fingerprint) -> Result<Option<SimilarityCandidate>> {
        let mut best: Option<SimilarityCandidate> = None;
        let mut rows = self.store.scan_all();
        while let Some(row) = rows.try_next().await? {
            let similarity = jaccard(query, &row.fingerprint);
            if similarity <= 0.0 {
                continue;
            }
            let better = best.as_ref().map_or(true, |b| similarity > b.similarity);
            if better {
                best = Some(candidate(row, similarity));
            }
        }
        Ok(best.map(|mut b| {
            b.rank = 1;
            b
        }))
    }
}

fn candidate(row: LabeledFingerprint, similarity: f64) -> SimilarityCandidate {
    SimilarityCandidate {
        entry_id: row.id,
        label: row.label,
        source_format: row.source_format,
        similarity,
        confidence: similarity,
        method: MatchMethod::Fuzzy,
        rank: 0,
    }
}

#[async_trait]
impl SimilarityProvider for FuzzyMatcher {
    fn method(&self) -> MatchMethod {
        MatchMethod::Fuzzy
    }

    async fn candidates(
        &self,
        query: &QueryFingerprint,
        threshold: f64,
    ) -> Result<Vec<SimilarityCandidate>> {
        self.find_matches(&query.fingerprint, threshold).await
    }

    async fn best_overall(&self, query: &QueryFingerprint) -> Result<Option<SimilarityCandidate>> {
        self.best_match(&query.fingerprint).await
    }
}
