// Match orchestration: normalize, fingerprint, ask every provider, merge.
//
// Providers run concurrently and are merged by one rule: keep candidates at
// or above the threshold, keep each episode label once (highest confidence),
// sort by confidence. The top candidate wins. When more than one label
// clears the threshold the result carries a note listing them.
//
// A provider that fails operationally (store unreachable, index not loaded)
// is logged and skipped; the others still answer. Caller errors (bad
// threshold, wrong embedding dimension) abort the request.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::fuzzy::FuzzyMatcher;
use super::result::{IdentificationResult, IdentifyRequest, MatchOutcome};
use super::traits::{validate_threshold, QueryFingerprint, SimilarityCandidate, SimilarityProvider};
use super::vector::{VectorIndex, VectorProvider};
use crate::db::models::EpisodeLabel;
use crate::db::FingerprintStore;
use crate::error::{MatchError, Result};
use crate::fingerprint::embeddings::Embedder;
use crate::fingerprint::{Fingerprint, DEFAULT_NGRAM_WIDTH};
use crate::text;

/// Default minimum confidence for a match to be reported.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub min_confidence: f64,
    pub ngram_width: usize,
    /// Report the best below-threshold confidence when nothing matches.
    pub diagnostics: bool,
    /// How many candidates an ambiguity note lists by name.
    pub max_listed_candidates: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            ngram_width: DEFAULT_NGRAM_WIDTH,
            diagnostics: true,
            max_listed_candidates: 5,
        }
    }
}

impl MatchSettings {
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.min_confidence, "min_confidence")?;
        if self.ngram_width == 0 {
            return Err(MatchError::validation("ngram_width must be positive"));
        }
        Ok(())
    }
}

pub struct MatchOrchestrator {
    providers: Vec<Arc<dyn SimilarityProvider>>,
    embedder: Option<Arc<dyn Embedder>>,
    settings: MatchSettings,
}

impl MatchOrchestrator {
    /// An orchestrator with no providers; add them with `with_provider`.
    pub fn new(settings: MatchSettings) -> Self {
        Self {
            providers: Vec::new(),
            embedder: None,
            settings,
        }
    }

    /// Fuzzy matching only.
    pub fn fuzzy_only(store: Arc<dyn FingerprintStore>, settings: MatchSettings) -> Self {
        Self::new(settings).with_provider(Arc::new(FuzzyMatcher::new(store)))
    }

    /// Fuzzy matching first, then vector search over `index`.
    pub fn hybrid(
        store: Arc<dyn FingerprintStore>,
        index: Arc<VectorIndex>,
        top_k: usize,
        settings: MatchSettings,
    ) -> Self {
        Self::fuzzy_only(store, settings).with_provider(Arc::new(VectorProvider::new(index, top_k)))
    }

    /// Providers are consulted in the order they are added; that order
    /// breaks confidence ties.
    pub fn with_provider(mut self, provider: Arc<dyn SimilarityProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Embeds query text for requests that arrive without an embedding.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Identify the episode `request.text` belongs to.
    ///
    /// Returns Err only for caller errors. Operational failures become
    /// `MatchOutcome::Failed` when they leave no candidate standing.
    pub async fn identify(&self, request: &IdentifyRequest) -> Result<MatchOutcome> {
        let threshold = request.min_confidence.unwrap_or(self.settings.min_confidence);
        validate_threshold(threshold, "min_confidence")?;

        let query = self.build_query(request).await?;
        debug!(
            grams = query.fingerprint.len(),
            has_embedding = query.embedding.is_some(),
            format = %query.source_format,
            threshold,
            "Identifying subtitle text"
        );

        let answers = join_all(
            self.providers
                .iter()
                .map(|provider| provider.candidates(&query, threshold)),
        )
        .await;

        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        for (provider, answer) in self.providers.iter().zip(answers) {
            match answer {
                Ok(found) => candidates.extend(found),
                Err(e) if e.is_caller_error() => return Err(e),
                Err(e) => {
                    warn!(method = %provider.method(), error = %e, "Similarity provider failed, continuing without it");
                    failures.push(e);
                }
            }
        }

        let ranked = merge_candidates(candidates, threshold);
        if let Some(winner) = ranked.first() {
            let notes = ambiguity_note(&ranked, threshold, self.settings.max_listed_candidates);
            info!(
                label = %winner.label,
                confidence = winner.confidence,
                method = %winner.method,
                candidates = ranked.len(),
                "Identified episode"
            );
            return Ok(MatchOutcome::Identified(IdentificationResult::identified(
                winner, notes,
            )));
        }

        if let Some(reason) = failures.into_iter().next() {
            error!(error = %reason, "Identification failed, returning zero-confidence result");
            return Ok(MatchOutcome::Failed {
                result: IdentificationResult::unmatched(0.0),
                reason,
            });
        }

        let diagnostic = if self.settings.diagnostics {
            self.best_below_threshold(&query).await
        } else {
            0.0
        };
        debug!(best = diagnostic, threshold, "No candidate cleared the threshold");
        Ok(MatchOutcome::NoMatch(IdentificationResult::unmatched(diagnostic)))
    }

    /// Like `identify`, but every error, caller errors included, is logged
    /// and folded into a zero-confidence result.
    pub async fn identify_merged(&self, request: &IdentifyRequest) -> IdentificationResult {
        match self.identify(request).await {
            Ok(outcome) => outcome.into_result(),
            Err(e) => {
                error!(error = %e, "Rejected identification request");
                IdentificationResult::unmatched(0.0)
            }
        }
    }

    async fn build_query(&self, request: &IdentifyRequest) -> Result<QueryFingerprint> {
        let normalized = text::normalize(&request.text);
        let fingerprint = Fingerprint::from_normalized(&normalized, self.settings.ngram_width)?;

        let embedding = match (&request.embedding, &self.embedder) {
            (Some(given), _) => Some(given.clone()),
            (None, Some(embedder)) if !normalized.is_empty() => {
                match embedder.embed(&normalized).await {
                    Ok(vector) if vector.len() == embedder.dimension() => Some(vector),
                    Ok(vector) => {
                        warn!(
                            expected = embedder.dimension(),
                            actual = vector.len(),
                            "Embedder broke its declared dimension, matching without a vector"
                        );
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, "Embedding failed, matching without a vector");
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(QueryFingerprint {
            fingerprint,
            embedding,
            source_format: request.source_format,
        })
    }

    /// Highest confidence any provider sees, for reporting only.
    async fn best_below_threshold(&self, query: &QueryFingerprint) -> f64 {
        let answers = join_all(self.providers.iter().map(|p| p.best_overall(query))).await;
        answers
            .into_iter()
            .filter_map(|answer| match answer {
                Ok(best) => best.map(|c| c.confidence),
                Err(e) => {
                    debug!(error = %e, "Diagnostic lookup failed");
                    None
                }
            })
            .fold(0.0, f64::max)
    }
}

/// Keep candidates with positive confidence at or above `threshold`, one per
/// episode label, sorted by confidence descending. Rows that share a label
/// (the same episode ripped from several sources, or one row found by both
/// providers) collapse to the best of them. Equal confidences keep provider
/// order.
pub(crate) fn merge_candidates(
    candidates: Vec<SimilarityCandidate>,
    threshold: f64,
) -> Vec<SimilarityCandidate> {
    let mut merged: Vec<SimilarityCandidate> = Vec::new();
    let mut position: HashMap<EpisodeLabel, usize> = HashMap::new();

    for candidate in candidates {
        if candidate.confidence < threshold || candidate.confidence <= 0.0 {
            continue;
        }
        match position.get(&candidate.label) {
            Some(&i) => {
                if candidate.confidence > merged[i].confidence {
                    merged[i] = candidate;
                }
            }
            None => {
                position.insert(candidate.label.clone(), merged.len());
                merged.push(candidate);
            }
        }
    }

    merged.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    merged
}

/// A human-readable note when more than one episode cleared the threshold.
/// `ranked` must already be merged, one candidate per label.
pub(crate) fn ambiguity_note(
    ranked: &[SimilarityCandidate],
    threshold: f64,
    max_listed: usize,
) -> Option<String> {
    if ranked.len() < 2 {
        return None;
    }

    let listed: Vec<String> = ranked
        .iter()
        .take(max_listed.max(1))
        .map(|c| format!("{} ({:.3}, {})", c.label, c.confidence, c.method))
        .collect();
    let mut note = format!(
        "{} candidates cleared the {:.2} threshold: {}",
        ranked.len(),
        threshold,
        listed.join(", ")
    );
    let hidden = ranked.len().saturating_sub(listed.len());
    if hidden > 0 {
        note.push_str(&format!(", and {hidden} more"));
    }
    if ranked[0].confidence == ranked[1].confidence {
        note.push_str("; top candidates are tied");
    }
    Some(note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SourceFormat;
    use crate::matching::traits::MatchMethod;

    fn cand(id: i64, episode: &str, confidence: f64, method: MatchMethod) -> SimilarityCandidate {
        SimilarityCandidate {
            entry_id: id,
            label: EpisodeLabel::new("Show", "1", episode),
            source_format: SourceFormat::Text,
            similarity: confidence,
            confidence,
            method,
            rank: 1,
        }
    }

    #[test]
    fn test_merge_drops_below_threshold() {
        let merged = merge_candidates(
            vec![
                cand(1, "1", 0.79, MatchMethod::Fuzzy),
                cand(2, "2", 0.80, MatchMethod::Fuzzy),
            ],
            0.8,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].entry_id, 2);
    }

    #[test]
    fn test_merge_keeps_best_confidence_per_row() {
        let merged = merge_candidates(
            vec![
                cand(1, "1", 0.85, MatchMethod::Fuzzy),
                cand(1, "1", 0.93, MatchMethod::Vector),
                cand(2, "2", 0.90, MatchMethod::Vector),
            ],
            0.8,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].entry_id, 1);
        assert_eq!(merged[0].method, MatchMethod::Vector);
        assert_eq!(merged[1].entry_id, 2);
    }

    #[test]
    fn test_merge_collapses_rows_sharing_a_label() {
        // Two rips of S1E2 (rows 1 and 3) and one of S1E4.
        let merged = merge_candidates(
            vec![
                cand(1, "2", 0.90, MatchMethod::Fuzzy),
                cand(3, "2", 0.97, MatchMethod::Fuzzy),
                cand(4, "4", 0.85, MatchMethod::Fuzzy),
            ],
            0.8,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].entry_id, 3);
        assert_eq!(merged[0].confidence, 0.97);
        assert_eq!(merged[1].label.episode, "4");
    }

    #[test]
    fn test_same_label_twice_is_not_ambiguous() {
        let merged = merge_candidates(
            vec![
                cand(1, "2", 1.0, MatchMethod::Fuzzy),
                cand(2, "2", 1.0, MatchMethod::Fuzzy),
            ],
            0.8,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].entry_id, 1);
        assert!(ambiguity_note(&merged, 0.8, 5).is_none());
    }

    #[test]
    fn test_merge_ties_keep_provider_order() {
        let merged = merge_candidates(
            vec![
                cand(1, "1", 0.9, MatchMethod::Fuzzy),
                cand(2, "2", 0.9, MatchMethod::Vector),
            ],
            0.8,
        );
        assert_eq!(merged[0].entry_id, 1);
    }

    #[test]
    fn test_merge_never_promotes_zero_confidence() {
        let merged = merge_candidates(vec![cand(1, "1", 0.0, MatchMethod::Fuzzy)], 0.0);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_ambiguity_note_lists_candidates() {
        let ranked = vec![
            cand(1, "2", 0.95, MatchMethod::Fuzzy),
            cand(2, "3", 0.95, MatchMethod::Vector),
        ];
        let note = ambiguity_note(&ranked, 0.8, 5).unwrap();
        assert!(note.contains("2 candidates"));
        assert!(note.contains("Show S1E2 (0.950, fuzzy)"));
        assert!(note.contains("Show S1E3 (0.950, vector)"));
        assert!(note.contains("tied"));
    }

    #[test]
    fn test_ambiguity_note_truncates() {
        let ranked: Vec<SimilarityCandidate> = (0..8)
            .map(|i| cand(i, &i.to_string(), 0.9 - i as f64 * 0.01, MatchMethod::Fuzzy))
            .collect();
        let note = ambiguity_note(&ranked, 0.8, 3).unwrap();
        assert!(note.starts_with("8 candidates"));
        assert!(note.ends_with("and 5 more"));
    }

    #[test]
    fn test_single_candidate_has_no_note() {
        let ranked = vec![cand(1, "1", 0.9, MatchMethod::Fuzzy)];
        assert!(ambiguity_note(&ranked, 0.8, 5).is_none());
    }

    #[test]
    fn test_settings_validation() {
        assert!(MatchSettings::default().validate().is_ok());
        let bad = MatchSettings {
            ngram_width: 0,
            ..MatchSettings::default()
        };
        assert!(bad.validate().is_err());
    }
}
