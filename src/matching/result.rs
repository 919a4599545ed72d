// Identification requests and results.

use serde::{Serialize, Serializer};

use super::traits::SimilarityCandidate;
use crate::db::models::{EpisodeLabel, SourceFormat};
use crate::error::MatchError;

/// A piece of subtitle text to identify.
#[derive(Debug, Clone)]
pub struct IdentifyRequest {
    pub text: String,
    pub source_format: SourceFormat,
    /// Precomputed embedding of the normalized text, if the caller has one.
    pub embedding: Option<Vec<f32>>,
    /// Overrides the orchestrator's configured threshold for this request.
    pub min_confidence: Option<f64>,
}

impl IdentifyRequest {
    pub fn new(text: impl Into<String>, source_format: SourceFormat) -> Self {
        Self {
            text: text.into(),
            source_format,
            embedding: None,
            min_confidence: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_min_confidence(mut self, threshold: f64) -> Self {
        self.min_confidence = Some(threshold);
        self
    }
}

/// The merged answer to an identification request.
///
/// Labels are set only when a candidate cleared the threshold. Serialized
/// with empty strings for absent fields, the shape downstream consumers read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentificationResult {
    #[serde(serialize_with = "empty_if_none")]
    pub series: Option<String>,
    #[serde(serialize_with = "empty_if_none")]
    pub season: Option<String>,
    #[serde(serialize_with = "empty_if_none")]
    pub episode: Option<String>,
    #[serde(rename = "match_confidence")]
    pub confidence: f64,
    #[serde(serialize_with = "empty_if_none")]
    pub ambiguity_notes: Option<String>,
}

impl IdentificationResult {
    /// No label; `confidence` is diagnostic only.
    pub fn unmatched(confidence: f64) -> Self {
        Self {
            series: None,
            season: None,
            episode: None,
            confidence,
            ambiguity_notes: None,
        }
    }

    pub fn identified(winner: &SimilarityCandidate, ambiguity_notes: Option<String>) -> Self {
        Self {
            series: Some(winner.label.series.clone()),
            season: Some(winner.label.season.clone()),
            episode: Some(winner.label.episode.clone()),
            confidence: winner.confidence,
            ambiguity_notes,
        }
    }

    pub fn is_identified(&self) -> bool {
        self.series.is_some()
    }

    pub fn label(&self) -> Option<EpisodeLabel> {
        match (&self.series, &self.season, &self.episode) {
            (Some(series), Some(season), Some(episode)) => {
                Some(EpisodeLabel::new(series, season, episode))
            }
            _ => None,
        }
    }
}

fn empty_if_none<S: Serializer>(
    value: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

/// How an identification ended. `Failed` carries the operational error that
/// prevented any candidate from being found; its result has zero confidence.
#[derive(Debug)]
pub enum MatchOutcome {
    Identified(IdentificationResult),
    NoMatch(IdentificationResult),
    Failed {
        result: IdentificationResult,
        reason: MatchError,
    },
}

impl MatchOutcome {
    pub fn result(&self) -> &IdentificationResult {
        match self {
            MatchOutcome::Identified(r) | MatchOutcome::NoMatch(r) => r,
            MatchOutcome::Failed { result, .. } => result,
        }
    }

    pub fn into_result(self) -> IdentificationResult {
        match self {
            MatchOutcome::Identified(r) | MatchOutcome::NoMatch(r) => r,
            MatchOutcome::Failed { result, .. } => result,
        }
    }

    pub fn is_identified(&self) -> bool {
        matches!(self, MatchOutcome::Identified(_))
    }
}
