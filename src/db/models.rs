// Data models: corpus rows and the types that describe them.
//
// Kept apart from the queries so the matching code can use them without
// depending on rusqlite.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};
use crate::fingerprint::embeddings::validate_embedding;
use crate::fingerprint::Fingerprint;

/// How the subtitle text was obtained. Image-based formats go through OCR and
/// are trusted less.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Text subtitles (SRT, ASS, VTT) extracted verbatim.
    Text,
    /// Blu-ray PGS bitmaps, OCR'd.
    Pgs,
    /// DVD VobSub bitmaps, OCR'd.
    VobSub,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 3] = [SourceFormat::Text, SourceFormat::Pgs, SourceFormat::VobSub];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Text => "text",
            SourceFormat::Pgs => "pgs",
            SourceFormat::VobSub => "vobsub",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceFormat {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(SourceFormat::Text),
            "pgs" => Ok(SourceFormat::Pgs),
            "vobsub" => Ok(SourceFormat::VobSub),
            other => Err(MatchError::validation(format!(
                "unknown source format {other:?} (expected text, pgs or vobsub)"
            ))),
        }
    }
}

/// The episode a fingerprint belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeLabel {
    pub series: String,
    pub season: String,
    pub episode: String,
}

impl EpisodeLabel {
    pub fn new(
        series: impl Into<String>,
        season: impl Into<String>,
        episode: impl Into<String>,
    ) -> Self {
        Self {
            series: series.into(),
            season: season.into(),
            episode: episode.into(),
        }
    }
}

impl fmt::Display for EpisodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} S{}E{}", self.series, self.season, self.episode)
    }
}

/// A fingerprint ready to be appended to the corpus.
#[derive(Debug, Clone)]
pub struct NewFingerprint {
    pub label: EpisodeLabel,
    pub fingerprint: Fingerprint,
    pub embedding: Option<Vec<f32>>,
    pub source_format: SourceFormat,
}

impl NewFingerprint {
    /// Reject rows the corpus must never hold: no n-grams (the source text
    /// was empty or too short), or an embedding that is not a usable
    /// `dim`-length vector.
    pub fn validate(&self, dim: usize) -> Result<()> {
        if self.fingerprint.is_empty() {
            return Err(MatchError::validation(format!(
                "fingerprint for {} is empty; the source text had no usable content",
                self.label
            )));
        }
        if self.label.series.trim().is_empty() {
            return Err(MatchError::validation("series name is empty"));
        }
        if let Some(ref embedding) = self.embedding {
            validate_embedding(embedding, dim)?;
        }
        Ok(())
    }
}

/// A stored corpus row. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledFingerprint {
    /// Store-assigned insertion sequence number. Defines stable order.
    pub id: i64,
    pub label: EpisodeLabel,
    pub fingerprint: Fingerprint,
    pub embedding: Option<Vec<f32>>,
    pub source_format: SourceFormat,
}
