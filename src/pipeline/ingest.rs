// Corpus ingestion: turn labeled subtitle files into stored fingerprints.
//
// Single files go through ingest_text. Bulk loads read a JSON manifest
// listing one subtitle file per episode; a bad entry is reported and skipped
// so one unreadable file never aborts the batch.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use crate::db::models::{EpisodeLabel, NewFingerprint, SourceFormat};
use crate::db::FingerprintStore;
use crate::error::MatchError;
use crate::fingerprint::Fingerprint;
use crate::text;

/// Normalize `raw_text`, fingerprint it, and append it to the corpus under
/// `label`. Returns the new row id.
pub async fn ingest_text(
    store: &dyn FingerprintStore,
    label: EpisodeLabel,
    raw_text: &str,
    source_format: SourceFormat,
    embedding: Option<Vec<f32>>,
    ngram_width: usize,
) -> crate::error::Result<i64> {
    let normalized = text::normalize(raw_text);
    if normalized.is_empty() {
        return Err(MatchError::validation(format!(
            "subtitle text for {label} is empty after normalization"
        )));
    }
    let fingerprint = Fingerprint::from_normalized(&normalized, ngram_width)?;

    store
        .insert(&NewFingerprint {
            label,
            fingerprint,
            embedding,
            source_format,
        })
        .await
}

/// Read a subtitle file as text. Invalid UTF-8 is replaced rather than
/// rejected (OCR output and old rips are often Latin-1); a leading BOM is
/// dropped.
pub fn read_subtitle_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read subtitle file {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// One manifest line: which file holds which episode.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub series: String,
    #[serde(deserialize_with = "string_or_number")]
    pub season: String,
    #[serde(deserialize_with = "string_or_number")]
    pub episode: String,
    /// Relative paths resolve against the manifest's directory.
    pub path: PathBuf,
    #[serde(default)]
    pub format: Option<SourceFormat>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl ManifestEntry {
    pub fn label(&self) -> EpisodeLabel {
        EpisodeLabel::new(&self.series, &self.season, &self.episode)
    }
}

/// Accept `"season": 1` as well as `"season": "1"`.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

/// Parse a manifest file.
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid manifest {}", path.display()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub inserted: usize,
    pub failed: Vec<IngestFailure>,
}

/// Ingest every manifest entry. `base_dir` anchors relative paths.
pub async fn ingest_manifest(
    store: &dyn FingerprintStore,
    entries: &[ManifestEntry],
    base_dir: &Path,
    ngram_width: usize,
    show_progress: bool,
) -> Result<IngestSummary> {
    let pb = if show_progress {
        let pb = ProgressBar::new(entries.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Ingesting [{bar:30}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut summary = IngestSummary::default();
    for entry in entries {
        let path = if entry.path.is_absolute() {
            entry.path.clone()
        } else {
            base_dir.join(&entry.path)
        };

        match ingest_entry(store, entry, &path, ngram_width).await {
            Ok(id) => {
                summary.inserted += 1;
                tracing::debug!(id, label = %entry.label(), "Ingested manifest entry");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to ingest manifest entry, skipping");
                summary.failed.push(IngestFailure {
                    path,
                    error: format!("{e:#}"),
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        inserted = summary.inserted,
        failed = summary.failed.len(),
        "Manifest ingestion complete"
    );
    Ok(summary)
}

async fn ingest_entry(
    store: &dyn FingerprintStore,
    entry: &ManifestEntry,
    path: &Path,
    ngram_width: usize,
) -> Result<i64> {
    let raw = read_subtitle_file(path)?;
    let id = ingest_text(
        store,
        entry.label(),
        &raw,
        entry.format.unwrap_or(SourceFormat::Text),
        entry.embedding.clone(),
        ngram_width,
    )
    .await?;
    Ok(id)
}
