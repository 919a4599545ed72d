// Database queries for the fingerprint corpus.
//
// All SQL lives here. Rows are read into a plain tuple inside the rusqlite
// closure and decoded afterwards, so corrupt values surface as
// MatchError::Storage rather than being skipped.

use rusqlite::{params, Connection, OptionalExtension};

use super::models::{EpisodeLabel, LabeledFingerprint, NewFingerprint, SourceFormat};
use crate::error::{MatchError, Result};
use crate::fingerprint::embeddings::{decode_embedding, encode_embedding};
use crate::fingerprint::Fingerprint;

// --- Fingerprints ---

/// Append one fingerprint row and return its id.
///
/// The caller validates the row first; this only writes it.
pub fn insert_fingerprint(conn: &Connection, entry: &NewFingerprint) -> Result<i64> {
    let canonical = entry.fingerprint.to_canonical()?;
    let embedding = entry.embedding.as_deref().map(encode_embedding);

    conn.execute(
        "INSERT INTO fingerprints
            (series, season, episode, fingerprint, ngram_width, embedding, source_format)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.label.series,
            entry.label.season,
            entry.label.episode,
            canonical,
            entry.fingerprint.width() as i64,
            embedding,
            entry.source_format.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

type RawRow = (i64, String, String, String, String, i64, Option<Vec<u8>>, String);

/// Read up to `limit` rows with id greater than `after_id`, in id order.
pub fn fetch_page(conn: &Connection, after_id: i64, limit: usize) -> Result<Vec<LabeledFingerprint>> {
    let mut stmt = conn.prepare(
        "SELECT id, series, season, episode, fingerprint, ngram_width, embedding, source_format
         FROM fingerprints
         WHERE id > ?1
         ORDER BY id ASC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![after_id, limit as i64], |row| {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    })?;

    let mut page = Vec::with_capacity(limit);
    for row in rows {
        page.push(decode_row(row?)?);
    }
    Ok(page)
}

fn decode_row(raw: RawRow) -> Result<LabeledFingerprint> {
    let (id, series, season, episode, canonical, width, embedding, format) = raw;

    let width = usize::try_from(width)
        .map_err(|_| MatchError::Storage(format!("row {id} has invalid n-gram width {width}")))?;
    let fingerprint = Fingerprint::from_canonical(&canonical, width)?;
    let embedding = embedding.as_deref().map(decode_embedding).transpose()?;
    let source_format = format
        .parse::<SourceFormat>()
        .map_err(|_| MatchError::Storage(format!("row {id} has unknown source format {format:?}")))?;

    Ok(LabeledFingerprint {
        id,
        label: EpisodeLabel {
            series,
            season,
            episode,
        },
        fingerprint,
        embedding,
        source_format,
    })
}

/// Total number of corpus rows.
pub fn count_fingerprints(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Rows per source format. Formats with no rows are omitted.
pub fn count_by_format(conn: &Connection) -> Result<Vec<(SourceFormat, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT source_format, COUNT(*) FROM fingerprints
         GROUP BY source_format
         ORDER BY source_format",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    let mut counts = Vec::new();
    for row in rows {
        let (format, count) = row?;
        let format = format
            .parse::<SourceFormat>()
            .map_err(|_| MatchError::Storage(format!("unknown source format {format:?}")))?;
        counts.push((format, count as u64));
    }
    Ok(counts)
}

/// Number of rows carrying an embedding.
pub fn count_embeddings(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM fingerprints WHERE embedding IS NOT NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

// --- Engine meta ---

/// Get a bookkeeping value by key (e.g. "index_rebuilt_at").
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM engine_meta WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a bookkeeping value (upsert).
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO engine_meta (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}
