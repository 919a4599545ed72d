// Composition tests: the full ingest -> store -> identify flow.
//
// These chain the public modules together the way the CLI does:
//   ingest_text -> SqliteFingerprintStore -> VectorIndex -> MatchOrchestrator
// using in-memory SQLite and no files outside the temp directory.

use std::sync::Arc;

use subprint::db::models::{EpisodeLabel, SourceFormat};
use subprint::db::schema::create_tables;
use subprint::db::{FingerprintStore, SqliteFingerprintStore};
use subprint::matching::vector::DEFAULT_TOP_K;
use subprint::matching::{
    IdentifyRequest, MatchMethod, MatchOrchestrator, MatchOutcome, MatchSettings,
    VectorBackendKind, VectorConfig, VectorIndex,
};
use subprint::pipeline::ingest::ingest_text;
use subprint::MatchError;

const DIM: usize = 4;

const PILOT: &str = "1\n00:00:01,000 --> 00:00:03,000\n<i>Previously on the show...</i>\n\n2\n00:00:04,000 --> 00:00:06,000\nWe need to talk about the money.\n";
const FINALE: &str = "1\n00:00:01,000 --> 00:00:03,000\nIt ends tonight.\n\n2\n00:00:04,000 --> 00:00:06,000\n[explosion] Get down!\n";

fn store() -> Arc<SqliteFingerprintStore> {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    create_tables(&conn).unwrap();
    Arc::new(SqliteFingerprintStore::new(conn, DIM))
}

async fn seed(store: &dyn FingerprintStore) {
    ingest_text(
        store,
        EpisodeLabel::new("Drama", "1", "1"),
        PILOT,
        SourceFormat::Text,
        Some(vec![1.0, 0.0, 0.0, 0.0]),
        3,
    )
    .await
    .unwrap();
    ingest_text(
        store,
        EpisodeLabel::new("Drama", "1", "10"),
        FINALE,
        SourceFormat::Pgs,
        Some(vec![0.0, 1.0, 0.0, 0.0]),
        3,
    )
    .await
    .unwrap();
}

fn hybrid(store: Arc<SqliteFingerprintStore>, backend: VectorBackendKind) -> MatchOrchestrator {
    let mut config = VectorConfig::new(DIM);
    config.backend = backend;
    let index = Arc::new(VectorIndex::lazy(store.clone(), config).unwrap());
    MatchOrchestrator::hybrid(store, index, DEFAULT_TOP_K, MatchSettings::default())
}

// ============================================================
// Ingest -> identify
// ============================================================

#[tokio::test]
async fn reformatted_subtitles_identify_their_episode() {
    let store = store();
    seed(store.as_ref()).await;
    let orchestrator = hybrid(store, VectorBackendKind::Hnsw);

    // Same dialogue rendered as WebVTT with different markup.
    let vtt = "WEBVTT\n\n00:01.000 --> 00:03.000\nPreviously on the show...\n\n00:04.000 --> 00:06.000\n<b>We need to talk about the money.</b>\n";
    let result = orchestrator
        .identify_merged(&IdentifyRequest::new(vtt, SourceFormat::Text))
        .await;
    assert_eq!(result.label(), Some(EpisodeLabel::new("Drama", "1", "1")));
    assert_eq!(result.confidence, 1.0);
}

#[tokio::test]
async fn vector_path_finds_paraphrased_ocr_text() {
    let store = store();
    seed(store.as_ref()).await;
    let orchestrator = hybrid(store, VectorBackendKind::Exact);

    // OCR'd text that shares little surface form with the stored finale, but
    // whose embedding points at it.
    let request = IdentifyRequest::new("lt end5 t0night. Gct d0wn!", SourceFormat::VobSub)
        .with_embedding(vec![0.0, 1.0, 0.0, 0.0]);
    let outcome = orchestrator.identify(&request).await.unwrap();

    assert!(outcome.is_identified());
    let result = outcome.result();
    assert_eq!(result.episode.as_deref(), Some("10"));
    // Calibrated by the stored finale's format (PGS): 1.0 * 0.90
    assert!((result.confidence - 0.90).abs() < 1e-6);
}

#[tokio::test]
async fn vector_matches_below_calibrated_threshold_are_not_promoted() {
    let store = store();
    seed(store.as_ref()).await;
    let orchestrator = hybrid(store, VectorBackendKind::Exact);

    let request = IdentifyRequest::new("garbled ocr", SourceFormat::VobSub)
        .with_embedding(vec![0.0, 1.0, 0.0, 0.0])
        .with_min_confidence(0.95);
    let outcome = orchestrator.identify(&request).await.unwrap();
    assert!(matches!(outcome, MatchOutcome::NoMatch(_)));
    // Diagnostic confidence comes from the closest vector, a PGS row.
    assert!((outcome.result().confidence - 0.90).abs() < 1e-6);
    assert!(outcome.result().series.is_none());
}

#[tokio::test]
async fn fuzzy_and_vector_agreeing_collapse_to_one_candidate() {
    let store = store();
    seed(store.as_ref()).await;
    let orchestrator = hybrid(store, VectorBackendKind::Exact);

    let request =
        IdentifyRequest::new(FINALE, SourceFormat::Text).with_embedding(vec![0.0, 1.0, 0.0, 0.0]);
    let result = orchestrator.identify_merged(&request).await;
    assert_eq!(result.episode.as_deref(), Some("10"));
    assert_eq!(result.confidence, 1.0);
    assert!(result.ambiguity_notes.is_none());
}

#[tokio::test]
async fn text_rip_outranks_equally_similar_ocr_rip() {
    let store = store();
    for (episode, format) in [("7", SourceFormat::VobSub), ("8", SourceFormat::Text)] {
        ingest_text(
            store.as_ref(),
            EpisodeLabel::new("Sitcom", "3", episode),
            &format!("Unrelated dialogue for episode {episode}"),
            format,
            Some(vec![0.0, 0.0, 0.0, 1.0]),
            3,
        )
        .await
        .unwrap();
    }
    let orchestrator = hybrid(store, VectorBackendKind::Exact);

    let request = IdentifyRequest::new("nothing textual in common", SourceFormat::VobSub)
        .with_embedding(vec![0.0, 0.0, 0.0, 1.0]);
    let result = orchestrator.identify_merged(&request).await;
    assert_eq!(result.episode.as_deref(), Some("8"));
    assert!((result.confidence - 0.95).abs() < 1e-6);
    let notes = result.ambiguity_notes.expect("both rips clear 0.8");
    assert!(notes.contains("Sitcom S3E7 (0.850, vector)"));
}

#[tokio::test]
async fn equal_vector_candidates_produce_ambiguity_note() {
    let store = store();
    for episode in ["4", "5"] {
        ingest_text(
            store.as_ref(),
            EpisodeLabel::new("Sitcom", "2", episode),
            &format!("Completely different script for episode {episode}"),
            SourceFormat::Text,
            Some(vec![0.0, 0.0, 1.0, 0.0]),
            3,
        )
        .await
        .unwrap();
    }
    let orchestrator = hybrid(store, VectorBackendKind::Exact);

    let request = IdentifyRequest::new("nothing textual in common", SourceFormat::Text)
        .with_embedding(vec![0.0, 0.0, 1.0, 0.0]);
    let result = orchestrator.identify_merged(&request).await;
    assert_eq!(result.episode.as_deref(), Some("4"));
    assert!((result.confidence - 0.95).abs() < 1e-6);
    let notes = result.ambiguity_notes.expect("ambiguity note");
    assert!(notes.contains("Sitcom S2E4"));
    assert!(notes.contains("Sitcom S2E5"));
    assert!(notes.contains(MatchMethod::Vector.as_str()));
}

// ============================================================
// Degradation
// ============================================================

#[tokio::test]
async fn disabled_vector_backend_still_matches_by_text() {
    let store = store();
    seed(store.as_ref()).await;
    let orchestrator = hybrid(store, VectorBackendKind::Disabled);

    let request =
        IdentifyRequest::new(PILOT, SourceFormat::Text).with_embedding(vec![1.0, 0.0, 0.0, 0.0]);
    let outcome = orchestrator.identify(&request).await.unwrap();
    assert!(outcome.is_identified());
    assert_eq!(outcome.result().episode.as_deref(), Some("1"));
}

#[tokio::test]
async fn wrong_dimension_query_embedding_is_surfaced() {
    let store = store();
    seed(store.as_ref()).await;
    let orchestrator = hybrid(store, VectorBackendKind::Exact);

    let request = IdentifyRequest::new(PILOT, SourceFormat::Text).with_embedding(vec![1.0, 0.0]);
    let err = orchestrator.identify(&request).await.unwrap_err();
    assert!(matches!(err, MatchError::DimensionMismatch { .. }));

    let merged = orchestrator.identify_merged(&request).await;
    assert_eq!(merged.confidence, 0.0);
    assert!(merged.series.is_none());
}

// ============================================================
// Corpus bookkeeping
// ============================================================

#[tokio::test]
async fn store_counts_reflect_ingestion() {
    let store = store();
    seed(store.as_ref()).await;
    assert_eq!(store.count().await.unwrap(), 2);
    assert_eq!(store.embedding_count().await.unwrap(), 2);
    assert_eq!(
        store.count_by_format().await.unwrap(),
        vec![(SourceFormat::Pgs, 1), (SourceFormat::Text, 1)]
    );
}

#[tokio::test]
async fn rebuild_sees_rows_added_after_load() {
    let store = store();
    seed(store.as_ref()).await;
    let index = VectorIndex::initialize(store.clone(), VectorConfig::new(DIM))
        .await
        .unwrap();
    assert_eq!(index.len().await, Some(2));

    ingest_text(
        store.as_ref(),
        EpisodeLabel::new("Drama", "2", "1"),
        "A new season begins.",
        SourceFormat::Text,
        Some(vec![0.0, 0.0, 0.0, 1.0]),
        3,
    )
    .await
    .unwrap();

    let report = index.rebuild().await.unwrap();
    assert_eq!(report.indexed, 3);
    assert!(store.get_meta("index_rebuilt_at").await.unwrap().is_some());

    let found = index
        .search(&[0.0, 0.0, 0.0, 1.0], 1, 0.5)
        .await
        .unwrap();
    assert_eq!(found[0].label, EpisodeLabel::new("Drama", "2", "1"));
}

#[tokio::test]
async fn status_reports_on_populated_store() {
    let store = store();
    seed(store.as_ref()).await;
    subprint::status::show(store.as_ref(), ":memory:").await.unwrap();
}
