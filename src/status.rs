// System status display: database size, corpus composition, index freshness.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::db::FingerprintStore;

/// Display corpus status to the terminal.
pub async fn show(store: &dyn FingerprintStore, db_display_path: &str) -> Result<()> {
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    let total = store.count().await?;
    if total == 0 {
        println!("Corpus: {}", "empty".yellow());
        println!("  Run `subprint ingest` or `subprint ingest-manifest` to add episodes");
        return Ok(());
    }
    println!("Corpus: {} fingerprints", total);
    for (format, count) in store.count_by_format().await? {
        println!("  {:<8} {}", format.as_str(), count);
    }

    let embedded = store.embedding_count().await?;
    println!(
        "Embeddings: {} of {} rows (dimension {})",
        embedded,
        total,
        store.embedding_dim()
    );

    match store.get_meta("index_rebuilt_at").await? {
        Some(at) => {
            let size = store
                .get_meta("index_size")
                .await?
                .unwrap_or_else(|| "?".to_string());
            println!("Last index rebuild: {} ({} vectors)", at, size);
        }
        None => println!("Last index rebuild: never (index builds on first identify)"),
    }

    Ok(())
}

/// Whether the database file exists yet.
pub fn is_initialized(db_path: &str) -> bool {
    Path::new(db_path).exists()
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
