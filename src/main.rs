use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use subprint::config::Config;
use subprint::db::models::{EpisodeLabel, SourceFormat};
use subprint::db::FingerprintStore;
use subprint::matching::{IdentifyRequest, MatchOrchestrator, VectorIndex};
use subprint::output::terminal;
use subprint::pipeline::ingest;

/// Subprint: identify TV episodes from subtitle text.
///
/// Builds a corpus of labeled subtitle fingerprints and matches unknown
/// subtitle files against it by n-gram overlap and embedding similarity.
#[derive(Parser)]
#[command(name = "subprint", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database
    Init,

    /// Add one labeled subtitle file to the corpus
    Ingest {
        /// Subtitle file (SRT, WebVTT, ASS, or OCR'd text)
        file: PathBuf,

        #[arg(long)]
        series: String,

        #[arg(long)]
        season: String,

        #[arg(long)]
        episode: String,

        /// Where the text came from: text, pgs, or vobsub
        #[arg(long, default_value = "text")]
        format: SourceFormat,

        /// JSON file holding a precomputed embedding (array of floats)
        #[arg(long)]
        embedding: Option<PathBuf>,
    },

    /// Add every entry of a JSON manifest to the corpus
    IngestManifest {
        manifest: PathBuf,
    },

    /// Identify which episode a subtitle file belongs to
    Identify {
        file: PathBuf,

        /// Where the text came from: text, pgs, or vobsub
        #[arg(long, default_value = "text")]
        format: SourceFormat,

        /// Override SUBPRINT_MIN_CONFIDENCE for this query
        #[arg(long)]
        min_confidence: Option<f64>,

        /// JSON file holding a precomputed embedding of the text
        #[arg(long)]
        embedding: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print every normalized variant of a subtitle file
    Normalize {
        file: PathBuf,
    },

    /// Rebuild the vector index from the stored embeddings
    RebuildIndex,

    /// Show corpus and index status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("subprint=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing subprint database...");
            let config = Config::load()?;
            let store = subprint::db::initialize_sqlite(&config.db_path, config.embedding_dim)?;
            let table_count = store.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
        }

        Commands::Ingest {
            file,
            series,
            season,
            episode,
            format,
            embedding,
        } => {
            let config = Config::load()?;
            let store = open_store(&config)?;
            let raw = ingest::read_subtitle_file(&file)?;
            let embedding = embedding.as_deref().map(read_embedding).transpose()?;
            let label = EpisodeLabel::new(series, season, episode);

            let id = ingest::ingest_text(
                store.as_ref(),
                label.clone(),
                &raw,
                format,
                embedding,
                config.ngram_width,
            )
            .await
            .with_context(|| format!("Failed to ingest {}", file.display()))?;
            println!("{} {} (row {id})", "Stored".green(), label.to_string().bold());
        }

        Commands::IngestManifest { manifest } => {
            let config = Config::load()?;
            let store = open_store(&config)?;
            let entries = ingest::load_manifest(&manifest)?;
            let base_dir = manifest.parent().unwrap_or_else(|| Path::new("."));
            println!("Ingesting {} manifest entries...", entries.len());

            let summary = ingest::ingest_manifest(
                store.as_ref(),
                &entries,
                base_dir,
                config.ngram_width,
                true,
            )
            .await?;
            terminal::display_ingest_summary(&summary);
        }

        Commands::Identify {
            file,
            format,
            min_confidence,
            embedding,
            json,
        } => {
            let config = Config::load()?;
            let store = open_store(&config)?;
            let index = Arc::new(VectorIndex::lazy(store.clone(), config.vector_config())?);
            let orchestrator = MatchOrchestrator::hybrid(
                store,
                index,
                config.vector_top_k,
                config.match_settings(),
            );

            let mut request = IdentifyRequest::new(ingest::read_subtitle_file(&file)?, format);
            if let Some(path) = embedding.as_deref() {
                request = request.with_embedding(read_embedding(path)?);
            }
            if let Some(threshold) = min_confidence {
                request = request.with_min_confidence(threshold);
            }

            let outcome = orchestrator.identify(&request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(outcome.result())?);
            } else {
                let threshold = min_confidence.unwrap_or(config.min_confidence);
                terminal::display_outcome(&outcome, threshold);
            }
        }

        Commands::Normalize { file } => {
            let raw = ingest::read_subtitle_file(&file)?;
            terminal::display_variants(&subprint::text::variants(&raw));
        }

        Commands::RebuildIndex => {
            let config = Config::load()?;
            let store = open_store(&config)?;
            let index = VectorIndex::lazy(store, config.vector_config())?;
            let report = index.rebuild().await?;
            terminal::display_rebuild(&report);
        }

        Commands::Status => {
            let config = Config::load()?;
            if !subprint::status::is_initialized(&config.db_path) {
                println!("Database: not initialized");
                println!("\nRun `subprint init` to set up the database.");
                return Ok(());
            }
            let store = open_store(&config)?;
            subprint::status::show(store.as_ref(), &config.db_path).await?;
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<dyn FingerprintStore>> {
    Ok(subprint::db::open_sqlite(
        &config.db_path,
        config.embedding_dim,
    )?)
}

/// Read an embedding stored as a JSON array of floats.
fn read_embedding(path: &Path) -> Result<Vec<f32>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read embedding file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Embedding file {} is not a JSON array of numbers", path.display()))
}
