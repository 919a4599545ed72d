use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::fingerprint::embeddings::DEFAULT_EMBEDDING_DIM;
use crate::fingerprint::DEFAULT_NGRAM_WIDTH;
use crate::matching::vector::backend::HnswParams;
use crate::matching::vector::DEFAULT_TOP_K;
use crate::matching::{
    FormatWeights, MatchSettings, VectorBackendKind, VectorConfig, DEFAULT_MIN_CONFIDENCE,
};

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Every
/// setting has a default; a value that is present but unparseable is an
/// error rather than a silent fallback.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub min_confidence: f64,
    pub ngram_width: usize,
    pub embedding_dim: usize,
    pub vector_backend: VectorBackendKind,
    pub vector_top_k: usize,
    pub weights: FormatWeights,
    /// Report the best below-threshold confidence when nothing matches.
    pub diagnostics: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let vector_backend = match env::var("SUBPRINT_VECTOR_BACKEND") {
            Ok(raw) => raw
                .parse::<VectorBackendKind>()
                .context("Invalid SUBPRINT_VECTOR_BACKEND")?,
            Err(_) => VectorBackendKind::Hnsw,
        };

        let defaults = FormatWeights::default();
        let weights = FormatWeights {
            text: parse_var("SUBPRINT_WEIGHT_TEXT", defaults.text)?,
            pgs: parse_var("SUBPRINT_WEIGHT_PGS", defaults.pgs)?,
            vobsub: parse_var("SUBPRINT_WEIGHT_VOBSUB", defaults.vobsub)?,
        };

        let config = Self {
            db_path: env::var("SUBPRINT_DB_PATH").unwrap_or_else(|_| default_db_path()),
            min_confidence: parse_var("SUBPRINT_MIN_CONFIDENCE", DEFAULT_MIN_CONFIDENCE)?,
            ngram_width: parse_var("SUBPRINT_NGRAM_WIDTH", DEFAULT_NGRAM_WIDTH)?,
            embedding_dim: parse_var("SUBPRINT_EMBEDDING_DIM", DEFAULT_EMBEDDING_DIM)?,
            vector_backend,
            vector_top_k: parse_var("SUBPRINT_VECTOR_TOP_K", DEFAULT_TOP_K)?,
            weights,
            diagnostics: parse_bool_var("SUBPRINT_DIAGNOSTICS", true)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints the individual parsers can't.
    pub fn validate(&self) -> Result<()> {
        if self.vector_top_k == 0 {
            bail!("SUBPRINT_VECTOR_TOP_K must be at least 1");
        }
        self.match_settings()
            .validate()
            .context("Invalid matching configuration")?;
        self.vector_config()
            .validate()
            .context("Invalid vector configuration")?;
        Ok(())
    }

    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            min_confidence: self.min_confidence,
            ngram_width: self.ngram_width,
            diagnostics: self.diagnostics,
            ..MatchSettings::default()
        }
    }

    pub fn vector_config(&self) -> VectorConfig {
        VectorConfig {
            dimension: self.embedding_dim,
            backend: self.vector_backend,
            weights: self.weights,
            hnsw: HnswParams::default(),
        }
    }
}

/// `<data dir>/subprint/subprint.db`, or ./subprint.db when the platform has
/// no data directory.
fn default_db_path() -> String {
    dirs::data_dir()
        .map(|dir| dir.join("subprint").join("subprint.db"))
        .unwrap_or_else(|| PathBuf::from("./subprint.db"))
        .to_string_lossy()
        .into_owned()
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {name}={raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

fn parse_bool_var(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("Invalid {name}={raw:?}: expected true or false"),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            db_path: "./subprint.db".to_string(),
            min_confidence: 0.8,
            ngram_width: 3,
            embedding_dim: 384,
            vector_backend: VectorBackendKind::Hnsw,
            vector_top_k: 10,
            weights: FormatWeights::default(),
            diagnostics: true,
        }
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_threshold_is_invalid() {
        let config = Config {
            min_confidence: 1.2,
            ..sample()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_top_k_is_invalid() {
        let config = Config {
            vector_top_k: 0,
            ..sample()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_carry_through() {
        let config = Config {
            min_confidence: 0.65,
            vector_backend: VectorBackendKind::Exact,
            ..sample()
        };
        assert_eq!(config.match_settings().min_confidence, 0.65);
        assert_eq!(config.vector_config().backend, VectorBackendKind::Exact);
        assert_eq!(config.vector_config().dimension, 384);
    }

    #[test]
    fn test_default_db_path_names_the_file() {
        assert!(default_db_path().ends_with("subprint.db"));
    }
}
