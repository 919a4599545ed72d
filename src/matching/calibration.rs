// Source-format confidence calibration.
//
// Vector similarity is scaled by a fixed per-format weight: text subtitles
// are extracted verbatim and trusted most, OCR'd bitmaps (PGS, then VobSub)
// progressively less. The weights are static configuration.
//
//   confidence = similarity * weight(format)
//
// A positive constant factor never reorders candidates that share a format.

use serde::{Deserialize, Serialize};

use crate::db::models::SourceFormat;
use crate::error::{MatchError, Result};

/// Per-format confidence weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormatWeights {
    pub text: f64,
    pub pgs: f64,
    pub vobsub: f64,
}

impl Default for FormatWeights {
    fn default() -> Self {
        Self {
            text: 0.95,
            pgs: 0.90,
            vobsub: 0.85,
        }
    }
}

impl FormatWeights {
    pub fn weight(&self, format: SourceFormat) -> f64 {
        match format {
            SourceFormat::Text => self.text,
            SourceFormat::Pgs => self.pgs,
            SourceFormat::VobSub => self.vobsub,
        }
    }

    /// Calibrated confidence for a similarity observed on `format` input.
    pub fn calibrate(&self, similarity: f64, format: SourceFormat) -> f64 {
        (similarity.clamp(0.0, 1.0) * self.weight(format)).clamp(0.0, 1.0)
    }

    /// Weights must lie in (0, 1] and must not rank a noisier format above a
    /// cleaner one.
    pub fn validate(&self) -> Result<()> {
        for format in SourceFormat::ALL {
            let w = self.weight(format);
            if !(w > 0.0 && w <= 1.0) {
                return Err(MatchError::validation(format!(
                    "{format} weight must be within (0, 1], got {w}"
                )));
            }
        }
        if self.text < self.pgs || self.pgs < self.vobsub {
            return Err(MatchError::validation(format!(
                "format weights must satisfy text >= pgs >= vobsub, got {} / {} / {}",
                self.text, self.pgs, self.vobsub
            )));
        }
        Ok(())
    }
}
