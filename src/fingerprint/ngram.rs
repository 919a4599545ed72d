// Fingerprint: the set of fixed-width character n-grams of normalized text.
//
// The set is kept sorted (BTreeSet) so the canonical serialized form is
// deterministic and two fingerprints built from the same text compare equal
// byte-for-byte in storage.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{MatchError, Result};
use crate::text;

/// Default n-gram width (trigrams).
pub const DEFAULT_NGRAM_WIDTH: usize = 3;

/// A shingled n-gram fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
    width: usize,
    grams: BTreeSet<String>,
}

impl Fingerprint {
    /// Build a fingerprint from text that has already been normalized.
    ///
    /// N-grams are taken over lowercased Unicode scalar values. Text shorter
    /// than `width` characters yields an empty fingerprint.
    pub fn from_normalized(normalized: &str, width: usize) -> Result<Self> {
        if width == 0 {
            return Err(MatchError::validation("n-gram width must be positive"));
        }

        let chars: Vec<char> = normalized.to_lowercase().chars().collect();
        let grams = chars
            .windows(width)
            .map(|w| w.iter().collect::<String>())
            .collect();

        Ok(Self { width, grams })
    }

    /// Normalize raw subtitle text, then fingerprint it.
    pub fn from_text(raw: &str, width: usize) -> Result<Self> {
        Self::from_normalized(&text::normalize(raw), width)
    }

    /// Rebuild a fingerprint from its canonical serialized form.
    pub fn from_canonical(canonical: &str, width: usize) -> Result<Self> {
        if width == 0 {
            return Err(MatchError::validation("n-gram width must be positive"));
        }
        let grams: BTreeSet<String> = serde_json::from_str(canonical)?;
        if let Some(bad) = grams.iter().find(|g| g.chars().count() != width) {
            return Err(MatchError::Storage(format!(
                "fingerprint n-gram {bad:?} does not have width {width}"
            )));
        }
        Ok(Self { width, grams })
    }

    /// Canonical form: a JSON array of the sorted n-grams.
    pub fn to_canonical(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.grams)?)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.grams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grams.is_empty()
    }

    pub fn contains(&self, gram: &str) -> bool {
        self.grams.contains(gram)
    }

    /// Iterate the n-grams in sorted order.
    pub fn grams(&self) -> impl Iterator<Item = &str> {
        self.grams.iter().map(String::as_str)
    }

    /// Number of n-grams present in both fingerprints.
    pub fn shared_count(&self, other: &Fingerprint) -> usize {
        // Walk the smaller set, probe the larger one.
        let (small, large) = if self.grams.len() <= other.grams.len() {
            (&self.grams, &other.grams)
        } else {
            (&other.grams, &self.grams)
        };
        small.iter().filter(|g| large.contains(*g)).count()
    }
}
