// Jaccard similarity between n-gram fingerprints.
//
//   jaccard(A, B) = |A ∩ B| / |A ∪ B|
//
// Defined as exactly 0.0 when either side is empty, so two "no content"
// entries never look like a match.

use super::ngram::Fingerprint;

/// Jaccard similarity in [0.0, 1.0].
///
/// Fingerprints built with different n-gram widths share no grams by
/// construction and score 0.0.
pub fn jaccard(a: &Fingerprint, b: &Fingerprint) -> f64 {
    if a.is_empty() || b.is_empty() || a.width() != b.width() {
        return 0.0;
    }

    let shared = a.shared_count(b);
    let union = a.len() + b.len() - shared;

    (shared as f64 / union as f64).clamp(0.0, 1.0)
}
