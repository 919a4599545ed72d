// Dense embeddings: validation, cosine math, and the storage byte format.
//
// The engine never computes embeddings itself. An external model produces
// fixed-dimension vectors, either handed over with each request or through
// the `Embedder` trait below.

use async_trait::async_trait;

use crate::error::{MatchError, Result};

/// Default embedding dimension (all-MiniLM-L6-v2 sized vectors).
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// An external text-embedding function.
///
/// Implementations wrap whatever model the deployment has. Every vector
/// returned must have exactly `dimension()` components.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The fixed length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed one piece of normalized subtitle text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Check that an embedding can be stored or searched with.
///
/// Wrong length is a validation error here (stored rows); query-side length
/// checks report `DimensionMismatch` instead, see `VectorIndex::search`.
pub fn validate_embedding(vector: &[f32], dim: usize) -> Result<()> {
    if vector.len() != dim {
        return Err(MatchError::validation(format!(
            "embedding has {} components, expected {dim}",
            vector.len()
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(MatchError::validation("embedding contains NaN or infinite values"));
    }
    if l2_norm(vector) < f32::EPSILON {
        return Err(MatchError::validation("embedding has zero norm"));
    }
    Ok(())
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine distance in [0.0, 2.0]: `1 - cos(a, b)`.
///
/// Mismatched lengths and zero vectors are treated as maximally unrelated
/// (distance 1.0, i.e. cosine 0).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let denom = l2_norm(a) * l2_norm(b);
    if denom < f32::EPSILON {
        1.0
    } else {
        (1.0 - dot / denom).clamp(0.0, 2.0)
    }
}

/// Similarity from a cosine distance, clamped to [0.0, 1.0].
pub fn similarity_from_distance(distance: f32) -> f64 {
    (1.0 - f64::from(distance)).clamp(0.0, 1.0)
}

/// Serialize an embedding as little-endian f32 bytes.
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of `encode_embedding`.
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(MatchError::Storage(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors_have_zero_distance() {
        let a = [1.0, 2.0, 3.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
        assert!((similarity_from_distance(cosine_distance(&a, &a)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_proportional_vectors_have_zero_distance() {
        assert!(cosine_distance(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let d = cosine_distance(&[1.0, 0.0], &[0.0, 1.0]);
        assert!((d - 1.0).abs() < 1e-6);
        assert!(similarity_from_distance(d).abs() < 1e-6);
    }

    #[test]
    fn test_opposite_vectors_clamp_similarity_to_zero() {
        let d = cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((d - 2.0).abs() < 1e-6);
        assert_eq!(similarity_from_distance(d), 0.0);
    }

    #[test]
    fn test_zero_and_mismatched_vectors() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_validate_embedding() {
        assert!(validate_embedding(&[0.5, 0.5], 2).is_ok());
        assert!(matches!(
            validate_embedding(&[0.5], 2),
            Err(MatchError::Validation(_))
        ));
        assert!(matches!(
            validate_embedding(&[0.0, 0.0], 2),
            Err(MatchError::Validation(_))
        ));
        assert!(matches!(
            validate_embedding(&[f32::NAN, 1.0], 2),
            Err(MatchError::Validation(_))
        ));
    }

    #[test]
    fn test_blob_round_trip() {
        let v = vec![0.25_f32, -1.5, 3.0e-3];
        let bytes = encode_embedding(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_embedding(&bytes).unwrap(), v);
    }

    #[test]
    fn test_truncated_blob_is_storage_error() {
        assert!(matches!(
            decode_embedding(&[0, 0, 128]),
            Err(MatchError::Storage(_))
        ));
    }
}
