// Nearest-neighbour backends over stored embeddings.
//
// Both backends answer the same question: the k slots closest to a query by
// cosine distance, nearest first. ExactBackend compares against every vector
// and is used for small corpora or when configured explicitly; HnswBackend
// wraps an hnsw_rs graph for approximate search over larger ones.

use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::prelude::*;

use crate::fingerprint::embeddings::cosine_distance;

/// hnsw_rs caps the number of layers at 16.
const MAX_LAYERS: usize = 16;

/// Tuning knobs for the HNSW graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HnswParams {
    /// Max connections per node (M).
    pub max_connections: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    /// Corpora with at most this many embeddings use the exact backend.
    pub exact_below: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            ef_construction: 200,
            ef_search: 64,
            exact_below: 1000,
        }
    }
}

pub trait AnnBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` (slot, cosine distance) pairs, nearest first.
    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)>;
}

pub struct ExactBackend {
    vectors: Vec<Vec<f32>>,
}

impl ExactBackend {
    pub fn build(vectors: Vec<Vec<f32>>) -> Self {
        Self { vectors }
    }
}

impl AnnBackend for ExactBackend {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(slot, v)| (slot, cosine_distance(query, v)))
            .collect();
        sort_hits(&mut scored);
        scored.truncate(k);
        scored
    }
}

pub struct HnswBackend {
    graph: Hnsw<'static, f32, DistCosine>,
    len: usize,
    ef_search: usize,
}

impl HnswBackend {
    /// Build the graph over `vectors`; slot i is vectors[i]. CPU-bound, so
    /// async callers run it on a blocking thread.
    pub fn build(vectors: &[Vec<f32>], params: &HnswParams) -> Self {
        let mut graph = Hnsw::<f32, DistCosine>::new(
            params.max_connections,
            vectors.len().max(1),
            MAX_LAYERS,
            params.ef_construction,
            DistCosine {},
        );
        for (slot, vector) in vectors.iter().enumerate() {
            graph.insert_slice((vector.as_slice(), slot));
        }
        graph.set_searching_mode(true);

        Self {
            graph,
            len: vectors.len(),
            ef_search: params.ef_search,
        }
    }
}

impl AnnBackend for HnswBackend {
    fn name(&self) -> &'static str {
        "hnsw"
    }

    fn len(&self) -> usize {
        self.len
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if self.len == 0 || k == 0 {
            return Vec::new();
        }
        let ef = self.ef_search.max(k);
        let mut hits: Vec<(usize, f32)> = self
            .graph
            .search(query, k, ef)
            .into_iter()
            .map(|n| (n.d_id, n.distance))
            .collect();
        sort_hits(&mut hits);
        hits.truncate(k);
        hits
    }
}

/// Nearest first; equal distances fall back to slot order so results are
/// deterministic.
fn sort_hits(hits: &mut [(usize, f32)]) {
    hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(angle: f32) -> Vec<f32> {
        vec![angle.cos(), angle.sin()]
    }

    #[test]
    fn test_exact_orders_by_distance() {
        let backend = ExactBackend::build(vec![unit(1.0), unit(0.0), unit(0.5)]);
        let hits = backend.search(&unit(0.0), 3);
        let slots: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(slots, vec![1, 2, 0]);
        assert!(hits[0].1.abs() < 1e-6);
    }

    #[test]
    fn test_exact_truncates_to_k() {
        let backend = ExactBackend::build(vec![unit(0.0), unit(0.1), unit(0.2)]);
        assert_eq!(backend.search(&unit(0.0), 2).len(), 2);
        assert_eq!(backend.search(&unit(0.0), 10).len(), 3);
    }

    #[test]
    fn test_hnsw_finds_identical_vector() {
        let vectors: Vec<Vec<f32>> = (0..50).map(|i| unit(i as f32 * 0.06)).collect();
        let backend = HnswBackend::build(&vectors, &HnswParams::default());
        assert_eq!(backend.len(), 50);
        let hits = backend.search(&vectors[17], 1);
        assert_eq!(hits[0].0, 17);
    }

    #[test]
    fn test_hnsw_empty_graph_returns_nothing() {
        let backend = HnswBackend::build(&[], &HnswParams::default());
        assert!(backend.is_empty());
        assert!(backend.search(&unit(0.0), 3).is_empty());
    }
}
