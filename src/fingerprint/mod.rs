// Fingerprint computation: n-gram sets, Jaccard overlap, and embedding math.

pub mod embeddings;
pub mod ngram;
pub mod overlap;

pub use ngram::{Fingerprint, DEFAULT_NGRAM_WIDTH};
pub use overlap::jaccard;
