// Text normalization: raw subtitle text in, canonical comparison text out.

pub mod normalize;

pub use normalize::{normalize, variants, NormalizedVariants};
