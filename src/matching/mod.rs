// Matching engine: fuzzy n-gram overlap, vector search, and the orchestrator
// that merges them into one identification result.

pub mod calibration;
pub mod fuzzy;
pub mod orchestrator;
pub mod result;
pub mod traits;
pub mod vector;

pub use calibration::FormatWeights;
pub use fuzzy::{FuzzyMatcher, FuzzyProvider};
pub use orchestrator::{MatchOrchestrator, MatchSettings, DEFAULT_MIN_CONFIDENCE};
pub use result::{IdentificationResult, IdentifyRequest, MatchOutcome};
pub use traits::{MatchMethod, QueryFingerprint, SimilarityCandidate, SimilarityProvider};
pub use vector::{VectorBackendKind, VectorConfig, VectorIndex, VectorProvider};
