// Subprint: identify TV episodes from subtitle text
//
// This is the library root. Text flows normalize -> fingerprint -> match:
// `text` cleans subtitle markup, `fingerprint` turns text into n-gram sets
// and validates embeddings, `db` stores the labeled corpus, and `matching`
// ranks stored episodes against a query.

pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod matching;
pub mod output;
pub mod pipeline;
pub mod status;
pub mod text;

pub use error::{MatchError, Result};
