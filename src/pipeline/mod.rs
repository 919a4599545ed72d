// Pipelines that feed the corpus.

pub mod ingest;
