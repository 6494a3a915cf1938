use crate::{Candidate, SearchError};
use async_trait::async_trait;

/// Hybrid (lexical + semantic) index queried by raw text.
#[async_trait]
pub trait ChunkStore {
    /// An empty store yields `Ok(vec![])`.
    async fn query(&self, text: &str, limit: usize) -> Result<Vec<Candidate>, SearchError>;
}

/// Single-turn text completion.
#[async_trait]
pub trait TextGenerator {
    /// An empty but successful completion is `Ok(String::new())`, never an error.
    async fn complete(&self, prompt: &str) -> Result<String, SearchError>;
}

/// Cross-encoder relevance model.
#[async_trait]
pub trait RelevanceScorer {
    /// Scores every passage against `query` in one batched call. The returned
    /// scores are in passage order; higher is more relevant.
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f64>, SearchError>;
}
