use crate::encoding::tokenize;
use crate::traits::ChunkStore;
use crate::{Candidate, Chunk, SearchError};
use async_trait::async_trait;
use std::collections::HashSet;

/// In-process store scored by query-term overlap. Useful offline and as a
/// stand-in for Qdrant in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryChunkStore {
    chunks: Vec<Chunk>,
}

impl MemoryChunkStore {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn query(&self, text: &str, limit: usize) -> Result<Vec<Candidate>, SearchError> {
        let terms: HashSet<String> = tokenize(text).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<Candidate> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let chunk_terms: HashSet<String> = tokenize(&chunk.text).collect();
                let matched = terms.intersection(&chunk_terms).count();
                if matched == 0 {
                    return None;
                }
                Some(Candidate {
                    chunk: chunk.clone(),
                    retrieval_score: matched as f64 / terms.len() as f64,
                })
            })
            .collect();

        hits.sort_by(|left, right| right.retrieval_score.total_cmp(&left.retrieval_score));
        hits.truncate(limit);
        Ok(hits)
    }
}
