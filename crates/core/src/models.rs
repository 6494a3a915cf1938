use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
    pub section_title: String,
    pub subject_context: String,
}

/// An indexed unit of document text. Owned by the chunk store; the pipeline
/// only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// One store hit for one query variant. `retrieval_score` is store-native and
/// is not comparable across variants.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chunk: Chunk,
    pub retrieval_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub chunk: Chunk,
    pub relevance_score: f64,
    pub rank: usize,
}

impl ScoredResult {
    pub fn to_evidence(&self) -> Evidence {
        Evidence {
            score: self.relevance_score,
            text: self.chunk.text.clone(),
            meta: EvidenceMeta {
                chunk_id: self.chunk.id.clone(),
                source: self.chunk.metadata.source.clone(),
                page: self.chunk.metadata.page,
                section_title: self.chunk.metadata.section_title.clone(),
                subject_context: self.chunk.metadata.subject_context.clone(),
            },
        }
    }
}

/// Shape handed to answer generation, best first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    pub score: f64,
    pub text: String,
    pub meta: EvidenceMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceMeta {
    pub chunk_id: String,
    pub source: String,
    pub page: u32,
    pub section_title: String,
    pub subject_context: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SearchStatus {
    Complete,
    Degraded,
    Empty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Degradation {
    /// Expansion backend missing or failing; recall narrowed to the original query.
    ExpansionUnavailable,
    /// Some variant searches failed; their candidates are missing.
    PartialRetrievalFailure { failed: usize, attempted: usize },
    /// Every variant search failed.
    TotalRetrievalFailure,
    /// Scoring backend failed; results are unranked with a 0.0 score.
    RerankUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<ScoredResult>,
    pub status: SearchStatus,
    pub degradations: Vec<Degradation>,
}

impl SearchOutcome {
    pub(crate) fn from_parts(
        query: &str,
        results: Vec<ScoredResult>,
        degradations: Vec<Degradation>,
    ) -> Self {
        let status = if results.is_empty() {
            SearchStatus::Empty
        } else if degradations.is_empty() {
            SearchStatus::Complete
        } else {
            SearchStatus::Degraded
        };

        Self {
            query: query.to_string(),
            results,
            status,
            degradations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_ranking_degraded(&self) -> bool {
        self.degradations.contains(&Degradation::RerankUnavailable)
    }

    pub fn evidence(&self) -> Vec<Evidence> {
        self.results.iter().map(ScoredResult::to_evidence).collect()
    }

    pub fn into_results(self) -> Vec<ScoredResult> {
        self.results
    }
}
