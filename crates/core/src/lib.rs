pub mod chunk_file;
pub mod clients;
pub mod config;
pub mod dedup;
pub mod encoding;
pub mod error;
pub mod expansion;
pub mod models;
pub mod orchestrator;
pub mod rerank;
pub mod retrieval;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunk_file::{load_chunk_file, parse_chunk_records};
pub use clients::{ChatCompletionGenerator, ChatConfig, CrossEncoderConfig, HttpCrossEncoder};
pub use config::PipelineConfig;
pub use dedup::dedupe;
pub use encoding::{CharacterNgramEncoder, DenseEncoder, SparseVector, TermFrequencyEncoder};
pub use error::{IngestError, SearchError};
pub use expansion::{QueryExpander, QueryVariants};
pub use models::{
    Candidate, Chunk, ChunkMetadata, Degradation, Evidence, EvidenceMeta, ScoredResult,
    SearchOutcome, SearchStatus,
};
pub use orchestrator::SearchCoordinator;
pub use rerank::{unranked_fallback, Reranker, FALLBACK_SCORE};
pub use retrieval::{CandidateRetriever, RetrievalReport};
pub use store::StoreHit;
pub use stores::{MemoryChunkStore, QdrantStore};
pub use traits::{ChunkStore, RelevanceScorer, TextGenerator};
