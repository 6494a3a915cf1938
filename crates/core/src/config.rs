use crate::SearchError;
use std::time::Duration;

pub const DEFAULT_VARIANT_FANOUT_LIMIT: usize = 25;
pub const DEFAULT_TOP_K: usize = 8;
pub const DEFAULT_MAX_VARIANTS: usize = 4;
pub const DEFAULT_RERANK_FALLBACK_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Candidates requested from the store per query variant.
    pub variant_fanout_limit: usize,
    pub top_k: usize,
    /// Original query included; 1 disables expansion.
    pub max_variants: usize,
    /// Unranked results returned when the scorer is unavailable.
    pub rerank_fallback_limit: usize,
    pub expansion_timeout: Duration,
    pub retrieval_timeout: Duration,
    pub rerank_timeout: Duration,
    pub pipeline_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variant_fanout_limit: DEFAULT_VARIANT_FANOUT_LIMIT,
            top_k: DEFAULT_TOP_K,
            max_variants: DEFAULT_MAX_VARIANTS,
            rerank_fallback_limit: DEFAULT_RERANK_FALLBACK_LIMIT,
            expansion_timeout: Duration::from_secs(10),
            retrieval_timeout: Duration::from_secs(15),
            rerank_timeout: Duration::from_secs(30),
            pipeline_timeout: Duration::from_secs(60),
        }
    }
}

impl PipelineConfig {
    /// The single-query pipeline: no expansion, five results.
    pub fn single_query() -> Self {
        Self {
            top_k: 5,
            max_variants: 1,
            ..Self::default()
        }
    }

    pub fn expansion_enabled(&self) -> bool {
        self.max_variants > 1
    }

    /// Upper bound on candidates sent to the scorer in one request.
    pub fn max_candidates(&self) -> usize {
        self.max_variants * self.variant_fanout_limit
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.variant_fanout_limit == 0 {
            return Err(SearchError::Request(
                "variant_fanout_limit must be at least 1".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(SearchError::Request("top_k must be at least 1".to_string()));
        }
        if self.max_variants == 0 {
            return Err(SearchError::Request(
                "max_variants must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
