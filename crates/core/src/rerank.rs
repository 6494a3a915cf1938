use crate::traits::RelevanceScorer;
use crate::{Candidate, ScoredResult, SearchError};

pub const FALLBACK_SCORE: f64 = 0.0;

pub struct Reranker<'a, R> {
    scorer: &'a R,
    top_k: usize,
}

impl<'a, R> Reranker<'a, R>
where
    R: RelevanceScorer + Send + Sync,
{
    pub fn new(scorer: &'a R, top_k: usize) -> Self {
        Self { scorer, top_k }
    }

    /// Scores every candidate against `query` in one batch and keeps the best
    /// `top_k`. Equal scores keep their input order.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[Candidate],
    ) -> Result<Vec<ScoredResult>, SearchError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let passages: Vec<&str> = candidates
            .iter()
            .map(|candidate| candidate.chunk.text.as_str())
            .collect();
        let scores = self.scorer.score(query, &passages).await?;

        if scores.len() != candidates.len() {
            return Err(SearchError::Request(format!(
                "scorer returned {} scores for {} passages",
                scores.len(),
                candidates.len()
            )));
        }
        if let Some(position) = scores.iter().position(|score| !score.is_finite()) {
            return Err(SearchError::Request(format!(
                "scorer returned a non-finite score for passage {position}"
            )));
        }

        let mut ranked: Vec<(f64, &Candidate)> = scores.into_iter().zip(candidates).collect();
        ranked.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(ranked
            .into_iter()
            .take(self.top_k)
            .enumerate()
            .map(|(position, (score, candidate))| ScoredResult {
                chunk: candidate.chunk.clone(),
                relevance_score: score,
                rank: position + 1,
            })
            .collect())
    }
}

/// Result list used when scoring is unavailable: candidates in merge order,
/// each carrying [`FALLBACK_SCORE`].
pub fn unranked_fallback(candidates: Vec<Candidate>, limit: usize) -> Vec<ScoredResult> {
    candidates
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(position, candidate)| ScoredResult {
            chunk: candidate.chunk,
            relevance_score: FALLBACK_SCORE,
            rank: position + 1,
        })
        .collect()
}
