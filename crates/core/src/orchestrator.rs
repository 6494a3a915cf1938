use crate::config::PipelineConfig;
use crate::dedup::dedupe;
use crate::expansion::{QueryExpander, QueryVariants};
use crate::rerank::{unranked_fallback, Reranker};
use crate::retrieval::CandidateRetriever;
use crate::traits::{ChunkStore, RelevanceScorer, TextGenerator};
use crate::{Candidate, Degradation, ScoredResult, SearchError, SearchOutcome};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Expansion, fan-out retrieval, deduplication and reranking behind a single
/// `search` call. Backend failures never escape; they show up as
/// [`Degradation`]s on the outcome.
pub struct SearchCoordinator<S, G, R>
where
    S: ChunkStore,
    G: TextGenerator,
    R: RelevanceScorer,
{
    store: S,
    generator: G,
    scorer: R,
    config: PipelineConfig,
}

impl<S, G, R> SearchCoordinator<S, G, R>
where
    S: ChunkStore + Send + Sync,
    G: TextGenerator + Send + Sync,
    R: RelevanceScorer + Send + Sync,
{
    pub fn new(store: S, generator: G, scorer: R, config: PipelineConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            store,
            generator,
            scorer,
            config,
        })
    }

    pub async fn search(&self, query: &str) -> SearchOutcome {
        if query.trim().is_empty() {
            warn!("blank query, nothing to search");
            return SearchOutcome::from_parts(query, Vec::new(), Vec::new());
        }

        let deadline = Instant::now() + self.config.pipeline_timeout;
        let mut degradations = Vec::new();

        let variants = self.expand(query, deadline, &mut degradations).await;
        debug!(variants = variants.as_slice().len(), "query expanded");

        let retriever = CandidateRetriever::new(&self.store, self.config.variant_fanout_limit);
        let report = retriever
            .retrieve(
                variants.as_slice(),
                stage_deadline(deadline, self.config.retrieval_timeout),
            )
            .await;

        if report.all_failed() {
            degradations.push(Degradation::TotalRetrievalFailure);
        } else if report.failed > 0 {
            degradations.push(Degradation::PartialRetrievalFailure {
                failed: report.failed,
                attempted: report.attempted,
            });
        }
        if report.timed_out {
            warn!(
                failed = report.failed,
                attempted = report.attempted,
                "retrieval cut short by the deadline"
            );
        }

        let raw_count = report.candidates.len();
        let unique = dedupe(report.candidates);
        debug!(raw = raw_count, unique = unique.len(), "candidates merged");

        if unique.is_empty() {
            info!(query = %query, degradations = ?degradations, "no candidates");
            return SearchOutcome::from_parts(query, Vec::new(), degradations);
        }

        let results = self
            .rerank(variants.original(), unique, deadline, &mut degradations)
            .await;
        let outcome = SearchOutcome::from_parts(query, results, degradations);
        info!(
            query = %query,
            results = outcome.results.len(),
            status = ?outcome.status,
            "search finished"
        );
        outcome
    }

    pub async fn search_results(&self, query: &str) -> Vec<ScoredResult> {
        self.search(query).await.into_results()
    }

    async fn expand(
        &self,
        query: &str,
        deadline: Instant,
        degradations: &mut Vec<Degradation>,
    ) -> QueryVariants {
        if !self.config.expansion_enabled() {
            return QueryVariants::original_only(query);
        }

        let expander = QueryExpander::new(&self.generator, self.config.max_variants);
        let budget = stage_deadline(deadline, self.config.expansion_timeout);
        let error = match timeout_at(budget, expander.expand(query)).await {
            Ok(Ok(variants)) => return variants,
            Ok(Err(error)) => error,
            Err(_) => timeout_error("expansion", self.config.expansion_timeout),
        };

        warn!(error = %error, "query expansion unavailable, searching original query only");
        degradations.push(Degradation::ExpansionUnavailable);
        QueryVariants::original_only(query)
    }

    async fn rerank(
        &self,
        query: &str,
        unique: Vec<Candidate>,
        deadline: Instant,
        degradations: &mut Vec<Degradation>,
    ) -> Vec<ScoredResult> {
        let reranker = Reranker::new(&self.scorer, self.config.top_k);
        let budget = stage_deadline(deadline, self.config.rerank_timeout);
        let error = match timeout_at(budget, reranker.rerank(query, &unique)).await {
            Ok(Ok(results)) => return results,
            Ok(Err(error)) => error,
            Err(_) => timeout_error("rerank", self.config.rerank_timeout),
        };

        let limit = self.config.rerank_fallback_limit.min(self.config.top_k);
        warn!(error = %error, limit, "rerank unavailable, returning unranked candidates");
        degradations.push(Degradation::RerankUnavailable);
        unranked_fallback(unique, limit)
    }
}

fn stage_deadline(pipeline_deadline: Instant, budget: Duration) -> Instant {
    (Instant::now() + budget).min(pipeline_deadline)
}

fn timeout_error(stage: &'static str, budget: Duration) -> SearchError {
    SearchError::Timeout {
        stage,
        millis: budget.as_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::tokenize;
    use crate::stores::MemoryChunkStore;
    use crate::{Chunk, ChunkMetadata, SearchStatus};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeGenerator {
        completion: Option<String>,
        calls: AtomicUsize,
    }

    impl FakeGenerator {
        fn returning(completion: &str) -> Self {
            Self {
                completion: Some(completion.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn offline() -> Self {
            Self {
                completion: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn complete(&self, _prompt: &str) -> Result<String, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.completion
                .clone()
                .ok_or_else(|| SearchError::NotReady("no API key".to_string()))
        }
    }

    /// Scores a passage by how many query terms it contains.
    #[derive(Default)]
    struct OverlapScorer {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RelevanceScorer for OverlapScorer {
        async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f64>, SearchError> {
            self.queries.lock().expect("lock").push(query.to_string());
            let terms: HashSet<String> = tokenize(query).collect();
            Ok(passages
                .iter()
                .map(|passage| {
                    let passage_terms: HashSet<String> = tokenize(passage).collect();
                    terms.intersection(&passage_terms).count() as f64
                })
                .collect())
        }
    }

    struct BrokenScorer;

    #[async_trait]
    impl RelevanceScorer for BrokenScorer {
        async fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f64>, SearchError> {
            Err(SearchError::NotReady("cross-encoder offline".to_string()))
        }
    }

    struct StalledScorer;

    #[async_trait]
    impl RelevanceScorer for StalledScorer {
        async fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f64>, SearchError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    struct StalledGenerator;

    #[async_trait]
    impl TextGenerator for StalledGenerator {
        async fn complete(&self, _prompt: &str) -> Result<String, SearchError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    /// Memory store that fails for the listed query texts.
    struct FlakyStore {
        inner: MemoryChunkStore,
        failing: Vec<String>,
        calls: AtomicUsize,
    }

    impl FlakyStore {
        fn new(inner: MemoryChunkStore, failing: &[&str]) -> Self {
            Self {
                inner,
                failing: failing.iter().map(|text| text.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChunkStore for FlakyStore {
        async fn query(&self, text: &str, limit: usize) -> Result<Vec<Candidate>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|failing| failing == text) {
                return Err(SearchError::backend("qdrant", "503 Service Unavailable"));
            }
            self.inner.query(text, limit).await
        }
    }

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: "syllabus.pdf".to_string(),
                page: 1,
                section_title: "Units".to_string(),
                subject_context: "X".to_string(),
            },
        }
    }

    fn syllabus_store() -> MemoryChunkStore {
        MemoryChunkStore::new(vec![
            chunk("1", "Subject: X - unit 1 covers sorting"),
            chunk("2", "Subject: X - unit 2 covers hashing"),
        ])
    }

    fn ids(results: &[ScoredResult]) -> Vec<&str> {
        results.iter().map(|result| result.chunk.id.as_str()).collect()
    }

    #[tokio::test]
    async fn matching_unit_ranks_first_without_expansion() {
        let generator = FakeGenerator::returning("unused");
        let coordinator = SearchCoordinator::new(
            syllabus_store(),
            generator,
            OverlapScorer::default(),
            PipelineConfig::single_query(),
        )
        .expect("valid config");

        let outcome = coordinator.search("what does unit 1 cover").await;
        assert_eq!(outcome.status, SearchStatus::Complete);
        assert_eq!(ids(&outcome.results), vec!["1", "2"]);
        assert!(outcome.results[0].relevance_score > outcome.results[1].relevance_score);
        assert_eq!(coordinator.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_store_returns_empty_outcome() {
        let coordinator = SearchCoordinator::new(
            MemoryChunkStore::default(),
            FakeGenerator::returning("anything at all"),
            OverlapScorer::default(),
            PipelineConfig::default(),
        )
        .expect("valid config");

        let outcome = coordinator.search("anything").await;
        assert!(outcome.is_empty());
        assert_eq!(outcome.status, SearchStatus::Empty);
        assert!(outcome.degradations.is_empty());
        assert!(coordinator.scorer.queries.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn overlapping_variants_yield_one_result_per_chunk() {
        let store = MemoryChunkStore::new(vec![
            chunk("7", "unit 7 covers tries"),
            chunk("8", "unit 8 covers heaps"),
        ]);
        let generator = FakeGenerator::returning("tries in unit 7\nprefix trees tries\nsyllabus tries");
        let coordinator = SearchCoordinator::new(
            store,
            generator,
            OverlapScorer::default(),
            PipelineConfig::default(),
        )
        .expect("valid config");

        let outcome = coordinator.search("what are tries").await;
        let hits_for_seven = outcome
            .results
            .iter()
            .filter(|result| result.chunk.id == "7")
            .count();
        assert_eq!(hits_for_seven, 1);
        assert_eq!(outcome.results[0].chunk.id, "7");
        assert_eq!(coordinator.generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reranking_always_uses_the_original_query() {
        let coordinator = SearchCoordinator::new(
            syllabus_store(),
            FakeGenerator::returning("unit one topics\nsorting unit"),
            OverlapScorer::default(),
            PipelineConfig::default(),
        )
        .expect("valid config");

        coordinator.search("what does unit 1 cover").await;
        assert_eq!(
            coordinator.scorer.queries.lock().expect("lock").as_slice(),
            &["what does unit 1 cover".to_string()]
        );
    }

    #[tokio::test]
    async fn expansion_failure_falls_back_to_original_query() {
        let store = FlakyStore::new(syllabus_store(), &[]);
        let coordinator = SearchCoordinator::new(
            store,
            FakeGenerator::offline(),
            OverlapScorer::default(),
            PipelineConfig::default(),
        )
        .expect("valid config");

        let outcome = coordinator.search("what does unit 1 cover").await;
        assert_eq!(outcome.status, SearchStatus::Degraded);
        assert_eq!(outcome.degradations, vec![Degradation::ExpansionUnavailable]);
        assert_eq!(ids(&outcome.results), vec!["1", "2"]);
        assert_eq!(coordinator.store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_retrieval_failure_narrows_recall() {
        let store = FlakyStore::new(syllabus_store(), &["unit 2 hashing"]);
        let coordinator = SearchCoordinator::new(
            store,
            FakeGenerator::returning("unit 2 hashing"),
            OverlapScorer::default(),
            PipelineConfig::default(),
        )
        .expect("valid config");

        let outcome = coordinator.search("unit 1 sorting").await;
        assert_eq!(
            outcome.degradations,
            vec![Degradation::PartialRetrievalFailure {
                failed: 1,
                attempted: 2
            }]
        );
        assert_eq!(outcome.results[0].chunk.id, "1");
    }

    #[tokio::test]
    async fn total_retrieval_failure_returns_empty() {
        let store = FlakyStore::new(syllabus_store(), &["unit 1", "unit one"]);
        let coordinator = SearchCoordinator::new(
            store,
            FakeGenerator::returning("unit one"),
            OverlapScorer::default(),
            PipelineConfig::default(),
        )
        .expect("valid config");

        let outcome = coordinator.search("unit 1").await;
        assert!(outcome.is_empty());
        assert_eq!(outcome.status, SearchStatus::Empty);
        assert_eq!(outcome.degradations, vec![Degradation::TotalRetrievalFailure]);
    }

    #[tokio::test]
    async fn rerank_failure_returns_unranked_top_five() {
        let store = MemoryChunkStore::new(
            (1..=9)
                .map(|index| chunk(&index.to_string(), &format!("unit {index} lecture notes")))
                .collect(),
        );
        let coordinator = SearchCoordinator::new(
            store,
            FakeGenerator::offline(),
            BrokenScorer,
            PipelineConfig::single_query(),
        )
        .expect("valid config");

        let outcome = coordinator.search("lecture notes").await;
        assert_eq!(outcome.results.len(), 5);
        assert!(outcome.results.iter().all(|result| result.relevance_score == 0.0));
        assert!(outcome.is_ranking_degraded());
        assert_eq!(outcome.status, SearchStatus::Degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn rerank_timeout_degrades_like_a_failure() {
        let config = PipelineConfig {
            max_variants: 1,
            rerank_timeout: Duration::from_millis(500),
            ..PipelineConfig::default()
        };
        let coordinator =
            SearchCoordinator::new(syllabus_store(), FakeGenerator::offline(), StalledScorer, config)
                .expect("valid config");

        let outcome = coordinator.search("unit 1").await;
        assert_eq!(outcome.degradations, vec![Degradation::RerankUnavailable]);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|result| result.relevance_score == 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn expansion_timeout_searches_original_query_only() {
        let config = PipelineConfig {
            expansion_timeout: Duration::from_millis(300),
            ..PipelineConfig::default()
        };
        let store = FlakyStore::new(syllabus_store(), &[]);
        let coordinator =
            SearchCoordinator::new(store, StalledGenerator, OverlapScorer::default(), config)
                .expect("valid config");

        let outcome = coordinator.search("what does unit 1 cover").await;
        assert_eq!(outcome.status, SearchStatus::Degraded);
        assert_eq!(outcome.degradations, vec![Degradation::ExpansionUnavailable]);
        assert_eq!(ids(&outcome.results), vec!["1", "2"]);
        assert_eq!(coordinator.store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pipeline_deadline_bounds_every_stage() {
        let config = PipelineConfig {
            pipeline_timeout: Duration::from_millis(300),
            ..PipelineConfig::default()
        };
        let coordinator =
            SearchCoordinator::new(syllabus_store(), StalledGenerator, StalledScorer, config)
                .expect("valid config");

        let started = Instant::now();
        let outcome = coordinator.search("unit 1").await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
        assert_eq!(
            outcome.degradations,
            vec![Degradation::ExpansionUnavailable, Degradation::RerankUnavailable]
        );
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|result| result.relevance_score == 0.0));
    }

    #[tokio::test]
    async fn results_respect_top_k_and_score_order() {
        let store = MemoryChunkStore::new(
            (1..=20)
                .map(|index| {
                    let extra = "review ".repeat(index % 4);
                    chunk(&index.to_string(), &format!("unit {index} {extra}exam"))
                })
                .collect(),
        );
        let coordinator = SearchCoordinator::new(
            store,
            FakeGenerator::offline(),
            OverlapScorer::default(),
            PipelineConfig {
                max_variants: 1,
                ..PipelineConfig::default()
            },
        )
        .expect("valid config");

        let outcome = coordinator.search("exam review").await;
        assert_eq!(outcome.results.len(), 8);
        assert!(outcome
            .results
            .windows(2)
            .all(|pair| pair[0].relevance_score >= pair[1].relevance_score));
        assert!(outcome
            .results
            .iter()
            .enumerate()
            .all(|(position, result)| result.rank == position + 1));
    }

    #[tokio::test]
    async fn repeated_search_is_stable() {
        let coordinator = SearchCoordinator::new(
            syllabus_store(),
            FakeGenerator::returning("unit one\nsorting"),
            OverlapScorer::default(),
            PipelineConfig::default(),
        )
        .expect("valid config");

        let first = coordinator.search_results("what does unit 1 cover").await;
        let second = coordinator.search_results("what does unit 1 cover").await;
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn blank_query_touches_no_backend() {
        let store = FlakyStore::new(syllabus_store(), &[]);
        let coordinator = SearchCoordinator::new(
            store,
            FakeGenerator::returning("unused"),
            OverlapScorer::default(),
            PipelineConfig::default(),
        )
        .expect("valid config");

        let outcome = coordinator.search("   ").await;
        assert_eq!(outcome.status, SearchStatus::Empty);
        assert_eq!(coordinator.store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = SearchCoordinator::new(
            syllabus_store(),
            FakeGenerator::offline(),
            OverlapScorer::default(),
            PipelineConfig {
                top_k: 0,
                ..PipelineConfig::default()
            },
        );
        assert!(result.is_err());
    }
}
