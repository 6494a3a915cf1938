use super::shared_client;
use crate::traits::RelevanceScorer;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;

pub const DEFAULT_RERANKER_MODEL: &str = "BAAI/bge-reranker-base";

#[derive(Debug, Clone)]
pub struct CrossEncoderConfig {
    /// Base URL of a text-embeddings-inference server; `None` leaves the scorer unavailable.
    /// Every candidate goes out in one `/rerank` request, so start the server
    /// with `--max-client-batch-size` at least `max_variants * variant_fanout_limit`
    /// (100 with the default pipeline; TEI's own default is 32).
    pub endpoint: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for CrossEncoderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: DEFAULT_RERANKER_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Cross-encoder served over HTTP (`POST /rerank`).
pub struct HttpCrossEncoder {
    config: CrossEncoderConfig,
    client: OnceCell<Client>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [&'a str],
    raw_scores: bool,
    truncate: bool,
}

#[derive(Deserialize)]
struct RankedText {
    index: usize,
    score: f64,
}

impl HttpCrossEncoder {
    pub fn new(config: CrossEncoderConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl RelevanceScorer for HttpCrossEncoder {
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f64>, SearchError> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or_else(|| SearchError::NotReady(format!("no endpoint for {}", self.config.model)))?;
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let url = url::Url::parse(&format!("{}/rerank", endpoint.trim_end_matches('/')))?;
        let client = shared_client(&self.client, self.config.timeout).await?;

        let response = client
            .post(url)
            .json(&RerankRequest {
                query,
                texts: passages,
                raw_scores: true,
                truncate: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::backend("cross-encoder", response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        parse_rerank_response(parsed, passages.len())
    }
}

/// Puts the server's best-first list back into passage order.
fn parse_rerank_response(parsed: Value, expected: usize) -> Result<Vec<f64>, SearchError> {
    let ranked: Vec<RankedText> = serde_json::from_value(parsed)
        .map_err(|error| SearchError::backend("cross-encoder", error.to_string()))?;

    let mut scores = vec![None; expected];
    for item in ranked {
        if !item.score.is_finite() {
            return Err(SearchError::backend(
                "cross-encoder",
                format!("non-finite score for passage {}", item.index),
            ));
        }
        let slot = scores.get_mut(item.index).ok_or_else(|| {
            SearchError::backend("cross-encoder", format!("passage index {} out of range", item.index))
        })?;
        *slot = Some(item.score);
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(index, score)| {
            score.ok_or_else(|| {
                SearchError::backend("cross-encoder", format!("no score for passage {index}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scores_are_returned_in_passage_order() {
        let parsed = json!([
            { "index": 2, "score": 4.5 },
            { "index": 0, "score": 1.25 },
            { "index": 1, "score": -3.0 }
        ]);
        let scores = parse_rerank_response(parsed, 3).expect("valid response");
        assert_eq!(scores, vec![1.25, -3.0, 4.5]);
    }

    #[test]
    fn missing_passage_score_is_an_error() {
        let parsed = json!([{ "index": 0, "score": 0.3 }]);
        assert!(parse_rerank_response(parsed, 2).is_err());
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let parsed = json!([{ "index": 5, "score": 0.3 }]);
        assert!(matches!(
            parse_rerank_response(parsed, 1),
            Err(SearchError::BackendResponse { .. })
        ));
    }

    #[test]
    fn unexpected_body_is_an_error() {
        let parsed = json!({ "error": "Model is overloaded", "error_type": "overloaded" });
        assert!(parse_rerank_response(parsed, 1).is_err());
    }

    #[tokio::test]
    async fn unconfigured_endpoint_is_not_ready() {
        let scorer = HttpCrossEncoder::new(CrossEncoderConfig::default());
        assert_eq!(scorer.model(), DEFAULT_RERANKER_MODEL);
        assert!(matches!(
            scorer.score("query", &["passage"]).await,
            Err(SearchError::NotReady(_))
        ));
    }
}
