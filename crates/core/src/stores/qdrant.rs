use crate::encoding::{CharacterNgramEncoder, DenseEncoder, TermFrequencyEncoder};
use crate::store::StoreHit;
use crate::traits::ChunkStore;
use crate::{Candidate, Chunk, SearchError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

const DENSE_VECTOR: &str = "dense";
const SPARSE_VECTOR: &str = "sparse";
const UPSERT_BATCH_SIZE: usize = 256;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    dense: CharacterNgramEncoder,
    sparse: TermFrequencyEncoder,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            dense: CharacterNgramEncoder::default(),
            sparse: TermFrequencyEncoder,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn ensure_collection(&self) -> Result<(), SearchError> {
        let url = format!("{}/collections/{}", self.endpoint, self.collection);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::backend("qdrant", response.status().to_string()));
        }

        let response = self
            .client
            .put(&url)
            .json(&json!({
                "vectors": {
                    DENSE_VECTOR: { "size": self.dense.dimensions(), "distance": "Cosine" }
                },
                "sparse_vectors": {
                    SPARSE_VECTOR: {}
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Request(format!(
                "qdrant collection setup failed with {}",
                response.status()
            )));
        }

        Ok(())
    }

    pub async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<(), SearchError> {
        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.endpoint, self.collection
        );

        for (batch, body) in self.upsert_batches(chunks).into_iter().enumerate() {
            let response = self.client.put(&url).json(&body).send().await?;
            if !response.status().is_success() {
                return Err(SearchError::backend(
                    "qdrant",
                    format!("upsert batch {batch}: {}", response.status()),
                ));
            }
            debug!(batch, collection = %self.collection, "upsert batch stored");
        }

        Ok(())
    }

    /// One `{"points": [...]}` request body per `UPSERT_BATCH_SIZE` chunks.
    fn upsert_batches(&self, chunks: &[Chunk]) -> Vec<Value> {
        chunks
            .chunks(UPSERT_BATCH_SIZE)
            .map(|batch| {
                let points = batch.iter().map(|chunk| self.point_for(chunk)).collect::<Vec<_>>();
                json!({ "points": points })
            })
            .collect()
    }

    fn point_for(&self, chunk: &Chunk) -> Value {
        // Qdrant point ids are unsigned integers or UUIDs.
        let id = match chunk.id.parse::<u64>() {
            Ok(numeric) => json!(numeric),
            Err(_) => json!(chunk.id),
        };
        let sparse = self.sparse.encode(&chunk.text);

        json!({
            "id": id,
            "vector": {
                DENSE_VECTOR: self.dense.encode(&chunk.text),
                SPARSE_VECTOR: { "indices": sparse.indices, "values": sparse.values },
            },
            "payload": {
                "content": chunk.text,
                "source": chunk.metadata.source,
                "page": chunk.metadata.page,
                "section_title": chunk.metadata.section_title,
                "subject_context": chunk.metadata.subject_context,
            },
        })
    }

    fn hybrid_query(&self, text: &str, limit: usize) -> Value {
        let sparse = self.sparse.encode(text);
        let mut prefetch = vec![json!({
            "query": self.dense.encode(text),
            "using": DENSE_VECTOR,
            "limit": limit,
        })];
        if !sparse.is_empty() {
            prefetch.push(json!({
                "query": { "indices": sparse.indices, "values": sparse.values },
                "using": SPARSE_VECTOR,
                "limit": limit,
            }));
        }

        json!({
            "prefetch": prefetch,
            "query": { "fusion": "rrf" },
            "limit": limit,
            "with_payload": true,
        })
    }
}

#[async_trait]
impl ChunkStore for QdrantStore {
    async fn query(&self, text: &str, limit: usize) -> Result<Vec<Candidate>, SearchError> {
        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/query",
                self.endpoint, self.collection
            ))
            .json(&self.hybrid_query(text, limit))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(collection = %self.collection, "collection missing, treating store as empty");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(SearchError::backend("qdrant", response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        parse_query_response(&parsed)
    }
}

fn parse_query_response(parsed: &Value) -> Result<Vec<Candidate>, SearchError> {
    let points = parsed
        .pointer("/result/points")
        .or_else(|| parsed.pointer("/result"))
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::backend("qdrant", "query response has no points"))?;

    Ok(points
        .iter()
        .map(StoreHit::from_point)
        .filter_map(StoreHit::into_candidate)
        .collect())
}
