use crate::models::{Candidate, Chunk, ChunkMetadata};
use serde_json::Value;

/// Raw hit as returned by a store backend, before payload normalization.
#[derive(Debug, Clone)]
pub struct StoreHit {
    pub id: Option<String>,
    pub score: f64,
    pub payload: Value,
}

impl StoreHit {
    pub fn from_point(point: &Value) -> Self {
        let id = match point.pointer("/id") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };

        Self {
            id,
            score: point.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
            payload: point.pointer("/payload").cloned().unwrap_or(Value::Null),
        }
    }

    /// Resolves both payload layouts the indexers write: flat chunk fields,
    /// or chunk fields nested under `metadata` with the text under `document`.
    /// Hits without an id are dropped; hits without text keep an empty text.
    pub fn into_candidate(self) -> Option<Candidate> {
        let id = self.id?;
        let nested = self.payload.get("metadata").filter(|value| value.is_object());

        let text = string_field(&self.payload, nested, &["content", "document", "text"]);
        let page = page_field(&self.payload, nested);

        Some(Candidate {
            chunk: Chunk {
                id,
                text,
                metadata: ChunkMetadata {
                    source: string_field(&self.payload, nested, &["source"]),
                    page,
                    section_title: string_field(&self.payload, nested, &["section_title"]),
                    subject_context: string_field(&self.payload, nested, &["subject_context"]),
                },
            },
            retrieval_score: self.score,
        })
    }
}

fn lookup<'a>(payload: &'a Value, nested: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    payload
        .get(key)
        .filter(|value| !value.is_null())
        .or_else(|| nested.and_then(|inner| inner.get(key)).filter(|value| !value.is_null()))
}

fn string_field(payload: &Value, nested: Option<&Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| lookup(payload, nested, key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn page_field(payload: &Value, nested: Option<&Value>) -> u32 {
    let page = lookup(payload, nested, "page").and_then(Value::as_u64).or_else(|| {
        lookup(payload, nested, "page_numbers")
            .and_then(Value::as_array)
            .and_then(|pages| pages.first())
            .and_then(Value::as_u64)
    });

    page.and_then(|page| u32::try_from(page).ok())
        .filter(|page| *page >= 1)
        .unwrap_or(1)
}
