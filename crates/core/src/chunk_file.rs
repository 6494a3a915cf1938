use crate::error::IngestError;
use crate::models::{Chunk, ChunkMetadata};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// One record of the chunker's JSON output.
#[derive(Debug, Deserialize)]
struct ChunkRecord {
    content: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    page_numbers: Vec<u32>,
    #[serde(default)]
    section_title: String,
    #[serde(default)]
    subject_context: String,
}

/// Loads a chunk file. Chunk ids are the record positions, so re-indexing
/// the same file overwrites the same points.
pub fn load_chunk_file(path: &Path) -> Result<Vec<Chunk>, IngestError> {
    let raw = fs::read_to_string(path)?;
    parse_chunk_records(&raw)
}

pub fn parse_chunk_records(raw: &str) -> Result<Vec<Chunk>, IngestError> {
    let records: Vec<ChunkRecord> = serde_json::from_str(raw)?;

    records
        .into_iter()
        .enumerate()
        .map(|(position, record)| {
            if record.content.trim().is_empty() {
                return Err(IngestError::InvalidRecord {
                    position,
                    reason: "content is empty".to_string(),
                });
            }

            let page = record
                .page
                .or_else(|| record.page_numbers.first().copied())
                .unwrap_or(1)
                .max(1);

            Ok(Chunk {
                id: position.to_string(),
                text: record.content,
                metadata: ChunkMetadata {
                    source: record.source,
                    page,
                    section_title: record.section_title,
                    subject_context: record.subject_context,
                },
            })
        })
        .collect()
}
