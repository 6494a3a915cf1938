use crate::Candidate;
use std::collections::HashSet;

/// First-write-wins merge keyed by chunk id. The kept candidate is whichever
/// arrived first; with concurrent retrieval that is the first variant to
/// complete, so the choice carries no priority. Candidates with blank text
/// are dropped.
pub fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| !candidate.chunk.text.trim().is_empty())
        .filter(|candidate| seen.insert(candidate.chunk.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Chunk, ChunkMetadata};

    fn candidate(id: &str, text: &str, score: f64) -> Candidate {
        Candidate {
            chunk: Chunk {
                id: id.to_string(),
                text: text.to_string(),
                metadata: ChunkMetadata::default(),
            },
            retrieval_score: score,
        }
    }

    #[test]
    fn duplicate_ids_keep_the_first_occurrence() {
        let merged = dedupe(vec![
            candidate("7", "unit 7 covers tries", 0.9),
            candidate("1", "unit 1 covers sorting", 0.5),
            candidate("7", "unit 7 covers tries", 0.2),
            candidate("7", "unit 7 covers tries", 0.7),
        ]);

        let ids: Vec<&str> = merged.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "1"]);
        assert_eq!(merged[0].retrieval_score, 0.9);
    }

    #[test]
    fn blank_text_is_dropped() {
        let merged = dedupe(vec![
            candidate("1", "   ", 0.9),
            candidate("2", "", 0.8),
            candidate("3", "unit 3 covers graphs", 0.1),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].chunk.id, "3");
    }

    #[test]
    fn blank_duplicate_does_not_shadow_a_later_valid_one() {
        let merged = dedupe(vec![candidate("4", "", 0.9), candidate("4", "unit 4 covers heaps", 0.3)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].chunk.text, "unit 4 covers heaps");
    }
}
