//! Raw-text encoders the Qdrant adapter uses to turn a query or a chunk into
//! its dense and sparse representations.

use std::collections::BTreeMap;

pub const DEFAULT_DENSE_DIMENSIONS: usize = 384;
const SPARSE_BUCKETS: u64 = 1 << 20;

pub trait DenseEncoder {
    fn dimensions(&self) -> usize;
    fn encode(&self, text: &str) -> Vec<f32>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEncoder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEncoder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DENSE_DIMENSIONS,
        }
    }
}

impl DenseEncoder for CharacterNgramEncoder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let bucket = (fnv1a(&token) % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

/// Hashed term-frequency encoder for the lexical half of hybrid search.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermFrequencyEncoder;

impl TermFrequencyEncoder {
    pub fn encode(&self, text: &str) -> SparseVector {
        let mut counts = BTreeMap::<u32, f32>::new();
        for term in tokenize(text) {
            let index = (fnv1a(&term) % SPARSE_BUCKETS) as u32;
            *counts.entry(index).or_insert(0.0) += 1.0;
        }

        let (indices, values): (Vec<u32>, Vec<f32>) = counts
            .into_iter()
            .map(|(index, count)| (index, 1.0 + count.ln()))
            .unzip();
        SparseVector { indices, values }
    }
}

pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(token: &str) -> u64 {
    let mut hash = 1469598103934665603u64;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_encoder_is_deterministic() {
        let encoder = CharacterNgramEncoder::default();
        let first = encoder.encode("unit 1 covers sorting");
        let second = encoder.encode("unit 1 covers sorting");
        assert_eq!(first, second);
        assert_eq!(first.len(), DEFAULT_DENSE_DIMENSIONS);
    }

    #[test]
    fn dense_encoder_of_empty_text_is_zero() {
        let encoder = CharacterNgramEncoder { dimensions: 16 };
        assert!(encoder.encode("").iter().all(|value| *value == 0.0));
    }

    #[test]
    fn sparse_encoder_counts_repeated_terms_once_per_index() {
        let sparse = TermFrequencyEncoder.encode("Sorting, sorting and hashing");
        assert_eq!(sparse.indices.len(), 3);
        assert_eq!(sparse.indices.len(), sparse.values.len());
        assert!(sparse.indices.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(sparse.values.iter().any(|value| *value > 1.0));
    }

    #[test]
    fn tokenizer_splits_on_punctuation() {
        let tokens: Vec<String> = tokenize("Subject: X - unit 1").collect();
        assert_eq!(tokens, vec!["subject", "x", "unit", "1"]);
    }
}
