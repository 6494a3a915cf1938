use crate::traits::TextGenerator;
use crate::SearchError;
use std::collections::HashSet;

/// The variant list always starts with the original query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVariants {
    variants: Vec<String>,
}

impl QueryVariants {
    pub fn original_only(query: &str) -> Self {
        Self {
            variants: vec![query.to_string()],
        }
    }

    pub fn original(&self) -> &str {
        &self.variants[0]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.variants
    }
}

pub struct QueryExpander<'a, G> {
    generator: &'a G,
    max_variants: usize,
}

impl<'a, G> QueryExpander<'a, G>
where
    G: TextGenerator + Send + Sync,
{
    pub fn new(generator: &'a G, max_variants: usize) -> Self {
        Self {
            generator,
            max_variants: max_variants.max(1),
        }
    }

    /// Asks the generator for alternative phrasings of `query`. Errors are
    /// returned so the caller can record the degradation; the caller falls
    /// back to [`QueryVariants::original_only`].
    pub async fn expand(&self, query: &str) -> Result<QueryVariants, SearchError> {
        if self.max_variants == 1 {
            return Ok(QueryVariants::original_only(query));
        }

        let completion = self
            .generator
            .complete(&expansion_prompt(query, self.max_variants - 1))
            .await?;
        Ok(variants_from_completion(query, &completion, self.max_variants))
    }
}

pub fn expansion_prompt(query: &str, alternatives: usize) -> String {
    format!(
        "You rewrite search queries for a document retrieval system.\n\
         Write up to {alternatives} alternative phrasings of the user's question that keep \
         the same intent but use different wording, so that a semantic search finds more \
         relevant passages.\n\
         Output one phrasing per line. Do not number the lines, do not add bullets, quotes \
         or any other text.\n\n\
         Question: {query}"
    )
}

/// One variant per non-empty line, original first. Lines repeating the
/// original or an earlier line (ignoring case and surrounding whitespace)
/// are skipped before the cap is applied.
pub fn variants_from_completion(query: &str, completion: &str, max_variants: usize) -> QueryVariants {
    let mut seen = HashSet::new();
    seen.insert(query.trim().to_lowercase());

    let mut variants = vec![query.to_string()];
    for line in completion.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if variants.len() >= max_variants.max(1) {
            break;
        }
        if seen.insert(line.to_lowercase()) {
            variants.push(line.to_string());
        }
    }

    QueryVariants { variants }
}
