//! In-memory retrieval oracle.
//!
//! Scores documents by query term overlap. Used for local runs and for
//! tests that want deterministic ranking without scripting every pass.

use super::{DocumentReference, OracleError, RetrievalOracle, SearchResponse};
use async_trait::async_trait;
use clerk_shared::heuristics::significant_words;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    corpora: HashMap<String, Vec<DocumentReference>>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, corpus: &str, doc: DocumentReference) -> Self {
        self.add_document(corpus, doc);
        self
    }

    pub fn add_document(&mut self, corpus: &str, doc: DocumentReference) {
        self.corpora.entry(corpus.to_string()).or_default().push(doc);
    }

    pub fn len(&self, corpus: &str) -> usize {
        self.corpora.get(corpus).map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.corpora.values().all(|d| d.is_empty())
    }

    /// Fraction of query terms present in title or content
    fn overlap(terms: &[String], doc: &DocumentReference) -> f32 {
        if terms.is_empty() {
            return 0.0;
        }
        let haystack = format!("{} {}", doc.title, doc.content).to_lowercase();
        let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
        hits as f32 / terms.len() as f32
    }
}

#[async_trait]
impl RetrievalOracle for InMemoryCorpus {
    async fn search(
        &self,
        query: &str,
        corpus: &str,
        max_results: usize,
    ) -> Result<SearchResponse, OracleError> {
        let Some(docs) = self.corpora.get(corpus) else {
            return Ok(SearchResponse::default());
        };
        let terms = significant_words(query, 3);

        let mut scored: Vec<(f32, &DocumentReference)> = docs
            .iter()
            .map(|doc| (Self::overlap(&terms, doc), doc))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        // Stable: ties keep insertion order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let document_references = scored
            .into_iter()
            .take(max_results)
            .map(|(score, doc)| doc.clone().with_score(score))
            .collect();

        Ok(SearchResponse {
            document_references,
            raw_text: String::new(),
        })
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
