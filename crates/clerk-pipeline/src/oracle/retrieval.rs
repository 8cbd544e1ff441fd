use super::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One document returned by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Oracle relevance score, if it reports one
    #[serde(default)]
    pub score: Option<f32>,
}

impl DocumentReference {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub document_references: Vec<DocumentReference>,
    #[serde(default)]
    pub raw_text: String,
}

/// Document search oracle, invoked once per lane per pass
#[async_trait]
pub trait RetrievalOracle: Send + Sync {
    async fn search(
        &self,
        query: &str,
        corpus: &str,
        max_results: usize,
    ) -> Result<SearchResponse, OracleError>;

    fn name(&self) -> &str;
}
