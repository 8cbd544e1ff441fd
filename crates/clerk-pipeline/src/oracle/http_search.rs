//! HTTP search client.
//!
//! Sends `{query, corpus, max_results}` as JSON and expects a
//! `SearchResponse` body back.

use super::{classify_failure, OracleError, RetrievalOracle, SearchResponse};
use async_trait::async_trait;
use clerk_shared::config::OracleConfig;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    corpus: &'a str,
    max_results: usize,
}

pub struct HttpSearchClient {
    http_client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl HttpSearchClient {
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            endpoint: config.search_endpoint.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

#[async_trait]
impl RetrievalOracle for HttpSearchClient {
    async fn search(
        &self,
        query: &str,
        corpus: &str,
        max_results: usize,
    ) -> Result<SearchResponse, OracleError> {
        debug!("search corpus={} max_results={} query={}", corpus, max_results, query);

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&SearchRequest {
                query,
                corpus,
                max_results,
            })
            .send()
            .await
            .map_err(|e| OracleError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &text));
        }

        let mut parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        parsed.document_references.truncate(max_results);
        Ok(parsed)
    }

    fn name(&self) -> &str {
        "http-search"
    }
}
