//! External oracle seams.
//!
//! Text generation and document search are opaque collaborators reached
//! through two narrow traits. Production code uses the HTTP clients; tests
//! use the fakes or the in-memory corpus.

mod corpus;
mod fake;
mod generation;
mod http_search;
mod ollama;
mod retrieval;

pub use corpus::InMemoryCorpus;
pub use fake::{FakeGenerationOracle, FakeGenerationOracleBuilder, FakeRetrievalOracle};
pub use generation::{GenerationOracle, GenerationRequest};
pub use http_search::HttpSearchClient;
pub use ollama::OllamaClient;
pub use retrieval::{DocumentReference, RetrievalOracle, SearchResponse};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Never retried locally; propagated to the caller
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Oracle returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Oracle returned an empty response")]
    EmptyResponse,

    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),

    #[error("Oracle call timed out after {0}s")]
    Timeout(u64),
}

impl OracleError {
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, OracleError::QuotaExhausted(_))
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            OracleError::Timeout(timeout_secs)
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

/// Longest body excerpt carried on a status error
const BODY_EXCERPT: usize = 300;

/// Map a non-success HTTP reply to an oracle error
pub fn classify_failure(status: u16, body: &str) -> OracleError {
    let lower = body.to_lowercase();
    if status == 429 || body.contains("RESOURCE_EXHAUSTED") || lower.contains("quota") {
        return OracleError::QuotaExhausted(excerpt(body, status));
    }
    OracleError::Status {
        code: status,
        body: excerpt(body, status),
    }
}

fn excerpt(body: &str, status: u16) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("HTTP {}", status);
    }
    trimmed.chars().take(BODY_EXCERPT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_failure() {
        assert!(classify_failure(429, "").is_quota_exhausted());
        assert!(classify_failure(400, "{\"error\":{\"status\":\"RESOURCE_EXHAUSTED\"}}").is_quota_exhausted());
        assert!(classify_failure(403, "Daily Quota exceeded").is_quota_exhausted());
        assert_eq!(
            classify_failure(500, ""),
            OracleError::Status {
                code: 500,
                body: "HTTP 500".to_string()
            }
        );
    }
}
