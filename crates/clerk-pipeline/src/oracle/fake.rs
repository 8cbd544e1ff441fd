// ============================================================================
// Fake oracles (testing)
// ============================================================================
//
// Generation responses are routed by a marker string found in the system
// instruction. Each route plays its scripted responses in order and then
// keeps repeating the last one. Retrieval responses are scripted per corpus
// and per pass in the same way.

use super::{
    DocumentReference, GenerationOracle, GenerationRequest, OracleError, RetrievalOracle,
    SearchResponse,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

type Scripted<T> = Vec<Result<T, OracleError>>;

/// Pick the response for call number `n` (0-based); the last entry repeats
fn scripted_at<T: Clone>(script: &Scripted<T>, n: usize) -> Option<Result<T, OracleError>> {
    if script.is_empty() {
        return None;
    }
    Some(script[n.min(script.len() - 1)].clone())
}

/// Fake generation oracle for deterministic testing
///
/// ```ignore
/// let fake = FakeGenerationOracleBuilder::new()
///     .respond(PLANNER_ROLE, r#"{"town":"Hollis"}"#)
///     .fail(SYNTHESIS_ROLE, OracleError::QuotaExhausted("429".into()))
///     .build();
/// ```
pub struct FakeGenerationOracle {
    routes: Vec<(String, Scripted<String>)>,
    default_response: Result<String, OracleError>,
    /// Track call counts per route for assertions
    call_counts: Arc<Mutex<HashMap<String, usize>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl FakeGenerationOracle {
    /// Every call returns `text`
    pub fn constant(text: &str) -> Self {
        FakeGenerationOracleBuilder::new().default_response(text).build()
    }

    /// Every call fails with `err`
    pub fn failing(err: OracleError) -> Self {
        FakeGenerationOracleBuilder::new().default_error(err).build()
    }

    pub fn call_count(&self, marker: &str) -> usize {
        lock(&self.call_counts).get(marker).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Requests in the order they were received
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }

    pub fn reset_counts(&self) {
        lock(&self.call_counts).clear();
        lock(&self.requests).clear();
    }
}

#[async_trait]
impl GenerationOracle for FakeGenerationOracle {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, OracleError> {
        lock(&self.requests).push(request.clone());

        let route = self
            .routes
            .iter()
            .find(|(marker, _)| request.system_instruction.contains(marker.as_str()));

        match route {
            Some((marker, script)) => {
                let n = {
                    let mut counts = lock(&self.call_counts);
                    let count = counts.entry(marker.clone()).or_insert(0);
                    *count += 1;
                    *count - 1
                };
                scripted_at(script, n).unwrap_or_else(|| self.default_response.clone())
            }
            None => self.default_response.clone(),
        }
    }

    fn name(&self) -> &str {
        "fake-generation"
    }
}

// ============================================================================
// Builder for FakeGenerationOracle
// ============================================================================

pub struct FakeGenerationOracleBuilder {
    routes: Vec<(String, Scripted<String>)>,
    default_response: Result<String, OracleError>,
}

impl FakeGenerationOracleBuilder {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            default_response: Err(OracleError::EmptyResponse),
        }
    }

    fn push(mut self, marker: &str, response: Result<String, OracleError>) -> Self {
        match self.routes.iter_mut().find(|(m, _)| m == marker) {
            Some((_, script)) => script.push(response),
            None => self.routes.push((marker.to_string(), vec![response])),
        }
        self
    }

    /// Queue a text response for requests whose system instruction contains `marker`
    pub fn respond(self, marker: &str, text: &str) -> Self {
        self.push(marker, Ok(text.to_string()))
    }

    /// Queue a failure for requests whose system instruction contains `marker`
    pub fn fail(self, marker: &str, err: OracleError) -> Self {
        self.push(marker, Err(err))
    }

    pub fn default_response(mut self, text: &str) -> Self {
        self.default_response = Ok(text.to_string());
        self
    }

    pub fn default_error(mut self, err: OracleError) -> Self {
        self.default_response = Err(err);
        self
    }

    pub fn build(self) -> FakeGenerationOracle {
        FakeGenerationOracle {
            routes: self.routes,
            default_response: self.default_response,
            call_counts: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for FakeGenerationOracleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fake retrieval oracle
// ============================================================================

/// Scripted search oracle; pass `n` of a corpus returns its `n`th script entry
#[derive(Default)]
pub struct FakeRetrievalOracle {
    corpora: HashMap<String, Scripted<SearchResponse>>,
    call_counts: Arc<Mutex<HashMap<String, usize>>>,
    queries: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeRetrievalOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one pass of documents for `corpus`
    pub fn with_pass(mut self, corpus: &str, docs: Vec<DocumentReference>) -> Self {
        self.corpora.entry(corpus.to_string()).or_default().push(Ok(SearchResponse {
            document_references: docs,
            raw_text: String::new(),
        }));
        self
    }

    /// Queue one failing pass for `corpus`
    pub fn with_failure(mut self, corpus: &str, err: OracleError) -> Self {
        self.corpora.entry(corpus.to_string()).or_default().push(Err(err));
        self
    }

    pub fn call_count(&self, corpus: &str) -> usize {
        lock(&self.call_counts).get(corpus).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.call_counts).values().sum()
    }

    /// (corpus, query) pairs in call order
    pub fn queries(&self) -> Vec<(String, String)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl RetrievalOracle for FakeRetrievalOracle {
    async fn search(
        &self,
        query: &str,
        corpus: &str,
        max_results: usize,
    ) -> Result<SearchResponse, OracleError> {
        lock(&self.queries).push((corpus.to_string(), query.to_string()));
        let n = {
            let mut counts = lock(&self.call_counts);
            let count = counts.entry(corpus.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let mut response = match self.corpora.get(corpus).and_then(|s| scripted_at(s, n)) {
            Some(result) => result?,
            None => SearchResponse::default(),
        };
        response.document_references.truncate(max_results);
        Ok(response)
    }

    fn name(&self) -> &str {
        "fake-retrieval"
    }
}
