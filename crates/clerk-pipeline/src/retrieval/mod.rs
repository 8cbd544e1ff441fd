//! Two-lane retrieval engine.
//!
//! Each pass issues one local and one state query concurrently and waits
//! for both. Results are capped per lane, merged, deduplicated and, when an
//! anchor is gated in, re-ranked toward it. A failing quality check triggers
//! one expanded second pass; there is never a third.

pub mod merge;
pub mod quality;
pub mod query;

pub use quality::{EscalationReason, RetrievalQuality};

use crate::error::PipelineError;
use crate::oracle::{OracleError, RetrievalOracle};
use crate::stage::{Stage, StageOutcome};
use clerk_shared::chunk::{dedupe_by_title, lane_count};
use clerk_shared::config::PipelineConfig;
use clerk_shared::heuristics;
use clerk_shared::{Chunk, IssueMap, Lane, LanePlan, RetrievalPlan, SituationContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Query strings actually sent, per lane, in pass order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuedQueries {
    pub local: Vec<String>,
    pub state: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    /// Merged evidence in presentation order
    pub chunks: Vec<Chunk>,
    pub archive_chunks_found: bool,
    pub escalated: bool,
    pub escalation_reason: Option<EscalationReason>,
    /// Quality of the final merged set
    pub quality: RetrievalQuality,
    /// Alignment fed to tiering
    pub situation_alignment: f32,
    pub queries: IssuedQueries,
    pub authority_first: bool,
    /// Lanes that failed and were treated as empty
    pub lane_failures: Vec<String>,
}

impl RetrievalResult {
    pub fn lane_chunks(&self, lane: Lane) -> Vec<&Chunk> {
        self.chunks.iter().filter(|c| c.lane == lane).collect()
    }

    pub fn count(&self, lane: Lane) -> usize {
        lane_count(&self.chunks, lane)
    }
}

struct PassOutput {
    local: Vec<Chunk>,
    state: Vec<Chunk>,
    failures: Vec<String>,
}

/// One lane call; non-quota failures degrade to an empty lane
async fn search_lane(
    oracle: &dyn RetrievalOracle,
    lane: Lane,
    corpus: &str,
    query: &str,
    lane_plan: &LanePlan,
) -> Result<Result<Vec<Chunk>, OracleError>, PipelineError> {
    match oracle.search(query, corpus, lane_plan.k).await {
        Ok(response) => Ok(Ok(merge::to_chunks(
            lane,
            response.document_references,
            lane_plan.keep,
        ))),
        Err(err) => match PipelineError::from_oracle(Stage::Retrieval, &err) {
            Some(fatal) => Err(fatal),
            None => Ok(Err(err)),
        },
    }
}

async fn run_pass(
    oracle: &dyn RetrievalOracle,
    config: &PipelineConfig,
    plan: &RetrievalPlan,
    local_query: &str,
    state_query: &str,
) -> Result<PassOutput, PipelineError> {
    let (local, state) = tokio::join!(
        search_lane(oracle, Lane::Local, &config.retrieval.local_corpus, local_query, &plan.local),
        search_lane(oracle, Lane::State, &config.retrieval.state_corpus, state_query, &plan.state),
    );

    let mut failures = Vec::new();
    let mut unwrap_lane = |lane: Lane, result: Result<Vec<Chunk>, OracleError>| match result {
        Ok(chunks) => chunks,
        Err(err) => {
            warn!("{} lane failed, continuing without it: {}", lane, err);
            failures.push(format!("{}: {}", lane, err));
            Vec::new()
        }
    };
    let local = unwrap_lane(Lane::Local, local?);
    let state = unwrap_lane(Lane::State, state?);

    Ok(PassOutput {
        local,
        state,
        failures,
    })
}

/// Union of two passes for one lane, best first, capped at `keep`
fn combine_lane(first: Vec<Chunk>, second: Vec<Chunk>, keep: usize) -> Vec<Chunk> {
    let mut combined = dedupe_by_title(first.into_iter().chain(second).collect());
    combined.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    combined.truncate(keep);
    combined
}

fn assemble(
    local: Vec<Chunk>,
    state: Vec<Chunk>,
    authority_first: bool,
    situation: Option<&SituationContext>,
    plan: &RetrievalPlan,
    config: &PipelineConfig,
) -> Vec<Chunk> {
    let merged = merge::merge_lanes(local, state, authority_first);
    match situation {
        Some(ctx) => merge::rerank_with_situation(
            merged,
            ctx,
            &config.retrieval,
            config.gate.min_keyword_len,
            plan.total_keep(),
        ),
        None => merged,
    }
}

/// Run retrieval for one request
///
/// `situation` must already be gated. Returns `Escalate` when the final set
/// still fails the quality checks after the second pass.
pub async fn retrieve(
    oracle: &dyn RetrievalOracle,
    config: &PipelineConfig,
    question: &str,
    issue: &IssueMap,
    plan: &RetrievalPlan,
    situation: Option<&SituationContext>,
) -> StageOutcome<RetrievalResult> {
    let authority_first = heuristics::contains_statute_reference(question);
    let mut queries = IssuedQueries::default();

    let local_query = query::lane_query(Lane::Local, plan, issue, &config.retrieval);
    let state_query = query::lane_query(Lane::State, plan, issue, &config.retrieval);
    queries.local.push(local_query.clone());
    queries.state.push(state_query.clone());

    let first = match run_pass(oracle, config, plan, &local_query, &state_query).await {
        Ok(pass) => pass,
        Err(fatal) => return StageOutcome::Fatal(fatal),
    };
    let mut failures = first.failures;
    let mut local = first.local;
    let mut state = first.state;

    let mut chunks = assemble(local.clone(), state.clone(), authority_first, situation, plan, config);
    let mut quality = quality::evaluate(&chunks, issue, situation, &config.retrieval);
    let escalation_reason = quality.escalation_reason(&config.retrieval);

    if let Some(reason) = &escalation_reason {
        info!("escalating retrieval: {}", reason);
        let local_query = query::escalation_query(Lane::Local, plan, issue, &config.retrieval);
        let state_query = query::escalation_query(Lane::State, plan, issue, &config.retrieval);
        queries.local.push(local_query.clone());
        queries.state.push(state_query.clone());

        let second = match run_pass(oracle, config, plan, &local_query, &state_query).await {
            Ok(pass) => pass,
            Err(fatal) => return StageOutcome::Fatal(fatal),
        };
        failures.extend(second.failures);
        local = combine_lane(local, second.local, plan.local.keep);
        state = combine_lane(state, second.state, plan.state.keep);

        chunks = assemble(local, state, authority_first, situation, plan, config);
        quality = quality::evaluate(&chunks, issue, situation, &config.retrieval);
    }

    let situation_alignment =
        quality::situation_alignment(&chunks, issue, situation, config.gate.min_keyword_len);

    debug!(
        "retrieval: {} chunks ({} local, {} state), confidence={:.2} alignment={:.2}",
        chunks.len(),
        lane_count(&chunks, Lane::Local),
        lane_count(&chunks, Lane::State),
        quality.confidence,
        quality.alignment
    );

    let still_weak = escalation_reason.is_some() && quality.escalation_reason(&config.retrieval).is_some();
    let result = RetrievalResult {
        archive_chunks_found: !chunks.is_empty(),
        escalated: escalation_reason.is_some(),
        escalation_reason,
        quality,
        situation_alignment,
        queries,
        authority_first,
        lane_failures: failures,
        chunks,
    };

    if still_weak {
        StageOutcome::Escalate(result)
    } else {
        StageOutcome::Ok(result)
    }
}
