//! Golden tests for the planner stage.
//!
//! These tests lock exact behavior. Changes require explicit approval.

use clerk_pipeline::planner::{plan_question, PlannerOutput};
use clerk_pipeline::{
    Artifact, FakeGenerationOracle, OracleError, PipelineError, Stage, StageOutcome, PLANNER_ROLE,
};
use clerk_shared::{PipelineConfig, Priority, RequestedOutput, SituationContext};

const QUESTION: &str = "Did the Select Board violate open meetings rules at Constitution Park?";

async fn plan_with(reply: &str, question: &str) -> StageOutcome<PlannerOutput> {
    let oracle = FakeGenerationOracle::constant(reply);
    plan_question(&oracle, &PipelineConfig::default(), question, &[], None).await
}

fn expect_ok(outcome: StageOutcome<PlannerOutput>) -> PlannerOutput {
    match outcome {
        StageOutcome::Ok(output) => output,
        other => panic!("expected Ok, got {}", other.label()),
    }
}

fn expect_recovered(outcome: StageOutcome<PlannerOutput>) -> (PlannerOutput, String) {
    match outcome {
        StageOutcome::RecoveredWithHeuristic { value, reason } => (value, reason),
        other => panic!("expected RecoveredWithHeuristic, got {}", other.label()),
    }
}

// === GOLDEN TESTS: Oracle plans ===

/// GOLDEN: entities not present in any source text are dropped
#[tokio::test]
async fn golden_unverified_entity_dropped() {
    let reply = r#"{
        "town": "Hollis",
        "situation_title": "Constitution Park meeting",
        "entities": ["Constitution Park", "Riverside Mall"],
        "boards": ["Select Board"],
        "legal_topics": ["open meetings"],
        "planner_confidence": 0.8
    }"#;
    let output = expect_ok(plan_with(reply, QUESTION).await);

    assert!(output.from_oracle);
    assert_eq!(output.issue.entities, vec!["Constitution Park"]);
    assert_eq!(output.dropped_entities, vec!["Riverside Mall"]);
    assert!(!output.plan.conservative);
}

/// GOLDEN: pasted documents count as source text for entity validation
#[tokio::test]
async fn golden_artifact_entity_kept() {
    let reply = r#"{"entities": ["Riverside Mall"], "planner_confidence": 0.8}"#;
    let oracle = FakeGenerationOracle::constant(reply);
    let artifacts = vec![Artifact::new("lease.txt", "Lease terms for Riverside Mall parking")];

    let output = expect_ok(
        plan_question(&oracle, &PipelineConfig::default(), QUESTION, &artifacts, None).await,
    );
    assert_eq!(output.issue.entities, vec!["Riverside Mall"]);
    assert!(output.dropped_entities.is_empty());

    let prompt = &oracle.requests()[0].user_prompt;
    assert!(prompt.contains("PASTED DOCUMENTS:"));
    assert!(prompt.contains("--- lease.txt ---"));
}

/// GOLDEN: fenced JSON with nested lanes decodes; missing fields fall back
#[tokio::test]
async fn golden_fenced_plan_decodes() {
    let reply = "Here is the plan:\n```json\n{\"situation_title\": \"Park vote\", \
                 \"requested_output\": \"legal-analysis\", \
                 \"local\": {\"queries\": [\"park vote minutes\"], \"k\": 12, \"keep\": 4}, \
                 \"planner_confidence\": 0.9}\n```";
    let output = expect_ok(plan_with(reply, QUESTION).await);

    assert_eq!(output.issue.situation_title, "Park vote");
    assert_eq!(output.issue.requested_output, RequestedOutput::LegalAnalysis);
    assert_eq!(output.plan.priority, Priority::LawFirst);
    assert_eq!(output.plan.local.queries, vec!["park vote minutes"]);
    assert_eq!(output.plan.local.k, 12);
    assert_eq!(output.plan.local.keep, 4);
    // Heuristic state queries fill the empty lane
    assert!(!output.plan.state.queries.is_empty());
}

/// GOLDEN: low planner confidence caps both lanes at 2 queries
#[tokio::test]
async fn golden_low_confidence_is_conservative() {
    let reply = r#"{
        "situation_title": "Park meeting",
        "local_queries": ["a one", "b two", "c three", "d four"],
        "state_queries": ["e five", "f six", "g seven"],
        "planner_confidence": 0.3
    }"#;
    let output = expect_ok(plan_with(reply, QUESTION).await);

    assert!(output.plan.conservative);
    assert_eq!(output.plan.local.queries, vec!["a one", "b two"]);
    assert_eq!(output.plan.state.queries, vec!["e five", "f six"]);
}

/// GOLDEN: the anchor is visible to the planner only when passed in
#[tokio::test]
async fn golden_anchor_in_prompt_when_gated() {
    let oracle = FakeGenerationOracle::constant(r#"{"situation_title": "Park vote"}"#);
    let ctx = SituationContext::new("Constitution Park boardwalk vote", vec!["Constitution Park".into()]);
    let config = PipelineConfig::default();

    plan_question(&oracle, &config, QUESTION, &[], Some(&ctx)).await;
    plan_question(&oracle, &config, QUESTION, &[], None).await;

    let requests = oracle.requests();
    assert!(requests[0].system_instruction.starts_with(PLANNER_ROLE));
    assert!(requests[0].user_prompt.contains("CURRENT SITUATION: Constitution Park boardwalk vote"));
    assert!(!requests[1].user_prompt.contains("CURRENT SITUATION"));
}

// === GOLDEN TESTS: Fallback and failure ===

/// GOLDEN: unusable output falls back to a conservative heuristic plan
#[tokio::test]
async fn golden_garbage_falls_back() {
    let (output, reason) = expect_recovered(plan_with("I am not sure what you mean.", QUESTION).await);

    assert_eq!(reason, "decode_error: no_json_object");
    assert!(!output.from_oracle);
    assert!(output.plan.conservative);
    assert!(output.plan.local.queries.len() <= 2);
    assert!(output.plan.state.queries.len() <= 2);
    assert!(output.issue.entities.iter().any(|e| e == "Constitution Park"));
}

/// GOLDEN: a JSON object with nothing useful is an empty plan
#[tokio::test]
async fn golden_empty_object_falls_back() {
    let (output, reason) = expect_recovered(plan_with("{\"town\": null}", QUESTION).await);
    assert_eq!(reason, "decode_error: empty_plan");
    assert!(!output.from_oracle);
}

/// GOLDEN: transport failures recover with heuristics
#[tokio::test]
async fn golden_transport_error_recovers() {
    let oracle = FakeGenerationOracle::failing(OracleError::Transport("connection refused".into()));
    let outcome = plan_question(&oracle, &PipelineConfig::default(), QUESTION, &[], None).await;
    let (output, reason) = expect_recovered(outcome);

    assert!(reason.starts_with("oracle_error:"));
    assert!(!output.from_oracle);
    assert_eq!(oracle.total_calls(), 1);
}

/// GOLDEN: quota exhaustion is fatal and never retried
#[tokio::test]
async fn golden_quota_is_fatal() {
    let oracle = FakeGenerationOracle::failing(OracleError::QuotaExhausted("429".into()));
    let outcome = plan_question(&oracle, &PipelineConfig::default(), QUESTION, &[], None).await;

    match outcome {
        StageOutcome::Fatal(PipelineError::QuotaExhausted { stage, .. }) => {
            assert_eq!(stage, Stage::Planner)
        }
        other => panic!("expected Fatal, got {}", other.label()),
    }
    assert_eq!(oracle.total_calls(), 1);
}
