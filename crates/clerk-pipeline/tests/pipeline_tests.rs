//! Golden tests for the end-to-end answer pipeline.
//!
//! These tests lock exact behavior. Changes require explicit approval.
//! All oracles are fakes; nothing touches the network.

use clerk_pipeline::{
    AnswerRequest, Artifact, ConversationTurn, DocumentReference, FakeGenerationOracle,
    FakeGenerationOracleBuilder, FakeRetrievalOracle, InMemorySessionStore, Orchestrator,
    OracleError, PipelineError, PlanSource, RecordingSink, Stage, PLANNER_ROLE, REPAIR_ROLE,
    SYNTHESIS_ROLE,
};
use clerk_shared::{CandidateKind, PipelineConfig, SituationContext, SituationUpdate, Tier, ViolationKind};
use std::sync::Arc;

const QUESTION: &str =
    "Did the Select Board follow open meetings rules when it voted on the Constitution Park boardwalk in Hollis?";

const PLAN_JSON: &str = r#"{
    "town": "Hollis",
    "situation_title": "Constitution Park boardwalk vote",
    "entities": ["Constitution Park", "Select Board"],
    "boards": ["Select Board"],
    "legal_topics": ["open meetings"],
    "requested_output": "legal_analysis",
    "legal_salience": 0.5,
    "planner_confidence": 0.8,
    "local": {"queries": ["Constitution Park boardwalk vote"]},
    "state": {"queries": ["open meetings notice requirements"]}
}"#;

/// Heading-complete, one [S#] under Governing Rules
const ORIGINAL_ANSWER: &str = "## Summary
The Select Board voted on the Constitution Park boardwalk at a posted public meeting, and the records show the notice and minutes requirements for open meetings were followed in most respects [L1]. The vote itself took place in public session after a short discussion of contractor bids and repair costs [L2].

## Timeline
- January: the Select Board reviewed the boardwalk condition report for Constitution Park [L1]
- February: the board posted notice of the meeting where bids would be discussed [L3]
- March: the board voted to award the boardwalk repair contract in public session [L2]

## Governing Rules
- Public bodies must post notice and hold deliberations in meetings open to the public [S1]
- Minutes must record members present, actions taken, and the votes of each member

## Impact
- Repairs to the boardwalk can proceed under the awarded contract [L4]
- Residents can review the minutes and bid documents on request [L5]

## Open Questions
- Whether the posted notice listed the boardwalk item specifically
- Whether any nonpublic session discussed the bids beforehand";

/// Same answer with three [S#] citations under Governing Rules
const REPAIRED_ANSWER: &str = "## Summary
The Select Board voted on the Constitution Park boardwalk at a posted public meeting, and the records show the notice and minutes requirements for open meetings were followed in most respects [L1]. The vote itself took place in public session after a short discussion of contractor bids and repair costs [L2].

## Timeline
- January: the Select Board reviewed the boardwalk condition report for Constitution Park [L1]
- February: the board posted notice of the meeting where bids would be discussed [L3]
- March: the board voted to award the boardwalk repair contract in public session [L2]

## Governing Rules
- Public bodies must post notice and hold deliberations in meetings open to the public [S1]
- Minutes must record members present, actions taken, and the votes of each member [S2]
- Guidance treats a vote on a contract award as an action that must occur in public [S3]

## Impact
- Repairs to the boardwalk can proceed under the awarded contract [L4]
- Residents can review the minutes and bid documents on request [L5]

## Open Questions
- Whether the posted notice listed the boardwalk item specifically
- Whether any nonpublic session discussed the bids beforehand";

fn local_docs() -> Vec<DocumentReference> {
    (1..=5)
        .map(|i| {
            DocumentReference::new(
                format!("minutes-{}", i),
                format!("Select Board minutes 2024-0{}", i),
                "Select Board minutes on Constitution Park boardwalk repairs and open meetings notice.",
            )
            .with_score(0.8)
        })
        .collect()
}

/// Four chunks from two documents, one carrying a statute citation
fn state_docs() -> Vec<DocumentReference> {
    vec![
        DocumentReference::new("rsa-91a", "RSA 91-A:2 Meetings Open to Public", "Open meetings require posted notice.")
            .with_score(0.9),
        DocumentReference::new("rsa-91a", "RSA 91-A:2 part II", "Minutes of open meetings record each vote.")
            .with_score(0.85),
        DocumentReference::new("ag-memo", "Right-to-Know guide chapter 1", "Open meetings and public votes.")
            .with_score(0.8),
        DocumentReference::new("ag-memo", "Right-to-Know guide chapter 2", "Open meetings and contract awards.")
            .with_score(0.75),
    ]
}

fn strong_retrieval() -> FakeRetrievalOracle {
    FakeRetrievalOracle::new()
        .with_pass("local", local_docs())
        .with_pass("state", state_docs())
}

struct Harness {
    orchestrator: Orchestrator,
    generation: Arc<FakeGenerationOracle>,
    retrieval: Arc<FakeRetrievalOracle>,
    sessions: Arc<InMemorySessionStore>,
    sink: Arc<RecordingSink>,
}

fn harness(generation: FakeGenerationOracle, retrieval: FakeRetrievalOracle) -> Harness {
    let generation = Arc::new(generation);
    let retrieval = Arc::new(retrieval);
    let sessions = Arc::new(InMemorySessionStore::new());
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = Orchestrator::new(
        Arc::new(PipelineConfig::default()),
        generation.clone(),
        retrieval.clone(),
        sessions.clone(),
        sink.clone(),
    )
    .unwrap();
    Harness {
        orchestrator,
        generation,
        retrieval,
        sessions,
        sink,
    }
}

// === GOLDEN TESTS: Tier A with a single repair ===

/// GOLDEN: 5 local + 4 state chunks (2 docs, statute present) -> A; missing [S#] -> one repair
#[tokio::test]
async fn golden_tier_a_single_repair() {
    let generation = FakeGenerationOracleBuilder::new()
        .respond(PLANNER_ROLE, PLAN_JSON)
        .respond(SYNTHESIS_ROLE, ORIGINAL_ANSWER)
        .respond(REPAIR_ROLE, REPAIRED_ANSWER)
        .build();
    let h = harness(generation, strong_retrieval());

    let answer = h
        .orchestrator
        .answer(AnswerRequest::new("s1", QUESTION))
        .await
        .unwrap();

    let debug = &answer.debug;
    assert_eq!(debug.local_chunks, 5);
    assert_eq!(debug.state_chunks, 4);
    assert_eq!(debug.record_strength.distinct_state_docs, 2);
    assert!(debug.record_strength.authoritative_state_present);
    assert!(debug.record_strength.situation_alignment >= 0.3);
    assert_eq!(answer.tier, Tier::A);

    // One planner, one synthesis, exactly one repair
    assert_eq!(h.generation.call_count(PLANNER_ROLE), 1);
    assert_eq!(h.generation.call_count(SYNTHESIS_ROLE), 1);
    assert_eq!(h.generation.call_count(REPAIR_ROLE), 1);
    assert_eq!(h.generation.total_calls(), 3);

    assert!(debug.repair_attempted);
    assert_eq!(debug.selected_candidate, CandidateKind::Repair);
    assert!(!debug.normalized);
    assert!(!debug.truncated);
    assert_eq!(answer.answer, REPAIRED_ANSWER);
    assert!(answer.audit.passed);
    assert!(!answer.audit.has(ViolationKind::MissingStateCitations));

    // No escalation: one call per lane
    assert!(!debug.escalated);
    assert_eq!(h.retrieval.call_count("local"), 1);
    assert_eq!(h.retrieval.call_count("state"), 1);
    assert_eq!(debug.plan_source, PlanSource::Oracle);
}

/// GOLDEN: the repair prompt carries the machine-readable hint
#[tokio::test]
async fn golden_repair_prompt_has_hint() {
    let generation = FakeGenerationOracleBuilder::new()
        .respond(PLANNER_ROLE, PLAN_JSON)
        .respond(SYNTHESIS_ROLE, ORIGINAL_ANSWER)
        .respond(REPAIR_ROLE, REPAIRED_ANSWER)
        .build();
    let h = harness(generation, strong_retrieval());
    h.orchestrator
        .answer(AnswerRequest::new("s1", QUESTION))
        .await
        .unwrap();

    let repair = h
        .generation
        .requests()
        .into_iter()
        .find(|r| r.system_instruction.contains(REPAIR_ROLE))
        .unwrap();
    assert!(repair.user_prompt.contains("REPAIR_REQUIRED"));
    assert!(repair.user_prompt.contains("rule=missing_state_citations"));
    assert!(repair.user_prompt.contains(ORIGINAL_ANSWER));
}

/// GOLDEN: an incomplete repair loses to a complete original
#[tokio::test]
async fn golden_incomplete_repair_rejected() {
    let generation = FakeGenerationOracleBuilder::new()
        .respond(PLANNER_ROLE, PLAN_JSON)
        .respond(SYNTHESIS_ROLE, ORIGINAL_ANSWER)
        .respond(REPAIR_ROLE, "## Summary\nOpen meetings rules applied [S1] [S2].")
        .build();
    let h = harness(generation, strong_retrieval());

    let answer = h
        .orchestrator
        .answer(AnswerRequest::new("s1", QUESTION))
        .await
        .unwrap();

    assert_eq!(h.generation.call_count(REPAIR_ROLE), 1);
    assert_eq!(answer.debug.selected_candidate, CandidateKind::Original);
    assert_eq!(answer.answer, ORIGINAL_ANSWER);
    // Still returned even though the rule is unmet
    assert!(!answer.audit.passed);
    assert!(answer.audit.has(ViolationKind::MissingStateCitations));
}

/// GOLDEN: a clean first draft never triggers repair
#[tokio::test]
async fn golden_clean_draft_no_repair() {
    let generation = FakeGenerationOracleBuilder::new()
        .respond(PLANNER_ROLE, PLAN_JSON)
        .respond(SYNTHESIS_ROLE, REPAIRED_ANSWER)
        .build();
    let h = harness(generation, strong_retrieval());

    let answer = h
        .orchestrator
        .answer(AnswerRequest::new("s1", QUESTION))
        .await
        .unwrap();

    assert_eq!(h.generation.call_count(REPAIR_ROLE), 0);
    assert!(!answer.debug.repair_attempted);
    assert_eq!(answer.debug.selected_candidate, CandidateKind::Original);
    assert_eq!(answer.citations.len(), 8);
}

// === GOLDEN TESTS: Empty retrieval with a gated-out anchor ===

fn park_context() -> SituationContext {
    SituationContext::new(
        "Constitution Park boardwalk vote",
        vec!["Constitution Park".to_string(), "Select Board".to_string()],
    )
}

/// GOLDEN: zero chunks, gated-out anchor -> archive_chunks_found=false, limitation answer
#[tokio::test]
async fn golden_empty_retrieval_limitation_answer() {
    let generation = FakeGenerationOracleBuilder::new()
        .respond(PLANNER_ROLE, "I could not produce a plan.")
        .fail(SYNTHESIS_ROLE, OracleError::Transport("connection reset".into()))
        .build();
    let h = harness(generation, FakeRetrievalOracle::new());
    h.sessions.put_situation("s2", Some(park_context())).unwrap();

    let request = AnswerRequest::new(
        "s2",
        "What did the budget committee decide on the warrant article?",
    )
    .with_history(vec![ConversationTurn::new(
        "What happened with the boardwalk?",
        "The Select Board approved repairs.",
    )]);
    let answer = h.orchestrator.answer(request).await.unwrap();

    let debug = &answer.debug;
    assert!(!debug.gate.use_context);
    assert!(debug.history_withheld);
    assert!(!debug.archive_chunks_found);
    assert_eq!(debug.local_chunks + debug.state_chunks, 0);
    assert_eq!(debug.plan_source, PlanSource::Heuristic);
    assert!(debug.synthesis_recovered);
    assert_eq!(answer.tier, Tier::C);
    assert!(answer.answer.starts_with("## Summary\nNo records"));
    assert!(answer.citations.is_empty());

    // Escalation ran once and only once
    assert!(debug.escalated);
    assert_eq!(h.retrieval.call_count("local"), 2);
    assert_eq!(h.retrieval.call_count("state"), 2);

    // The synthesis prompt saw no evidence and no prior turns
    let synthesis = h
        .generation
        .requests()
        .into_iter()
        .find(|r| r.system_instruction.contains(SYNTHESIS_ROLE))
        .unwrap();
    assert!(synthesis.user_prompt.contains("EVIDENCE: none"));
    assert!(!synthesis.user_prompt.contains("PRIOR CONVERSATION"));
    assert!(!synthesis.user_prompt.contains("boardwalk"));

    let names = h.sink.names();
    assert!(names.contains(&"stage_recovered"));
    assert_eq!(names.last(), Some(&"answer_finalized"));
}

/// GOLDEN: a gated-in anchor passes history and stays in place
#[tokio::test]
async fn golden_follow_up_keeps_anchor() {
    let generation = FakeGenerationOracleBuilder::new()
        .respond(PLANNER_ROLE, PLAN_JSON)
        .respond(SYNTHESIS_ROLE, REPAIRED_ANSWER)
        .build();
    let h = harness(generation, strong_retrieval());
    h.sessions.put_situation("s3", Some(park_context())).unwrap();

    let request = AnswerRequest::new(
        "s3",
        "Did the Select Board revisit the boardwalk at Constitution Park?",
    )
    .with_history(vec![ConversationTurn::new("Earlier question", "Earlier answer")]);
    let answer = h.orchestrator.answer(request).await.unwrap();

    assert!(answer.debug.gate.use_context);
    assert!(!answer.debug.history_withheld);
    assert_eq!(answer.situation_update, SituationUpdate::Keep);

    let synthesis = h
        .generation
        .requests()
        .into_iter()
        .find(|r| r.system_instruction.contains(SYNTHESIS_ROLE))
        .unwrap();
    assert!(synthesis.user_prompt.contains("PRIOR CONVERSATION"));
}

/// GOLDEN: pasted artifacts reach the planner and synthesizer
#[tokio::test]
async fn golden_artifacts_visible() {
    let generation = FakeGenerationOracleBuilder::new()
        .respond(PLANNER_ROLE, PLAN_JSON)
        .respond(SYNTHESIS_ROLE, REPAIRED_ANSWER)
        .build();
    let h = harness(generation, strong_retrieval());
    h.sessions
        .add_artifact("s4", Artifact::new("warrant.txt", "Article 12: boardwalk bond"))
        .unwrap();

    h.orchestrator
        .answer(AnswerRequest::new("s4", QUESTION))
        .await
        .unwrap();

    let requests = h.generation.requests();
    assert!(requests[0].user_prompt.contains("Article 12: boardwalk bond"));
    let synthesis = requests
        .iter()
        .find(|r| r.system_instruction.contains(SYNTHESIS_ROLE))
        .unwrap();
    assert!(synthesis.user_prompt.contains("USER-PROVIDED TEXT [USER]"));
}

// === GOLDEN TESTS: Quota exhaustion ===

/// GOLDEN: quota during planning surfaces as a typed error
#[tokio::test]
async fn golden_quota_in_planner_is_fatal() {
    let generation = FakeGenerationOracle::failing(OracleError::QuotaExhausted("429".into()));
    let h = harness(generation, strong_retrieval());

    let err = h
        .orchestrator
        .answer(AnswerRequest::new("s1", QUESTION))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::QuotaExhausted {
            stage: Stage::Planner,
            message: "429".to_string()
        }
    );
    // Never retried, nothing downstream ran
    assert_eq!(h.generation.total_calls(), 1);
    assert_eq!(h.retrieval.total_calls(), 0);
}

/// GOLDEN: quota on a retrieval lane is fatal, other lane failures are not
#[tokio::test]
async fn golden_quota_in_retrieval_is_fatal() {
    let generation = FakeGenerationOracleBuilder::new()
        .respond(PLANNER_ROLE, PLAN_JSON)
        .respond(SYNTHESIS_ROLE, REPAIRED_ANSWER)
        .build();
    let retrieval = FakeRetrievalOracle::new()
        .with_pass("local", local_docs())
        .with_failure("state", OracleError::QuotaExhausted("RESOURCE_EXHAUSTED".into()));
    let h = harness(generation, retrieval);

    let err = h
        .orchestrator
        .answer(AnswerRequest::new("s1", QUESTION))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::QuotaExhausted { stage: Stage::Retrieval, .. }));
    assert_eq!(h.generation.call_count(SYNTHESIS_ROLE), 0);
}

/// GOLDEN: quota during synthesis is fatal
#[tokio::test]
async fn golden_quota_in_synthesis_is_fatal() {
    let generation = FakeGenerationOracleBuilder::new()
        .respond(PLANNER_ROLE, PLAN_JSON)
        .fail(SYNTHESIS_ROLE, OracleError::QuotaExhausted("quota".into()))
        .build();
    let h = harness(generation, strong_retrieval());

    let err = h
        .orchestrator
        .answer(AnswerRequest::new("s1", QUESTION))
        .await
        .unwrap_err();
    assert_eq!(err.code(), -32029);
    assert!(matches!(err, PipelineError::QuotaExhausted { stage: Stage::Synthesis, .. }));
}

/// GOLDEN: an invalid config is rejected at construction
#[test]
fn golden_invalid_config_rejected() {
    let mut config = PipelineConfig::default();
    config.retrieval.min_confidence = 1.5;
    let result = Orchestrator::new(
        Arc::new(config),
        Arc::new(FakeGenerationOracle::constant("x")),
        Arc::new(FakeRetrievalOracle::new()),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(RecordingSink::new()),
    );
    assert!(matches!(result, Err(PipelineError::Config(_))));
}
