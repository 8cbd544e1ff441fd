//! Orchestrator - sequences the stages for one request.
//!
//! Gate, planner, retrieval, tiering, synthesis, audit and repair run in
//! order on one task. Only quota exhaustion aborts the request; every other
//! failure degrades to a heuristic and is reported through telemetry.

use crate::error::PipelineError;
use crate::oracle::{GenerationOracle, RetrievalOracle};
use crate::planner::{self, PlannerOutput};
use crate::repair::{self, RepairReport};
use crate::retrieval::{self, EscalationReason, IssuedQueries, RetrievalResult};
use crate::session::{Artifact, SessionStore};
use crate::stage::{Stage, StageOutcome};
use crate::synthesizer::{self, ConversationTurn, SynthesisInput};
use crate::telemetry::{PipelineEvent, RequestIds, TelemetrySink};
use clerk_shared::answer_text::answer_word_count;
use clerk_shared::citation::extract_citations;
use clerk_shared::situation::decide_situation_update;
use clerk_shared::{
    compute_record_strength, evaluate_gate, AnswerPolicy, AuditContext, AuditResult,
    CandidateKind, CitationToken, GateDecision, IssueMap, Lane, PipelineConfig, RecordStrength,
    RetrievalPlan, SituationContext, SituationUpdate, Tier,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub session_id: String,
    pub question: String,
    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl AnswerRequest {
    pub fn new(session_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            question: question.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Oracle,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
}

/// Per-request diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDebug {
    pub gate: GateDecision,
    pub history_withheld: bool,
    pub plan_source: PlanSource,
    pub plan_recovery_reason: Option<String>,
    pub dropped_entities: Vec<String>,
    pub issue: IssueMap,
    pub plan: RetrievalPlan,
    pub queries: IssuedQueries,
    pub escalated: bool,
    pub escalation_reason: Option<EscalationReason>,
    pub local_chunks: usize,
    pub state_chunks: usize,
    pub archive_chunks_found: bool,
    pub lane_failures: Vec<String>,
    pub record_strength: RecordStrength,
    pub synthesis_recovered: bool,
    pub repair_attempted: bool,
    pub selected_candidate: CandidateKind,
    pub normalized: bool,
    pub truncated: bool,
    pub timings: Vec<StageTiming>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineAnswer {
    pub request_id: String,
    pub answer: String,
    pub tier: Tier,
    pub citations: Vec<CitationToken>,
    pub audit: AuditResult,
    /// For the caller to persist; the pipeline never writes the session
    pub situation_update: SituationUpdate,
    pub debug: PipelineDebug,
}

struct Timer {
    timings: Vec<StageTiming>,
    started: Instant,
}

impl Timer {
    fn new() -> Self {
        Self {
            timings: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Close the current stage and start the next
    fn lap(&mut self, stage: Stage) {
        self.timings.push(StageTiming {
            stage,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        });
        self.started = Instant::now();
    }
}

pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    generation: Arc<dyn GenerationOracle>,
    retrieval: Arc<dyn RetrievalOracle>,
    sessions: Arc<dyn SessionStore>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<PipelineConfig>,
        generation: Arc<dyn GenerationOracle>,
        retrieval: Arc<dyn RetrievalOracle>,
        sessions: Arc<dyn SessionStore>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, PipelineError> {
        config
            .validate()
            .map_err(|e| PipelineError::Config(format!("{:#}", e)))?;
        Ok(Self {
            config,
            generation,
            retrieval,
            sessions,
            telemetry,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn emit(&self, ids: &RequestIds, event: PipelineEvent) {
        self.telemetry.emit(ids, &event);
    }

    fn recovered(&self, ids: &RequestIds, stage: Stage, reason: &str) {
        self.emit(
            ids,
            PipelineEvent::StageRecovered {
                stage,
                reason: reason.to_string(),
            },
        );
    }

    /// Session reads degrade to "no anchor, no artifacts" on failure
    async fn load_session(&self, session_id: &str) -> (Option<SituationContext>, Vec<Artifact>) {
        let situation = match self.sessions.situation_context(session_id).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!("session {}: situation unavailable: {}", session_id, e);
                None
            }
        };
        let artifacts = match self.sessions.session_artifacts(session_id).await {
            Ok(a) => a,
            Err(e) => {
                warn!("session {}: artifacts unavailable: {}", session_id, e);
                Vec::new()
            }
        };
        (situation, artifacts)
    }

    /// Answer one question; only quota exhaustion is returned as an error
    pub async fn answer(&self, request: AnswerRequest) -> Result<PipelineAnswer, PipelineError> {
        let config = self.config.as_ref();
        let ids = RequestIds {
            request_id: Uuid::new_v4().to_string(),
            session_id: request.session_id.clone(),
        };
        let question = request.question.trim();
        info!(request_id = %ids.request_id, session_id = %ids.session_id, "answering question");
        let mut timer = Timer::new();

        // Gate
        let (stored, artifacts) = self.load_session(&request.session_id).await;
        let gate = evaluate_gate(question, stored.as_ref(), &config.gate);
        let gated = if gate.use_context { stored.as_ref() } else { None };
        let history_withheld = stored.is_some() && !gate.use_context;
        let history: &[ConversationTurn] = if history_withheld { &[] } else { &request.history };
        debug!(
            "gate score={:.2} use_context={} history_withheld={}",
            gate.score, gate.use_context, history_withheld
        );
        timer.lap(Stage::Gate);

        // Planner
        let planned = planner::plan_question(
            self.generation.as_ref(),
            config,
            question,
            &artifacts,
            gated,
        )
        .await;
        let plan_recovery_reason = match &planned {
            StageOutcome::RecoveredWithHeuristic { reason, .. } => {
                self.recovered(&ids, Stage::Planner, reason);
                Some(reason.clone())
            }
            _ => None,
        };
        let PlannerOutput {
            issue,
            plan,
            dropped_entities,
            from_oracle,
        } = planned.into_result()?;
        self.emit(
            &ids,
            PipelineEvent::PlanComplete {
                from_oracle,
                entities: issue.entities.len(),
                dropped_entities: dropped_entities.len(),
                local_queries: plan.local.queries.len(),
                state_queries: plan.state.queries.len(),
                priority: plan.priority,
                conservative: plan.conservative,
            },
        );
        timer.lap(Stage::Planner);

        // Retrieval
        let retrieved = retrieval::retrieve(
            self.retrieval.as_ref(),
            config,
            question,
            &issue,
            &plan,
            gated,
        )
        .await;
        if let StageOutcome::Escalate(result) = &retrieved {
            info!(
                "retrieval still weak after escalation (confidence {:.2}, alignment {:.2})",
                result.quality.confidence, result.quality.alignment
            );
        }
        let retrieval: RetrievalResult = retrieved.into_result()?;
        self.emit(
            &ids,
            PipelineEvent::RetrievalComplete {
                local_chunks: retrieval.count(Lane::Local),
                state_chunks: retrieval.count(Lane::State),
                escalated: retrieval.escalated,
                confidence: retrieval.quality.confidence,
                alignment: retrieval.quality.alignment,
            },
        );
        timer.lap(Stage::Retrieval);

        // Tiering
        let strength = compute_record_strength(
            &retrieval.chunks,
            &issue,
            retrieval.situation_alignment,
            &config.tiering,
        );
        self.emit(
            &ids,
            PipelineEvent::TierComputed {
                tier: strength.tier,
                promoted: strength.promoted,
                state_count: strength.state_count,
                situation_alignment: strength.situation_alignment,
            },
        );
        timer.lap(Stage::Tiering);

        // Synthesis
        let policy = AnswerPolicy::select(strength.tier, strength.state_count > 0, config);
        let user_text = planner::artifact_text(&artifacts, config.planner.artifact_char_budget);
        let input = SynthesisInput {
            question,
            issue: &issue,
            chunks: &retrieval.chunks,
            policy: &policy,
            history,
            user_text: &user_text,
        };
        let synthesized = synthesizer::synthesize(self.generation.as_ref(), config, &input).await;
        let synthesis_recovered = synthesized.is_recovered();
        if let StageOutcome::RecoveredWithHeuristic { reason, .. } = &synthesized {
            self.recovered(&ids, Stage::Synthesis, reason);
        }
        let draft = synthesized.into_result()?;
        timer.lap(Stage::Synthesis);

        // Audit and repair
        let audit_ctx = AuditContext {
            policy: &policy,
            config: &config.audit,
            local_evidence: strength.local_count,
            state_evidence: strength.state_count,
            situation: gated,
            issue: &issue,
            drift_ignore: &config.retrieval.drift_ignore,
        };
        let repaired = repair::audit_and_repair(
            self.generation.as_ref(),
            config,
            &input,
            &audit_ctx,
            draft.text,
        )
        .await;
        if let StageOutcome::RecoveredWithHeuristic { reason, .. } = &repaired {
            self.recovered(&ids, Stage::Repair, reason);
        }
        let report: RepairReport = repaired.into_result()?;
        self.emit_audits(&ids, &report);
        timer.lap(Stage::Repair);

        // Finalize
        let situation_update = decide_situation_update(question, stored.as_ref(), &issue);
        let citations = extract_citations(&report.text);
        self.emit(
            &ids,
            PipelineEvent::AnswerFinalized {
                tier: strength.tier,
                words: answer_word_count(&report.text),
                citations: citations.len(),
            },
        );
        timer.lap(Stage::Finalize);

        info!(
            request_id = %ids.request_id,
            tier = %strength.tier,
            escalated = retrieval.escalated,
            repaired = report.attempted,
            "answer ready"
        );

        Ok(PipelineAnswer {
            request_id: ids.request_id,
            answer: report.text,
            tier: strength.tier,
            citations,
            audit: report.audit,
            situation_update,
            debug: PipelineDebug {
                gate,
                history_withheld,
                plan_source: if from_oracle {
                    PlanSource::Oracle
                } else {
                    PlanSource::Heuristic
                },
                plan_recovery_reason,
                dropped_entities,
                local_chunks: retrieval.count(Lane::Local),
                state_chunks: retrieval.count(Lane::State),
                archive_chunks_found: retrieval.archive_chunks_found,
                escalated: retrieval.escalated,
                escalation_reason: retrieval.escalation_reason,
                queries: retrieval.queries,
                lane_failures: retrieval.lane_failures,
                record_strength: strength,
                synthesis_recovered,
                repair_attempted: report.attempted,
                selected_candidate: report.selected,
                normalized: report.normalized,
                truncated: report.truncated,
                timings: timer.timings,
                issue,
                plan,
            },
        })
    }

    fn emit_audits(&self, ids: &RequestIds, report: &RepairReport) {
        let audits = std::iter::once((CandidateKind::Original, &report.original_audit))
            .chain(report.repair_audit.iter().map(|a| (CandidateKind::Repair, a)));
        for (kind, audit) in audits {
            self.emit(
                ids,
                PipelineEvent::AuditResult {
                    candidate: kind.to_string(),
                    errors: audit.error_count(),
                    warnings: audit.warning_count(),
                    passed: audit.passed,
                },
            );
        }
        self.emit(
            ids,
            PipelineEvent::RepairOutcome {
                attempted: report.attempted,
                selected: report.selected.to_string(),
                normalized: report.normalized,
                truncated: report.truncated,
            },
        );
    }
}
