//! Audit, single repair pass, selection and deterministic cleanup.
//!
//! The repair cycle is a candidate list of at most two entries. Both are
//! audited independently, scored by the pure scorer and reduced by the pure
//! selector. Remaining format violations are fixed without another
//! generation call.

use crate::error::PipelineError;
use crate::oracle::{GenerationOracle, GenerationRequest};
use crate::stage::{Stage, StageOutcome};
use crate::synthesizer::{self, SynthesisInput};
use clerk_shared::config::PipelineConfig;
use clerk_shared::{
    audit_answer, hard_truncate, normalize_answer_format, score_candidate, select_candidate,
    AuditContext, AuditResult, Candidate, CandidateKind, CandidateScore, ViolationKind,
};
use tracing::{debug, info, warn};

/// Marker identifying repair requests
pub const REPAIR_ROLE: &str = "ROLE: governance answer repair";

#[derive(Debug, Clone, PartialEq)]
pub struct RepairReport {
    pub text: String,
    /// Audit of `text`
    pub audit: AuditResult,
    pub original_audit: AuditResult,
    pub repair_audit: Option<AuditResult>,
    pub attempted: bool,
    pub selected: CandidateKind,
    pub scores: Vec<CandidateScore>,
    pub normalized: bool,
    pub truncated: bool,
}

fn repair_request(
    input: &SynthesisInput<'_>,
    config: &PipelineConfig,
    previous: &str,
    hint: &str,
) -> GenerationRequest {
    let system = format!(
        "{}\n\nRewrite a local-government answer so it satisfies every rule below. Keep the facts \
         and citations that are supported by the evidence.\n\nFORMAT RULES:\n{}\nTONE:\n{}\n",
        REPAIR_ROLE,
        input.policy.format_rules(),
        input.policy.tier_guidance()
    );
    let user = format!(
        "{}\nPREVIOUS ANSWER:\n{}\n\n{}\n\nReturn only the corrected answer.",
        synthesizer::user_prompt(input, config),
        previous,
        hint
    );
    GenerationRequest::new(system, user)
        .with_temperature(config.answer.temperature)
        .with_max_output_tokens(config.answer.max_output_tokens)
}

/// Audit `original`, repair at most once, select, then normalize or truncate
pub async fn audit_and_repair(
    oracle: &dyn GenerationOracle,
    config: &PipelineConfig,
    input: &SynthesisInput<'_>,
    audit_ctx: &AuditContext<'_>,
    original: String,
) -> StageOutcome<RepairReport> {
    let original_audit = audit_answer(&original, audit_ctx);
    debug!(
        "original audit: errors={} warnings={}",
        original_audit.error_count(),
        original_audit.warning_count()
    );

    let mut candidates = vec![Candidate {
        kind: CandidateKind::Original,
        text: original,
        audit: original_audit.clone(),
    }];
    let mut attempted = false;
    let mut repair_audit = None;
    let mut recovery: Option<String> = None;

    if let Some(hint) = original_audit.repair_hint.as_deref() {
        attempted = true;
        let request = repair_request(input, config, &candidates[0].text, hint);
        match oracle.generate(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                let audit = audit_answer(&text, audit_ctx);
                repair_audit = Some(audit.clone());
                candidates.push(Candidate {
                    kind: CandidateKind::Repair,
                    text,
                    audit,
                });
            }
            Ok(_) => recovery = Some("empty repair generation".to_string()),
            Err(err) => {
                if let Some(fatal) = PipelineError::from_oracle(Stage::Repair, &err) {
                    return StageOutcome::Fatal(fatal);
                }
                warn!("repair generation failed, keeping original: {}", err);
                recovery = Some(format!("oracle_error: {}", err));
            }
        }
    }

    let scores: Vec<CandidateScore> = candidates
        .iter()
        .map(|c| score_candidate(c, audit_ctx.policy, &config.answer))
        .collect();
    let winner = select_candidate(&scores).unwrap_or(0);
    let chosen = candidates.swap_remove(winner);
    if attempted {
        info!(
            "selected {} candidate (scores: {:?})",
            chosen.kind,
            scores.iter().map(|s| (s.complete, s.score)).collect::<Vec<_>>()
        );
    }

    let selected = chosen.kind;
    let mut text = chosen.text;
    let mut audit = chosen.audit;
    let mut normalized = false;
    let mut truncated = false;

    if audit.has(ViolationKind::FormatViolation) {
        text = normalize_answer_format(&text, audit_ctx.policy);
        audit = audit_answer(&text, audit_ctx);
        normalized = true;
    }
    if audit.has(ViolationKind::FormatViolation) {
        text = hard_truncate(&text, audit_ctx.policy);
        audit = audit_answer(&text, audit_ctx);
        truncated = true;
    }
    if normalized || truncated {
        debug!("cleanup: normalized={} truncated={}", normalized, truncated);
    }

    let report = RepairReport {
        text,
        audit,
        original_audit,
        repair_audit,
        attempted,
        selected,
        scores,
        normalized,
        truncated,
    };

    match recovery {
        Some(reason) => StageOutcome::RecoveredWithHeuristic {
            value: report,
            reason,
        },
        None => StageOutcome::Ok(report),
    }
}
