//! Planner - question to IssueMap and RetrievalPlan.
//!
//! One extraction call to the generation oracle. The reply goes through the
//! typed decode step; anything unusable (other than quota exhaustion) falls
//! back to the deterministic heuristics so the pipeline never stalls for
//! lack of a plan.

use crate::error::PipelineError;
use crate::oracle::{GenerationOracle, GenerationRequest};
use crate::session::Artifact;
use crate::stage::{Stage, StageOutcome};
use clerk_shared::config::PipelineConfig;
use clerk_shared::plan::{build_retrieval_plan, decode_plan};
use clerk_shared::{IssueMap, RetrievalPlan, SituationContext};
use tracing::{debug, info, warn};

/// Marker identifying planner requests
pub const PLANNER_ROLE: &str = "ROLE: governance issue planner";

const PLANNER_SYSTEM_PROMPT: &str = r#"ROLE: governance issue planner

Extract the structure of a local-government question. Reply with ONE JSON
object and nothing else:

{
  "town": "jurisdiction named in the text, or null",
  "situation_title": "short title, at most 8 words",
  "entities": ["named places, bodies, people, projects copied VERBATIM from the text"],
  "actions": ["votes, approvals, hearings ..."],
  "legal_topics": ["open meetings, procurement, zoning ..."],
  "boards": ["boards or committees named"],
  "time_hints": ["dates or periods named"],
  "requested_output": "summary | timeline | legal_analysis | process",
  "legal_salience": 0.0,
  "planner_confidence": 0.0,
  "local": {"queries": ["..."], "k": 8, "keep": 6},
  "state": {"queries": ["..."], "k": 8, "keep": 6},
  "min_state_evidence": 1,
  "priority": "law_first | facts_first | process_first"
}

Never invent entities. Omit fields you cannot fill."#;

/// Planner result
#[derive(Debug, Clone)]
pub struct PlannerOutput {
    pub issue: IssueMap,
    pub plan: RetrievalPlan,
    pub dropped_entities: Vec<String>,
    /// False when the heuristic fallback produced the issue map
    pub from_oracle: bool,
}

/// Concatenate pasted artifacts, cut to `budget` characters
pub fn artifact_text(artifacts: &[Artifact], budget: usize) -> String {
    let joined = artifacts
        .iter()
        .map(|a| format!("--- {} ---\n{}", a.name, a.text))
        .collect::<Vec<_>>()
        .join("\n\n");
    if joined.chars().count() <= budget {
        joined
    } else {
        joined.chars().take(budget).collect()
    }
}

fn build_prompt(question: &str, artifact: &str, situation: Option<&SituationContext>) -> String {
    let mut prompt = format!("QUESTION:\n{}\n", question);
    if let Some(ctx) = situation {
        prompt.push_str(&format!(
            "\nCURRENT SITUATION: {}\nKNOWN ENTITIES: {}\n",
            ctx.title,
            ctx.entities.join(", ")
        ));
    }
    if !artifact.is_empty() {
        prompt.push_str(&format!("\nPASTED DOCUMENTS:\n{}\n", artifact));
    }
    prompt
}

fn heuristic_output(
    question: &str,
    artifact: &str,
    situation: Option<&SituationContext>,
    config: &PipelineConfig,
) -> PlannerOutput {
    let issue = IssueMap::heuristic(
        question,
        artifact,
        situation,
        config.planner.default_jurisdiction.as_deref(),
    );
    let plan = build_retrieval_plan(question, &issue, None, &config.planner);
    PlannerOutput {
        issue,
        plan,
        dropped_entities: Vec::new(),
        from_oracle: false,
    }
}

/// Build the issue map and retrieval plan for one question
///
/// `situation` must already be gated: pass `None` when the gate withheld it.
pub async fn plan_question(
    oracle: &dyn GenerationOracle,
    config: &PipelineConfig,
    question: &str,
    artifacts: &[Artifact],
    situation: Option<&SituationContext>,
) -> StageOutcome<PlannerOutput> {
    let artifact = artifact_text(artifacts, config.planner.artifact_char_budget);
    let request = GenerationRequest::new(PLANNER_SYSTEM_PROMPT, build_prompt(question, &artifact, situation))
        .with_temperature(config.planner.temperature)
        .with_max_output_tokens(config.planner.max_output_tokens);

    let reply = match oracle.generate(&request).await {
        Ok(text) => text,
        Err(err) => {
            if let Some(fatal) = PipelineError::from_oracle(Stage::Planner, &err) {
                return StageOutcome::Fatal(fatal);
            }
            warn!("planner oracle failed, using heuristics: {}", err);
            return StageOutcome::RecoveredWithHeuristic {
                value: heuristic_output(question, &artifact, situation, config),
                reason: format!("oracle_error: {}", err),
            };
        }
    };

    let parsed = match decode_plan(&reply) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("planner reply unusable ({}), using heuristics", err.tag());
            debug!("unusable planner reply: {}", reply);
            return StageOutcome::RecoveredWithHeuristic {
                value: heuristic_output(question, &artifact, situation, config),
                reason: format!("decode_error: {}", err.tag()),
            };
        }
    };

    let validated = parsed.to_issue(
        question,
        &artifact,
        situation,
        config.planner.default_jurisdiction.as_deref(),
    );
    if !validated.dropped_entities.is_empty() {
        info!(
            "dropped {} unverifiable entities: {:?}",
            validated.dropped_entities.len(),
            validated.dropped_entities
        );
    }

    let plan = build_retrieval_plan(question, &validated.issue, Some(&parsed), &config.planner);
    debug!(
        "plan: priority={} conservative={} local={} state={}",
        plan.priority,
        plan.conservative,
        plan.local.queries.len(),
        plan.state.queries.len()
    );

    StageOutcome::Ok(PlannerOutput {
        issue: validated.issue,
        plan,
        dropped_entities: validated.dropped_entities,
        from_oracle: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_budget() {
        let artifacts = vec![Artifact::new("a.txt", "x".repeat(50))];
        let text = artifact_text(&artifacts, 20);
        assert_eq!(text.chars().count(), 20);
        assert!(text.starts_with("--- a.txt ---"));
        assert!(artifact_text(&[], 20).is_empty());
    }

    #[test]
    fn test_prompt_includes_gated_situation_only() {
        let ctx = SituationContext::new("Constitution Park boardwalk vote", vec!["Select Board".into()]);
        let with = build_prompt("What happened?", "", Some(&ctx));
        assert!(with.contains("CURRENT SITUATION: Constitution Park boardwalk vote"));
        let without = build_prompt("What happened?", "", None);
        assert!(!without.contains("CURRENT SITUATION"));
        assert!(PLANNER_SYSTEM_PROMPT.starts_with(PLANNER_ROLE));
    }
}
