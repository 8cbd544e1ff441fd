//! Synthesizer - one generation call under the selected answer policy.
//!
//! Evidence is labeled with lane citation tokens in merge order: the first
//! local chunk is `[L1]`, the first state chunk `[S1]`. Prior conversation
//! is included only when the situation gate let it through.

use crate::error::PipelineError;
use crate::oracle::{GenerationOracle, GenerationRequest};
use crate::stage::{Stage, StageOutcome};
use clerk_shared::citation::extract_citations;
use clerk_shared::config::PipelineConfig;
use clerk_shared::normalize::{truncate_words, BULLET_PLACEHOLDER};
use clerk_shared::policy::{HEADING_IMPACT, HEADING_OPEN, HEADING_RULES, HEADING_SUMMARY, HEADING_TIMELINE};
use clerk_shared::{AnswerPolicy, Chunk, CitationToken, IssueMap, Lane};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Marker identifying synthesis requests
pub const SYNTHESIS_ROLE: &str = "ROLE: governance answer writer";

/// Longest evidence title quoted in the fallback answer
const FALLBACK_TITLE_WORDS: usize = 12;

/// One prior exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Everything one synthesis call reads
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub question: &'a str,
    pub issue: &'a IssueMap,
    pub chunks: &'a [Chunk],
    pub policy: &'a AnswerPolicy,
    /// Already gated: empty when the anchor was withheld
    pub history: &'a [ConversationTurn],
    /// Pasted text the user supplied, cited as `[USER]`
    pub user_text: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutput {
    pub text: String,
    pub citations: Vec<CitationToken>,
}

impl SynthesisOutput {
    fn from_text(text: String) -> Self {
        let citations = extract_citations(&text);
        Self { text, citations }
    }
}

/// Pair each chunk with its citation token, preserving merge order
pub fn label_evidence(chunks: &[Chunk]) -> Vec<(CitationToken, &Chunk)> {
    let mut local = 0;
    let mut state = 0;
    chunks
        .iter()
        .map(|chunk| {
            let index = match chunk.lane {
                Lane::Local => {
                    local += 1;
                    local
                }
                Lane::State => {
                    state += 1;
                    state
                }
            };
            (CitationToken::for_lane(chunk.lane, index), chunk)
        })
        .collect()
}

fn cut_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push_str(" ...");
    cut
}

pub fn system_instruction(policy: &AnswerPolicy) -> String {
    format!(
        "{}\n\nYou answer questions about local government using only the evidence provided.\n\n\
         FORMAT RULES:\n{}\nTONE:\n{}\n",
        SYNTHESIS_ROLE,
        policy.format_rules(),
        policy.tier_guidance()
    )
}

pub fn user_prompt(input: &SynthesisInput<'_>, config: &PipelineConfig) -> String {
    let mut prompt = String::new();

    let turns = input.history.len().saturating_sub(config.answer.history_turns);
    if turns < input.history.len() {
        prompt.push_str("PRIOR CONVERSATION:\n");
        for turn in &input.history[turns..] {
            prompt.push_str(&format!("Q: {}\nA: {}\n", turn.question, turn.answer));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("QUESTION:\n{}\n\n", input.question));
    if let Some(town) = &input.issue.town {
        prompt.push_str(&format!("JURISDICTION: {}\n\n", town));
    }

    if input.chunks.is_empty() {
        prompt.push_str(
            "EVIDENCE: none. No evidence was found in the local records or the state corpus. \
             Say so plainly, do not guess, and do not cite [L#] or [S#] tokens.\n",
        );
    } else {
        prompt.push_str("EVIDENCE:\n");
        for (token, chunk) in label_evidence(input.chunks) {
            prompt.push_str(&format!(
                "{} {}\n{}\n\n",
                token,
                chunk.title,
                cut_chars(&chunk.content, config.answer.max_chunk_chars)
            ));
        }
    }

    if !input.user_text.trim().is_empty() {
        prompt.push_str(&format!(
            "\nUSER-PROVIDED TEXT [USER]:\n{}\n",
            cut_chars(input.user_text, config.answer.max_chunk_chars)
        ));
    }
    prompt
}

pub fn build_request(input: &SynthesisInput<'_>, config: &PipelineConfig) -> GenerationRequest {
    GenerationRequest::new(system_instruction(input.policy), user_prompt(input, config))
        .with_temperature(config.answer.temperature)
        .with_max_output_tokens(config.answer.max_output_tokens)
}

fn evidence_bullets(input: &SynthesisInput<'_>, lane: Lane, max: usize) -> Vec<String> {
    label_evidence(input.chunks)
        .into_iter()
        .filter(|(_, c)| c.lane == lane)
        .take(max)
        .map(|(token, c)| format!("- {} {}", truncate_words(&c.title, FALLBACK_TITLE_WORDS), token))
        .collect()
}

/// Deterministic answer used when generation fails
pub fn limitation_answer(input: &SynthesisInput<'_>) -> String {
    let summary = if input.chunks.is_empty() {
        "No records addressing this question were found in the local archive or the state corpus, \
         so no answer can be given from the available evidence."
            .to_string()
    } else {
        format!(
            "An answer could not be written for this question. {} related records were found; \
             their titles are listed below.",
            input.chunks.len()
        )
    };

    if !input.policy.is_sectioned() {
        let titles: Vec<String> = label_evidence(input.chunks)
            .into_iter()
            .take(6)
            .map(|(token, c)| format!("{} {}", truncate_words(&c.title, FALLBACK_TITLE_WORDS), token))
            .collect();
        if titles.is_empty() {
            return summary;
        }
        return format!("{}\n\nRelated records: {}.", summary, titles.join("; "));
    }

    let section = |heading: &str, lines: Vec<String>| {
        let body = if lines.is_empty() {
            format!("- {}", BULLET_PLACEHOLDER)
        } else {
            lines.join("\n")
        };
        format!("## {}\n{}", heading, body)
    };
    let max_bullets = |heading: &str| input.policy.section(heading).map(|s| s.max_bullets).unwrap_or(0);

    let open = if input.issue.situation_title.trim().is_empty() {
        Vec::new()
    } else {
        vec![format!(
            "- Which records cover {}?",
            truncate_words(&input.issue.situation_title, FALLBACK_TITLE_WORDS)
        )]
    };

    [
        format!("## {}\n{}", HEADING_SUMMARY, summary),
        section(HEADING_TIMELINE, evidence_bullets(input, Lane::Local, max_bullets(HEADING_TIMELINE))),
        section(HEADING_RULES, evidence_bullets(input, Lane::State, max_bullets(HEADING_RULES))),
        section(HEADING_IMPACT, Vec::new()),
        section(HEADING_OPEN, open),
    ]
    .join("\n\n")
}

/// Generate the answer; non-quota failures fall back to the limitation answer
pub async fn synthesize(
    oracle: &dyn GenerationOracle,
    config: &PipelineConfig,
    input: &SynthesisInput<'_>,
) -> StageOutcome<SynthesisOutput> {
    let request = build_request(input, config);
    debug!(
        "synthesis: tier={} evidence={} history_turns={}",
        input.policy.tier,
        input.chunks.len(),
        input.history.len()
    );

    match oracle.generate(&request).await {
        Ok(text) if !text.trim().is_empty() => StageOutcome::Ok(SynthesisOutput::from_text(text)),
        Ok(_) => StageOutcome::RecoveredWithHeuristic {
            value: SynthesisOutput::from_text(limitation_answer(input)),
            reason: "empty generation".to_string(),
        },
        Err(err) => {
            if let Some(fatal) = PipelineError::from_oracle(Stage::Synthesis, &err) {
                return StageOutcome::Fatal(fatal);
            }
            warn!("synthesis failed, using limitation answer: {}", err);
            StageOutcome::RecoveredWithHeuristic {
                value: SynthesisOutput::from_text(limitation_answer(input)),
                reason: format!("oracle_error: {}", err),
            }
        }
    }
}
