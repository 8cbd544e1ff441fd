//! IssueMap - structured extraction of a governance question.
//!
//! Entities must be verifiable against the source text (question, pasted
//! artifact, gated situation anchor). Anything the extractor proposes that
//! cannot be found there is dropped, never carried forward.

use crate::heuristics;
use crate::situation::SituationContext;
use serde::{Deserialize, Serialize};

/// Planner confidence assigned to heuristic (non-oracle) issue maps
pub const HEURISTIC_PLANNER_CONFIDENCE: f32 = 0.35;

/// Kind of answer the question asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedOutput {
    #[default]
    Summary,
    Timeline,
    LegalAnalysis,
    Process,
}

impl RequestedOutput {
    /// Lenient parse of oracle labels
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "summary" | "overview" => Some(Self::Summary),
            "timeline" | "chronology" => Some(Self::Timeline),
            "legal_analysis" | "legal" | "law" => Some(Self::LegalAnalysis),
            "process" | "procedure" | "how_to" => Some(Self::Process),
            _ => None,
        }
    }

    /// Infer from question wording and legal salience
    pub fn infer(question: &str, legal_salience: f32) -> Self {
        let padded = heuristics::padded_tokens(question);
        let has = |p: &str| heuristics::contains_phrase(&padded, p);
        if has("how do") || has("how can") || has("process") || has("steps") || has("procedure") {
            Self::Process
        } else if has("timeline") || has("when did") || has("history of") || has("sequence") {
            Self::Timeline
        } else if legal_salience >= 0.6 {
            Self::LegalAnalysis
        } else {
            Self::Summary
        }
    }
}

impl std::fmt::Display for RequestedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Summary => write!(f, "summary"),
            Self::Timeline => write!(f, "timeline"),
            Self::LegalAnalysis => write!(f, "legal_analysis"),
            Self::Process => write!(f, "process"),
        }
    }
}

/// Structured issue representation, built once per request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueMap {
    /// Jurisdiction hint ("Hollis")
    pub town: Option<String>,
    /// Short situation title
    pub situation_title: String,
    /// Named things, each verified against source text
    pub entities: Vec<String>,
    pub actions: Vec<String>,
    pub legal_topics: Vec<String>,
    pub boards: Vec<String>,
    pub time_hints: Vec<String>,
    pub requested_output: RequestedOutput,
    /// 0.0-1.0
    pub legal_salience: f32,
    /// 0.0-1.0
    pub planner_confidence: f32,
}

impl IssueMap {
    /// Deterministic extraction used when the oracle is unavailable or unparseable
    pub fn heuristic(
        question: &str,
        artifact_text: &str,
        situation: Option<&SituationContext>,
        default_jurisdiction: Option<&str>,
    ) -> Self {
        let combined = format!("{}\n{}", question, artifact_text);
        let source = source_text(question, artifact_text, situation);

        let candidates = heuristics::extract_named_entities(&combined);
        let (entities, _) = retain_verified_entities(candidates, &source);

        let legal_salience = heuristics::legal_salience(question);
        let town = heuristics::detect_jurisdiction(&combined)
            .or_else(|| default_jurisdiction.map(str::to_string));

        Self {
            town,
            situation_title: default_title(question, &entities),
            boards: heuristics::detect_boards(&combined),
            legal_topics: heuristics::detect_legal_topics(&combined),
            actions: heuristics::detect_actions(question),
            time_hints: heuristics::detect_time_hints(question),
            requested_output: RequestedOutput::infer(question, legal_salience),
            legal_salience,
            planner_confidence: HEURISTIC_PLANNER_CONFIDENCE,
            entities,
        }
    }

    /// Entities, legal topics and boards, used for alignment scoring
    pub fn key_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for term in self
            .entities
            .iter()
            .chain(self.legal_topics.iter())
            .chain(self.boards.iter())
        {
            if !terms.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                terms.push(term.clone());
            }
        }
        terms
    }
}

/// Text that extracted entities are validated against
pub fn source_text(
    question: &str,
    artifact_text: &str,
    situation: Option<&SituationContext>,
) -> String {
    let mut source = format!("{}\n{}", question, artifact_text);
    if let Some(ctx) = situation {
        source.push('\n');
        source.push_str(&ctx.title);
        for entity in &ctx.entities {
            source.push('\n');
            source.push_str(entity);
        }
    }
    source
}

/// Split candidates into (verified, dropped) by case-insensitive substring match
///
/// Verified entities keep their first-seen order and are deduplicated.
pub fn retain_verified_entities(
    candidates: Vec<String>,
    source: &str,
) -> (Vec<String>, Vec<String>) {
    let source_lower = source.to_lowercase();
    let mut kept: Vec<String> = Vec::new();
    let mut dropped: Vec<String> = Vec::new();

    for candidate in candidates {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            continue;
        }
        if kept.iter().any(|k| k.eq_ignore_ascii_case(trimmed)) {
            continue;
        }
        if source_lower.contains(&trimmed.to_lowercase()) {
            kept.push(trimmed.to_string());
        } else {
            dropped.push(trimmed.to_string());
        }
    }
    (kept, dropped)
}

/// Title from the first entity, else the first words of the question
fn default_title(question: &str, entities: &[String]) -> String {
    if let Some(first) = entities.first() {
        return first.clone();
    }
    question
        .split_whitespace()
        .take(8)
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['?', '.', '!'])
        .to_string()
}
