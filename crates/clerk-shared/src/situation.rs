//! Situation anchor and relevance gate.
//!
//! The anchor is a cross-turn topic descriptor owned by the session store.
//! The gate only decides whether the stored anchor (and the prior
//! conversation history) is visible to this turn. It never mutates it.
//! Replacement is decided separately, after the answer is built.

use crate::config::GateConfig;
use crate::heuristics::{self, Domain};
use crate::issue::IssueMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional time window of the situation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Persisted cross-turn topic anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SituationContext {
    pub title: String,
    pub entities: Vec<String>,
    pub time_range: Option<TimeRange>,
    pub last_updated: DateTime<Utc>,
}

impl SituationContext {
    pub fn new(title: impl Into<String>, entities: Vec<String>) -> Self {
        Self {
            title: title.into(),
            entities,
            time_range: None,
            last_updated: Utc::now(),
        }
    }

    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    /// Seed an anchor from the current issue
    pub fn from_issue(issue: &IssueMap) -> Self {
        let time_range = match (issue.time_hints.first(), issue.time_hints.last()) {
            (Some(start), Some(end)) => Some(TimeRange {
                start: Some(start.clone()),
                end: if end != start { Some(end.clone()) } else { None },
            }),
            _ => None,
        };
        Self {
            title: issue.situation_title.clone(),
            entities: issue.entities.clone(),
            time_range,
            last_updated: Utc::now(),
        }
    }

    /// Keyword domain of title plus entities
    pub fn domain(&self) -> Option<Domain> {
        heuristics::detect_domain(&format!("{} {}", self.title, self.entities.join(" ")))
    }

    /// Entities plus title keywords, lowercase, deduplicated
    pub fn terms(&self, min_keyword_len: usize) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for entity in &self.entities {
            let lower = entity.trim().to_lowercase();
            if !lower.is_empty() && !terms.contains(&lower) {
                terms.push(lower);
            }
        }
        for word in heuristics::significant_words(&self.title, min_keyword_len) {
            if !terms.iter().any(|t| t == &word || t.split_whitespace().any(|w| w == word)) {
                terms.push(word);
            }
        }
        terms
    }

    /// Fraction of anchor terms present in `text`, 0.0-1.0
    pub fn match_score(&self, text: &str, min_keyword_len: usize) -> f32 {
        let terms = self.terms(min_keyword_len);
        if terms.is_empty() {
            return 0.0;
        }
        let padded = heuristics::padded_tokens(text);
        let hits = terms
            .iter()
            .filter(|t| heuristics::contains_phrase(&padded, t))
            .count();
        hits as f32 / terms.len() as f32
    }
}

/// Individual gate signals, kept for debug output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateSignals {
    pub verbatim_entities: usize,
    pub partial_overlaps: usize,
    pub title_keyword_hits: usize,
    pub generic_backref: bool,
    pub dynamic_backref: bool,
    pub domain_mismatch: bool,
}

/// Gate result for one turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub score: f32,
    /// When false, both the anchor and prior history are withheld this turn
    pub use_context: bool,
    pub signals: GateSignals,
    pub question_domain: Option<Domain>,
    pub situation_domain: Option<Domain>,
}

/// Score whether the stored anchor still applies to `question`
pub fn evaluate_gate(
    question: &str,
    situation: Option<&SituationContext>,
    config: &GateConfig,
) -> GateDecision {
    let Some(ctx) = situation else {
        return GateDecision::default();
    };

    let padded = heuristics::padded_tokens(question);
    let question_words = heuristics::significant_words(question, config.min_keyword_len);
    let mut signals = GateSignals::default();

    for entity in &ctx.entities {
        if entity.trim().is_empty() {
            continue;
        }
        if heuristics::contains_phrase(&padded, entity) {
            signals.verbatim_entities += 1;
        } else if heuristics::significant_words(entity, config.min_keyword_len)
            .iter()
            .filter(|w| !heuristics::GENERIC_BODY_WORDS.contains(&w.as_str()))
            .any(|w| question_words.contains(w))
        {
            signals.partial_overlaps += 1;
        }
    }

    signals.title_keyword_hits = heuristics::significant_words(&ctx.title, config.min_keyword_len)
        .iter()
        .filter(|w| question_words.contains(w))
        .count();

    signals.generic_backref = heuristics::has_generic_backreference(question);
    signals.dynamic_backref = ctx.entities.iter().any(|entity| {
        !entity.trim().is_empty() && heuristics::contains_phrase(&padded, &format!("the {}", entity))
    });

    let question_domain = heuristics::detect_domain(question);
    let situation_domain = ctx.domain();
    let any_overlap = signals.verbatim_entities > 0 || signals.partial_overlaps > 0;
    signals.domain_mismatch = matches!(
        (question_domain, situation_domain),
        (Some(q), Some(s)) if q != s
    ) && !any_overlap;

    let mut score = signals.verbatim_entities as f32 * config.verbatim_entity_weight
        + signals.partial_overlaps as f32 * config.partial_overlap_weight
        + signals.title_keyword_hits as f32 * config.title_keyword_weight;
    if signals.generic_backref {
        score += config.generic_backref_weight;
    }
    if signals.dynamic_backref {
        score += config.dynamic_backref_weight;
    }
    if signals.domain_mismatch {
        score += config.domain_mismatch_penalty;
    }

    GateDecision {
        score,
        use_context: score >= config.use_threshold,
        signals,
        question_domain,
        situation_domain,
    }
}

/// What the caller should do with the stored anchor after this turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "context", rename_all = "snake_case")]
pub enum SituationUpdate {
    /// Leave the stored anchor unchanged
    Keep,
    /// Store this anchor in place of the old one
    Replace(SituationContext),
    /// Drop the old anchor; store the new one if present
    Reset(Option<SituationContext>),
}

/// Decide anchor replacement from new-entity detection in the question
pub fn decide_situation_update(
    question: &str,
    existing: Option<&SituationContext>,
    issue: &IssueMap,
) -> SituationUpdate {
    let fresh = || {
        if issue.entities.is_empty() {
            None
        } else {
            Some(SituationContext::from_issue(issue))
        }
    };

    if heuristics::has_broadening_signal(question) {
        return SituationUpdate::Reset(fresh());
    }

    let Some(ctx) = existing else {
        return match fresh() {
            Some(seed) => SituationUpdate::Replace(seed),
            None => SituationUpdate::Keep,
        };
    };

    let known = format!("{} {}", ctx.title, ctx.entities.join(" ")).to_lowercase();
    let unseen = issue
        .entities
        .iter()
        .filter(|e| !known.contains(&e.to_lowercase()))
        .count();

    if unseen >= 2 && heuristics::has_event_marker(question) {
        if let Some(seed) = fresh() {
            return SituationUpdate::Replace(seed);
        }
    }
    SituationUpdate::Keep
}
