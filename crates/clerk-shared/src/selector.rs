//! Candidate scoring and selection for the repair cycle.
//!
//! The cycle is a list of at most two candidates (original, repair). Scoring
//! and selection are pure; completeness is a hard gate that outranks score.

use crate::answer_text;
use crate::audit::{AuditResult, ViolationKind};
use crate::citation;
use crate::config::AnswerConfig;
use crate::policy::AnswerPolicy;
use serde::{Deserialize, Serialize};

const HEADING_POINTS: i32 = 10;
const CITATION_POINTS: i32 = 10;
const ERROR_PENALTY: i32 = 8;
const WARNING_PENALTY: i32 = 2;
const BANNED_PENALTY: i32 = 15;
const SWEET_SPOT_BONUS: i32 = 10;
const SHORT_PENALTY: i32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Original,
    Repair,
}

impl std::fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateKind::Original => write!(f, "original"),
            CandidateKind::Repair => write!(f, "repair"),
        }
    }
}

/// An audited answer candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub text: String,
    pub audit: AuditResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub score: i32,
    /// All headings present and at least the minimum word count
    pub complete: bool,
    pub words: usize,
}

/// Pure scorer
pub fn score_candidate(candidate: &Candidate, policy: &AnswerPolicy, config: &AnswerConfig) -> CandidateScore {
    let parsed = answer_text::parse_answer(&candidate.text);
    let words = answer_text::answer_word_count(&candidate.text);

    let headings_present = policy
        .sections
        .iter()
        .filter(|s| parsed.find(&s.heading).is_some())
        .count();
    let all_headings = headings_present == policy.sections.len();

    let mut score = headings_present as i32 * HEADING_POINTS;
    if !citation::extract_citations(&candidate.text).is_empty() {
        score += CITATION_POINTS;
    }
    score -= candidate.audit.error_count() as i32 * ERROR_PENALTY;
    score -= candidate.audit.warning_count() as i32 * WARNING_PENALTY;
    if candidate.audit.has(ViolationKind::BannedPhrase) {
        score -= BANNED_PENALTY;
    }
    let (low, high) = config.sweet_spot;
    if (low..=high).contains(&words) {
        score += SWEET_SPOT_BONUS;
    }
    if words < policy.min_words {
        score -= SHORT_PENALTY;
    }

    CandidateScore {
        score,
        complete: all_headings && words >= policy.min_words,
        words,
    }
}

/// Pure reducer: index of the winner. Complete beats incomplete, then the
/// higher score; ties keep the earlier candidate.
pub fn select_candidate(scores: &[CandidateScore]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, score) in scores.iter().enumerate() {
        let better = match best {
            None => true,
            Some(b) => {
                let current = &scores[b];
                (score.complete, score.score) > (current.complete, current.score)
            }
        };
        if better {
            best = Some(idx);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::strength::Tier;

    fn score(complete: bool, score: i32) -> CandidateScore {
        CandidateScore {
            score,
            complete,
            words: 0,
        }
    }

    #[test]
    fn test_completeness_outranks_score() {
        let scores = [score(false, 90), score(true, 20)];
        assert_eq!(select_candidate(&scores), Some(1));
    }

    #[test]
    fn test_tie_keeps_original() {
        let scores = [score(true, 40), score(true, 40)];
        assert_eq!(select_candidate(&scores), Some(0));
        assert_eq!(select_candidate(&[]), None);
    }

    #[test]
    fn test_short_answer_incomplete() {
        let config = PipelineConfig::default();
        let policy = AnswerPolicy::select(Tier::B, true, &config);
        let candidate = Candidate {
            kind: CandidateKind::Original,
            text: "## Summary\nToo short [L1].".to_string(),
            audit: AuditResult::default(),
        };
        let s = score_candidate(&candidate, &policy, &config.answer);
        assert!(!s.complete);
        // one heading + citation - short penalty
        assert_eq!(s.score, 10 + 10 - 40);
    }
}
