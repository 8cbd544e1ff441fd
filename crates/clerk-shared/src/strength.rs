//! Evidence strength tiering.
//!
//! Pure function of chunk statistics with test-locked thresholds.
//! More evidence never lowers the tier for the same measurements.

use crate::chunk::{distinct_documents, lane_count, Chunk, Lane};
use crate::config::TieringConfig;
use crate::heuristics;
use crate::issue::IssueMap;
use serde::{Deserialize, Serialize};

/// Discrete evidence-strength tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
}

impl Tier {
    /// Higher is stronger
    pub fn rank(&self) -> u8 {
        match self {
            Tier::A => 2,
            Tier::B => 1,
            Tier::C => 0,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::A => write!(f, "A"),
            Tier::B => write!(f, "B"),
            Tier::C => write!(f, "C"),
        }
    }
}

/// Measured evidence fed to the tier function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierInputs {
    pub state_count: usize,
    pub distinct_state_docs: usize,
    pub authoritative_state_present: bool,
    pub situation_alignment: f32,
    pub legal_salience: f32,
}

/// Evidence strength record, derived once per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordStrength {
    pub tier: Tier,
    pub local_count: usize,
    pub state_count: usize,
    pub distinct_local_docs: usize,
    pub distinct_state_docs: usize,
    pub situation_alignment: f32,
    /// Fraction of the issue's legal topics found in authoritative evidence
    pub legal_topic_coverage: f32,
    pub authoritative_state_present: bool,
    /// True when a computed C was promoted to B for a salient legal question
    pub promoted: bool,
}

/// Tier function. Returns (tier, promoted)
pub fn derive_tier(inputs: &TierInputs, config: &TieringConfig) -> (Tier, bool) {
    let tier_a = inputs.state_count >= config.tier_a_min_state
        && (inputs.authoritative_state_present
            || inputs.distinct_state_docs >= config.tier_a_min_distinct_state_docs)
        && inputs.situation_alignment >= config.tier_a_min_alignment;
    if tier_a {
        return (Tier::A, false);
    }

    if inputs.state_count >= config.tier_b_min_state
        && inputs.situation_alignment >= config.tier_b_min_alignment
    {
        return (Tier::B, false);
    }

    // well-evidenced legal questions are never left at C
    if inputs.legal_salience >= config.promotion_salience
        && inputs.state_count >= config.promotion_min_state
    {
        return (Tier::B, true);
    }

    (Tier::C, false)
}

/// Any authoritative signal among state-lane chunks
pub fn authoritative_state_present(chunks: &[Chunk]) -> bool {
    chunks
        .iter()
        .filter(|c| c.lane == Lane::State)
        .any(|c| heuristics::is_authoritative_text(&c.text()))
}

/// Fraction of legal topics mentioned in state-lane evidence
pub fn legal_topic_coverage(chunks: &[Chunk], legal_topics: &[String]) -> f32 {
    if legal_topics.is_empty() {
        return 1.0;
    }
    let state_text: String = chunks
        .iter()
        .filter(|c| c.lane == Lane::State)
        .map(|c| c.text())
        .collect::<Vec<_>>()
        .join("\n");
    let padded = heuristics::padded_tokens(&state_text);
    let detected = heuristics::detect_legal_topics(&state_text);
    let covered = legal_topics
        .iter()
        .filter(|topic| heuristics::contains_phrase(&padded, topic) || detected.contains(topic))
        .count();
    covered as f32 / legal_topics.len() as f32
}

/// Build the strength record from the chunks that reach synthesis
pub fn compute_record_strength(
    chunks: &[Chunk],
    issue: &IssueMap,
    situation_alignment: f32,
    config: &TieringConfig,
) -> RecordStrength {
    let state_count = lane_count(chunks, Lane::State);
    let distinct_state_docs = distinct_documents(chunks, Lane::State);
    let authoritative = authoritative_state_present(chunks);

    let inputs = TierInputs {
        state_count,
        distinct_state_docs,
        authoritative_state_present: authoritative,
        situation_alignment,
        legal_salience: issue.legal_salience,
    };
    let (tier, promoted) = derive_tier(&inputs, config);

    RecordStrength {
        tier,
        local_count: lane_count(chunks, Lane::Local),
        state_count,
        distinct_local_docs: distinct_documents(chunks, Lane::Local),
        distinct_state_docs,
        situation_alignment,
        legal_topic_coverage: legal_topic_coverage(chunks, &issue.legal_topics),
        authoritative_state_present: authoritative,
        promoted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_rank_order() {
        assert!(Tier::A.rank() > Tier::B.rank());
        assert!(Tier::B.rank() > Tier::C.rank());
    }

    #[test]
    fn test_distinct_docs_substitute_for_authority() {
        let inputs = TierInputs {
            state_count: 5,
            distinct_state_docs: 2,
            authoritative_state_present: false,
            situation_alignment: 0.5,
            legal_salience: 0.0,
        };
        assert_eq!(derive_tier(&inputs, &TieringConfig::default()), (Tier::A, false));
    }

    #[test]
    fn test_alignment_blocks_tier_a() {
        let inputs = TierInputs {
            state_count: 6,
            distinct_state_docs: 3,
            authoritative_state_present: true,
            situation_alignment: 0.25,
            legal_salience: 0.0,
        };
        assert_eq!(derive_tier(&inputs, &TieringConfig::default()).0, Tier::B);
    }

    #[test]
    fn test_legal_topic_coverage() {
        let chunks = vec![Chunk::new(
            Lane::State,
            "RSA 91-A:3",
            "Nonpublic sessions may be held only for listed purposes.",
            0.9,
        )];
        let topics = vec!["nonpublic sessions".to_string(), "quorum".to_string()];
        assert_eq!(legal_topic_coverage(&chunks, &topics), 0.5);
        assert_eq!(legal_topic_coverage(&chunks, &[]), 1.0);
    }
}
