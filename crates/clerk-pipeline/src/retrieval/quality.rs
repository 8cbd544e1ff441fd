//! Retrieval quality evaluation.
//!
//! Confidence blends average chunk score, count saturation and key-entity
//! presence. Alignment is the share of the issue's key terms found in the
//! evidence. Drift is a foreign named entity recurring across local chunks.

use clerk_shared::audit::foreign_entities;
use clerk_shared::config::RetrievalConfig;
use clerk_shared::heuristics;
use clerk_shared::{Chunk, IssueMap, Lane, SituationContext};
use serde::{Deserialize, Serialize};

/// Why a second pass ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum EscalationReason {
    LowConfidence(f32),
    LowAlignment(f32),
    Drift(String),
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscalationReason::LowConfidence(c) => write!(f, "low confidence {:.2}", c),
            EscalationReason::LowAlignment(a) => write!(f, "low alignment {:.2}", a),
            EscalationReason::Drift(name) => write!(f, "drift toward '{}'", name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalQuality {
    pub confidence: f32,
    pub alignment: f32,
    pub drift_entity: Option<String>,
}

impl RetrievalQuality {
    /// First failing check, in confidence, alignment, drift order
    pub fn escalation_reason(&self, config: &RetrievalConfig) -> Option<EscalationReason> {
        if self.confidence < config.min_confidence {
            Some(EscalationReason::LowConfidence(self.confidence))
        } else if self.alignment < config.min_alignment {
            Some(EscalationReason::LowAlignment(self.alignment))
        } else {
            self.drift_entity.clone().map(EscalationReason::Drift)
        }
    }
}

fn evidence_text(chunks: &[Chunk]) -> String {
    chunks.iter().map(|c| c.text()).collect::<Vec<_>>().join("\n")
}

/// Terms alignment is measured against: key terms, else title keywords
fn alignment_terms(issue: &IssueMap) -> Vec<String> {
    let terms = issue.key_terms();
    if !terms.is_empty() {
        return terms;
    }
    heuristics::significant_words(&issue.situation_title, 4)
}

/// Share of alignment terms present anywhere in the evidence, 0.0-1.0
pub fn topic_alignment(chunks: &[Chunk], issue: &IssueMap) -> f32 {
    let terms = alignment_terms(issue);
    if terms.is_empty() || chunks.is_empty() {
        return 0.0;
    }
    let padded = heuristics::padded_tokens(&evidence_text(chunks));
    let hits = terms
        .iter()
        .filter(|t| heuristics::contains_phrase(&padded, t))
        .count();
    hits as f32 / terms.len() as f32
}

/// Alignment fed to tiering; averaged with the anchor match when one is gated in
pub fn situation_alignment(
    chunks: &[Chunk],
    issue: &IssueMap,
    situation: Option<&SituationContext>,
    min_keyword_len: usize,
) -> f32 {
    let topic = topic_alignment(chunks, issue);
    match situation {
        Some(ctx) if !chunks.is_empty() => {
            let anchor = chunks
                .iter()
                .map(|c| ctx.match_score(&c.text(), min_keyword_len))
                .sum::<f32>()
                / chunks.len() as f32;
            (topic + anchor) / 2.0
        }
        _ => topic,
    }
}

/// Weighted blend of mean score, count saturation and entity presence
pub fn retrieval_confidence(chunks: &[Chunk], issue: &IssueMap, config: &RetrievalConfig) -> f32 {
    if chunks.is_empty() {
        return 0.0;
    }
    let mean_score = chunks.iter().map(|c| c.score).sum::<f32>() / chunks.len() as f32;
    let saturation = config.count_saturation.max(1);
    let count = (chunks.len() as f32 / saturation as f32).min(1.0);

    let entity = if issue.entities.is_empty() {
        1.0
    } else {
        let padded = heuristics::padded_tokens(&evidence_text(chunks));
        let present = issue
            .entities
            .iter()
            .filter(|e| heuristics::contains_phrase(&padded, e))
            .count();
        present as f32 / issue.entities.len() as f32
    };

    let total_weight = config.score_weight + config.count_weight + config.entity_weight;
    if total_weight <= 0.0 {
        return 0.0;
    }
    let blended =
        config.score_weight * mean_score + config.count_weight * count + config.entity_weight * entity;
    (blended / total_weight).clamp(0.0, 1.0)
}

/// Foreign entity appearing in at least `drift_fraction` of local chunks
pub fn detect_drift(
    chunks: &[Chunk],
    issue: &IssueMap,
    situation: Option<&SituationContext>,
    config: &RetrievalConfig,
) -> Option<String> {
    let local: Vec<&Chunk> = chunks.iter().filter(|c| c.lane == Lane::Local).collect();
    if local.len() < config.drift_min_chunks {
        return None;
    }

    let mut known: Vec<String> = issue.key_terms().iter().map(|t| t.to_lowercase()).collect();
    if let Some(town) = &issue.town {
        known.push(town.to_lowercase());
    }
    if let Some(ctx) = situation {
        known.extend(ctx.terms(1));
    }
    if known.is_empty() {
        return None;
    }

    // Per-chunk distinct foreign names, counted across chunks in first-seen order
    let mut counts: Vec<(String, usize)> = Vec::new();
    for chunk in &local {
        for name in foreign_entities(&chunk.text(), &known, &config.drift_ignore) {
            if heuristics::is_authoritative_text(&name) {
                continue;
            }
            match counts.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
                Some((_, c)) => *c += 1,
                None => counts.push((name, 1)),
            }
        }
    }

    let threshold = (config.drift_fraction * local.len() as f32).ceil() as usize;
    counts
        .into_iter()
        .filter(|(_, c)| *c >= threshold.max(1))
        .max_by_key(|(_, c)| *c)
        .map(|(name, _)| name)
}

pub fn evaluate(
    chunks: &[Chunk],
    issue: &IssueMap,
    situation: Option<&SituationContext>,
    config: &RetrievalConfig,
) -> RetrievalQuality {
    RetrievalQuality {
        confidence: retrieval_confidence(chunks, issue, config),
        alignment: topic_alignment(chunks, issue),
        drift_entity: detect_drift(chunks, issue, situation, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue() -> IssueMap {
        IssueMap {
            town: Some("Hollis".to_string()),
            situation_title: "Constitution Park boardwalk vote".to_string(),
            entities: vec!["Constitution Park".to_string()],
            boards: vec!["Select Board".to_string()],
            ..IssueMap::default()
        }
    }

    #[test]
    fn test_confidence_blend() {
        let config = RetrievalConfig::default();
        let chunks: Vec<Chunk> = (0..8)
            .map(|i| Chunk::new(Lane::Local, format!("Doc {}", i), "Constitution Park repairs", 1.0))
            .collect();
        let c = retrieval_confidence(&chunks, &issue(), &config);
        assert!((c - 1.0).abs() < 1e-6);
        assert_eq!(retrieval_confidence(&[], &issue(), &config), 0.0);
    }

    #[test]
    fn test_alignment() {
        let chunks = vec![Chunk::new(Lane::Local, "Minutes", "The Select Board met.", 0.8)];
        assert_eq!(topic_alignment(&chunks, &issue()), 0.5);
    }

    #[test]
    fn test_drift_detected() {
        let config = RetrievalConfig::default();
        let chunks: Vec<Chunk> = (0..4)
            .map(|i| {
                Chunk::new(
                    Lane::Local,
                    format!("Minutes {}", i),
                    "Riverside Mall parking was discussed; leases for Riverside Mall too.",
                    0.7,
                )
            })
            .collect();
        assert_eq!(
            detect_drift(&chunks, &issue(), None, &config),
            Some("Riverside Mall".to_string())
        );

        let on_topic: Vec<Chunk> = (0..4)
            .map(|i| Chunk::new(Lane::Local, format!("Minutes {}", i), "Constitution Park boardwalk.", 0.7))
            .collect();
        assert_eq!(detect_drift(&on_topic, &issue(), None, &config), None);
    }
}
