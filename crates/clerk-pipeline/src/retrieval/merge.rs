//! Lane merge, dedupe and situation re-ranking.

use crate::oracle::DocumentReference;
use clerk_shared::chunk::dedupe_by_title;
use clerk_shared::config::RetrievalConfig;
use clerk_shared::{Chunk, Lane, SituationContext};

/// Score step used when the oracle reports no relevance score
const RANK_DECAY: f32 = 0.05;
const MIN_FALLBACK_SCORE: f32 = 0.05;

/// Convert one lane's references to chunks, capped at `keep`
pub fn to_chunks(lane: Lane, docs: Vec<DocumentReference>, keep: usize) -> Vec<Chunk> {
    docs.into_iter()
        .take(keep)
        .enumerate()
        .map(|(rank, doc)| {
            let score = doc
                .score
                .unwrap_or_else(|| (1.0 - rank as f32 * RANK_DECAY).max(MIN_FALLBACK_SCORE))
                .clamp(0.0, 1.0);
            let mut chunk = Chunk::new(lane, doc.title, doc.content, score);
            if !doc.id.is_empty() {
                chunk = chunk.with_document(doc.id);
            }
            chunk
        })
        .collect()
}

/// Concatenate lanes in priority order, then dedupe by normalized title
///
/// Authority-first puts the state lane ahead when the question itself cites a statute.
pub fn merge_lanes(local: Vec<Chunk>, state: Vec<Chunk>, authority_first: bool) -> Vec<Chunk> {
    let merged: Vec<Chunk> = if authority_first {
        state.into_iter().chain(local).collect()
    } else {
        local.into_iter().chain(state).collect()
    };
    dedupe_by_title(merged)
}

/// Re-rank against a gated-in anchor and cap at `cap` chunks
///
/// Ranked by `score + situation_weight * match`. At least
/// `ceil(min_on_topic_fraction * len)` of the kept chunks are on-topic when
/// that many on-topic chunks exist, even if off-topic chunks scored higher.
pub fn rerank_with_situation(
    chunks: Vec<Chunk>,
    situation: &SituationContext,
    config: &RetrievalConfig,
    min_keyword_len: usize,
    cap: usize,
) -> Vec<Chunk> {
    let mut ranked: Vec<(f32, bool, Chunk)> = chunks
        .into_iter()
        .map(|chunk| {
            let m = situation.match_score(&chunk.text(), min_keyword_len);
            let adjusted = chunk.score + config.situation_weight * m;
            (adjusted, m > config.on_topic_threshold, chunk)
        })
        .collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let keep = cap.min(ranked.len());
    let on_topic_total = ranked.iter().filter(|r| r.1).count();
    let reserved = ((config.min_on_topic_fraction * keep as f32).ceil() as usize).min(on_topic_total);

    let mut selected: Vec<bool> = ranked.iter().enumerate().map(|(i, _)| i < keep).collect();
    let mut on_topic_selected = ranked[..keep].iter().filter(|r| r.1).count();

    // Swap the lowest off-topic pick for the best unselected on-topic chunk
    while on_topic_selected < reserved {
        let Some(out_idx) = (0..keep).rev().find(|&i| selected[i] && !ranked[i].1) else {
            break;
        };
        let Some(in_idx) = (keep..ranked.len()).find(|&i| !selected[i] && ranked[i].1) else {
            break;
        };
        selected[out_idx] = false;
        selected[in_idx] = true;
        on_topic_selected += 1;
    }

    ranked
        .into_iter()
        .zip(selected)
        .filter(|(_, picked)| *picked)
        .map(|((_, _, chunk), _)| chunk)
        .collect()
}

/// Fraction of chunks whose anchor match exceeds the on-topic threshold
pub fn on_topic_fraction(
    chunks: &[Chunk],
    situation: &SituationContext,
    config: &RetrievalConfig,
    min_keyword_len: usize,
) -> f32 {
    if chunks.is_empty() {
        return 0.0;
    }
    let on_topic = chunks
        .iter()
        .filter(|c| situation.match_score(&c.text(), min_keyword_len) > config.on_topic_threshold)
        .count();
    on_topic as f32 / chunks.len() as f32
}
