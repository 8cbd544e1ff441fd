//! Lane query construction.
//!
//! Each pass sends exactly one query string per lane. The local query is
//! biased toward the jurisdiction (town, boards, document-type hints); the
//! state query toward statutes and official guidance (anchor terms).

use clerk_shared::config::RetrievalConfig;
use clerk_shared::{IssueMap, Lane, RetrievalPlan};

/// Append `term` unless an equal term (case-insensitive) is already present
fn push_unique(parts: &mut Vec<String>, term: &str) {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return;
    }
    if !parts.iter().any(|p| p.eq_ignore_ascii_case(trimmed)) {
        parts.push(trimmed.to_string());
    }
}

/// First-pass query for a lane
pub fn lane_query(lane: Lane, plan: &RetrievalPlan, issue: &IssueMap, config: &RetrievalConfig) -> String {
    let mut parts: Vec<String> = Vec::new();
    match lane {
        Lane::Local => {
            if let Some(town) = &issue.town {
                push_unique(&mut parts, town);
            }
            for board in &issue.boards {
                push_unique(&mut parts, board);
            }
            for query in &plan.local.queries {
                push_unique(&mut parts, query);
            }
            for hint in &config.local_doc_hints {
                push_unique(&mut parts, hint);
            }
        }
        Lane::State => {
            for query in &plan.state.queries {
                push_unique(&mut parts, query);
            }
            for term in &config.state_anchor_terms {
                push_unique(&mut parts, term);
            }
        }
    }
    parts.join(" ")
}

/// Escalation query: first-pass query qualified by entities, boards and dates
pub fn escalation_query(
    lane: Lane,
    plan: &RetrievalPlan,
    issue: &IssueMap,
    config: &RetrievalConfig,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    for entity in &issue.entities {
        push_unique(&mut parts, &format!("\"{}\"", entity));
    }
    match lane {
        Lane::Local => {
            for board in &issue.boards {
                push_unique(&mut parts, board);
            }
            for hint in &issue.time_hints {
                push_unique(&mut parts, hint);
            }
            for action in &issue.actions {
                push_unique(&mut parts, action);
            }
        }
        Lane::State => {
            for topic in &issue.legal_topics {
                push_unique(&mut parts, topic);
            }
        }
    }
    let base = lane_query(lane, plan, issue, config);
    if parts.is_empty() {
        return base;
    }
    format!("{} {}", parts.join(" "), base)
}
