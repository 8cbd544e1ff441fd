//! Retrieval plan and the oracle plan decoder.
//!
//! The planner oracle answers with loosely shaped JSON. `decode_plan` turns
//! that into a typed `ParsedPlan` or a `DecodeError`; nothing downstream
//! touches raw oracle output.

use crate::chunk::Lane;
use crate::config::PlannerConfig;
use crate::error::DecodeError;
use crate::heuristics;
use crate::issue::{self, IssueMap, RequestedOutput};
use crate::situation::SituationContext;
use serde::{Deserialize, Serialize};

/// Planner confidence assumed when the oracle omits one
pub const DEFAULT_ORACLE_CONFIDENCE: f32 = 0.6;

/// Which evidence the retrieval and synthesis stages lead with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    LawFirst,
    FactsFirst,
    ProcessFirst,
}

impl Priority {
    /// Lenient parse of oracle labels ("law-first", "LAW_FIRST", "law")
    pub fn from_label(label: &str) -> Option<Self> {
        let norm = label.trim().to_lowercase().replace(['-', ' '], "_");
        match norm.trim_end_matches("_first") {
            "law" | "legal" => Some(Self::LawFirst),
            "facts" | "fact" => Some(Self::FactsFirst),
            "process" | "procedure" => Some(Self::ProcessFirst),
            _ => None,
        }
    }

    /// Default ordering for an issue
    pub fn infer(issue: &IssueMap, high_salience: f32) -> Self {
        match issue.requested_output {
            RequestedOutput::Process => Self::ProcessFirst,
            RequestedOutput::LegalAnalysis => Self::LawFirst,
            _ if issue.legal_salience >= high_salience => Self::LawFirst,
            _ => Self::FactsFirst,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::LawFirst => write!(f, "law-first"),
            Priority::FactsFirst => write!(f, "facts-first"),
            Priority::ProcessFirst => write!(f, "process-first"),
        }
    }
}

/// Queries and budgets for one lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanePlan {
    pub queries: Vec<String>,
    /// Retrieval width passed to the oracle
    pub k: usize,
    /// Maximum chunks kept from this lane
    pub keep: usize,
    /// Evidence floor below which retrieval is considered thin
    pub min_evidence: usize,
}

/// Per-lane retrieval plan, consumed once by the retrieval engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalPlan {
    pub local: LanePlan,
    pub state: LanePlan,
    pub priority: Priority,
    /// True when planner confidence forced the short query lists
    pub conservative: bool,
}

impl RetrievalPlan {
    pub fn lane(&self, lane: Lane) -> &LanePlan {
        match lane {
            Lane::Local => &self.local,
            Lane::State => &self.state,
        }
    }

    /// Upper bound on chunks that can reach synthesis
    pub fn total_keep(&self) -> usize {
        self.local.keep + self.state.keep
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Typed view of the oracle's extraction output, before validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPlan {
    pub town: Option<String>,
    pub situation_title: Option<String>,
    pub entities: Vec<String>,
    pub actions: Vec<String>,
    pub legal_topics: Vec<String>,
    pub boards: Vec<String>,
    pub time_hints: Vec<String>,
    pub requested_output: Option<RequestedOutput>,
    pub legal_salience: Option<f32>,
    pub planner_confidence: Option<f32>,
    pub local_queries: Vec<String>,
    pub state_queries: Vec<String>,
    pub local_k: Option<usize>,
    pub local_keep: Option<usize>,
    pub state_k: Option<usize>,
    pub state_keep: Option<usize>,
    pub min_state_evidence: Option<usize>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLane {
    queries: Vec<String>,
    k: Option<usize>,
    keep: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPlan {
    #[serde(alias = "jurisdiction")]
    town: Option<String>,
    #[serde(alias = "title")]
    situation_title: Option<String>,
    entities: Vec<String>,
    actions: Vec<String>,
    legal_topics: Vec<String>,
    boards: Vec<String>,
    time_hints: Vec<String>,
    requested_output: Option<String>,
    legal_salience: Option<f32>,
    #[serde(alias = "confidence")]
    planner_confidence: Option<f32>,
    local: Option<RawLane>,
    state: Option<RawLane>,
    local_queries: Vec<String>,
    state_queries: Vec<String>,
    min_state_evidence: Option<usize>,
    priority: Option<String>,
}

/// Locate the JSON object in oracle output (bare, fenced, or embedded in prose)
pub fn extract_json(text: &str) -> Result<&str, DecodeError> {
    let t = text.trim();
    if let Some(start) = t.find("```") {
        let body = &t[start + 3..];
        if let Some(end) = body.find("```") {
            let fenced = body[..end].trim_start_matches("json").trim();
            if fenced.starts_with('{') && fenced.ends_with('}') {
                return Ok(fenced);
            }
        }
    }
    match (t.find('{'), t.rfind('}')) {
        (Some(s), Some(e)) if s < e => Ok(&t[s..=e]),
        _ => Err(DecodeError::NoJsonObject),
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let trimmed = item.trim();
        if !trimmed.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(trimmed)) {
            out.push(trimmed.to_string());
        }
    }
    out
}

fn clean_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Decode the planner oracle's raw text
pub fn decode_plan(text: &str) -> Result<ParsedPlan, DecodeError> {
    let json = extract_json(text)?;
    let raw: RawPlan =
        serde_json::from_str(json).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let (local_lane, state_lane) = (raw.local.unwrap_or_default(), raw.state.unwrap_or_default());
    let mut local_queries = raw.local_queries;
    local_queries.extend(local_lane.queries);
    let mut state_queries = raw.state_queries;
    state_queries.extend(state_lane.queries);

    let plan = ParsedPlan {
        town: clean_opt(raw.town),
        situation_title: clean_opt(raw.situation_title),
        entities: clean_list(raw.entities),
        actions: clean_list(raw.actions),
        legal_topics: clean_list(raw.legal_topics),
        boards: clean_list(raw.boards),
        time_hints: clean_list(raw.time_hints),
        requested_output: raw.requested_output.as_deref().and_then(RequestedOutput::from_label),
        legal_salience: raw.legal_salience.map(|s| s.clamp(0.0, 1.0)),
        planner_confidence: raw.planner_confidence.map(|c| c.clamp(0.0, 1.0)),
        local_queries: clean_list(local_queries),
        state_queries: clean_list(state_queries),
        local_k: local_lane.k.filter(|&k| k > 0),
        local_keep: local_lane.keep.filter(|&k| k > 0),
        state_k: state_lane.k.filter(|&k| k > 0),
        state_keep: state_lane.keep.filter(|&k| k > 0),
        min_state_evidence: raw.min_state_evidence,
        priority: raw.priority.as_deref().and_then(Priority::from_label),
    };

    let empty = plan.situation_title.is_none()
        && plan.entities.is_empty()
        && plan.legal_topics.is_empty()
        && plan.boards.is_empty()
        && plan.local_queries.is_empty()
        && plan.state_queries.is_empty();
    if empty {
        return Err(DecodeError::EmptyPlan);
    }
    Ok(plan)
}

// ============================================================================
// Issue map and plan assembly
// ============================================================================

/// Issue map built from a decoded plan, with unverifiable entities split off
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedIssue {
    pub issue: IssueMap,
    pub dropped_entities: Vec<String>,
}

impl ParsedPlan {
    /// Validate entities against the source text and fill gaps heuristically
    pub fn to_issue(
        &self,
        question: &str,
        artifact_text: &str,
        situation: Option<&SituationContext>,
        default_jurisdiction: Option<&str>,
    ) -> ValidatedIssue {
        let source = issue::source_text(question, artifact_text, situation);
        let (entities, dropped_entities) =
            issue::retain_verified_entities(self.entities.clone(), &source);
        let fallback = IssueMap::heuristic(question, artifact_text, situation, default_jurisdiction);

        let legal_salience = self.legal_salience.unwrap_or(fallback.legal_salience);
        let pick = |from_oracle: &Vec<String>, from_heuristic: Vec<String>| {
            if from_oracle.is_empty() {
                from_heuristic
            } else {
                from_oracle.clone()
            }
        };

        let issue = IssueMap {
            town: self.town.clone().or(fallback.town),
            situation_title: self
                .situation_title
                .clone()
                .unwrap_or_else(|| fallback.situation_title.clone()),
            actions: pick(&self.actions, fallback.actions),
            legal_topics: pick(&self.legal_topics, fallback.legal_topics),
            boards: pick(&self.boards, fallback.boards),
            time_hints: pick(&self.time_hints, fallback.time_hints),
            requested_output: self
                .requested_output
                .unwrap_or_else(|| RequestedOutput::infer(question, legal_salience)),
            legal_salience,
            planner_confidence: self.planner_confidence.unwrap_or(DEFAULT_ORACLE_CONFIDENCE),
            entities,
        };

        ValidatedIssue {
            issue,
            dropped_entities,
        }
    }
}

/// Deterministic lane queries from the issue map
///
/// Local queries lead with entities and boards; state queries lead with any
/// statute references in the question, then legal topics.
pub fn heuristic_queries(question: &str, issue: &IssueMap) -> (Vec<String>, Vec<String>) {
    let mut local: Vec<String> = Vec::new();
    let board = issue.boards.first().cloned().unwrap_or_default();
    for entity in &issue.entities {
        if board.is_empty() || entity.eq_ignore_ascii_case(&board) {
            local.push(entity.clone());
        } else {
            local.push(format!("{} {}", board, entity));
        }
    }
    for action in &issue.actions {
        if let Some(entity) = issue.entities.first() {
            local.push(format!("{} {}", entity, action));
        }
    }
    if local.is_empty() {
        local.push(issue.situation_title.clone());
    }

    let mut state: Vec<String> = heuristics::find_statute_references(question)
        .into_iter()
        .map(|r| r.text)
        .collect();
    state.extend(issue.legal_topics.iter().cloned());
    if state.is_empty() {
        if let Some(board) = issue.boards.first() {
            state.push(format!("{} authority", board));
        }
        state.push(issue.situation_title.clone());
    }

    (clean_list(local), clean_list(state))
}

/// Assemble the retrieval plan, applying defaults, floors and conservative mode
pub fn build_retrieval_plan(
    question: &str,
    issue: &IssueMap,
    parsed: Option<&ParsedPlan>,
    config: &PlannerConfig,
) -> RetrievalPlan {
    let (heuristic_local, heuristic_state) = heuristic_queries(question, issue);
    let (mut local_queries, mut state_queries) = match parsed {
        Some(p) => (p.local_queries.clone(), p.state_queries.clone()),
        None => (Vec::new(), Vec::new()),
    };
    if local_queries.is_empty() {
        local_queries = heuristic_local;
    }
    if state_queries.is_empty() {
        state_queries = heuristic_state;
    }

    let conservative = issue.planner_confidence < config.conservative_confidence;
    let cap = if conservative {
        config.conservative_max_queries
    } else {
        config.max_queries_per_lane
    };
    local_queries.truncate(cap);
    state_queries.truncate(cap);

    let mut min_state = parsed
        .and_then(|p| p.min_state_evidence)
        .unwrap_or(config.min_state_evidence);
    if issue.legal_salience >= config.high_salience {
        min_state = min_state.max(config.high_salience_min_state_evidence);
    }

    let priority = parsed
        .and_then(|p| p.priority)
        .unwrap_or_else(|| Priority::infer(issue, config.high_salience));

    RetrievalPlan {
        local: LanePlan {
            queries: local_queries,
            k: parsed.and_then(|p| p.local_k).unwrap_or(config.default_k),
            keep: parsed.and_then(|p| p.local_keep).unwrap_or(config.default_keep),
            min_evidence: config.min_local_evidence,
        },
        state: LanePlan {
            queries: state_queries,
            k: parsed.and_then(|p| p.state_k).unwrap_or(config.default_k),
            keep: parsed.and_then(|p| p.state_keep).unwrap_or(config.default_keep),
            min_evidence: min_state,
        },
        priority,
        conservative,
    }
}
