//! Citation token grammar: `[L#]` local, `[S#]` authoritative, `[USER]`.

use crate::chunk::Lane;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CITATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:([LS])(\d{1,3})|USER)\]").expect("citation pattern"));

/// One citation token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum CitationToken {
    Local(usize),
    State(usize),
    User,
}

impl CitationToken {
    /// Token for the 1-based evidence index within a lane
    pub fn for_lane(lane: Lane, index: usize) -> Self {
        match lane {
            Lane::Local => Self::Local(index),
            Lane::State => Self::State(index),
        }
    }

    pub fn lane(&self) -> Option<Lane> {
        match self {
            Self::Local(_) => Some(Lane::Local),
            Self::State(_) => Some(Lane::State),
            Self::User => None,
        }
    }
}

impl std::fmt::Display for CitationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(n) => write!(f, "[L{}]", n),
            Self::State(n) => write!(f, "[S{}]", n),
            Self::User => write!(f, "[USER]"),
        }
    }
}

/// A token with its byte span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CitationSpan {
    pub token: CitationToken,
    pub start: usize,
    pub end: usize,
}

/// Every token occurrence, in order
pub fn find_citations(text: &str) -> Vec<CitationSpan> {
    CITATION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let token = match (caps.get(1), caps.get(2)) {
                (Some(prefix), Some(num)) => {
                    let n: usize = num.as_str().parse().ok()?;
                    if prefix.as_str() == "L" {
                        CitationToken::Local(n)
                    } else {
                        CitationToken::State(n)
                    }
                }
                _ => CitationToken::User,
            };
            Some(CitationSpan {
                token,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Distinct tokens used, first-seen order
pub fn extract_citations(text: &str) -> Vec<CitationToken> {
    let mut out: Vec<CitationToken> = Vec::new();
    for span in find_citations(text) {
        if !out.contains(&span.token) {
            out.push(span.token);
        }
    }
    out
}

/// Occurrences of authoritative tokens
pub fn count_state_citations(text: &str) -> usize {
    find_citations(text)
        .iter()
        .filter(|s| matches!(s.token, CitationToken::State(_)))
        .count()
}

/// Word made only of tokens, ignoring edge punctuation
pub fn is_citation_token(word: &str) -> bool {
    let trimmed = word.trim_matches(|c: char| c == ',' || c == '.' || c == ';' || c == ':');
    CITATION_RE.is_match(trimmed) && CITATION_RE.replace_all(trimmed, "").is_empty()
}

/// Text with all tokens removed and whitespace collapsed
pub fn strip_citations(text: &str) -> String {
    CITATION_RE
        .replace_all(text, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
