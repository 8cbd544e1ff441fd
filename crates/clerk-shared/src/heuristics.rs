//! Table-driven text classifiers.
//!
//! Every classifier is a pure function over a pattern table so it can be
//! tested without the generation oracle. The planner fallback, the situation
//! gate, retrieval drift checks and the auditor all share these tables.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Statute-style references: RSA 91-A:3, 41:14-a, § 12, chapter 32
static STATUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
          (?i:\bR\.?S\.?A\.?)\s*\d{1,3}(?:-[A-Za-z])?(?::\d+(?:-[A-Za-z]+)?(?:,\s*[IVX]+)?)?
        | \b\d{1,3}-[A-Z]:\d+(?:-[a-z])?\b
        | \b\d{1,3}:\d{1,3}-[a-z]\b
        | §\s*\d+(?:[.\-]\d+)*
        | (?i:\bchapter)\s+\d{1,3}(?:-[A-Z])?\b
        ",
    )
    .expect("statute pattern")
});

/// Capitalized multi-word names ("Constitution Park", "Board of Selectmen")
static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z'\-]+(?:\s+(?:of\s+|the\s+|and\s+)?[A-Z][A-Za-z'\-]+)+")
        .expect("name pattern")
});

static QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"\n]{3,60})""#).expect("quoted pattern"));

static JURISDICTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[Tt]own|[Cc]ity|[Vv]illage) of ([A-Z][A-Za-z]+(?:\s[A-Z][A-Za-z]+)?)")
        .expect("jurisdiction pattern")
});

static TIME_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)(?:\s+\d{1,2})?(?:,?\s+\d{4})?",
        r"\b(?:19|20)\d{2}\b",
        r"(?i)\b(?:last|this|next)\s+(?:week|month|year|meeting|spring|summer|fall|winter)\b",
        r"(?i)\b(?:yesterday|today|recently)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("time pattern"))
    .collect()
});

/// Leading capitalized words that start sentences, not names
const NAME_LEADERS: &[&str] = &[
    "What", "When", "Where", "Why", "How", "Who", "Which", "Did", "Does", "Do", "Is", "Are",
    "Was", "Were", "Can", "Could", "Should", "Would", "The", "A", "An", "In", "On", "At", "If",
    "And", "But", "Under", "After", "Before", "Since", "Per",
];

const STOPWORDS: &[&str] = &[
    "what", "when", "where", "which", "that", "this", "with", "from", "have", "about", "there",
    "their", "they", "them", "would", "could", "should", "does", "were", "been", "will", "into",
    "after", "before", "over", "under", "town", "city", "then", "than", "also", "some", "your",
    "said", "says", "just", "like", "more", "most", "only", "very", "whether",
];

/// Keyword domain of a question or situation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Budget,
    Zoning,
    Personnel,
    Elections,
    Facilities,
    Records,
    Schools,
    Environment,
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Domain::Budget => "budget",
            Domain::Zoning => "zoning",
            Domain::Personnel => "personnel",
            Domain::Elections => "elections",
            Domain::Facilities => "facilities",
            Domain::Records => "records",
            Domain::Schools => "schools",
            Domain::Environment => "environment",
        };
        write!(f, "{}", s)
    }
}

/// Domain keyword sets. Order breaks ties.
const DOMAIN_TABLE: &[(Domain, &[&str])] = &[
    (
        Domain::Budget,
        &[
            "budget", "appropriation", "tax rate", "fiscal", "expenditure", "revenue", "levy",
            "bond", "capital reserve", "default budget", "spending",
        ],
    ),
    (
        Domain::Zoning,
        &[
            "zoning", "variance", "special exception", "planning board", "site plan",
            "subdivision", "setback", "land use", "ordinance",
        ],
    ),
    (
        Domain::Personnel,
        &[
            "personnel", "employee", "hire", "hired", "fired", "termination", "salary", "wages",
            "police chief", "administrator", "resign", "resigned",
        ],
    ),
    (
        Domain::Elections,
        &["election", "ballot", "candidate", "voter", "voters", "polling", "recount", "absentee"],
    ),
    (
        Domain::Facilities,
        &[
            "park", "boardwalk", "road", "bridge", "building", "construction", "playground",
            "trail", "culvert", "paving",
        ],
    ),
    (
        Domain::Records,
        &["right-to-know", "91-a", "public records", "records request", "nonpublic"],
    ),
    (Domain::Schools, &["school", "teacher", "superintendent", "curriculum"]),
    (
        Domain::Environment,
        &["wetland", "wetlands", "conservation", "septic", "water quality", "shoreland"],
    ),
];

const BOARD_TABLE: &[(&str, &str)] = &[
    ("select board", "Select Board"),
    ("selectboard", "Select Board"),
    ("board of selectmen", "Select Board"),
    ("selectmen", "Select Board"),
    ("planning board", "Planning Board"),
    ("zoning board of adjustment", "Zoning Board of Adjustment"),
    ("zoning board", "Zoning Board of Adjustment"),
    ("zba", "Zoning Board of Adjustment"),
    ("budget committee", "Budget Committee"),
    ("conservation commission", "Conservation Commission"),
    ("school board", "School Board"),
    ("city council", "City Council"),
    ("town council", "Town Council"),
    ("board of health", "Board of Health"),
    ("historic district commission", "Historic District Commission"),
    ("library trustees", "Library Trustees"),
];

const LEGAL_TOPIC_TABLE: &[(&[&str], &str)] = &[
    (
        &["right-to-know", "right to know", "91-a", "public records", "records request"],
        "public records",
    ),
    (&["nonpublic", "non-public", "executive session"], "nonpublic sessions"),
    (&["conflict of interest", "recuse", "recusal"], "conflict of interest"),
    (&["variance", "special exception"], "zoning relief"),
    (&["quorum"], "quorum"),
    (&["warrant article", "town meeting", "deliberative session"], "town meeting procedure"),
    (
        &["meeting notice", "posted notice", "notice of meeting", "open meeting"],
        "meeting notice",
    ),
    (&["appeal", "rehearing"], "appeals"),
    (&["election", "ballot", "recount"], "election law"),
    (&["appropriation", "default budget", "budget"], "municipal finance"),
    (&["eminent domain"], "eminent domain"),
    (&["minutes"], "meeting minutes"),
];

const LEGAL_WORDS: &[&str] = &[
    "legal", "illegal", "lawful", "unlawful", "allowed", "permitted", "required", "statute",
    "law", "violate", "violated", "violation", "comply", "compliance", "authority", "rsa",
];

const ACTION_WORDS: &[&str] = &[
    "voted", "vote", "approved", "approve", "denied", "deny", "tabled", "adopted", "rejected",
    "appointed", "hired", "fired", "amended", "decided", "decide", "postponed", "awarded",
    "signed", "passed",
];

/// Generic back-references to the previous topic
pub const GENERIC_BACKREFS: &[&str] = &[
    "that vote", "the vote", "that project", "the project", "that meeting", "the meeting",
    "that decision", "the decision", "that issue", "this issue", "the proposal",
    "that proposal", "that article", "that hearing", "the hearing", "that case", "follow up",
    "follow-up", "what happened next", "same issue",
];

/// Phrases that signal the user is leaving the current situation
pub const BROADENING_PHRASES: &[&str] = &[
    "in general", "generally speaking", "new question", "different question", "new topic",
    "unrelated", "switching gears", "change of subject", "another topic", "any town",
];

/// Words that mark a concrete civic event
pub const EVENT_MARKERS: &[&str] = &[
    "vote", "voted", "meeting", "hearing", "decision", "approved", "denied", "election",
    "lawsuit", "appeal", "petition", "warrant", "contract", "resignation", "complaint",
];

/// Governing-body nouns shared by most local questions; they never tie a
/// question to one situation on their own
pub const GENERIC_BODY_WORDS: &[&str] = &[
    "board", "boards", "committee", "commission", "council", "department", "office", "trustees",
];

const REGULATORY_BODIES: &[&str] = &[
    "attorney general", "secretary of state", "department of revenue administration",
    "supreme court", "superior court", "public utilities commission",
    "department of environmental services", "office of the ombudsman",
];

const GUIDANCE_MARKERS: &[&str] = &[
    "official guidance", "advisory opinion", "memorandum", "handbook", "administrative rule",
    "admin. r.", "rulemaking", "legislative history",
];

/// Lowercase, punctuation-free text padded with spaces for whole-token matching
pub fn padded_tokens(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { ' ' })
        .collect();
    let joined = cleaned
        .split_whitespace()
        .map(|w| w.trim_matches('.'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!(" {} ", joined)
}

/// Whole-token phrase match against `padded_tokens` output
pub fn contains_phrase(padded: &str, phrase: &str) -> bool {
    let needle = padded_tokens(phrase);
    !needle.trim().is_empty() && padded.contains(&needle)
}

/// Significant lowercase words (length and stopword filtered), in order, deduplicated
pub fn significant_words(text: &str, min_len: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in padded_tokens(text).split_whitespace() {
        if word.chars().count() < min_len || STOPWORDS.contains(&word) {
            continue;
        }
        if !out.iter().any(|w| w == word) {
            out.push(word.to_string());
        }
    }
    out
}

/// Detect the dominant keyword domain, if any keyword matches
pub fn detect_domain(text: &str) -> Option<Domain> {
    let padded = padded_tokens(text);
    let mut best: Option<(Domain, usize)> = None;
    for (domain, keywords) in DOMAIN_TABLE {
        let hits = keywords.iter().filter(|k| contains_phrase(&padded, k)).count();
        if hits == 0 {
            continue;
        }
        match best {
            Some((_, best_hits)) if best_hits >= hits => {}
            _ => best = Some((*domain, hits)),
        }
    }
    best.map(|(d, _)| d)
}

/// A statute-style reference located in text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatuteRef {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// All statute-style references, in order
pub fn find_statute_references(text: &str) -> Vec<StatuteRef> {
    STATUTE_RE
        .find_iter(text)
        .map(|m| StatuteRef {
            start: m.start(),
            end: m.end(),
            text: m.as_str().trim().to_string(),
        })
        .collect()
}

pub fn contains_statute_reference(text: &str) -> bool {
    STATUTE_RE.is_match(text)
}

/// Capitalized multi-word names and quoted phrases, surface form preserved
pub fn extract_named_entities(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |candidate: &str| {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return;
        }
        if !out.iter().any(|e| e.eq_ignore_ascii_case(trimmed)) {
            out.push(trimmed.to_string());
        }
    };

    for m in NAME_RE.find_iter(text) {
        let mut words: Vec<&str> = m.as_str().split_whitespace().collect();
        while let Some(first) = words.first() {
            if NAME_LEADERS.contains(first) || matches!(*first, "of" | "the" | "and") {
                words.remove(0);
            } else {
                break;
            }
        }
        // connector words cannot end a name
        while let Some(last) = words.last() {
            if matches!(*last, "of" | "the" | "and") {
                words.pop();
            } else {
                break;
            }
        }
        if words.len() >= 2 {
            push(&words.join(" "));
        }
    }
    for cap in QUOTED_RE.captures_iter(text) {
        push(&cap[1]);
    }
    out
}

/// Boards mentioned, canonical names, first-seen order
pub fn detect_boards(text: &str) -> Vec<String> {
    let padded = padded_tokens(text);
    let mut out: Vec<String> = Vec::new();
    for (pattern, canonical) in BOARD_TABLE {
        if contains_phrase(&padded, pattern) && !out.iter().any(|b| b == canonical) {
            out.push(canonical.to_string());
        }
    }
    out
}

/// Legal topic labels in table order
pub fn detect_legal_topics(text: &str) -> Vec<String> {
    let padded = padded_tokens(text);
    LEGAL_TOPIC_TABLE
        .iter()
        .filter(|(patterns, _)| patterns.iter().any(|p| contains_phrase(&padded, p)))
        .map(|(_, label)| label.to_string())
        .collect()
}

/// Action words in order of appearance
pub fn detect_actions(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in padded_tokens(text).split_whitespace() {
        if ACTION_WORDS.contains(&word) && !out.iter().any(|a| a == word) {
            out.push(word.to_string());
        }
    }
    out
}

/// Dates, years and relative time phrases
pub fn detect_time_hints(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    for re in TIME_RES.iter() {
        for m in re.find_iter(text) {
            let overlaps = found
                .iter()
                .any(|(start, s)| m.start() < start + s.len() && *start < m.end());
            if !overlaps {
                found.push((m.start(), m.as_str().trim().to_string()));
            }
        }
    }
    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, s)| s).collect()
}

/// "Town of X" style jurisdiction mention
pub fn detect_jurisdiction(text: &str) -> Option<String> {
    JURISDICTION_RE.captures(text).map(|c| c[1].to_string())
}

/// Legal salience in [0, 1]
///
/// Statute reference 0.4, legal topics 0.15 each (max 0.3), legal words 0.1
/// each (max 0.3).
pub fn legal_salience(text: &str) -> f32 {
    let padded = padded_tokens(text);
    let mut score = 0.0f32;
    if contains_statute_reference(text) {
        score += 0.4;
    }
    score += (detect_legal_topics(text).len() as f32 * 0.15).min(0.3);
    let word_hits = LEGAL_WORDS.iter().filter(|w| contains_phrase(&padded, w)).count();
    score += (word_hits as f32 * 0.1).min(0.3);
    score.clamp(0.0, 1.0)
}

pub fn has_generic_backreference(text: &str) -> bool {
    let padded = padded_tokens(text);
    GENERIC_BACKREFS.iter().any(|p| contains_phrase(&padded, p))
}

pub fn has_broadening_signal(text: &str) -> bool {
    let padded = padded_tokens(text);
    BROADENING_PHRASES.iter().any(|p| contains_phrase(&padded, p))
}

pub fn has_event_marker(text: &str) -> bool {
    let padded = padded_tokens(text);
    EVENT_MARKERS.iter().any(|p| contains_phrase(&padded, p))
}

/// Statute citation, named regulatory body, or official-guidance marker
pub fn is_authoritative_text(text: &str) -> bool {
    if contains_statute_reference(text) {
        return true;
    }
    let padded = padded_tokens(text);
    REGULATORY_BODIES
        .iter()
        .chain(GUIDANCE_MARKERS.iter())
        .any(|p| contains_phrase(&padded, p))
}
