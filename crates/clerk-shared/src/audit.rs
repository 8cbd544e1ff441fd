//! Answer auditor.
//!
//! Checks generated text against the answer policy without calling the
//! oracle. Error-severity violations trigger the single repair pass;
//! warnings are logged and never block.

use crate::answer_text::{self, ParsedAnswer};
use crate::citation::{self, CitationToken};
use crate::config::AuditConfig;
use crate::heuristics;
use crate::issue::IssueMap;
use crate::policy::{AnswerPolicy, HEADING_RULES};
use crate::situation::SituationContext;
use serde::{Deserialize, Serialize};

/// Longest excerpt carried on a violation
const EXCERPT_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Length, heading, bullet count or bullet length
    FormatViolation,
    MissingStateCitations,
    UncitedReference,
    /// Citation index with no matching evidence
    UnknownCitation,
    UserCitationMisplaced,
    AbsoluteLanguage,
    BannedPhrase,
    OffTopicDrift,
}

impl ViolationKind {
    pub fn severity(&self) -> Severity {
        match self {
            ViolationKind::AbsoluteLanguage
            | ViolationKind::BannedPhrase
            | ViolationKind::OffTopicDrift => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ViolationKind::FormatViolation => "format_violation",
            ViolationKind::MissingStateCitations => "missing_state_citations",
            ViolationKind::UncitedReference => "uncited_reference",
            ViolationKind::UnknownCitation => "unknown_citation",
            ViolationKind::UserCitationMisplaced => "user_citation_misplaced",
            ViolationKind::AbsoluteLanguage => "absolute_language",
            ViolationKind::BannedPhrase => "banned_phrase",
            ViolationKind::OffTopicDrift => "off_topic_drift",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditViolation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    pub excerpt: String,
}

impl AuditViolation {
    fn new(kind: ViolationKind, message: impl Into<String>, excerpt: &str) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
            excerpt: excerpt_of(excerpt),
        }
    }
}

/// Batch of violations for one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResult {
    pub violations: Vec<AuditViolation>,
    /// Machine-readable summary of failed rules, present when not passed
    pub repair_hint: Option<String>,
    /// No error-severity violations
    pub passed: bool,
}

impl AuditResult {
    fn from_violations(violations: Vec<AuditViolation>) -> Self {
        let passed = !violations.iter().any(|v| v.severity == Severity::Error);
        let repair_hint = if passed {
            None
        } else {
            Some(build_repair_hint(&violations))
        };
        Self {
            violations,
            repair_hint,
            passed,
        }
    }

    pub fn error_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.violations.len() - self.error_count()
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }

    pub fn has(&self, kind: ViolationKind) -> bool {
        self.count(kind) > 0
    }
}

/// Everything the auditor needs besides the text
#[derive(Debug, Clone, Copy)]
pub struct AuditContext<'a> {
    pub policy: &'a AnswerPolicy,
    pub config: &'a AuditConfig,
    /// Evidence items per lane, bounding valid citation indices
    pub local_evidence: usize,
    pub state_evidence: usize,
    /// Gated-in anchor, if any
    pub situation: Option<&'a SituationContext>,
    pub issue: &'a IssueMap,
    /// Names never treated as drift
    pub drift_ignore: &'a [String],
}

pub fn audit_answer(text: &str, ctx: &AuditContext<'_>) -> AuditResult {
    let mut violations = Vec::new();
    let parsed = answer_text::parse_answer(text);

    check_length(text, ctx.policy, &mut violations);
    if ctx.policy.is_sectioned() {
        check_structure(&parsed, ctx.policy, &mut violations);
    }
    check_state_citations(text, &parsed, ctx.policy, &mut violations);
    check_uncited_references(text, ctx.config.citation_neighborhood, &mut violations);
    check_citation_indices(text, ctx, &mut violations);
    if ctx.policy.is_sectioned() {
        check_user_citations(&parsed, ctx.policy, &mut violations);
    }
    check_phrases(text, ctx.config, &mut violations);
    if let Some(situation) = ctx.situation {
        check_drift(text, situation, ctx, &mut violations);
    }

    AuditResult::from_violations(violations)
}

// ============================================================================
// Rules
// ============================================================================

fn check_length(text: &str, policy: &AnswerPolicy, out: &mut Vec<AuditViolation>) {
    let words = answer_text::answer_word_count(text);
    if words > policy.word_cap {
        out.push(AuditViolation::new(
            ViolationKind::FormatViolation,
            format!("answer has {} words, cap is {}", words, policy.word_cap),
            "",
        ));
    }
    let chars = text.chars().count();
    if chars > policy.max_chars {
        out.push(AuditViolation::new(
            ViolationKind::FormatViolation,
            format!("answer has {} characters, cap is {}", chars, policy.max_chars),
            "",
        ));
    }
}

fn check_structure(parsed: &ParsedAnswer, policy: &AnswerPolicy, out: &mut Vec<AuditViolation>) {
    // headings present and in order
    let mut last_pos: Option<usize> = None;
    for spec in &policy.sections {
        let pos = parsed
            .sections
            .iter()
            .position(|s| answer_text::heading_matches(&s.heading, &spec.heading));
        match pos {
            None => out.push(AuditViolation::new(
                ViolationKind::FormatViolation,
                format!("missing heading '{}'", spec.heading),
                "",
            )),
            Some(p) => {
                if last_pos.is_some_and(|lp| p < lp) {
                    out.push(AuditViolation::new(
                        ViolationKind::FormatViolation,
                        format!("heading '{}' out of order", spec.heading),
                        &parsed.sections[p].heading,
                    ));
                }
                last_pos = Some(p);
            }
        }
    }

    for section in &parsed.sections {
        let Some(spec) = policy.section(&section.heading) else {
            out.push(AuditViolation::new(
                ViolationKind::FormatViolation,
                format!("unexpected heading '{}'", section.heading),
                &section.heading,
            ));
            continue;
        };
        let bullets = section.bullets();
        if spec.prose_only && !bullets.is_empty() {
            out.push(AuditViolation::new(
                ViolationKind::FormatViolation,
                format!("'{}' must be prose, found {} bullets", spec.heading, bullets.len()),
                bullets[0],
            ));
        } else if bullets.len() > spec.max_bullets {
            out.push(AuditViolation::new(
                ViolationKind::FormatViolation,
                format!(
                    "'{}' has {} bullets, limit is {}",
                    spec.heading,
                    bullets.len(),
                    spec.max_bullets
                ),
                bullets[spec.max_bullets],
            ));
        }
        for bullet in bullets {
            let words = answer_text::content_word_count(bullet);
            if words > policy.bullet_word_limit {
                out.push(AuditViolation::new(
                    ViolationKind::FormatViolation,
                    format!("bullet has {} words, limit is {}", words, policy.bullet_word_limit),
                    bullet,
                ));
            }
        }
    }
}

fn check_state_citations(
    text: &str,
    parsed: &ParsedAnswer,
    policy: &AnswerPolicy,
    out: &mut Vec<AuditViolation>,
) {
    if policy.required_state_citations == 0 {
        return;
    }
    let scope = if policy.is_sectioned() {
        parsed.find(HEADING_RULES).map(|s| s.body()).unwrap_or_default()
    } else {
        text.to_string()
    };
    let found = citation::count_state_citations(&scope);
    if found < policy.required_state_citations {
        let place = if policy.is_sectioned() { HEADING_RULES } else { "answer" };
        out.push(AuditViolation::new(
            ViolationKind::MissingStateCitations,
            format!(
                "{} has {} [S#] citations, needs {}",
                place, found, policy.required_state_citations
            ),
            &scope,
        ));
    }
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn check_uncited_references(text: &str, neighborhood: usize, out: &mut Vec<AuditViolation>) {
    let state_spans: Vec<_> = citation::find_citations(text)
        .into_iter()
        .filter(|s| matches!(s.token, CitationToken::State(_)))
        .collect();

    for reference in heuristics::find_statute_references(text) {
        let lo = floor_boundary(text, reference.start.saturating_sub(neighborhood));
        let hi = ceil_boundary(text, (reference.end + neighborhood).min(text.len()));
        let cited = state_spans.iter().any(|s| s.start >= lo && s.end <= hi);
        if !cited {
            out.push(AuditViolation::new(
                ViolationKind::UncitedReference,
                format!("'{}' has no [S#] citation nearby", reference.text),
                &text[lo..hi],
            ));
        }
    }
}

fn check_citation_indices(text: &str, ctx: &AuditContext<'_>, out: &mut Vec<AuditViolation>) {
    for token in citation::extract_citations(text) {
        let valid = match token {
            CitationToken::Local(n) => n >= 1 && n <= ctx.local_evidence,
            CitationToken::State(n) => n >= 1 && n <= ctx.state_evidence,
            CitationToken::User => true,
        };
        if !valid {
            out.push(AuditViolation::new(
                ViolationKind::UnknownCitation,
                format!("{} does not match any retrieved evidence", token),
                &token.to_string(),
            ));
        }
    }
}

fn check_user_citations(parsed: &ParsedAnswer, policy: &AnswerPolicy, out: &mut Vec<AuditViolation>) {
    let user = CitationToken::User.to_string();
    let mut misplaced: Vec<&str> = parsed
        .preamble
        .iter()
        .filter(|l| l.contains(&user))
        .map(String::as_str)
        .collect();
    for section in &parsed.sections {
        let allowed = policy
            .section(&section.heading)
            .map(|s| s.allows_user_citation)
            .unwrap_or(false);
        if !allowed {
            misplaced.extend(section.lines.iter().filter(|l| l.contains(&user)).map(String::as_str));
        }
    }
    for line in misplaced {
        out.push(AuditViolation::new(
            ViolationKind::UserCitationMisplaced,
            "[USER] citation outside the timeline",
            line,
        ));
    }
}

fn check_phrases(text: &str, config: &AuditConfig, out: &mut Vec<AuditViolation>) {
    let padded = heuristics::padded_tokens(text);
    for phrase in &config.absolute_phrases {
        if heuristics::contains_phrase(&padded, phrase) {
            out.push(AuditViolation::new(
                ViolationKind::AbsoluteLanguage,
                format!("unqualified certainty: '{}'", phrase),
                phrase,
            ));
        }
    }
    for phrase in &config.banned_phrases {
        if heuristics::contains_phrase(&padded, phrase) {
            out.push(AuditViolation::new(
                ViolationKind::BannedPhrase,
                format!("disallowed phrase: '{}'", phrase),
                phrase,
            ));
        }
    }
}

fn check_drift(
    text: &str,
    situation: &SituationContext,
    ctx: &AuditContext<'_>,
    out: &mut Vec<AuditViolation>,
) {
    let body = answer_text::body_text(text);
    let mut known = situation.terms(1);
    known.extend(ctx.issue.key_terms().iter().map(|t| t.to_lowercase()));
    if let Some(town) = &ctx.issue.town {
        known.push(town.to_lowercase());
    }

    for name in foreign_entities(&body, &known, ctx.drift_ignore) {
        let padded = heuristics::padded_tokens(&body);
        let needle = heuristics::padded_tokens(&name);
        let mentions = padded.matches(needle.as_str()).count();
        if mentions >= ctx.config.drift_min_mentions {
            out.push(AuditViolation::new(
                ViolationKind::OffTopicDrift,
                format!("'{}' is outside the current situation ({} mentions)", name, mentions),
                &name,
            ));
        }
    }
}

/// Named entities in `text` sharing no word with `known` or `ignore`
pub fn foreign_entities(text: &str, known: &[String], ignore: &[String]) -> Vec<String> {
    let known_words: Vec<String> = known
        .iter()
        .flat_map(|k| heuristics::significant_words(k, 3))
        .collect();
    heuristics::extract_named_entities(text)
        .into_iter()
        .filter(|name| !ignore.iter().any(|i| i.eq_ignore_ascii_case(name)))
        .filter(|name| heuristics::detect_boards(name).is_empty())
        .filter(|name| {
            !heuristics::significant_words(name, 3)
                .iter()
                .any(|w| known_words.contains(w))
        })
        .collect()
}

fn excerpt_of(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().take(EXCERPT_CHARS).collect::<String>() + "..."
}

/// Rule summary appended to the repair instruction
fn build_repair_hint(violations: &[AuditViolation]) -> String {
    let mut lines = vec!["REPAIR_REQUIRED".to_string()];
    for v in violations.iter().filter(|v| v.severity == Severity::Error) {
        lines.push(format!("- rule={} detail={}", v.kind.tag(), v.message));
    }
    lines.join("\n")
}
