//! Deterministic format normalization and hard truncation.
//!
//! Both run without another generation call. Normalization is idempotent:
//! normalizing its own output returns it unchanged. Truncation never adds a
//! notice to the text.

use crate::answer_text::{self, bullet_body};
use crate::citation;
use crate::config::AnswerProfile;
use crate::policy::AnswerPolicy;

/// Stands in for an empty prose heading
pub const PROSE_PLACEHOLDER: &str = "The available records do not directly answer this question.";
/// Stands in for an empty bullet heading
pub const BULLET_PLACEHOLDER: &str = "Not addressed in the available records.";

#[derive(Debug, Clone, PartialEq)]
struct NormalizedSection {
    heading: String,
    prose_only: bool,
    prose: String,
    bullets: Vec<String>,
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn as_sentence(text: &str) -> String {
    let t = collapse(text);
    if t.is_empty() || t.ends_with(['.', '!', '?']) {
        t
    } else {
        format!("{}.", t)
    }
}

/// Keep at most `limit` non-citation words; citation tokens past the cut
/// are carried to the end
pub fn truncate_words(text: &str, limit: usize) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut carried: Vec<&str> = Vec::new();
    let mut count = 0;
    for word in text.split_whitespace() {
        if citation::is_citation_token(word) {
            if count <= limit && carried.is_empty() {
                kept.push(word);
            } else if !carried.contains(&word) && !kept.contains(&word) {
                carried.push(word);
            }
            continue;
        }
        count += 1;
        if count <= limit {
            kept.push(word);
        }
    }
    kept.extend(carried);
    kept.join(" ")
}

/// Gather lines as (is_bullet, text) in order
fn items<'a>(lines: impl Iterator<Item = &'a String>) -> Vec<(bool, String)> {
    lines
        .filter(|l| !l.trim().is_empty())
        .map(|l| match bullet_body(l) {
            Some(body) => (true, body.to_string()),
            None => (false, l.trim().to_string()),
        })
        .collect()
}

fn build_sections(text: &str, policy: &AnswerPolicy) -> Vec<NormalizedSection> {
    let parsed = answer_text::parse_answer(text);
    let mut out = Vec::with_capacity(policy.sections.len());

    for (idx, spec) in policy.sections.iter().enumerate() {
        let mut found: Vec<(bool, String)> = parsed
            .sections
            .iter()
            .filter(|s| answer_text::heading_matches(&s.heading, &spec.heading))
            .flat_map(|s| items(s.lines.iter()))
            .collect();
        if found.is_empty() && idx == 0 {
            found = items(parsed.preamble.iter());
        }

        if spec.prose_only {
            let prose = found
                .iter()
                .map(|(is_bullet, t)| if *is_bullet { as_sentence(t) } else { collapse(t) })
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            out.push(NormalizedSection {
                heading: spec.heading.clone(),
                prose_only: true,
                prose: if prose.is_empty() {
                    PROSE_PLACEHOLDER.to_string()
                } else {
                    prose
                },
                bullets: Vec::new(),
            });
        } else {
            let mut bullets: Vec<String> = found
                .iter()
                .map(|(_, t)| truncate_words(t, policy.bullet_word_limit))
                .filter(|t| !t.is_empty())
                .collect();
            bullets.truncate(spec.max_bullets);
            if bullets.is_empty() {
                bullets.push(BULLET_PLACEHOLDER.to_string());
            }
            out.push(NormalizedSection {
                heading: spec.heading.clone(),
                prose_only: false,
                prose: String::new(),
                bullets,
            });
        }
    }
    out
}

fn render_sections(sections: &[NormalizedSection]) -> String {
    sections
        .iter()
        .map(|s| {
            let body = if s.prose_only {
                s.prose.clone()
            } else {
                s.bullets
                    .iter()
                    .map(|b| format!("- {}", b))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            format!("## {}\n{}", s.heading, body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Headings and bullets become plain sentences, paragraphs kept
fn normalize_prose(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in text.lines() {
        if answer_text::heading_text(line).is_some() {
            continue;
        }
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
            continue;
        }
        match bullet_body(line) {
            Some(body) => current.push(as_sentence(body)),
            None => current.push(collapse(line)),
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Rewrite headings, bullet counts and bullet lengths to the policy
pub fn normalize_answer_format(text: &str, policy: &AnswerPolicy) -> String {
    match policy.profile {
        AnswerProfile::Sectioned => render_sections(&build_sections(text, policy)),
        AnswerProfile::Prose => normalize_prose(text),
    }
}

fn over_limits(text: &str, policy: &AnswerPolicy) -> bool {
    answer_text::answer_word_count(text) > policy.word_cap || text.chars().count() > policy.max_chars
}

/// Trim bullets, then words, until the word and character caps hold
pub fn hard_truncate(text: &str, policy: &AnswerPolicy) -> String {
    match policy.profile {
        AnswerProfile::Sectioned => truncate_sections(text, policy),
        AnswerProfile::Prose => truncate_prose(&normalize_prose(text), policy),
    }
}

fn truncate_sections(text: &str, policy: &AnswerPolicy) -> String {
    let mut sections = build_sections(text, policy);
    let mut rendered = render_sections(&sections);

    // drop trailing bullets, last heading first, keeping one per heading
    while over_limits(&rendered, policy) {
        let Some(section) = sections.iter_mut().rev().find(|s| s.bullets.len() > 1) else {
            break;
        };
        section.bullets.pop();
        rendered = render_sections(&sections);
    }

    // then shorten the prose heading
    if over_limits(&rendered, policy) {
        let excess = answer_text::answer_word_count(&rendered).saturating_sub(policy.word_cap);
        if let Some(prose) = sections.iter_mut().find(|s| s.prose_only) {
            let words = answer_text::content_word_count(&prose.prose);
            let keep = words.saturating_sub(excess.max(1)).max(1);
            prose.prose = as_sentence(&truncate_words(&prose.prose, keep));
        }
        rendered = render_sections(&sections);
    }

    // last resort: cut bullet text, longest first
    while over_limits(&rendered, policy) {
        let longest = sections
            .iter_mut()
            .flat_map(|s| s.bullets.iter_mut())
            .max_by_key(|b| answer_text::content_word_count(b));
        let Some(bullet) = longest else { break };
        let words = answer_text::content_word_count(bullet);
        if words <= 1 {
            break;
        }
        *bullet = truncate_words(bullet, words / 2);
        rendered = render_sections(&sections);
    }
    rendered
}

fn truncate_prose(text: &str, policy: &AnswerPolicy) -> String {
    if !over_limits(text, policy) {
        return text.to_string();
    }
    let mut kept: Vec<&str> = Vec::new();
    let mut count = 0;
    let mut chars = 0;
    for word in text.split_inclusive(char::is_whitespace) {
        let is_word = !word.trim().is_empty() && !citation::is_citation_token(word.trim());
        if is_word {
            count += 1;
        }
        chars += word.chars().count();
        if count > policy.word_cap || chars > policy.max_chars {
            break;
        }
        kept.push(word);
    }
    let cut = kept.concat();
    let cut = cut.trim_end();

    // end on a sentence boundary when that keeps most of the text
    match cut.rfind(['.', '!', '?']) {
        Some(pos) if pos > cut.len() / 2 => cut[..=pos].to_string(),
        _ => as_sentence(cut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::policy::HEADING_RULES;
    use crate::strength::Tier;

    fn policy() -> AnswerPolicy {
        AnswerPolicy::select(Tier::A, true, &PipelineConfig::default())
    }

    #[test]
    fn test_truncate_words_keeps_citations() {
        let text = "one two three four five [L1] six seven [S2]";
        assert_eq!(truncate_words(text, 3), "one two three [L1] [S2]");
        assert_eq!(truncate_words("a [L1] b", 5), "a [L1] b");
    }

    #[test]
    fn test_normalize_fills_and_orders() {
        let raw = "The board acted.\n## Governing Rules\n- Rule one [S1]\n- Rule two [S2]\n## Timeline\n1. First\n2. Second\n3. Third\n4. Fourth\n5. Fifth\n6. Sixth";
        let out = normalize_answer_format(raw, &policy());
        let parsed = answer_text::parse_answer(&out);
        let headings: Vec<&str> = parsed.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(
            headings,
            vec!["Summary", "Timeline", "Governing Rules", "Impact", "Open Questions"]
        );
        assert_eq!(parsed.sections[0].prose(), vec!["The board acted."]);
        assert_eq!(parsed.sections[1].bullets().len(), 5);
        assert_eq!(parsed.find(HEADING_RULES).unwrap().bullets().len(), 2);
        assert_eq!(parsed.sections[3].bullets(), vec![BULLET_PLACEHOLDER]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = "## Summary\n- Bullet in prose section [L1]\nMore prose\n## Impact\nLoose line that should become a bullet with far more than twenty words in it so that it is cut down to size [L2]";
        let once = normalize_answer_format(raw, &policy());
        let twice = normalize_answer_format(&once, &policy());
        assert_eq!(once, twice);
        assert!(once.starts_with("## Summary\nBullet in prose section [L1]. More prose"));
    }

    #[test]
    fn test_prose_profile_normalize() {
        let mut config = PipelineConfig::default();
        config.answer.profile = AnswerProfile::Prose;
        let policy = AnswerPolicy::select(Tier::B, false, &config);
        let out = normalize_answer_format("## Answer\nFirst line\n- a bullet\n\nSecond para", &policy);
        assert_eq!(out, "First line a bullet.\n\nSecond para");
    }

    #[test]
    fn test_hard_truncate_enforces_cap() {
        let mut config = PipelineConfig::default();
        config.answer.tier_c_word_cap = 40;
        config.answer.min_words = 10;
        let policy = AnswerPolicy::select(Tier::C, false, &config);
        let bullet = "word ".repeat(15);
        let raw = format!(
            "## Summary\n{}\n## Timeline\n- {}\n- {}\n- {}\n## Impact\n- {}\n- {}",
            "summary ".repeat(20),
            bullet,
            bullet,
            bullet,
            bullet,
            bullet
        );
        let out = hard_truncate(&raw, &policy);
        assert!(answer_text::answer_word_count(&out) <= 40, "{}", out);
        assert!(!out.to_lowercase().contains("truncated"));
        assert_eq!(answer_text::parse_answer(&out).sections.len(), 5);
    }

    #[test]
    fn test_hard_truncate_prose() {
        let mut config = PipelineConfig::default();
        config.answer.profile = AnswerProfile::Prose;
        config.answer.tier_b_word_cap = 10;
        let policy = AnswerPolicy::select(Tier::B, false, &config);
        let out = hard_truncate("One two three four five six. Seven eight nine ten eleven twelve.", &policy);
        assert_eq!(out, "One two three four five six.");
    }
}
