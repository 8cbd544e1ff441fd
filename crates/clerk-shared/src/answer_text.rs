//! Answer text structure: headings, prose and bullets.

use crate::citation;

/// A heading and the lines beneath it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub lines: Vec<String>,
}

impl Section {
    /// Bullet bodies with the marker removed
    pub fn bullets(&self) -> Vec<&str> {
        self.lines.iter().filter_map(|l| bullet_body(l)).collect()
    }

    /// Non-bullet, non-empty lines
    pub fn prose(&self) -> Vec<&str> {
        self.lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty() && bullet_body(l).is_none())
            .collect()
    }

    pub fn body(&self) -> String {
        self.lines.join("\n")
    }
}

/// Answer split at heading lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAnswer {
    /// Lines before the first heading
    pub preamble: Vec<String>,
    pub sections: Vec<Section>,
}

impl ParsedAnswer {
    /// First section whose heading matches `expected`
    pub fn find(&self, expected: &str) -> Option<&Section> {
        self.sections.iter().find(|s| heading_matches(&s.heading, expected))
    }
}

/// Heading text for `# X`, `## X`, `**X**` or `**X:**` lines
pub fn heading_text(line: &str) -> Option<String> {
    let t = line.trim();
    if t.starts_with('#') {
        let text = t.trim_start_matches('#').trim().trim_end_matches(':').trim();
        return if text.is_empty() { None } else { Some(text.to_string()) };
    }
    if t.len() > 4 && t.starts_with("**") && t.ends_with("**") {
        let inner = t[2..t.len() - 2].trim().trim_end_matches(':').trim();
        if !inner.is_empty() && !inner.contains("**") && inner.split_whitespace().count() <= 6 {
            return Some(inner.to_string());
        }
    }
    None
}

/// Bullet body for `- x`, `* x`, `• x`, `1. x` or `1) x`
pub fn bullet_body(line: &str) -> Option<&str> {
    let t = line.trim_start();
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = t.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    let digits = t.chars().take_while(|c| c.is_ascii_digit()).count();
    if (1..=2).contains(&digits) {
        let rest = &t[digits..];
        if let Some(body) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(body.trim());
        }
    }
    None
}

pub fn parse_answer(text: &str) -> ParsedAnswer {
    let mut parsed = ParsedAnswer::default();
    for line in text.lines() {
        if let Some(heading) = heading_text(line) {
            parsed.sections.push(Section {
                heading,
                lines: Vec::new(),
            });
            continue;
        }
        match parsed.sections.last_mut() {
            Some(section) => section.lines.push(line.to_string()),
            None => parsed.preamble.push(line.to_string()),
        }
    }
    parsed
}

fn heading_key(heading: &str) -> String {
    heading
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case- and punctuation-insensitive heading comparison
pub fn heading_matches(found: &str, expected: &str) -> bool {
    heading_key(found) == heading_key(expected)
}

/// Words excluding citation tokens, including runs like "[L1][S2]"
pub fn content_word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|w| !citation::is_citation_token(w))
        .count()
}

/// Answer length in words: heading lines, bullet markers and citation
/// tokens do not count
pub fn answer_word_count(text: &str) -> usize {
    text.lines()
        .filter(|l| heading_text(l).is_none())
        .map(|l| content_word_count(bullet_body(l).unwrap_or(l)))
        .sum()
}

/// Lines that are not headings, joined
pub fn body_text(text: &str) -> String {
    text.lines()
        .filter(|l| heading_text(l).is_none())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Intro line\n## Summary\nThe board acted [L1].\n\n## Timeline\n- May 1: vote [L2]\n* May 9: appeal\n2. June: hearing\n**Governing Rules**\n• RSA 91-A:2 [S1]";

    #[test]
    fn test_parse_sections() {
        let parsed = parse_answer(SAMPLE);
        assert_eq!(parsed.preamble, vec!["Intro line"]);
        assert_eq!(parsed.sections.len(), 3);
        assert_eq!(parsed.sections[1].bullets(), vec!["May 1: vote [L2]", "May 9: appeal", "June: hearing"]);
        assert_eq!(parsed.sections[0].prose(), vec!["The board acted [L1]."]);
        assert_eq!(parsed.sections[2].heading, "Governing Rules");
        assert!(parsed.find("governing rules").is_some());
    }

    #[test]
    fn test_heading_text_forms() {
        assert_eq!(heading_text("### Open Questions:"), Some("Open Questions".to_string()));
        assert_eq!(heading_text("**Impact**"), Some("Impact".to_string()));
        assert_eq!(heading_text("**Note** this is bold prose"), None);
        assert_eq!(heading_text("#"), None);
    }

    #[test]
    fn test_word_counts_skip_citations() {
        assert_eq!(content_word_count("The board voted [L1] [S2]."), 3);
        assert_eq!(content_word_count("The board voted [L1][S2]."), 3);
        assert_eq!(answer_word_count("## Governing Rules\n- Notice required [S1][S2]"), 2);
        assert_eq!(answer_word_count("## Summary\n- One two [L1]\nThree"), 3);
    }

    #[test]
    fn test_year_prose_not_bullet() {
        assert_eq!(bullet_body("2023. The board met"), None);
        assert_eq!(bullet_body("12) item"), Some("item"));
    }
}
