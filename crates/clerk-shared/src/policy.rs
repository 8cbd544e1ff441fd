//! Answer policy: format contract selected per tier and profile.
//!
//! The sectioned profile uses five fixed headings. The first is prose only;
//! the others carry bullets with per-heading ceilings. `[USER]` citations
//! belong under the timeline heading and nowhere else.

use crate::config::{AnswerProfile, PipelineConfig};
use crate::strength::Tier;
use serde::{Deserialize, Serialize};

pub const HEADING_SUMMARY: &str = "Summary";
pub const HEADING_TIMELINE: &str = "Timeline";
pub const HEADING_RULES: &str = "Governing Rules";
pub const HEADING_IMPACT: &str = "Impact";
pub const HEADING_OPEN: &str = "Open Questions";

/// (heading, bullet ceiling, prose only, allows [USER])
const SECTION_TABLE: &[(&str, usize, bool, bool)] = &[
    (HEADING_SUMMARY, 0, true, false),
    (HEADING_TIMELINE, 5, false, true),
    (HEADING_RULES, 5, false, false),
    (HEADING_IMPACT, 4, false, false),
    (HEADING_OPEN, 4, false, false),
];

/// One required heading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub heading: String,
    pub max_bullets: usize,
    pub prose_only: bool,
    pub allows_user_citation: bool,
}

/// Format contract for one answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerPolicy {
    pub profile: AnswerProfile,
    pub tier: Tier,
    pub word_cap: usize,
    pub max_chars: usize,
    /// Empty for the prose profile
    pub sections: Vec<SectionSpec>,
    pub bullet_word_limit: usize,
    pub min_words: usize,
    /// `[S#]` occurrences required under the governing-rules heading
    /// (whole answer for prose); zero when no authoritative evidence exists
    pub required_state_citations: usize,
}

impl AnswerPolicy {
    /// Policy for a tier under the configured profile
    pub fn select(tier: Tier, state_evidence_present: bool, config: &PipelineConfig) -> Self {
        let profile = config.answer.profile;
        let sections = match profile {
            AnswerProfile::Sectioned => SECTION_TABLE
                .iter()
                .map(|&(heading, max_bullets, prose_only, allows_user)| SectionSpec {
                    heading: heading.to_string(),
                    max_bullets,
                    prose_only,
                    allows_user_citation: allows_user,
                })
                .collect(),
            AnswerProfile::Prose => Vec::new(),
        };
        Self {
            profile,
            tier,
            word_cap: config.word_cap_for(tier),
            max_chars: config.answer.max_chars,
            sections,
            bullet_word_limit: config.answer.bullet_word_limit,
            min_words: config.answer.min_words.min(config.word_cap_for(tier)),
            required_state_citations: if state_evidence_present {
                config.answer.min_state_citations
            } else {
                0
            },
        }
    }

    pub fn is_sectioned(&self) -> bool {
        self.profile == AnswerProfile::Sectioned
    }

    pub fn section(&self, heading: &str) -> Option<&SectionSpec> {
        self.sections
            .iter()
            .find(|s| crate::answer_text::heading_matches(&s.heading, heading))
    }

    /// Citation-bearing section for authoritative evidence
    pub fn rules_heading(&self) -> Option<&str> {
        self.section(HEADING_RULES).map(|s| s.heading.as_str())
    }

    /// Format rules rendered for the generation instruction
    pub fn format_rules(&self) -> String {
        let mut rules = String::new();
        match self.profile {
            AnswerProfile::Sectioned => {
                rules.push_str("Use exactly these headings, in this order, each as a line starting with '## ':\n");
                for (i, section) in self.sections.iter().enumerate() {
                    let shape = if section.prose_only {
                        "prose only, no bullets".to_string()
                    } else {
                        format!("at most {} bullets starting with '- '", section.max_bullets)
                    };
                    rules.push_str(&format!("{}. {} ({})\n", i + 1, section.heading, shape));
                }
                rules.push_str(&format!(
                    "Each bullet has at most {} words, not counting citation tokens.\n",
                    self.bullet_word_limit
                ));
            }
            AnswerProfile::Prose => {
                rules.push_str("Write plain paragraphs. No headings and no bullet lists.\n");
            }
        }
        rules.push_str(&format!(
            "Total length at most {} words. Never exceed it.\n",
            self.word_cap
        ));
        rules.push_str(
            "Cite evidence with tokens: [L1], [L2] for local documents, [S1], [S2] for statutes \
             and state guidance, [USER] for text the user supplied.\n",
        );
        if self.is_sectioned() {
            rules.push_str(&format!("[USER] may appear only under {}.\n", HEADING_TIMELINE));
        }
        if self.required_state_citations > 0 {
            let place = if self.is_sectioned() {
                format!("under {}", HEADING_RULES)
            } else {
                "in the answer".to_string()
            };
            rules.push_str(&format!(
                "Include at least {} [S#] citations {}.\n",
                self.required_state_citations, place
            ));
        }
        rules.push_str("Every statute number you mention must carry an [S#] citation next to it.\n");
        rules.push_str("Do not end with next steps or advice to consult counsel.\n");
        rules
    }

    /// Tier-specific tone and hedging guidance
    pub fn tier_guidance(&self) -> &'static str {
        match self.tier {
            Tier::A => {
                "The evidence is strong. State conclusions directly and cite the specific \
                 statute sections and records that support them."
            }
            Tier::B => {
                "The evidence is partial. Qualify conclusions (\"the records indicate\"), \
                 cite only what the evidence shows, and do not name statute numbers that \
                 lack a matching [S#] source."
            }
            Tier::C => {
                "The evidence is thin. Be brief, say plainly what the records do not show, \
                 avoid specific statute numbers unless an [S#] source contains them, and \
                 list the gaps under the open questions."
            }
        }
    }
}
