//! Pipeline configuration.
//!
//! One immutable `PipelineConfig` is built at process start and passed into
//! every stage. No stage reads ambient or global state.
//!
//! Config file: path from `CLERK_CONFIG`, otherwise built-in defaults.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "CLERK_CONFIG";

/// Hard ceiling on any answer word cap
pub const ABSOLUTE_WORD_CEILING: usize = 500;

/// Situation gate weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum total score for the anchor to be used this turn
    pub use_threshold: f32,
    pub verbatim_entity_weight: f32,
    pub partial_overlap_weight: f32,
    pub title_keyword_weight: f32,
    pub generic_backref_weight: f32,
    pub dynamic_backref_weight: f32,
    /// Applied (negative) when domains differ and no entity overlaps
    pub domain_mismatch_penalty: f32,
    /// Words shorter than this never count as significant
    pub min_keyword_len: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            use_threshold: 2.0,
            verbatim_entity_weight: 1.0,
            partial_overlap_weight: 0.5,
            title_keyword_weight: 0.5,
            generic_backref_weight: 1.0,
            dynamic_backref_weight: 1.5,
            domain_mismatch_penalty: -2.0,
            min_keyword_len: 4,
        }
    }
}

/// Planner limits and defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Pasted artifacts are truncated to this many characters
    pub artifact_char_budget: usize,
    pub max_queries_per_lane: usize,
    /// Below this planner confidence both lanes keep at most
    /// `conservative_max_queries` queries
    pub conservative_confidence: f32,
    pub conservative_max_queries: usize,
    pub default_k: usize,
    pub default_keep: usize,
    pub min_local_evidence: usize,
    pub min_state_evidence: usize,
    pub high_salience_min_state_evidence: usize,
    pub high_salience: f32,
    /// Jurisdiction used when neither the oracle nor the question names one
    pub default_jurisdiction: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            artifact_char_budget: 6000,
            max_queries_per_lane: 4,
            conservative_confidence: 0.45,
            conservative_max_queries: 2,
            default_k: 8,
            default_keep: 6,
            min_local_evidence: 1,
            min_state_evidence: 1,
            high_salience_min_state_evidence: 2,
            high_salience: 0.6,
            default_jurisdiction: None,
            temperature: 0.1,
            max_output_tokens: 1024,
        }
    }
}

/// Two-lane retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Corpus handle for jurisdiction-local documents
    pub local_corpus: String,
    /// Corpus handle for the authoritative corpus
    pub state_corpus: String,
    /// Document-type hints appended to local queries
    pub local_doc_hints: Vec<String>,
    /// Anchor terms appended to authoritative queries
    pub state_anchor_terms: Vec<String>,
    /// Weight of the situation match in re-ranking
    pub situation_weight: f32,
    /// Match score above which a chunk counts as on-topic
    pub on_topic_threshold: f32,
    /// Fraction of the merged set reserved for on-topic chunks
    pub min_on_topic_fraction: f32,
    pub min_confidence: f32,
    pub min_alignment: f32,
    /// A foreign entity in at least this fraction of chunks is drift
    pub drift_fraction: f32,
    pub drift_min_chunks: usize,
    /// Chunk count at which the count component saturates
    pub count_saturation: usize,
    pub score_weight: f32,
    pub count_weight: f32,
    pub entity_weight: f32,
    /// Names never treated as foreign drift entities
    pub drift_ignore: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            local_corpus: "local".to_string(),
            state_corpus: "state".to_string(),
            local_doc_hints: vec![
                "minutes".to_string(),
                "agenda".to_string(),
                "warrant".to_string(),
                "report".to_string(),
            ],
            state_anchor_terms: vec![
                "RSA".to_string(),
                "statute".to_string(),
                "attorney general guidance".to_string(),
                "administrative rule".to_string(),
            ],
            situation_weight: 0.35,
            on_topic_threshold: 0.15,
            min_on_topic_fraction: 0.4,
            min_confidence: 0.45,
            min_alignment: 0.25,
            drift_fraction: 0.30,
            drift_min_chunks: 3,
            count_saturation: 8,
            score_weight: 0.5,
            count_weight: 0.3,
            entity_weight: 0.2,
            drift_ignore: vec![
                "New Hampshire".to_string(),
                "Attorney General".to_string(),
                "Town Meeting".to_string(),
                "Revised Statutes".to_string(),
            ],
        }
    }
}

/// Evidence tier thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TieringConfig {
    pub tier_a_min_state: usize,
    pub tier_a_min_distinct_state_docs: usize,
    pub tier_a_min_alignment: f32,
    pub tier_b_min_state: usize,
    pub tier_b_min_alignment: f32,
    /// Legal salience at which a computed C is promoted to B
    pub promotion_salience: f32,
    pub promotion_min_state: usize,
}

impl Default for TieringConfig {
    fn default() -> Self {
        Self {
            tier_a_min_state: 4,
            tier_a_min_distinct_state_docs: 2,
            tier_a_min_alignment: 0.30,
            tier_b_min_state: 2,
            tier_b_min_alignment: 0.20,
            promotion_salience: 0.6,
            promotion_min_state: 2,
        }
    }
}

/// Answer format profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerProfile {
    /// Five fixed headings, audit-enforced
    #[default]
    Sectioned,
    /// Heading-free prose with a word cap
    Prose,
}

impl std::fmt::Display for AnswerProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerProfile::Sectioned => write!(f, "sectioned"),
            AnswerProfile::Prose => write!(f, "prose"),
        }
    }
}

/// Answer generation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    pub profile: AnswerProfile,
    pub tier_a_word_cap: usize,
    pub tier_b_word_cap: usize,
    pub tier_c_word_cap: usize,
    pub max_chars: usize,
    pub bullet_word_limit: usize,
    /// Below this an answer is incomplete regardless of score
    pub min_words: usize,
    /// Word-count range that earns the selector bonus
    pub sweet_spot: (usize, usize),
    /// Authoritative citations required under the governing-rules heading
    pub min_state_citations: usize,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Prior turns shown to the synthesizer when the anchor is gated in
    pub history_turns: usize,
    /// Evidence text per chunk is cut to this many characters in prompts
    pub max_chunk_chars: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            profile: AnswerProfile::Sectioned,
            tier_a_word_cap: 500,
            tier_b_word_cap: 450,
            tier_c_word_cap: 350,
            max_chars: 4000,
            bullet_word_limit: 20,
            min_words: 80,
            sweet_spot: (150, 450),
            min_state_citations: 2,
            temperature: 0.2,
            max_output_tokens: 1400,
            history_turns: 3,
            max_chunk_chars: 1200,
        }
    }
}

/// Auditor phrase tables and windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Characters on each side of a statute reference searched for a citation
    pub citation_neighborhood: usize,
    pub banned_phrases: Vec<String>,
    pub absolute_phrases: Vec<String>,
    /// A foreign entity must be mentioned this often to count as drift
    pub drift_min_mentions: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            citation_neighborhood: 80,
            banned_phrases: vec![
                "next steps".to_string(),
                "consult counsel".to_string(),
                "consult an attorney".to_string(),
                "consult a lawyer".to_string(),
                "seek legal advice".to_string(),
                "contact your town attorney".to_string(),
            ],
            absolute_phrases: vec![
                "definitely illegal".to_string(),
                "clearly illegal".to_string(),
                "is always".to_string(),
                "is never".to_string(),
                "without a doubt".to_string(),
                "guaranteed".to_string(),
                "unquestionably".to_string(),
                "certainly violates".to_string(),
            ],
            drift_min_mentions: 2,
        }
    }
}

/// Oracle endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub generation_endpoint: String,
    pub generation_model: String,
    pub search_endpoint: String,
    pub timeout_secs: u64,
    pub keep_alive: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            generation_endpoint: "http://127.0.0.1:11434".to_string(),
            generation_model: "qwen3:8b".to_string(),
            search_endpoint: "http://127.0.0.1:8088/search".to_string(),
            timeout_secs: 120,
            keep_alive: "5m".to_string(),
        }
    }
}

/// Logging setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: false,
        }
    }
}

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub gate: GateConfig,
    pub planner: PlannerConfig,
    pub retrieval: RetrievalConfig,
    pub tiering: TieringConfig,
    pub answer: AnswerConfig,
    pub audit: AuditConfig,
    pub oracle: OracleConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(text).context("Failed to parse pipeline config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load from an explicit path, then `CLERK_CONFIG`, otherwise defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
        match path.map(Path::to_path_buf).or(from_env) {
            Some(p) => Self::load(&p),
            None => {
                tracing::debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject out-of-range or contradictory settings
    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("retrieval.on_topic_threshold", self.retrieval.on_topic_threshold),
            ("retrieval.min_on_topic_fraction", self.retrieval.min_on_topic_fraction),
            ("retrieval.min_confidence", self.retrieval.min_confidence),
            ("retrieval.min_alignment", self.retrieval.min_alignment),
            ("retrieval.drift_fraction", self.retrieval.drift_fraction),
            ("planner.conservative_confidence", self.planner.conservative_confidence),
            ("planner.high_salience", self.planner.high_salience),
            ("tiering.tier_a_min_alignment", self.tiering.tier_a_min_alignment),
            ("tiering.tier_b_min_alignment", self.tiering.tier_b_min_alignment),
            ("tiering.promotion_salience", self.tiering.promotion_salience),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be within [0, 1], got {}", name, value);
            }
        }

        let caps = [
            self.answer.tier_a_word_cap,
            self.answer.tier_b_word_cap,
            self.answer.tier_c_word_cap,
        ];
        if caps.iter().any(|&c| c == 0 || c > ABSOLUTE_WORD_CEILING) {
            bail!("answer word caps must be within 1..={}", ABSOLUTE_WORD_CEILING);
        }
        if self.answer.sweet_spot.0 > self.answer.sweet_spot.1 {
            bail!("answer.sweet_spot lower bound exceeds upper bound");
        }
        if self.answer.bullet_word_limit == 0 {
            bail!("answer.bullet_word_limit must be positive");
        }
        if self.planner.default_keep == 0 || self.planner.default_k == 0 {
            bail!("planner lane width and keep cap must be positive");
        }
        if self.planner.conservative_max_queries > self.planner.max_queries_per_lane {
            bail!("planner.conservative_max_queries exceeds max_queries_per_lane");
        }
        if self.tiering.tier_a_min_state < self.tiering.tier_b_min_state {
            bail!("tier A state floor is below tier B state floor");
        }
        Ok(())
    }

    /// Word cap for a tier, never above the absolute ceiling
    pub fn word_cap_for(&self, tier: crate::strength::Tier) -> usize {
        use crate::strength::Tier;
        let cap = match tier {
            Tier::A => self.answer.tier_a_word_cap,
            Tier::B => self.answer.tier_b_word_cap,
            Tier::C => self.answer.tier_c_word_cap,
        };
        cap.min(ABSOLUTE_WORD_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [retrieval]
            local_corpus = "town-docs"

            [answer]
            profile = "prose"
            "#,
        )
        .unwrap();

        assert_eq!(config.retrieval.local_corpus, "town-docs");
        assert_eq!(config.retrieval.state_corpus, "state");
        assert_eq!(config.answer.profile, AnswerProfile::Prose);
        assert_eq!(config.answer.bullet_word_limit, 20);
        assert_eq!(config.gate.use_threshold, 2.0);
    }

    #[test]
    fn test_rejects_out_of_range_fraction() {
        let err = PipelineConfig::from_toml_str(
            r#"
            [retrieval]
            drift_fraction = 1.5
            "#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("drift_fraction"));
    }

    #[test]
    fn test_rejects_word_cap_above_ceiling() {
        let mut config = PipelineConfig::default();
        config.answer.tier_a_word_cap = 900;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[planner]\ndefault_jurisdiction = \"Hollis\"").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.planner.default_jurisdiction.as_deref(), Some("Hollis"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = PipelineConfig::load(Path::new("/nonexistent/clerk.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_word_cap_per_tier() {
        use crate::strength::Tier;
        let config = PipelineConfig::default();
        assert_eq!(config.word_cap_for(Tier::A), 500);
        assert_eq!(config.word_cap_for(Tier::B), 450);
        assert_eq!(config.word_cap_for(Tier::C), 350);
    }
}
