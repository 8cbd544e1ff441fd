//! Shared types and pure logic for the Clerk answer pipeline.
//! v0.3.0: Situation gate, issue maps, retrieval plans, evidence tiers.
//! v0.4.0: Answer policy profiles, auditor, normalizer, candidate selector.

pub mod answer_text;
pub mod audit;
pub mod chunk;
pub mod citation;
pub mod config;
pub mod error;
pub mod heuristics;
pub mod issue;
pub mod normalize;
pub mod plan;
pub mod policy;
pub mod selector;
pub mod situation;
pub mod strength;

pub use audit::{audit_answer, AuditContext, AuditResult, AuditViolation, Severity, ViolationKind};
pub use chunk::{Chunk, Lane};
pub use citation::CitationToken;
pub use config::{AnswerProfile, PipelineConfig};
pub use error::DecodeError;
pub use issue::{IssueMap, RequestedOutput};
pub use normalize::{hard_truncate, normalize_answer_format};
pub use plan::{decode_plan, LanePlan, ParsedPlan, Priority, RetrievalPlan};
pub use policy::AnswerPolicy;
pub use selector::{select_candidate, score_candidate, Candidate, CandidateKind, CandidateScore};
pub use situation::{evaluate_gate, GateDecision, SituationContext, SituationUpdate};
pub use strength::{compute_record_strength, RecordStrength, Tier};

/// Package version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
