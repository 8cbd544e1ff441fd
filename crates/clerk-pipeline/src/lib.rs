//! Clerk answer pipeline.
//!
//! Turns a governance question into an audited, citation-bearing answer:
//! situation gate, planner, two-lane retrieval, tiering, synthesis, audit
//! and a single repair pass.
//!
//! v0.3.0: Oracle seams, planner, two-lane retrieval with escalation.
//! v0.4.0: Synthesizer, repair loop, orchestrator, telemetry sink.

pub mod error;
pub mod oracle;
pub mod orchestrator;
pub mod planner;
pub mod repair;
pub mod retrieval;
pub mod session;
pub mod stage;
pub mod synthesizer;
pub mod telemetry;

pub use error::PipelineError;
pub use oracle::{
    DocumentReference, FakeGenerationOracle, FakeGenerationOracleBuilder, FakeRetrievalOracle,
    GenerationOracle, GenerationRequest, HttpSearchClient, InMemoryCorpus, OllamaClient,
    OracleError, RetrievalOracle, SearchResponse,
};
pub use orchestrator::{AnswerRequest, Orchestrator, PipelineAnswer, PipelineDebug, PlanSource};
pub use planner::PLANNER_ROLE;
pub use repair::REPAIR_ROLE;
pub use session::{Artifact, InMemorySessionStore, SessionStore};
pub use stage::{Stage, StageOutcome};
pub use synthesizer::{ConversationTurn, SYNTHESIS_ROLE};
pub use telemetry::{init_logging, PipelineEvent, RecordingSink, TelemetrySink, TracingSink};

/// Package version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
