//! Error types for the pipeline.

use crate::oracle::OracleError;
use crate::stage::Stage;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The only failure surfaced to callers of `Orchestrator::answer`
    #[error("Oracle quota exhausted during {stage}: {message}")]
    QuotaExhausted { stage: Stage, message: String },

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn code(&self) -> i32 {
        match self {
            PipelineError::QuotaExhausted { .. } => -32029,
            PipelineError::Session(_) => -32010,
            PipelineError::Config(_) => -32011,
        }
    }

    /// Wrap a quota failure with the stage it happened in
    pub fn from_oracle(stage: Stage, err: &OracleError) -> Option<Self> {
        match err {
            OracleError::QuotaExhausted(message) => Some(PipelineError::QuotaExhausted {
                stage,
                message: message.clone(),
            }),
            _ => None,
        }
    }
}
