//! Error types for decoding oracle output.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No JSON object found in oracle output")]
    NoJsonObject,

    #[error("Malformed plan JSON: {0}")]
    Malformed(String),

    #[error("Plan contained no usable fields")]
    EmptyPlan,
}

impl DecodeError {
    /// Stable short tag for telemetry
    pub fn tag(&self) -> &'static str {
        match self {
            DecodeError::NoJsonObject => "no_json_object",
            DecodeError::Malformed(_) => "malformed",
            DecodeError::EmptyPlan => "empty_plan",
        }
    }
}
