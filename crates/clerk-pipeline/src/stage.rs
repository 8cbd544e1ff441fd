//! Per-stage outcome state machine.
//!
//! Each stage reports one of four outcomes instead of nesting fallbacks:
//! a clean result, a result produced by a deterministic fallback, a result
//! that asks the caller to escalate, or a fatal error.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Pipeline stage, used in errors, telemetry and timings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Gate,
    Planner,
    Retrieval,
    Tiering,
    Synthesis,
    Audit,
    Repair,
    Finalize,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Gate => "gate",
            Stage::Planner => "planner",
            Stage::Retrieval => "retrieval",
            Stage::Tiering => "tiering",
            Stage::Synthesis => "synthesis",
            Stage::Audit => "audit",
            Stage::Repair => "repair",
            Stage::Finalize => "finalize",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug)]
pub enum StageOutcome<T> {
    Ok(T),
    /// Oracle output was unusable; a heuristic stood in
    RecoveredWithHeuristic { value: T, reason: String },
    /// Usable, but quality is below threshold
    Escalate(T),
    Fatal(PipelineError),
}

impl<T> StageOutcome<T> {
    pub fn label(&self) -> &'static str {
        match self {
            StageOutcome::Ok(_) => "ok",
            StageOutcome::RecoveredWithHeuristic { .. } => "recovered_with_heuristic",
            StageOutcome::Escalate(_) => "escalate",
            StageOutcome::Fatal(_) => "fatal",
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, StageOutcome::RecoveredWithHeuristic { .. })
    }

    /// Value for every non-fatal outcome
    pub fn into_result(self) -> Result<T, PipelineError> {
        match self {
            StageOutcome::Ok(value)
            | StageOutcome::RecoveredWithHeuristic { value, .. }
            | StageOutcome::Escalate(value) => Ok(value),
            StageOutcome::Fatal(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        let recovered: StageOutcome<u8> = StageOutcome::RecoveredWithHeuristic {
            value: 3,
            reason: "no json".to_string(),
        };
        assert_eq!(recovered.label(), "recovered_with_heuristic");
        assert_eq!(recovered.into_result().unwrap(), 3);

        let fatal: StageOutcome<u8> = StageOutcome::Fatal(PipelineError::QuotaExhausted {
            stage: Stage::Planner,
            message: "429".to_string(),
        });
        assert_eq!(fatal.label(), "fatal");
        assert!(fatal.into_result().is_err());
    }
}
