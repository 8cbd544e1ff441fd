//! Logging setup and the stage-boundary telemetry sink.
//!
//! Pipeline logic emits events and never reads them back.

use clerk_shared::config::LoggingConfig;
use clerk_shared::{Priority, Tier};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::stage::Stage;

/// Install the global fmt subscriber; `RUST_LOG` wins over the configured level
///
/// Returns false when a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .try_init()
        .is_ok()
}

/// Identifiers attached to every event of one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestIds {
    pub request_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    PlanComplete {
        from_oracle: bool,
        entities: usize,
        dropped_entities: usize,
        local_queries: usize,
        state_queries: usize,
        priority: Priority,
        conservative: bool,
    },
    /// A stage fell back to a heuristic
    StageRecovered { stage: Stage, reason: String },
    RetrievalComplete {
        local_chunks: usize,
        state_chunks: usize,
        escalated: bool,
        confidence: f32,
        alignment: f32,
    },
    TierComputed {
        tier: Tier,
        promoted: bool,
        state_count: usize,
        situation_alignment: f32,
    },
    AuditResult {
        candidate: String,
        errors: usize,
        warnings: usize,
        passed: bool,
    },
    RepairOutcome {
        attempted: bool,
        selected: String,
        normalized: bool,
        truncated: bool,
    },
    AnswerFinalized { tier: Tier, words: usize, citations: usize },
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::PlanComplete { .. } => "plan_complete",
            PipelineEvent::StageRecovered { .. } => "stage_recovered",
            PipelineEvent::RetrievalComplete { .. } => "retrieval_complete",
            PipelineEvent::TierComputed { .. } => "tier_computed",
            PipelineEvent::AuditResult { .. } => "audit_result",
            PipelineEvent::RepairOutcome { .. } => "repair_outcome",
            PipelineEvent::AnswerFinalized { .. } => "answer_finalized",
        }
    }
}

pub trait TelemetrySink: Send + Sync {
    fn emit(&self, ids: &RequestIds, event: &PipelineEvent);
}

/// Emits each event as a structured tracing record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, ids: &RequestIds, event: &PipelineEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        match event {
            PipelineEvent::StageRecovered { stage, reason } => warn!(
                request_id = %ids.request_id,
                session_id = %ids.session_id,
                stage = %stage,
                "stage recovered with heuristic: {}",
                reason
            ),
            _ => info!(
                request_id = %ids.request_id,
                session_id = %ids.session_id,
                event = event.name(),
                "{}",
                payload
            ),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<(RequestIds, PipelineEvent)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|e| e.iter().map(|(_, ev)| ev.clone()).collect())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(PipelineEvent::name).collect()
    }
}

impl TelemetrySink for RecordingSink {
    fn emit(&self, ids: &RequestIds, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((ids.clone(), event.clone()));
        }
    }
}
