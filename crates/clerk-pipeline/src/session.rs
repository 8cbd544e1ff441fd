//! Session store seam.
//!
//! The pipeline reads the situation anchor and pasted artifacts for a
//! session. It never writes: the situation update decided after the answer
//! is returned to the caller, who persists it.

use crate::error::PipelineError;
use async_trait::async_trait;
use clerk_shared::SituationContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Ephemeral pasted document attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub text: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn situation_context(
        &self,
        session_id: &str,
    ) -> Result<Option<SituationContext>, PipelineError>;

    async fn session_artifacts(&self, session_id: &str) -> Result<Vec<Artifact>, PipelineError>;
}

#[derive(Debug, Default, Clone)]
struct SessionEntry {
    situation: Option<SituationContext>,
    artifacts: Vec<Artifact>,
}

/// Process-local store for development hosts and tests
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or clear) the anchor for a session
    pub fn put_situation(
        &self,
        session_id: &str,
        situation: Option<SituationContext>,
    ) -> Result<(), PipelineError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| PipelineError::Session("session lock poisoned".to_string()))?;
        sessions.entry(session_id.to_string()).or_default().situation = situation;
        Ok(())
    }

    pub fn add_artifact(&self, session_id: &str, artifact: Artifact) -> Result<(), PipelineError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| PipelineError::Session("session lock poisoned".to_string()))?;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .artifacts
            .push(artifact);
        Ok(())
    }

    fn read_entry(&self, session_id: &str) -> Result<Option<SessionEntry>, PipelineError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| PipelineError::Session("session lock poisoned".to_string()))?;
        Ok(sessions.get(session_id).cloned())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn situation_context(
        &self,
        session_id: &str,
    ) -> Result<Option<SituationContext>, PipelineError> {
        Ok(self.read_entry(session_id)?.and_then(|e| e.situation))
    }

    async fn session_artifacts(&self, session_id: &str) -> Result<Vec<Artifact>, PipelineError> {
        Ok(self
            .read_entry(session_id)?
            .map(|e| e.artifacts)
            .unwrap_or_default())
    }
}
