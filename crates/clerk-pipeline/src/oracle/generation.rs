use super::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationRequest {
    pub fn new(system_instruction: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.2,
            max_output_tokens: 1024,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

/// Text generation oracle
#[async_trait]
pub trait GenerationOracle: Send + Sync {
    /// Must surface quota exhaustion as `OracleError::QuotaExhausted`
    async fn generate(&self, request: &GenerationRequest) -> Result<String, OracleError>;

    /// Name used in logs
    fn name(&self) -> &str;
}
