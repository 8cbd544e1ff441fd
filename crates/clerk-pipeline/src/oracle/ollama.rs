//! Ollama generation client.
//!
//! Posts non-streaming `/api/chat` requests with a system and a user message.
//! The model stays loaded for `keep_alive` after each call.

use super::{classify_failure, GenerationOracle, GenerationRequest, OracleError};
use async_trait::async_trait;
use clerk_shared::config::OracleConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    keep_alive: &'a str,
    options: ChatOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[allow(dead_code)]
    model: String,
    message: ChatMessage,
    #[serde(default)]
    done: bool,
}

pub struct OllamaClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    keep_alive: String,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            endpoint: config.generation_endpoint.trim_end_matches('/').to_string(),
            model: config.generation_model.clone(),
            keep_alive: config.keep_alive.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: &str) -> Self {
        self.keep_alive = keep_alive.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl GenerationOracle for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, OracleError> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_instruction.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
            stream: false,
            keep_alive: &self.keep_alive,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_output_tokens,
            },
        };

        info!("[>]  LLM CALL [{}] (keep_alive: {})", self.model, self.keep_alive);
        debug!(
            "prompt sizes: system={} user={}",
            request.system_instruction.len(),
            request.user_prompt.len()
        );

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        if !parsed.done {
            debug!("ollama reported done=false for a non-streaming call");
        }
        let content = parsed.message.content.trim().to_string();
        if content.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        info!("[<]  LLM RESPONSE [{}] ({} chars)", self.model, content.len());
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
