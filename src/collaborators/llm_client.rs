//! LLM chat collaborator — `run(prompt, thread) -> {text}` (§6.4).
//!
//! The hosted LLM provider and conversation-history persistence are
//! out of scope; this is a thin client over the Anthropic Messages API
//! with no quota tracking or usage logging of its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::AppError;

const CLAUDE_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[async_trait]
pub trait LlmChatClient: Send + Sync {
    /// Runs `prompt` against the model, optionally continuing `thread`.
    /// Returns the raw response text — callers are responsible for
    /// whatever JSON-tolerance parsing they need.
    async fn run(&self, prompt: &str, thread: Option<&str>) -> Result<String, AppError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

pub struct AnthropicLlmClient {
    http_client: reqwest::Client,
    config: LlmConfig,
}

impl AnthropicLlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl LlmChatClient for AnthropicLlmClient {
    async fn run(&self, prompt: &str, thread: Option<&str>) -> Result<String, AppError> {
        let mut messages = Vec::new();
        if let Some(thread_context) = thread {
            messages.push(AnthropicMessage {
                role: "assistant".to_string(),
                content: thread_context.to_string(),
            });
        }
        messages.push(AnthropicMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            messages,
        };

        let response = self
            .http_client
            .post(&self.config.base_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", CLAUDE_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!("provider returned {status}: {body}")));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("failed to parse provider response: {e}")))?;

        Ok(parsed
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .map(|block| block.text)
            .unwrap_or_default())
    }
}
