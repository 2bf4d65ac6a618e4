//! OpenAI-compatible chat client
//!
//! Works against OpenAI, Azure OpenAI, DeepSeek, and other compatible
//! /chat/completions endpoints.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;

use super::{ChatMessage, LlmChat, LlmError};

/// Provider configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API base, e.g. `https://api.openai.com/v1`
    pub api_base: String,
    /// Bearer token
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Read configuration from `MEDATLAS_LLM_BASE`, `MEDATLAS_LLM_KEY` and
    /// `MEDATLAS_LLM_MODEL`. Returns `None` when the key is unset, which
    /// callers treat as "run without an LLM".
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("MEDATLAS_LLM_KEY").ok()?;
        Some(Self {
            api_base: std::env::var("MEDATLAS_LLM_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key,
            model: std::env::var("MEDATLAS_LLM_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout_secs: 20,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat client for OpenAI-compatible providers
pub struct OpenAiChat {
    config: LlmConfig,
    http_client: Client,
}

impl OpenAiChat {
    /// Build a client for the given provider
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Api(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http_client })
    }
}

#[async_trait]
impl LlmChat for OpenAiChat {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens,
            temperature,
        };

        tracing::debug!(url = %url, model = %self.config.model, "calling LLM");

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_secs)
                } else {
                    LlmError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api(format!("API error {}: {}", status, error_text)));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("Empty response from LLM".to_string()))
    }
}
