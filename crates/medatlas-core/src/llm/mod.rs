//! LLM Collaborator
//!
//! Narrow chat contract used in exactly two places: intent-classification
//! fallback (validated output) and optional answer synthesis. The engine must
//! degrade gracefully without it, so every caller has a non-LLM fallback.

use async_trait::async_trait;

#[cfg(feature = "llm")]
mod openai;

#[cfg(feature = "llm")]
pub use openai::{LlmConfig, OpenAiChat};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// LLM collaborator error types
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Request exceeded its timeout
    #[error("LLM request timed out after {0}s")]
    Timeout(u64),
    /// Provider returned an error
    #[error("LLM API error: {0}")]
    Api(String),
    /// Response could not be parsed
    #[error("LLM response parse error: {0}")]
    Parse(String),
    /// Provider asked us to back off
    #[error("LLM rate limited, retry after {0}s")]
    RateLimited(u64),
}

// ============================================================================
// MESSAGES
// ============================================================================

/// One chat message
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// System-role message
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    /// User-role message
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

// ============================================================================
// CHAT CONTRACT
// ============================================================================

/// Chat-completion collaborator
#[async_trait]
pub trait LlmChat: Send + Sync {
    /// Complete a chat exchange, returning the assistant text
    async fn chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError>;
}
