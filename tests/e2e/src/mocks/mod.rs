//! Deterministic stub collaborators
//!
//! The engine's I/O-bound contracts (embedder, LLM) replaced by pure
//! functions so journeys are hermetic and reproducible.

use async_trait::async_trait;

use medatlas_core::{
    ChatMessage, Embedder, Embedding, EmbeddingError, LlmChat, LlmError, EMBEDDING_DIMENSIONS,
};

/// Bag-of-words embedder: each token hashes to one of the 384 dimensions.
/// Token overlap maps to cosine similarity, which is exactly what the
/// classifier's exemplar scoring and the searcher's fusion need from a
/// sentence model - and it is fully deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenHashEmbedder;

impl TokenHashEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn bucket(token: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        (hash % EMBEDDING_DIMENSIONS as u64) as usize
    }
}

#[async_trait]
impl Embedder for TokenHashEmbedder {
    fn model_id(&self) -> &str {
        "test/token-hash-384"
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }
        let mut vector = vec![0.0_f32; EMBEDDING_DIMENSIONS];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[Self::bucket(token)] += 1.0;
        }
        Ok(Embedding::unit(vector))
    }
}

/// LLM stub that always answers with a fixed string
pub struct ScriptedLlm {
    reply: String,
}

impl ScriptedLlm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

#[async_trait]
impl LlmChat for ScriptedLlm {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, LlmError> {
        Ok(self.reply.clone())
    }
}

/// LLM stub that always fails, for degradation paths
pub struct FailingLlm;

#[async_trait]
impl LlmChat for FailingLlm {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, LlmError> {
        Err(LlmError::Timeout(1))
    }
}
