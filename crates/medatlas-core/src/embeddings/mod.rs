//! Semantic Embeddings Module
//!
//! The embedder contract for the engine: deterministic 384-dimensional
//! unit-norm vectors from a fixed sentence model. The bundled implementation
//! (`embeddings` feature) runs all-MiniLM-L6-v2 locally via fastembed; tests
//! and remote deployments inject their own [`Embedder`].

use async_trait::async_trait;

#[cfg(feature = "embeddings")]
mod local;

#[cfg(feature = "embeddings")]
pub use local::{LocalEmbedder, BATCH_SIZE, MAX_TEXT_LENGTH};

/// Embedding dimensions produced by the fixed sentence model
pub const EMBEDDING_DIMENSIONS: usize = 384;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Embedding error types
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    /// Failed to initialize the embedding model
    #[error("Model initialization failed: {0}")]
    ModelInit(String),
    /// Failed to generate an embedding
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
    /// Invalid input (empty text)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// EMBEDDING TYPE
// ============================================================================

/// A semantic embedding vector
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// The embedding vector
    pub vector: Vec<f32>,
}

impl Embedding {
    /// Create an embedding, L2-normalizing to unit length
    pub fn unit(mut vector: Vec<f32>) -> Self {
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Self { vector }
    }

    /// Dimensions of the vector
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    /// Cosine similarity with another embedding
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        cosine_similarity(&self.vector, &other.vector)
    }

    /// Check unit length
    pub fn is_normalized(&self) -> bool {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        (norm - 1.0).abs() < 0.001
    }
}

/// Compute cosine similarity between two vectors
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator > 0.0 {
        dot_product / denominator
    } else {
        0.0
    }
}

// ============================================================================
// EMBEDDER CONTRACT
// ============================================================================

/// Deterministic text-to-vector collaborator.
///
/// Implementations must return unit-norm vectors of [`EMBEDDING_DIMENSIONS`]
/// and identify the fixed model they run, which is recorded with the corpus.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Fixed model identifier recorded with the corpus snapshot
    fn model_id(&self) -> &str;

    /// Vector dimensions (always [`EMBEDDING_DIMENSIONS`] in practice)
    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Embed multiple texts; implementations may batch
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

// ============================================================================
// TESTS
// ============================================================================
