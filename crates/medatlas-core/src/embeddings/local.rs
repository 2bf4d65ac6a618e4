//! Local Semantic Embeddings
//!
//! Runs sentence-transformers/all-MiniLM-L6-v2 (384 dimensions) through
//! fastembed's ONNX runtime. The model is process-wide: loaded once behind a
//! `OnceLock`, shared by every engine instance.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;

use super::{Embedder, Embedding, EmbeddingError, EMBEDDING_DIMENSIONS};

/// Fixed model identifier recorded with the corpus snapshot
pub const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Maximum text length for embedding (truncated if longer)
pub const MAX_TEXT_LENGTH: usize = 4096;

/// Batch size for embedding generation
pub const BATCH_SIZE: usize = 32;

// ============================================================================
// GLOBAL MODEL
// ============================================================================

static EMBEDDING_MODEL_RESULT: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

/// Cache directory for fastembed model files.
/// Uses MEDATLAS_MODEL_CACHE env var, or falls back to the platform cache dir.
fn get_cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("MEDATLAS_MODEL_CACHE") {
        return std::path::PathBuf::from(path);
    }

    if let Some(proj_dirs) = directories::ProjectDirs::from("org", "medatlas", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".cache/medatlas/fastembed");
    }

    std::path::PathBuf::from(".fastembed_cache")
}

fn get_model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, EmbeddingError> {
    let result = EMBEDDING_MODEL_RESULT.get_or_init(|| {
        let cache_dir = get_cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!("Failed to create cache directory {:?}: {}", cache_dir, e);
        }

        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false)
            .with_cache_dir(cache_dir);

        TextEmbedding::try_new(options)
            .map(Mutex::new)
            .map_err(|e| {
                format!(
                    "Failed to initialize all-MiniLM-L6-v2 embedding model: {}. \
                    Ensure ONNX runtime is available and model files can be downloaded.",
                    e
                )
            })
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| EmbeddingError::ModelInit(format!("Lock poisoned: {}", e))),
        Err(err) => Err(EmbeddingError::ModelInit(err.clone())),
    }
}

fn embed_blocking(texts: Vec<String>) -> Result<Vec<Embedding>, EmbeddingError> {
    let mut model = get_model()?;
    let mut all = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(BATCH_SIZE) {
        let truncated: Vec<&str> = chunk
            .iter()
            .map(|t| if t.len() > MAX_TEXT_LENGTH { &t[..MAX_TEXT_LENGTH] } else { t.as_str() })
            .collect();

        let embeddings = model
            .embed(truncated, None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        for raw in embeddings {
            if raw.len() != EMBEDDING_DIMENSIONS {
                return Err(EmbeddingError::EmbeddingFailed(format!(
                    "model returned {} dimensions, expected {}",
                    raw.len(),
                    EMBEDDING_DIMENSIONS
                )));
            }
            all.push(Embedding::unit(raw));
        }
    }

    Ok(all)
}

// ============================================================================
// LOCAL EMBEDDER
// ============================================================================

/// Embedder backed by the process-wide local MiniLM model
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalEmbedder;

impl LocalEmbedder {
    /// Create a local embedder handle (the model itself is global)
    pub fn new() -> Self {
        Self
    }

    /// Eagerly load the model, surfacing any init error
    pub fn init(&self) -> Result<(), EmbeddingError> {
        get_model().map(|_| ())
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }
        let texts = vec![text.to_string()];
        let mut out = tokio::task::spawn_blocking(move || embed_blocking(texts))
            .await
            .map_err(|e| EmbeddingError::EmbeddingFailed(format!("embedding task failed: {e}")))??;
        out.pop()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }
        let owned = texts.to_vec();
        tokio::task::spawn_blocking(move || embed_blocking(owned))
            .await
            .map_err(|e| EmbeddingError::EmbeddingFailed(format!("embedding task failed: {e}")))?
    }
}
