//! # MedAtlas Core
//!
//! Multi-agent query engine over a fixed corpus of Ghanaian healthcare
//! facilities. Turns a natural-language question into a structured, cited,
//! map-ready answer through five coupled subsystems:
//!
//! - **Intent classifier & router**: embedding-similarity + regex + LLM
//!   fallback over 14 intent labels, producing an ordered agent plan
//! - **Orchestrator**: a stateful workflow engine with a self-correction
//!   retry on empty filtered searches and a final aggregation step
//! - **Multi-vector semantic retrieval**: three independent 384-dim
//!   embeddings per facility fused by normalized weighted Reciprocal Rank
//!   Fusion
//! - **Medical-domain validator**: constraint checking, two-stage
//!   (Isolation Forest intersected with Mahalanobis) anomaly detection, and
//!   graph-structural risk analyses
//! - **Geospatial & planning engine**: Haversine ball-tree, grid cold-spot
//!   detection, maximin placement, nearest-neighbour + 2-opt tours, and
//!   capability-scored emergency routing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use medatlas_core::{
//!     CorpusStore, EngineConfig, InMemoryVectorIndex, LocalEmbedder, QueryEngine,
//! };
//!
//! let corpus = Arc::new(CorpusStore::load_snapshot("facilities.json")?);
//! let engine = QueryEngine::bootstrap(
//!     corpus,
//!     Some(Arc::new(LocalEmbedder::new())),
//!     Arc::new(InMemoryVectorIndex::new()),
//!     None,
//!     EngineConfig::default(),
//! )
//! .await?;
//!
//! let response = engine.run("How many hospitals offer cardiology?").await?;
//! println!("{}", response.summary);
//! ```
//!
//! ## Feature Flags
//!
//! - `embeddings` (default): local embedding generation with fastembed
//!   (all-MiniLM-L6-v2, 384 dimensions)
//! - `llm` (default): OpenAI-compatible chat client for intent fallback and
//!   answer synthesis

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod agents;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod engine;
pub mod geocode;
pub mod intent;
pub mod llm;
pub mod spatial;
pub mod stats;
pub mod vector;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Corpus
pub use corpus::{
    CorpusStore, EquipmentTag, Facility, FacilityType, SnapshotError, Specialty, ALL_EQUIPMENT,
    ALL_SPECIALTIES, GHANA_CENTROID,
};

// Geocoding
pub use geocode::{Gazetteer, GeoPoint, PlaceMatch};

// Embeddings
pub use embeddings::{cosine_similarity, Embedder, Embedding, EmbeddingError, EMBEDDING_DIMENSIONS};
#[cfg(feature = "embeddings")]
pub use embeddings::LocalEmbedder;

// Vector index
pub use vector::{
    build_facility_index, Condition, FieldMatch, Filter, InMemoryVectorIndex, IndexBuildError,
    NamedVector, ScoredPoint, VectorIndex, VectorIndexError, VectorPoint, FACILITY_COLLECTION,
};

// Spatial
pub use spatial::{haversine_km, BallTree, SpatialHit, SpatialIndex, EARTH_RADIUS_KM};

// Intent
pub use intent::{Flow, Intent, IntentClassifier, Plan, QueryParams, ALL_INTENTS};

// LLM collaborator
pub use llm::{ChatMessage, LlmChat, LlmError};
#[cfg(feature = "llm")]
pub use llm::{LlmConfig, OpenAiChat};

// Agents
pub use agents::{
    Agent, AgentContext, AgentError, AgentName, AgentResult, AnalystAgent, Citation,
    FacilitySummary, GeoAgent, PlannerAgent, SearcherAgent, SearchConfig, Severity,
    ValidatorAgent,
};

// Engine
pub use config::{EngineConfig, MAX_QUERY_CHARS};
pub use engine::{EngineError, QueryEngine, Response, TraceStep};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Embedding model identifier recorded with the corpus snapshot
pub const EMBEDDING_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AgentName, AgentResult, Citation, CorpusStore, Embedder, EngineConfig, EngineError,
        Facility, FacilitySummary, FacilityType, Flow, InMemoryVectorIndex, Intent, LlmChat,
        QueryEngine, Response, Specialty, VectorIndex,
    };

    #[cfg(feature = "embeddings")]
    pub use crate::LocalEmbedder;

    #[cfg(feature = "llm")]
    pub use crate::{LlmConfig, OpenAiChat};
}
