//! Vector Index Client
//!
//! Contract for the external vector database: three named 384-dim vectors per
//! facility, searched independently under payload filters and fused by the
//! semantic searcher. The engine ships an exact-scan in-memory implementation
//! ([`InMemoryVectorIndex`]); remote engines implement the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::embeddings::Embedding;

mod indexer;
mod memory;

pub use indexer::{build_facility_index, facility_templates, IndexBuildError, FACILITY_COLLECTION};
pub use memory::InMemoryVectorIndex;

/// Indexed payload field: facility city
pub const FIELD_CITY: &str = "address_city";
/// Indexed payload field: facility region
pub const FIELD_REGION: &str = "address_stateOrRegion";
/// Indexed payload field: facility type tag
pub const FIELD_FACILITY_TYPE: &str = "facilityTypeId";
/// Indexed payload field: organization tag
pub const FIELD_ORGANIZATION: &str = "organization_type";

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Vector index error types
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum VectorIndexError {
    /// Index unreachable or failed internally
    #[error("Vector index unavailable: {0}")]
    Unavailable(String),
    /// Unknown collection
    #[error("Unknown collection: {0}")]
    CollectionMissing(String),
    /// Query vector has the wrong dimensionality
    #[error("Invalid dimensions: expected {expected}, got {got}")]
    InvalidDimensions { expected: usize, got: usize },
}

// ============================================================================
// NAMED VECTORS
// ============================================================================

/// The three per-facility embedding spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedVector {
    /// Whole-record text
    FullDocument,
    /// Procedures and equipment detail
    ClinicalDetail,
    /// Specialty-focused context
    SpecialtiesContext,
}

/// All named vectors, in fusion order
pub const ALL_VECTORS: [NamedVector; 3] = [
    NamedVector::FullDocument,
    NamedVector::ClinicalDetail,
    NamedVector::SpecialtiesContext,
];

impl NamedVector {
    /// Vector name as stored in the index
    pub fn as_str(&self) -> &'static str {
        match self {
            NamedVector::FullDocument => "full_document",
            NamedVector::ClinicalDetail => "clinical_detail",
            NamedVector::SpecialtiesContext => "specialties_context",
        }
    }
}

impl std::fmt::Display for NamedVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// FILTERS
// ============================================================================

/// One field-equality predicate (case-insensitive)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub field: String,
    pub value: String,
}

impl FieldMatch {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { field: field.into(), value: value.into() }
    }
}

/// OR across field-equality predicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    pub any_of: Vec<FieldMatch>,
}

impl Condition {
    /// Single-field equality
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { any_of: vec![FieldMatch::new(field, value)] }
    }

    /// OR over several (field, value) pairs
    pub fn any(matches: Vec<FieldMatch>) -> Self {
        Self { any_of: matches }
    }
}

/// AND of conditions; an empty filter matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    /// Filter with no conditions
    pub fn none() -> Self {
        Self::default()
    }

    /// True iff no conditions are present
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Add a condition, returning self for chaining
    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Evaluate the filter against a payload
    pub fn matches(&self, payload: &HashMap<String, String>) -> bool {
        self.conditions.iter().all(|condition| {
            condition.any_of.iter().any(|m| {
                payload
                    .get(&m.field)
                    .is_some_and(|v| v.eq_ignore_ascii_case(&m.value))
            })
        })
    }
}

// ============================================================================
// POINTS
// ============================================================================

/// A stored point: one facility with its named vectors and payload
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vectors: HashMap<NamedVector, Embedding>,
    pub payload: HashMap<String, String>,
}

/// A search hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
}

// ============================================================================
// INDEX CONTRACT
// ============================================================================

/// Vector database collaborator.
///
/// `search` returns the top-`k` points of `collection` by cosine similarity
/// in the given named-vector space, restricted to payloads matching `filter`,
/// sorted by score descending.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace points
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<(), VectorIndexError>;

    /// Top-k filtered search in one named-vector space
    async fn search(
        &self,
        collection: &str,
        vector: NamedVector,
        query: &Embedding,
        filter: &Filter,
        k: usize,
    ) -> Result<Vec<ScoredPoint>, VectorIndexError>;
}

// ============================================================================
// TESTS
// ============================================================================
