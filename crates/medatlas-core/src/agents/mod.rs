//! Agents
//!
//! The five analysts behind the orchestrator. Each receives an immutable
//! plan context, reads the shared corpus and indexes, and emits one tagged
//! [`AgentResult`] with its citations. Agents never route to each other;
//! the orchestrator alone decides the next node.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::embeddings::EmbeddingError;
use crate::intent::{Intent, QueryParams};
use crate::vector::VectorIndexError;

mod analyst;
mod geo;
mod planner;
mod result;
mod searcher;
mod validator;

pub use analyst::AnalystAgent;
pub use geo::GeoAgent;
pub use planner::PlannerAgent;
pub use result::*;
pub use searcher::{SearchConfig, SearcherAgent};
pub use validator::ValidatorAgent;

// ============================================================================
// AGENT NAMES
// ============================================================================

/// The closed set of agents a plan can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentName {
    Analyst,
    Searcher,
    Validator,
    Geo,
    Planner,
}

impl AgentName {
    /// Agent name string as reported in responses
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::Analyst => "analyst",
            AgentName::Searcher => "searcher",
            AgentName::Validator => "validator",
            AgentName::Geo => "geo",
            AgentName::Planner => "planner",
        }
    }
}

impl std::fmt::Display for AgentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Uncaught agent failure; recorded in the trace, the plan continues
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Embedding collaborator failed
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Vector index collaborator failed
    #[error(transparent)]
    VectorIndex(#[from] VectorIndexError),
    /// Anything else
    #[error("{0}")]
    Internal(String),
}

// ============================================================================
// CONTEXT & CONTRACT
// ============================================================================

/// Immutable per-invocation context handed to an agent
pub struct AgentContext<'a> {
    /// The (possibly self-corrected) query text
    pub query: &'a str,
    /// Classified intent
    pub intent: Intent,
    /// Extracted parameters
    pub params: &'a QueryParams,
    /// Committed outputs of plan predecessors, keyed by agent
    pub prior: &'a BTreeMap<AgentName, AgentResult>,
    /// Position of this invocation in the trace, for citations
    pub step_index: usize,
}

/// One analyst in the plan
#[async_trait]
pub trait Agent: Send + Sync {
    /// This agent's routing name
    fn name(&self) -> AgentName;

    /// Execute against the context, producing one tagged result
    async fn run(&self, ctx: &AgentContext<'_>) -> Result<AgentResult, AgentError>;
}
