//! Engine configuration

use std::time::Duration;

use crate::agents::SearchConfig;

/// Maximum accepted query length in characters
pub const MAX_QUERY_CHARS: usize = 2000;

/// Engine-wide knobs with production defaults
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Total wall-clock budget for a full plan
    pub plan_deadline: Duration,
    /// Semantic search configuration
    pub search: SearchConfig,
    /// Character budget for the JSON slice handed to the LLM summarizer
    pub summary_char_budget: usize,
    /// Ask the LLM for the final summary (falls back to concatenated facts
    /// either way)
    pub synthesize_with_llm: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plan_deadline: Duration::from_secs(10),
            search: SearchConfig::default(),
            summary_char_budget: 3000,
            synthesize_with_llm: true,
        }
    }
}
