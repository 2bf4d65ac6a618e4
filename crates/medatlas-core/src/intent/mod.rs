//! Intent Classifier
//!
//! Maps a free-form query to one of 14 intent labels and an ordered agent
//! execution plan. Pipeline:
//!
//! 1. Embedding similarity against frozen exemplars (mean of top-2 per intent)
//! 2. Sigmoid confidence on the top-two score gap
//! 3. LLM fallback below the confidence threshold, output validated
//! 4. Regex fallback when no embedder is available
//! 5. Multi-intent expansion for strong secondary intents with disjoint agents
//!
//! No query fails classification; GENERAL is a valid catch-all.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::agents::AgentName;
use crate::embeddings::{Embedder, Embedding};
use crate::geocode::Gazetteer;
use crate::llm::{ChatMessage, LlmChat};

mod exemplars;
mod params;

pub use exemplars::EXEMPLARS;
pub use params::{extract_params, strip_location_qualifiers, QueryParams};

/// Confidence below which the LLM fallback is consulted
const LLM_FALLBACK_THRESHOLD: f64 = 0.45;

/// Minimum LLM self-reported confidence for its label to be accepted
const LLM_ACCEPT_THRESHOLD: f64 = 0.5;

/// Secondary-intent similarity needed for multi-intent expansion
const MULTI_INTENT_THRESHOLD: f64 = 0.40;

/// No classification ever reports less than this
const CONFIDENCE_FLOOR: f64 = 0.10;

// ============================================================================
// INTENTS
// ============================================================================

/// Closed intent label set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Count,
    Aggregate,
    AnomalyDetection,
    Validation,
    DistanceQuery,
    CoverageGap,
    MedicalDesert,
    SinglePointFailure,
    FacilityLookup,
    ServiceSearch,
    SpecialtySearch,
    Comparison,
    Planning,
    General,
}

/// All intents in declaration order (also the tie-break order)
pub const ALL_INTENTS: [Intent; 14] = [
    Intent::Count,
    Intent::Aggregate,
    Intent::AnomalyDetection,
    Intent::Validation,
    Intent::DistanceQuery,
    Intent::CoverageGap,
    Intent::MedicalDesert,
    Intent::SinglePointFailure,
    Intent::FacilityLookup,
    Intent::ServiceSearch,
    Intent::SpecialtySearch,
    Intent::Comparison,
    Intent::Planning,
    Intent::General,
];

impl Intent {
    /// Label string as reported in responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Count => "COUNT",
            Intent::Aggregate => "AGGREGATE",
            Intent::AnomalyDetection => "ANOMALY_DETECTION",
            Intent::Validation => "VALIDATION",
            Intent::DistanceQuery => "DISTANCE_QUERY",
            Intent::CoverageGap => "COVERAGE_GAP",
            Intent::MedicalDesert => "MEDICAL_DESERT",
            Intent::SinglePointFailure => "SINGLE_POINT_FAILURE",
            Intent::FacilityLookup => "FACILITY_LOOKUP",
            Intent::ServiceSearch => "SERVICE_SEARCH",
            Intent::SpecialtySearch => "SPECIALTY_SEARCH",
            Intent::Comparison => "COMPARISON",
            Intent::Planning => "PLANNING",
            Intent::General => "GENERAL",
        }
    }

    /// Parse a label, case-insensitive
    pub fn parse_name(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase();
        ALL_INTENTS.into_iter().find(|i| i.as_str() == normalized)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ROUTING TABLE
// ============================================================================

/// Plan execution flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Single,
    Sequential,
    Parallel,
}

/// The routing table: intent -> (ordered agents, flow). Data, not code;
/// a single dispatcher reads it.
pub fn routing(intent: Intent) -> (&'static [AgentName], Flow) {
    use AgentName::{Analyst, Geo, Planner, Searcher, Validator};
    match intent {
        Intent::Count | Intent::Aggregate => (&[Analyst], Flow::Single),
        Intent::AnomalyDetection => (&[Analyst, Validator], Flow::Sequential),
        Intent::Validation => (&[Searcher, Validator], Flow::Sequential),
        Intent::DistanceQuery => (&[Geo], Flow::Single),
        Intent::CoverageGap | Intent::MedicalDesert => (&[Geo, Validator], Flow::Sequential),
        Intent::SinglePointFailure => (&[Analyst, Validator], Flow::Sequential),
        Intent::FacilityLookup | Intent::SpecialtySearch => (&[Searcher], Flow::Single),
        Intent::ServiceSearch => (&[Searcher, Analyst], Flow::Sequential),
        Intent::Comparison => (&[Analyst, Geo], Flow::Parallel),
        Intent::Planning => (&[Planner], Flow::Single),
        Intent::General => (&[Searcher, Analyst], Flow::Parallel),
    }
}

// ============================================================================
// PLAN
// ============================================================================

/// The classifier's output: intent, confidence, and an ordered agent plan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub intent: Intent,
    pub confidence: f64,
    pub agents: Vec<AgentName>,
    pub flow: Flow,
    #[serde(skip)]
    pub params: QueryParams,
}

// ============================================================================
// REGEX FALLBACK PATTERNS
// ============================================================================

#[derive(Deserialize)]
struct PatternFile {
    patterns: std::collections::BTreeMap<String, Vec<String>>,
}

fn fallback_patterns() -> &'static Vec<(Intent, Vec<Regex>)> {
    static PATTERNS: OnceLock<Vec<(Intent, Vec<Regex>)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let raw = include_str!("../../data/intent_patterns.json");
        let file: PatternFile = serde_json::from_str(raw).expect("bundled pattern file is valid");
        // keep intent declaration order for deterministic tie-breaks
        ALL_INTENTS
            .into_iter()
            .filter_map(|intent| {
                let key = intent.as_str().to_lowercase();
                let sources = file.patterns.get(&key)?;
                let compiled = sources
                    .iter()
                    .map(|p| {
                        Regex::new(&format!("(?i){p}")).expect("bundled pattern compiles")
                    })
                    .collect();
                Some((intent, compiled))
            })
            .collect()
    })
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Logistic squash of the top-two score gap: ~0.5 at a 0.05 margin
fn gap_confidence(gap: f64) -> f64 {
    let x = 20.0 * (gap - 0.05);
    1.0 / (1.0 + (-x).exp())
}

#[derive(Deserialize)]
struct LlmIntentReply {
    intent: String,
    confidence: f64,
}

/// Embedding-similarity + regex + LLM-fallback intent classifier
pub struct IntentClassifier {
    embedder: Option<Arc<dyn Embedder>>,
    llm: Option<Arc<dyn LlmChat>>,
    gazetteer: &'static Gazetteer,
    /// per-intent exemplar embeddings, unit-norm, frozen at build
    exemplar_embeddings: Option<Vec<(Intent, Vec<Embedding>)>>,
}

impl IntentClassifier {
    /// Build the classifier, pre-embedding every exemplar. When the embedder
    /// is absent or fails, the classifier degrades to the regex pipeline.
    pub async fn build(
        embedder: Option<Arc<dyn Embedder>>,
        llm: Option<Arc<dyn LlmChat>>,
    ) -> Self {
        let exemplar_embeddings = match &embedder {
            Some(embedder) => {
                let mut per_intent = Vec::with_capacity(EXEMPLARS.len());
                let mut failed = false;
                for (intent, sentences) in EXEMPLARS {
                    let texts: Vec<String> = sentences.iter().map(|s| s.to_string()).collect();
                    match embedder.embed_batch(&texts).await {
                        Ok(embeddings) => per_intent.push((intent, embeddings)),
                        Err(e) => {
                            tracing::warn!(intent = %intent, error = %e, "exemplar embedding failed; regex fallback only");
                            failed = true;
                            break;
                        }
                    }
                }
                (!failed).then_some(per_intent)
            }
            None => None,
        };

        Self {
            embedder,
            llm,
            gazetteer: Gazetteer::bundled(),
            exemplar_embeddings,
        }
    }

    /// Classify a query into a plan. Never fails; GENERAL catches the rest.
    pub async fn classify(&self, query: &str) -> Plan {
        let params = extract_params(query, self.gazetteer);

        let scored = self.score_by_embedding(query).await;
        let (intent, confidence, scores) = match scored {
            Some(scores) => {
                let (intent, confidence) = self.pick_with_llm_fallback(query, &scores).await;
                (intent, confidence, Some(scores))
            }
            None => {
                let (intent, confidence) = self.regex_fallback(query);
                (intent, confidence, None)
            }
        };

        let (base_agents, base_flow) = routing(intent);
        let mut agents: Vec<AgentName> = base_agents.to_vec();
        let mut flow = base_flow;

        // Multi-intent expansion: strong secondary intents with disjoint
        // agent sets extend the plan
        if let Some(scores) = &scores {
            let mut expanded_with_comparison = false;
            for &(other, score) in scores {
                if other == intent || score < MULTI_INTENT_THRESHOLD {
                    continue;
                }
                let (other_agents, _) = routing(other);
                if other_agents.iter().any(|a| agents.contains(a)) {
                    continue;
                }
                agents.extend_from_slice(other_agents);
                expanded_with_comparison |= other == Intent::Comparison;
            }
            if agents.len() > base_agents.len() {
                flow = if intent == Intent::Comparison || expanded_with_comparison {
                    Flow::Parallel
                } else {
                    Flow::Sequential
                };
                tracing::debug!(agents = ?agents, "multi-intent expansion applied");
            }
        }

        Plan {
            intent,
            confidence: confidence.clamp(CONFIDENCE_FLOOR, 1.0),
            agents,
            flow,
            params,
        }
    }

    /// Per-intent scores (mean of top-2 exemplar similarities), sorted
    /// descending. `None` when embeddings are unavailable.
    async fn score_by_embedding(&self, query: &str) -> Option<Vec<(Intent, f64)>> {
        let embedder = self.embedder.as_ref()?;
        let exemplars = self.exemplar_embeddings.as_ref()?;

        let query_embedding = match embedder.embed(query).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed; regex fallback");
                return None;
            }
        };

        let mut scores: Vec<(Intent, f64)> = exemplars
            .iter()
            .map(|(intent, embeddings)| {
                let mut sims: Vec<f64> = embeddings
                    .iter()
                    .map(|e| query_embedding.cosine_similarity(e) as f64)
                    .collect();
                sims.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
                let top2 = &sims[..sims.len().min(2)];
                let score = top2.iter().sum::<f64>() / top2.len().max(1) as f64;
                (*intent, score)
            })
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Some(scores)
    }

    /// Winner + confidence from sorted scores, consulting the LLM when the
    /// embedding confidence is low
    async fn pick_with_llm_fallback(
        &self,
        query: &str,
        scores: &[(Intent, f64)],
    ) -> (Intent, f64) {
        let (winner, s1) = scores[0];
        let s2 = scores.get(1).map(|&(_, s)| s).unwrap_or(0.0);
        let confidence = gap_confidence(s1 - s2);

        if confidence >= LLM_FALLBACK_THRESHOLD {
            return (winner, confidence);
        }

        if let Some(llm) = &self.llm {
            match self.ask_llm(llm.as_ref(), query).await {
                Some((intent, llm_confidence)) if llm_confidence >= LLM_ACCEPT_THRESHOLD => {
                    tracing::debug!(intent = %intent, confidence = llm_confidence, "LLM fallback accepted");
                    return (intent, llm_confidence);
                }
                Some(_) | None => {
                    tracing::debug!("LLM fallback rejected; keeping embedding winner");
                }
            }
        }

        (winner, confidence)
    }

    async fn ask_llm(&self, llm: &dyn LlmChat, query: &str) -> Option<(Intent, f64)> {
        let labels: Vec<&str> = ALL_INTENTS.iter().map(|i| i.as_str()).collect();
        let system = format!(
            "You classify healthcare facility queries into exactly one intent label. \
             Valid labels: {}. Respond with JSON only: \
             {{\"intent\": \"<LABEL>\", \"confidence\": <0.0-1.0>}}",
            labels.join(", ")
        );
        let messages = [ChatMessage::system(system), ChatMessage::user(query)];

        let reply = match llm.chat(&messages, 64, 0.0).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "LLM intent fallback failed");
                return None;
            }
        };

        // tolerate fenced or prefixed output around the JSON object
        let start = reply.find('{')?;
        let end = reply.rfind('}')?;
        let parsed: LlmIntentReply = serde_json::from_str(&reply[start..=end]).ok()?;
        let intent = Intent::parse_name(&parsed.intent)?;
        Some((intent, parsed.confidence))
    }

    /// Regex scoring over the bundled pattern sets; ties break by intent
    /// declaration order
    fn regex_fallback(&self, query: &str) -> (Intent, f64) {
        let mut best: Option<(Intent, usize)> = None;
        for (intent, patterns) in fallback_patterns() {
            let matches = patterns.iter().filter(|p| p.is_match(query)).count();
            if matches > 0 && best.is_none_or(|(_, m)| matches > m) {
                best = Some((*intent, matches));
            }
        }
        match best {
            Some((intent, matches)) => {
                let confidence = (0.45 + 0.15 * matches as f64).min(0.95);
                (intent, confidence)
            }
            None => (Intent::General, 0.30),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
