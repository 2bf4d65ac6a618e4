//! Orchestrator
//!
//! The stateful workflow engine: router -> agents (per the plan's flow) ->
//! aggregator. The plan is an explicit transition table; agents receive an
//! immutable context and emit one result record, and the orchestrator alone
//! decides the next node. The single self-correction edge wraps the
//! semantic searcher: an empty filtered result strips geocodable location
//! qualifiers and retries once without filters.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use crate::agents::{
    Agent, AgentContext, AgentName, AgentResult, AnalystAgent, GeoAgent, PlannerAgent,
    SearcherAgent, ValidatorAgent,
};
use crate::config::{EngineConfig, MAX_QUERY_CHARS};
use crate::corpus::CorpusStore;
use crate::embeddings::Embedder;
use crate::geocode::Gazetteer;
use crate::intent::{strip_location_qualifiers, Flow, IntentClassifier, Plan};
use crate::llm::LlmChat;
use crate::spatial::SpatialIndex;
use crate::vector::{build_facility_index, IndexBuildError, VectorIndex};

mod aggregate;
mod response;

pub use response::{Response, TraceStep};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Engine boundary errors
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Query rejected before classification
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// ENGINE
// ============================================================================

/// The multi-agent query engine: inbound contract `run(query) -> Response`
pub struct QueryEngine {
    classifier: IntentClassifier,
    analyst: Arc<AnalystAgent>,
    searcher: Arc<SearcherAgent>,
    validator: Arc<ValidatorAgent>,
    geo: Arc<GeoAgent>,
    planner: Arc<PlannerAgent>,
    llm: Option<Arc<dyn LlmChat>>,
    gazetteer: &'static Gazetteer,
    config: EngineConfig,
}

impl QueryEngine {
    /// Build the engine from a loaded corpus and its collaborators: embeds
    /// and upserts the facility index, builds the spatial index, and
    /// pre-embeds the classifier exemplars.
    pub async fn bootstrap(
        corpus: Arc<CorpusStore>,
        embedder: Option<Arc<dyn Embedder>>,
        vector_index: Arc<dyn VectorIndex>,
        llm: Option<Arc<dyn LlmChat>>,
        config: EngineConfig,
    ) -> Result<Self, IndexBuildError> {
        if let Some(embedder) = &embedder {
            build_facility_index(embedder.as_ref(), vector_index.as_ref(), &corpus).await?;
        }
        let spatial = Arc::new(SpatialIndex::build(&corpus));
        let classifier = IntentClassifier::build(embedder.clone(), llm.clone()).await;

        Ok(Self {
            classifier,
            analyst: Arc::new(AnalystAgent::new(corpus.clone())),
            searcher: Arc::new(SearcherAgent::new(
                corpus.clone(),
                vector_index,
                embedder,
                config.search.clone(),
            )),
            validator: Arc::new(ValidatorAgent::new(corpus.clone())),
            geo: Arc::new(GeoAgent::new(corpus.clone(), spatial.clone())),
            planner: Arc::new(PlannerAgent::new(corpus, spatial)),
            llm,
            gazetteer: Gazetteer::bundled(),
            config,
        })
    }

    fn agent(&self, name: AgentName) -> &dyn Agent {
        match name {
            AgentName::Analyst => self.analyst.as_ref(),
            AgentName::Searcher => self.searcher.as_ref(),
            AgentName::Validator => self.validator.as_ref(),
            AgentName::Geo => self.geo.as_ref(),
            AgentName::Planner => self.planner.as_ref(),
        }
    }

    /// Run one query through router, agents, and aggregator
    pub async fn run(&self, query: &str) -> Result<Response, EngineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::InvalidInput("query is empty".to_string()));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(EngineError::InvalidInput(format!(
                "query exceeds {MAX_QUERY_CHARS} characters"
            )));
        }

        let started = Instant::now();
        let deadline = started + self.config.plan_deadline;
        let mut trace: Vec<TraceStep> = Vec::new();
        let mut partial = false;

        // ---- router ----
        let router_started = Instant::now();
        let plan = self.classifier.classify(query).await;
        tracing::info!(
            intent = %plan.intent,
            confidence = plan.confidence,
            agents = ?plan.agents,
            "plan built"
        );
        trace.push(TraceStep {
            agent: "router".to_string(),
            action: "classify".to_string(),
            duration_ms: router_started.elapsed().as_millis() as u64,
            summary: format!(
                "intent {} (confidence {:.2}), {} agent(s), {:?} flow",
                plan.intent,
                plan.confidence,
                plan.agents.len(),
                plan.flow
            ),
            citations: vec![],
            error: None,
        });

        // ---- agents ----
        let mut results: BTreeMap<AgentName, AgentResult> = BTreeMap::new();
        match plan.flow {
            Flow::Parallel => {
                self.run_parallel(query, &plan, deadline, &mut results, &mut trace, &mut partial)
                    .await;
            }
            Flow::Single | Flow::Sequential => {
                self.run_sequential(query, &plan, deadline, &mut results, &mut trace, &mut partial)
                    .await;
            }
        }

        // ---- aggregator ----
        let aggregate_started = Instant::now();
        let keyed: BTreeMap<String, AgentResult> = results
            .iter()
            .map(|(name, result)| (name.as_str().to_string(), result.clone()))
            .collect();
        let map_facilities = aggregate::collect_map_facilities(&keyed);

        let summary = match (&self.llm, self.config.synthesize_with_llm) {
            (Some(llm), true) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match tokio::time::timeout(
                    remaining,
                    aggregate::synthesize_summary(
                        llm.as_ref(),
                        query,
                        &keyed,
                        self.config.summary_char_budget,
                    ),
                )
                .await
                {
                    Ok(text) => text,
                    Err(_) => {
                        tracing::warn!("summary synthesis timed out; using fallback");
                        aggregate::fallback_summary(&keyed)
                    }
                }
            }
            _ => aggregate::fallback_summary(&keyed),
        };

        trace.push(TraceStep {
            agent: "aggregator".to_string(),
            action: "aggregate".to_string(),
            duration_ms: aggregate_started.elapsed().as_millis() as u64,
            summary: format!("{} map facilities, {} results merged", map_facilities.len(), keyed.len()),
            citations: vec![],
            error: None,
        });

        Ok(Response {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.to_string(),
            intent: plan.intent,
            confidence: plan.confidence,
            agents_used: plan.agents.iter().map(|a| a.as_str().to_string()).collect(),
            agent_results: keyed,
            map_facilities,
            summary,
            trace,
            partial,
            total_duration_ms: started.elapsed().as_millis() as u64,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Sequential execution: each agent observes the committed outputs of
    /// its predecessors
    async fn run_sequential(
        &self,
        query: &str,
        plan: &Plan,
        deadline: Instant,
        results: &mut BTreeMap<AgentName, AgentResult>,
        trace: &mut Vec<TraceStep>,
        partial: &mut bool,
    ) {
        for &name in &plan.agents {
            let step_index = trace.len();
            let step_started = Instant::now();
            let remaining = deadline.saturating_duration_since(Instant::now());

            let outcome = {
                let ctx = AgentContext {
                    query,
                    intent: plan.intent,
                    params: &plan.params,
                    prior: results,
                    step_index,
                };
                tokio::time::timeout(remaining, self.agent(name).run(&ctx)).await
            };
            let (result, error) = Self::settle(name, outcome, partial);
            trace.push(TraceStep {
                agent: name.as_str().to_string(),
                action: result.action().to_string(),
                duration_ms: step_started.elapsed().as_millis() as u64,
                summary: aggregate::fact_for(&result),
                citations: result.citations().to_vec(),
                error,
            });
            results.insert(name, result);

            if name == AgentName::Searcher {
                self.self_correct(query, plan, deadline, results, trace).await;
            }
        }
    }

    /// Parallel execution: agents share nothing and merge deterministically
    /// by agent name
    async fn run_parallel(
        &self,
        query: &str,
        plan: &Plan,
        deadline: Instant,
        results: &mut BTreeMap<AgentName, AgentResult>,
        trace: &mut Vec<TraceStep>,
        partial: &mut bool,
    ) {
        let empty = BTreeMap::new();
        let base_step = trace.len();
        let remaining = deadline.saturating_duration_since(Instant::now());

        let futures: Vec<_> = plan
            .agents
            .iter()
            .enumerate()
            .map(|(offset, &name)| {
                let empty = &empty;
                let params = &plan.params;
                async move {
                    let started = Instant::now();
                    let ctx = AgentContext {
                        query,
                        intent: plan.intent,
                        params,
                        prior: empty,
                        step_index: base_step + offset,
                    };
                    let outcome =
                        tokio::time::timeout(remaining, self.agent(name).run(&ctx)).await;
                    (name, outcome, started.elapsed())
                }
            })
            .collect();

        for (name, outcome, elapsed) in join_all(futures).await {
            let (result, error) = Self::settle(name, outcome, partial);
            trace.push(TraceStep {
                agent: name.as_str().to_string(),
                action: result.action().to_string(),
                duration_ms: elapsed.as_millis() as u64,
                summary: aggregate::fact_for(&result),
                citations: result.citations().to_vec(),
                error,
            });
            results.insert(name, result);
        }

        if plan.agents.contains(&AgentName::Searcher) {
            self.self_correct(query, plan, deadline, results, trace).await;
        }
    }

    /// Normalize an agent outcome: errors and timeouts become in-band
    /// `Failed` results so every planned agent has an entry
    fn settle(
        name: AgentName,
        outcome: Result<Result<AgentResult, crate::agents::AgentError>, tokio::time::error::Elapsed>,
        partial: &mut bool,
    ) -> (AgentResult, Option<String>) {
        match outcome {
            Ok(Ok(result)) => (result, None),
            Ok(Err(e)) => {
                tracing::warn!(agent = %name, error = %e, "agent failed");
                *partial = true;
                let message = e.to_string();
                (
                    AgentResult::Failed { error: message.clone(), citations: vec![] },
                    Some(message),
                )
            }
            Err(_) => {
                tracing::warn!(agent = %name, "agent timed out");
                *partial = true;
                (
                    AgentResult::Failed { error: "timeout".to_string(), citations: vec![] },
                    Some("timeout".to_string()),
                )
            }
        }
    }

    /// The one self-correction edge: if the searcher came back empty under
    /// filters, strip geocodable location qualifiers and retry once
    /// without filters
    async fn self_correct(
        &self,
        query: &str,
        plan: &Plan,
        deadline: Instant,
        results: &mut BTreeMap<AgentName, AgentResult>,
        trace: &mut Vec<TraceStep>,
    ) {
        let needs_retry = matches!(
            results.get(&AgentName::Searcher),
            Some(AgentResult::SemanticSearch { count: 0, filters_applied, .. })
                if !filters_applied.is_empty()
        );
        if !needs_retry {
            return;
        }

        let cleaned = strip_location_qualifiers(query, self.gazetteer)
            .unwrap_or_else(|| query.to_string());
        tracing::debug!(retry_query = %cleaned, "self-correction retry without filters");

        let step_index = trace.len();
        let step_started = Instant::now();
        let remaining = deadline.saturating_duration_since(Instant::now());
        let outcome = tokio::time::timeout(
            remaining,
            self.searcher
                .search_with(&cleaned, &plan.params, false, true, step_index),
        )
        .await;

        let (result, error) = match outcome {
            Ok(Ok(result)) => (result, None),
            Ok(Err(e)) => {
                let message = e.to_string();
                (
                    AgentResult::Failed { error: message.clone(), citations: vec![] },
                    Some(message),
                )
            }
            Err(_) => (
                AgentResult::Failed { error: "timeout".to_string(), citations: vec![] },
                Some("timeout".to_string()),
            ),
        };

        trace.push(TraceStep {
            agent: "self_correction".to_string(),
            action: result.action().to_string(),
            duration_ms: step_started.elapsed().as_millis() as u64,
            summary: aggregate::fact_for(&result),
            citations: result.citations().to_vec(),
            error,
        });
        // the retry replaces the searcher's committed slot
        if !matches!(result, AgentResult::Failed { .. }) {
            results.insert(AgentName::Searcher, result);
        }
    }
}
