//! Semantic Searcher
//!
//! Multi-vector retrieval with Reciprocal Rank Fusion. Three query
//! embeddings (one per named vector, each with its own template) are
//! searched independently under the same payload filter, then fused:
//!
//! `score(d) = sum over vectors of weight(v) / (60 + rank_v(d))`
//!
//! Per-vector weights adapt to clinical / specialty keyword hits in the
//! query and are normalized to sum to 3.0 so no vector dominates.

use async_trait::async_trait;
use lru::LruCache;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::corpus::extract::{contains_phrase, tokenize};
use crate::corpus::{CorpusStore, ALL_SPECIALTIES};
use crate::embeddings::{Embedder, Embedding};
use crate::intent::QueryParams;
use crate::vector::{
    Condition, FieldMatch, Filter, NamedVector, ScoredPoint, VectorIndex, ALL_VECTORS,
    FACILITY_COLLECTION, FIELD_CITY, FIELD_FACILITY_TYPE, FIELD_ORGANIZATION, FIELD_REGION,
};

use super::{
    Agent, AgentContext, AgentError, AgentName, AgentResult, Citation, FacilitySummary,
    ScoredFacility,
};

/// RRF rank-dampening constant
const RRF_K: f64 = 60.0;

/// Per-vector weights are normalized to this total
const WEIGHT_TOTAL: f64 = 3.0;

/// Keyword-hit contribution to a vector's raw weight is capped here
const MAX_KEYWORD_BOOST: usize = 3;

/// Query-embedding cache entries
const EMBEDDING_CACHE_SIZE: usize = 256;

/// Free-text markers of clinical detail (procedures / equipment talk)
const CLINICAL_KEYWORDS: [&str; 20] = [
    "catheterization",
    "cath lab",
    "surgery",
    "surgical",
    "dialysis",
    "mri",
    "ct",
    "x-ray",
    "xray",
    "ultrasound",
    "icu",
    "ventilator",
    "laboratory",
    "radiotherapy",
    "chemotherapy",
    "scan",
    "scanner",
    "theater",
    "theatre",
    "endoscopy",
];

/// Organization tags recognized in query text
const ORGANIZATION_KEYWORDS: [&str; 4] = ["government", "private", "chag", "mission"];

/// Search knobs, engine-configurable
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Results returned after fusion
    pub k: usize,
    /// Per-vector candidate pool is `k * candidate_multiplier`
    pub candidate_multiplier: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { k: 30, candidate_multiplier: 3 }
    }
}

/// Multi-vector RRF searcher
pub struct SearcherAgent {
    corpus: Arc<CorpusStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Option<Arc<dyn Embedder>>,
    config: SearchConfig,
    cache: Mutex<LruCache<String, Embedding>>,
}

impl SearcherAgent {
    pub fn new(
        corpus: Arc<CorpusStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Option<Arc<dyn Embedder>>,
        config: SearchConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(EMBEDDING_CACHE_SIZE).expect("cache size is nonzero");
        Self { corpus, index, embedder, config, cache: Mutex::new(LruCache::new(capacity)) }
    }

    /// Vector-specific query templates, in [`ALL_VECTORS`] order
    fn query_templates(query: &str) -> [String; 3] {
        [
            query.to_string(),
            format!("Procedures: {query} | Equipment: {query}"),
            format!("facility with specialties: {query}"),
        ]
    }

    /// Raw then normalized per-vector weights; the normalized weights sum
    /// to exactly [`WEIGHT_TOTAL`]
    fn vector_weights(query: &str) -> BTreeMap<String, f64> {
        let clinical_hits = CLINICAL_KEYWORDS
            .iter()
            .filter(|kw| contains_phrase(query, kw))
            .count()
            .min(MAX_KEYWORD_BOOST);
        let specialty_hits = ALL_SPECIALTIES
            .iter()
            .filter(|s| s.keywords().iter().any(|kw| contains_phrase(query, kw)))
            .count()
            .min(MAX_KEYWORD_BOOST);

        let raw = [
            (NamedVector::FullDocument, 1.0),
            (NamedVector::ClinicalDetail, 1.0 + clinical_hits as f64),
            (NamedVector::SpecialtiesContext, 1.0 + specialty_hits as f64),
        ];
        let total: f64 = raw.iter().map(|&(_, w)| w).sum();
        raw.into_iter()
            .map(|(v, w)| (v.as_str().to_string(), w * WEIGHT_TOTAL / total))
            .collect()
    }

    /// Payload filter from extracted parameters. City terms may live in
    /// either indexed location field, so the city condition ORs across both.
    fn build_filter(query: &str, params: &QueryParams) -> (Filter, Vec<String>) {
        let mut filter = Filter::none();
        let mut applied = Vec::new();

        if let Some(city) = &params.city {
            filter = filter.with(Condition::any(vec![
                FieldMatch::new(FIELD_CITY, city.clone()),
                FieldMatch::new(FIELD_REGION, city.clone()),
            ]));
            applied.push(format!("city={city}"));
        }
        if let Some(region) = &params.region {
            filter = filter.with(Condition::equals(FIELD_REGION, region.clone()));
            applied.push(format!("region={region}"));
        }
        if let Some(facility_type) = params.facility_type {
            filter = filter.with(Condition::equals(
                FIELD_FACILITY_TYPE,
                facility_type.as_str(),
            ));
            applied.push(format!("type={facility_type}"));
        }
        let query_tokens = tokenize(query);
        if let Some(org) = ORGANIZATION_KEYWORDS
            .iter()
            .find(|kw| query_tokens.iter().any(|t| t == *kw))
        {
            filter = filter.with(Condition::equals(FIELD_ORGANIZATION, *org));
            applied.push(format!("organization={org}"));
        }

        (filter, applied)
    }

    async fn embed_cached(
        &self,
        embedder: &Arc<dyn Embedder>,
        text: &str,
    ) -> Result<Embedding, AgentError> {
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(text)
            .cloned()
        {
            return Ok(hit);
        }
        let embedding = embedder.embed(text).await?;
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    /// Run the fused search. `apply_filters = false` is the self-correction
    /// retry path; `retried` marks the result as a second attempt.
    pub async fn search_with(
        &self,
        query: &str,
        params: &QueryParams,
        apply_filters: bool,
        retried: bool,
        step_index: usize,
    ) -> Result<AgentResult, AgentError> {
        let Some(embedder) = self.embedder.as_ref() else {
            return Ok(AgentResult::Failed {
                error: "embedder_unavailable".to_string(),
                citations: vec![],
            });
        };

        let (filter, filters_applied) = if apply_filters {
            Self::build_filter(query, params)
        } else {
            (Filter::none(), Vec::new())
        };

        let templates = Self::query_templates(query);
        let weights = Self::vector_weights(query);
        let pool = self.config.k * self.config.candidate_multiplier;

        let mut fused: HashMap<String, f64> = HashMap::new();
        for (vector, template) in ALL_VECTORS.into_iter().zip(&templates) {
            let embedding = self.embed_cached(embedder, template).await?;
            let hits: Vec<ScoredPoint> = match self
                .index
                .search(FACILITY_COLLECTION, vector, &embedding, &filter, pool)
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    // an unreachable index degrades to an empty list; the
                    // orchestrator's self-correction takes it from there
                    tracing::warn!(vector = %vector, error = %e, "vector search failed");
                    Vec::new()
                }
            };
            let weight = weights[vector.as_str()];
            for (rank, hit) in hits.iter().enumerate() {
                *fused.entry(hit.id.clone()).or_default() += weight / (RRF_K + (rank + 1) as f64);
            }
        }

        let mut ranked: Vec<(String, f64)> = fused.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(self.config.k);

        let facilities: Vec<ScoredFacility> = ranked
            .iter()
            .filter_map(|(id, score)| {
                let facility = self.corpus.get(id)?;
                Some(ScoredFacility {
                    facility: FacilitySummary::from_facility(facility),
                    rrf_score: *score,
                    display_score: (score * 100.0).min(1.0),
                })
            })
            .collect();

        let citations = facilities
            .iter()
            .map(|f| Citation {
                facility_id: f.facility.id.clone(),
                field: "rrf_score".to_string(),
                value: format!("{:.4}", f.rrf_score),
                confidence: f.display_score,
                step_index,
            })
            .collect();

        Ok(AgentResult::SemanticSearch {
            count: facilities.len(),
            facilities,
            search_method: "reciprocal_rank_fusion".to_string(),
            vector_weights: weights,
            filters_applied,
            retried_without_filters: retried,
            citations,
        })
    }
}

#[async_trait]
impl Agent for SearcherAgent {
    fn name(&self) -> AgentName {
        AgentName::Searcher
    }

    async fn run(&self, ctx: &AgentContext<'_>) -> Result<AgentResult, AgentError> {
        self.search_with(ctx.query, ctx.params, true, false, ctx.step_index).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
