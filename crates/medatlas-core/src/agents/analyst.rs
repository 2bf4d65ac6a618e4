//! Data Analyst
//!
//! Structured queries over the corpus: counts with negation-aware filters,
//! regional aggregation, specialty distribution, IQR ratio anomalies, and
//! single-point-of-failure ranking.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::corpus::{CorpusStore, Facility, ALL_SPECIALTIES};
use crate::intent::Intent;
use crate::stats::percentile;

use super::{
    Agent, AgentContext, AgentError, AgentName, AgentResult, Citation, FacilitySummary,
    RatioAnomaly, Severity, SpofEntry,
};

/// IQR multiplier for the ratio anomaly threshold
const IQR_FACTOR: f64 = 1.5;

/// The ratio threshold never drops below this (noise floor on sparse data)
const RATIO_THRESHOLD_FLOOR: f64 = 20.0;

/// A specialty offered by at most this many facilities is a failure risk
const SPOF_MAX_COUNT: usize = 3;

/// Specialties offered by at most [`SPOF_MAX_COUNT`] facilities, ranked
/// rarest first. Shared with the validator's national-level report.
pub(crate) fn spof_entries(corpus: &CorpusStore) -> (BTreeMap<String, usize>, Vec<SpofEntry>) {
    let mut results: Vec<SpofEntry> = ALL_SPECIALTIES
        .into_iter()
        .filter_map(|specialty| {
            let offering = corpus.by_specialty(specialty);
            let count = offering.len();
            if count == 0 || count > SPOF_MAX_COUNT {
                return None;
            }
            let risk_level = match count {
                1 => Severity::Critical,
                2 => Severity::High,
                _ => Severity::Medium,
            };
            Some(SpofEntry {
                specialty: specialty.to_string(),
                facility_count: count,
                facilities: offering.iter().map(|f| FacilitySummary::from_facility(f)).collect(),
                risk_level,
            })
        })
        .collect();
    results.sort_by_key(|e| e.facility_count);

    let rare_specialties: BTreeMap<String, usize> = results
        .iter()
        .map(|e| (e.specialty.clone(), e.facility_count))
        .collect();

    (rare_specialties, results)
}

/// Structured-query analyst over the corpus
pub struct AnalystAgent {
    corpus: Arc<CorpusStore>,
}

impl AnalystAgent {
    pub fn new(corpus: Arc<CorpusStore>) -> Self {
        Self { corpus }
    }

    fn count_facilities(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let params = ctx.params;
        let mut filters_applied = Vec::new();

        if let Some(specialty) = params.specialty {
            if params.specialty_negated {
                filters_applied.push(format!("specialty!={specialty}"));
            } else {
                filters_applied.push(format!("specialty={specialty}"));
            }
        }
        if let Some(region) = &params.region {
            filters_applied.push(format!("region={region}"));
        }
        if let Some(facility_type) = params.facility_type {
            filters_applied.push(format!("type={facility_type}"));
        }
        if let Some(equipment) = params.equipment {
            filters_applied.push(format!("equipment={equipment}"));
        }

        let matched: Vec<&Facility> = self.corpus.filter(|f| {
            let specialty_ok = match params.specialty {
                // negation inverts the mask: select facilities lacking it
                Some(tag) if params.specialty_negated => !f.has_specialty(tag),
                Some(tag) => f.has_specialty(tag),
                None => true,
            };
            specialty_ok
                && params
                    .region
                    .as_ref()
                    .is_none_or(|r| f.region.eq_ignore_ascii_case(r))
                && params.facility_type.is_none_or(|t| f.facility_type == t)
                && params.equipment.is_none_or(|e| f.has_equipment(e))
        });

        let citations = matched
            .iter()
            .take(20)
            .map(|f| Citation {
                facility_id: f.id.clone(),
                field: match (params.specialty, &params.region) {
                    (Some(_), _) => "specialties".to_string(),
                    (None, Some(_)) => "region".to_string(),
                    _ => "facility_type".to_string(),
                },
                value: filters_applied.join(", "),
                confidence: 1.0,
                step_index: ctx.step_index,
            })
            .collect();

        AgentResult::CountFacilities {
            count: matched.len(),
            facilities: matched.iter().map(|f| FacilitySummary::from_facility(f)).collect(),
            filters_applied,
            citations,
        }
    }

    fn region_aggregation(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let specialty = ctx.params.specialty;
        let mut aggregation: BTreeMap<String, usize> = BTreeMap::new();
        for facility in self.corpus.all() {
            if specialty.is_none_or(|tag| facility.has_specialty(tag)) {
                *aggregation.entry(facility.region.clone()).or_default() += 1;
            }
        }

        let (top_region, top_count) = aggregation
            .iter()
            .max_by_key(|&(_, &count)| count)
            .map(|(region, &count)| (Some(region.clone()), count))
            .unwrap_or((None, 0));

        let citations = top_region
            .as_deref()
            .map(|region| {
                self.corpus
                    .by_region(region)
                    .into_iter()
                    .take(5)
                    .map(|f| Citation {
                        facility_id: f.id.clone(),
                        field: "region".to_string(),
                        value: region.to_string(),
                        confidence: 1.0,
                        step_index: ctx.step_index,
                    })
                    .collect()
            })
            .unwrap_or_default();

        AgentResult::RegionAggregation { aggregation, top_region, top_count, citations }
    }

    fn specialty_distribution(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
        for specialty in ALL_SPECIALTIES {
            let count = self.corpus.by_specialty(specialty).len();
            if count > 0 {
                distribution.insert(specialty.to_string(), count);
            }
        }

        let citations = distribution
            .iter()
            .max_by_key(|&(_, &count)| count)
            .and_then(|(tag, _)| {
                let specialty = crate::corpus::Specialty::parse_name(tag)?;
                Some(
                    self.corpus
                        .by_specialty(specialty)
                        .into_iter()
                        .take(5)
                        .map(|f| Citation {
                            facility_id: f.id.clone(),
                            field: "specialties".to_string(),
                            value: tag.clone(),
                            confidence: 1.0,
                            step_index: ctx.step_index,
                        })
                        .collect(),
                )
            })
            .unwrap_or_default();

        AgentResult::SpecialtyDistribution {
            total_unique_specialties: distribution.len(),
            distribution,
            citations,
        }
    }

    fn ratio_anomalies(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let with_ratio: Vec<(&Facility, f64)> = self
            .corpus
            .all()
            .filter_map(|f| f.bed_doctor_ratio().map(|r| (f, r)))
            .collect();

        let ratios: Vec<f64> = with_ratio.iter().map(|&(_, r)| r).collect();
        let q25 = percentile(&ratios, 25.0);
        let q75 = percentile(&ratios, 75.0);
        let iqr = q75 - q25;
        let threshold = (q75 + IQR_FACTOR * iqr).max(RATIO_THRESHOLD_FLOOR);

        let anomalies: Vec<RatioAnomaly> = with_ratio
            .iter()
            .filter(|&&(_, ratio)| ratio > threshold)
            .map(|&(facility, ratio)| {
                let mut reasons =
                    vec![format!("bed-doctor ratio {ratio:.1} exceeds threshold {threshold:.1}")];
                if facility.doctors == 1 {
                    reasons.push(format!("single doctor for {} beds", facility.capacity));
                }
                if ratio > threshold * 2.0 {
                    reasons.push("ratio more than double the threshold".to_string());
                }
                RatioAnomaly {
                    facility: FacilitySummary::from_facility(facility),
                    ratio,
                    reasons,
                }
            })
            .collect();

        let citations = anomalies
            .iter()
            .map(|a| Citation {
                facility_id: a.facility.id.clone(),
                field: "capacity/doctors".to_string(),
                value: format!("{:.1}", a.ratio),
                confidence: 0.9,
                step_index: ctx.step_index,
            })
            .collect();

        AgentResult::RatioAnomalies { anomalies, threshold, citations }
    }

    fn single_point_of_failure(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let (rare_specialties, results) = spof_entries(&self.corpus);

        let citations = results
            .iter()
            .flat_map(|entry| {
                entry.facilities.iter().map(|f| Citation {
                    facility_id: f.id.clone(),
                    field: "specialties".to_string(),
                    value: entry.specialty.clone(),
                    confidence: 1.0,
                    step_index: ctx.step_index,
                })
            })
            .collect();

        AgentResult::SinglePointOfFailure { rare_specialties, results, citations }
    }

    fn wants_distribution(query: &str) -> bool {
        let q = query.to_lowercase();
        q.contains("distribution") || q.contains("breakdown")
    }

    fn wants_region_aggregation(query: &str) -> bool {
        let q = query.to_lowercase();
        q.contains("which region") || q.contains("per region") || q.contains("by region")
    }
}

#[async_trait]
impl Agent for AnalystAgent {
    fn name(&self) -> AgentName {
        AgentName::Analyst
    }

    async fn run(&self, ctx: &AgentContext<'_>) -> Result<AgentResult, AgentError> {
        let result = match ctx.intent {
            Intent::AnomalyDetection => self.ratio_anomalies(ctx),
            Intent::SinglePointFailure => self.single_point_of_failure(ctx),
            Intent::Aggregate => {
                if Self::wants_distribution(ctx.query) && !Self::wants_region_aggregation(ctx.query)
                {
                    self.specialty_distribution(ctx)
                } else {
                    self.region_aggregation(ctx)
                }
            }
            // COUNT and the default routing both reduce to filtered counting
            _ => self.count_facilities(ctx),
        };
        Ok(result)
    }
}

// ============================================================================
// TESTS
// ============================================================================
