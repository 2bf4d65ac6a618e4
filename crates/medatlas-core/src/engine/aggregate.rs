//! Aggregator
//!
//! Merges every agent result into the map-ready facility list and produces
//! the final summary - via the LLM collaborator when available, with a
//! concatenated-facts fallback either way.

use std::collections::{BTreeMap, HashSet};

use crate::agents::{AgentResult, FacilitySummary};
use crate::llm::{ChatMessage, LlmChat};

/// Deduplicate (by id) every map-ready facility across all results,
/// preserving first-seen order
pub fn collect_map_facilities(
    results: &BTreeMap<String, AgentResult>,
) -> Vec<FacilitySummary> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for result in results.values() {
        for facility in result.facilities_for_map() {
            if seen.insert(facility.id.as_str()) {
                out.push(facility.clone());
            }
        }
    }
    out
}

/// One short fact per agent result, for the fallback summary and the LLM
/// context
pub fn result_facts(results: &BTreeMap<String, AgentResult>) -> Vec<String> {
    results
        .iter()
        .map(|(agent, result)| format!("{agent}: {}", fact_for(result)))
        .collect()
}

/// One-line human summary of a single result; also used for trace steps
pub fn fact_for(result: &AgentResult) -> String {
    match result {
        AgentResult::CountFacilities { count, filters_applied, .. } => {
            if filters_applied.is_empty() {
                format!("{count} facilities matched")
            } else {
                format!("{count} facilities matched [{}]", filters_applied.join(", "))
            }
        }
        AgentResult::RegionAggregation { top_region, top_count, .. } => match top_region {
            Some(region) => format!("{region} leads with {top_count} facilities"),
            None => "no regional data".to_string(),
        },
        AgentResult::SpecialtyDistribution { total_unique_specialties, .. } => {
            format!("{total_unique_specialties} distinct specialties offered")
        }
        AgentResult::RatioAnomalies { anomalies, threshold, .. } => format!(
            "{} bed/doctor ratio outliers above {threshold:.0}",
            anomalies.len()
        ),
        AgentResult::SinglePointOfFailure { results, .. } => {
            format!("{} specialties depend on 3 or fewer facilities", results.len())
        }
        AgentResult::SemanticSearch { count, retried_without_filters, .. } => {
            if *retried_without_filters {
                format!("{count} semantic matches (after dropping filters)")
            } else {
                format!("{count} semantic matches")
            }
        }
        AgentResult::Validation { validated, .. } => {
            let with_issues = validated.iter().filter(|v| !v.issues.is_empty()).count();
            format!("{with_issues} of {} facilities have constraint issues", validated.len())
        }
        AgentResult::AnomalyScan { flagged, mahalanobis_skipped, .. } => {
            if *mahalanobis_skipped {
                format!("{} anomalous facilities (single-stage)", flagged.len())
            } else {
                format!("{} anomalous facilities (two-stage intersection)", flagged.len())
            }
        }
        AgentResult::CoverageByRegion { gaps, .. } => {
            format!("{} regions under-covered", gaps.len())
        }
        AgentResult::RadiusSearch { count, radius_km, .. } => {
            format!("{count} facilities within {radius_km:.0} km")
        }
        AgentResult::NearestFacilities { facilities, .. } => {
            format!("{} nearest facilities found", facilities.len())
        }
        AgentResult::ColdSpots { cold_spots, threshold_km, .. } => {
            format!("{} cold spots beyond {threshold_km:.0} km", cold_spots.len())
        }
        AgentResult::MedicalDeserts { deserts, .. } => {
            format!("{} regions qualify as medical deserts", deserts.len())
        }
        AgentResult::RegionalEquity { flagged, .. } => {
            format!("{} regions flagged for inequitable access", flagged.len())
        }
        AgentResult::CityDistance { from, to, distance_km, .. } => {
            format!("{from} to {to} is {distance_km:.1} km")
        }
        AgentResult::EmergencyRoute { primary_facility, .. } => match primary_facility {
            Some(primary) => format!(
                "primary: {} ({:.1} km, ~{:.0} min)",
                primary.facility.name, primary.distance_km, primary.travel_minutes
            ),
            None => "no facility within routing range".to_string(),
        },
        AgentResult::SpecialistTour { stops, total_distance_km, .. } => format!(
            "{}-stop tour covering {total_distance_km:.0} km",
            stops.len()
        ),
        AgentResult::EquipmentDistribution { equipment, regions, .. } => {
            format!("{equipment} gaps ranked across {} regions", regions.len())
        }
        AgentResult::Placement { suggestions, .. } => match suggestions.first() {
            Some(top) => format!(
                "best new site at ({:.2}, {:.2}), {:.0} km from coverage",
                top.latitude, top.longitude, top.nearest_facility_km
            ),
            None => "no placement candidates".to_string(),
        },
        AgentResult::CapacityPlanning { regions, .. } => {
            let critical = regions.iter().filter(|r| r.status == "critical").count();
            format!("{critical} regions at critical capacity")
        }
        AgentResult::Failed { error, .. } => format!("failed: {error}"),
    }
}

/// Concatenated-facts summary; always available
pub fn fallback_summary(results: &BTreeMap<String, AgentResult>) -> String {
    let facts = result_facts(results);
    if facts.is_empty() {
        "No agent produced results.".to_string()
    } else {
        facts.join(". ")
    }
}

/// The largest `take` such that the first `take` facts serialize within the
/// character budget; binary search over the fact count
fn fit_to_budget(facts: &[String], budget: usize) -> usize {
    let serialized_len = |take: usize| {
        serde_json::to_string(&facts[..take]).map(|s| s.len()).unwrap_or(usize::MAX)
    };
    if serialized_len(facts.len()) <= budget {
        return facts.len();
    }
    let (mut lo, mut hi) = (0usize, facts.len());
    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        if serialized_len(mid) <= budget {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Ask the LLM for a prose summary of the results, feeding it at most
/// `char_budget` characters of serialized facts. Any failure degrades to
/// the concatenated fallback.
pub async fn synthesize_summary(
    llm: &dyn LlmChat,
    query: &str,
    results: &BTreeMap<String, AgentResult>,
    char_budget: usize,
) -> String {
    let facts = result_facts(results);
    let take = fit_to_budget(&facts, char_budget);
    if take < facts.len() {
        tracing::debug!(total = facts.len(), take, "summary facts truncated to fit budget");
    }
    let context = serde_json::to_string(&facts[..take]).unwrap_or_default();

    let messages = [
        ChatMessage::system(
            "Summarize these healthcare facility findings in 2-3 plain sentences. \
             Only state facts present in the data.",
        ),
        ChatMessage::user(format!("Question: {query}\nFindings: {context}")),
    ];

    match llm.chat(&messages, 256, 0.2).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => fallback_summary(results),
        Err(e) => {
            tracing::warn!(error = %e, "LLM summary failed; using fallback");
            fallback_summary(results)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
