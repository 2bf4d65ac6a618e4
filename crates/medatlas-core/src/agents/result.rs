//! Agent result records
//!
//! A tagged union over agent actions. Every variant carries a closed field
//! set plus a shared `citations` list, and knows which of its records are
//! map-ready via [`AgentResult::facilities_for_map`] - the typed replacement
//! for scanning results for facility-bearing keys.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::corpus::Facility;

// ============================================================================
// SHARED PIECES
// ============================================================================

/// Traceable attribution from a response claim to the facility field that
/// produced it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub facility_id: String,
    pub field: String,
    pub value: String,
    /// Attribution confidence in [0, 1]
    pub confidence: f64,
    /// Trace step that produced this citation
    pub step_index: usize,
}

/// Shared severity / risk / priority scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
        }
    }
}

/// Map-ready facility record embedded in results
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitySummary {
    pub id: String,
    pub name: String,
    pub city: String,
    pub region: String,
    pub facility_type: String,
    pub specialties: Vec<String>,
    pub capacity: u32,
    pub doctors: u32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl FacilitySummary {
    /// Project a corpus facility down to its map-ready summary
    pub fn from_facility(facility: &Facility) -> Self {
        let (latitude, longitude) = match facility.coordinates() {
            Some((lat, lng)) => (Some(lat), Some(lng)),
            None => (None, None),
        };
        Self {
            id: facility.id.clone(),
            name: facility.name.clone(),
            city: facility.city.clone(),
            region: facility.region.clone(),
            facility_type: facility.facility_type.as_str().to_string(),
            specialties: facility.specialties.iter().map(|s| s.to_string()).collect(),
            capacity: facility.capacity,
            doctors: facility.doctors,
            latitude,
            longitude,
        }
    }

    /// True iff the summary carries plottable coordinates
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// A facility with a fused relevance score
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredFacility {
    #[serde(flatten)]
    pub facility: FacilitySummary,
    /// Raw RRF score
    pub rrf_score: f64,
    /// Display-normalized score in [0, 1]
    pub display_score: f64,
}

/// A facility with a distance from some query center
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistancedFacility {
    #[serde(flatten)]
    pub facility: FacilitySummary,
    pub distance_km: f64,
}

/// A routed facility with capability score and travel estimate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedFacility {
    #[serde(flatten)]
    pub facility: FacilitySummary,
    pub distance_km: f64,
    pub capability_score: u32,
    pub travel_minutes: f64,
}

/// One bed/doctor ratio outlier
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioAnomaly {
    #[serde(flatten)]
    pub facility: FacilitySummary,
    pub ratio: f64,
    pub reasons: Vec<String>,
}

/// One rarely-offered specialty
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpofEntry {
    pub specialty: String,
    pub facility_count: usize,
    pub facilities: Vec<FacilitySummary>,
    pub risk_level: Severity,
}

/// One constraint issue found during validation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub procedure: String,
    pub missing: String,
    pub severity: Severity,
}

/// One matched red-flag pattern
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedFlag {
    pub category: String,
    pub matched_text: String,
    /// Specialty mentioned within the surrounding 5-word window, if any
    pub near_specialty: Option<String>,
}

/// Per-facility validation report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    #[serde(flatten)]
    pub facility: FacilitySummary,
    pub issues: Vec<ValidationIssue>,
    pub red_flags: Vec<RedFlag>,
    /// Claim confidence after diminishing penalties, in [0.10, 0.95]
    pub confidence: f64,
}

/// One facility flagged by the two-stage anomaly detector
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyFlag {
    #[serde(flatten)]
    pub facility: FacilitySummary,
    pub isolation_score: f64,
    pub mahalanobis_sq: Option<f64>,
    pub reasons: Vec<String>,
}

/// Region-level coverage entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionCoverage {
    pub region: String,
    pub facility_count: usize,
    pub severity: Severity,
}

/// One grid cell whose nearest facility exceeds the threshold
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdSpot {
    pub latitude: f64,
    pub longitude: f64,
    pub nearest_distance_km: f64,
    pub nearest_facility: Option<FacilitySummary>,
}

/// One region scored against a specialty-access threshold
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesertEntry {
    pub region: String,
    pub nearest_distance_km: f64,
    pub nearest_facility: Option<FacilitySummary>,
    pub severity: Severity,
}

/// Region flagged by the equity analysis
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityEntry {
    pub region: String,
    pub mahalanobis_sq: f64,
    pub facility_count: usize,
    pub bed_total: u64,
    pub doctor_total: u64,
}

/// One stop on a specialist tour
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourStop {
    #[serde(flatten)]
    pub facility: FacilitySummary,
    pub capability_score: u32,
    pub leg_km: f64,
}

/// Recommended equipment placement for one region
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentRegionPlan {
    pub region: String,
    pub facilities_lacking: usize,
    pub recommended: Option<FacilitySummary>,
    pub would_serve: usize,
}

/// Candidate site for a new facility
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementSuggestion {
    pub latitude: f64,
    pub longitude: f64,
    pub nearest_facility_km: f64,
    pub priority: Severity,
}

/// Per-region capacity figures
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionCapacity {
    pub region: String,
    pub total_facilities: usize,
    pub beds_per_facility: f64,
    pub doctors_per_facility: f64,
    pub status: String,
}

// ============================================================================
// THE TAGGED UNION
// ============================================================================

/// One agent invocation's output, tagged by action
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentResult {
    CountFacilities {
        count: usize,
        facilities: Vec<FacilitySummary>,
        filters_applied: Vec<String>,
        citations: Vec<Citation>,
    },
    RegionAggregation {
        aggregation: BTreeMap<String, usize>,
        top_region: Option<String>,
        top_count: usize,
        citations: Vec<Citation>,
    },
    SpecialtyDistribution {
        distribution: BTreeMap<String, usize>,
        total_unique_specialties: usize,
        citations: Vec<Citation>,
    },
    RatioAnomalies {
        anomalies: Vec<RatioAnomaly>,
        threshold: f64,
        citations: Vec<Citation>,
    },
    SinglePointOfFailure {
        rare_specialties: BTreeMap<String, usize>,
        results: Vec<SpofEntry>,
        citations: Vec<Citation>,
    },
    SemanticSearch {
        count: usize,
        facilities: Vec<ScoredFacility>,
        search_method: String,
        /// Normalized per-vector weights, summing to 3.0
        vector_weights: BTreeMap<String, f64>,
        filters_applied: Vec<String>,
        retried_without_filters: bool,
        citations: Vec<Citation>,
    },
    Validation {
        validated: Vec<ValidationReport>,
        citations: Vec<Citation>,
    },
    AnomalyScan {
        flagged: Vec<AnomalyFlag>,
        isolation_outliers: usize,
        mahalanobis_outliers: usize,
        mahalanobis_skipped: bool,
        citations: Vec<Citation>,
    },
    CoverageByRegion {
        specialty: Option<String>,
        gaps: Vec<RegionCoverage>,
        citations: Vec<Citation>,
    },
    RadiusSearch {
        center_lat: f64,
        center_lng: f64,
        radius_km: f64,
        specialty: Option<String>,
        count: usize,
        facilities: Vec<DistancedFacility>,
        citations: Vec<Citation>,
    },
    NearestFacilities {
        center_lat: f64,
        center_lng: f64,
        k: usize,
        specialty: Option<String>,
        facilities: Vec<DistancedFacility>,
        citations: Vec<Citation>,
    },
    ColdSpots {
        specialty: Option<String>,
        threshold_km: f64,
        cold_spots: Vec<ColdSpot>,
        citations: Vec<Citation>,
    },
    MedicalDeserts {
        specialty: Option<String>,
        threshold_km: f64,
        deserts: Vec<DesertEntry>,
        citations: Vec<Citation>,
    },
    RegionalEquity {
        flagged: Vec<EquityEntry>,
        threshold: f64,
        citations: Vec<Citation>,
    },
    CityDistance {
        from: String,
        to: String,
        distance_km: f64,
        citations: Vec<Citation>,
    },
    EmergencyRoute {
        origin_lat: f64,
        origin_lng: f64,
        primary_facility: Option<RoutedFacility>,
        backup_facility: Option<RoutedFacility>,
        alternatives: Vec<RoutedFacility>,
        citations: Vec<Citation>,
    },
    SpecialistTour {
        specialty: String,
        stops: Vec<TourStop>,
        total_distance_km: f64,
        greedy_distance_km: f64,
        citations: Vec<Citation>,
    },
    EquipmentDistribution {
        equipment: String,
        regions: Vec<EquipmentRegionPlan>,
        citations: Vec<Citation>,
    },
    Placement {
        specialty: Option<String>,
        suggestions: Vec<PlacementSuggestion>,
        citations: Vec<Citation>,
    },
    CapacityPlanning {
        regions: Vec<RegionCapacity>,
        citations: Vec<Citation>,
    },
    /// In-band graceful failure (e.g. an unresolvable location)
    Failed {
        error: String,
        citations: Vec<Citation>,
    },
}

impl AgentResult {
    /// Action tag, matching the serialized `action` field
    pub fn action(&self) -> &'static str {
        match self {
            AgentResult::CountFacilities { .. } => "count_facilities",
            AgentResult::RegionAggregation { .. } => "region_aggregation",
            AgentResult::SpecialtyDistribution { .. } => "specialty_distribution",
            AgentResult::RatioAnomalies { .. } => "ratio_anomalies",
            AgentResult::SinglePointOfFailure { .. } => "single_point_of_failure",
            AgentResult::SemanticSearch { .. } => "semantic_search",
            AgentResult::Validation { .. } => "validation",
            AgentResult::AnomalyScan { .. } => "anomaly_scan",
            AgentResult::CoverageByRegion { .. } => "coverage_by_region",
            AgentResult::RadiusSearch { .. } => "radius_search",
            AgentResult::NearestFacilities { .. } => "nearest_facilities",
            AgentResult::ColdSpots { .. } => "cold_spots",
            AgentResult::MedicalDeserts { .. } => "medical_deserts",
            AgentResult::RegionalEquity { .. } => "regional_equity",
            AgentResult::CityDistance { .. } => "city_distance",
            AgentResult::EmergencyRoute { .. } => "emergency_route",
            AgentResult::SpecialistTour { .. } => "specialist_tour",
            AgentResult::EquipmentDistribution { .. } => "equipment_distribution",
            AgentResult::Placement { .. } => "placement",
            AgentResult::CapacityPlanning { .. } => "capacity_planning",
            AgentResult::Failed { .. } => "failed",
        }
    }

    /// Shared citations list
    pub fn citations(&self) -> &[Citation] {
        match self {
            AgentResult::CountFacilities { citations, .. }
            | AgentResult::RegionAggregation { citations, .. }
            | AgentResult::SpecialtyDistribution { citations, .. }
            | AgentResult::RatioAnomalies { citations, .. }
            | AgentResult::SinglePointOfFailure { citations, .. }
            | AgentResult::SemanticSearch { citations, .. }
            | AgentResult::Validation { citations, .. }
            | AgentResult::AnomalyScan { citations, .. }
            | AgentResult::CoverageByRegion { citations, .. }
            | AgentResult::RadiusSearch { citations, .. }
            | AgentResult::NearestFacilities { citations, .. }
            | AgentResult::ColdSpots { citations, .. }
            | AgentResult::MedicalDeserts { citations, .. }
            | AgentResult::RegionalEquity { citations, .. }
            | AgentResult::CityDistance { citations, .. }
            | AgentResult::EmergencyRoute { citations, .. }
            | AgentResult::SpecialistTour { citations, .. }
            | AgentResult::EquipmentDistribution { citations, .. }
            | AgentResult::Placement { citations, .. }
            | AgentResult::CapacityPlanning { citations, .. }
            | AgentResult::Failed { citations, .. } => citations,
        }
    }

    /// Every map-ready facility this result carries
    pub fn facilities_for_map(&self) -> Vec<&FacilitySummary> {
        let mut out: Vec<&FacilitySummary> = Vec::new();
        match self {
            AgentResult::CountFacilities { facilities, .. } => {
                out.extend(facilities.iter());
            }
            AgentResult::RatioAnomalies { anomalies, .. } => {
                out.extend(anomalies.iter().map(|a| &a.facility));
            }
            AgentResult::SinglePointOfFailure { results, .. } => {
                out.extend(results.iter().flat_map(|r| r.facilities.iter()));
            }
            AgentResult::SemanticSearch { facilities, .. } => {
                out.extend(facilities.iter().map(|f| &f.facility));
            }
            AgentResult::Validation { validated, .. } => {
                out.extend(validated.iter().map(|v| &v.facility));
            }
            AgentResult::AnomalyScan { flagged, .. } => {
                out.extend(flagged.iter().map(|f| &f.facility));
            }
            AgentResult::RadiusSearch { facilities, .. }
            | AgentResult::NearestFacilities { facilities, .. } => {
                out.extend(facilities.iter().map(|f| &f.facility));
            }
            AgentResult::ColdSpots { cold_spots, .. } => {
                out.extend(cold_spots.iter().filter_map(|c| c.nearest_facility.as_ref()));
            }
            AgentResult::MedicalDeserts { deserts, .. } => {
                out.extend(deserts.iter().filter_map(|d| d.nearest_facility.as_ref()));
            }
            AgentResult::EmergencyRoute { primary_facility, backup_facility, alternatives, .. } => {
                out.extend(primary_facility.iter().map(|f| &f.facility));
                out.extend(backup_facility.iter().map(|f| &f.facility));
                out.extend(alternatives.iter().map(|f| &f.facility));
            }
            AgentResult::SpecialistTour { stops, .. } => {
                out.extend(stops.iter().map(|s| &s.facility));
            }
            AgentResult::EquipmentDistribution { regions, .. } => {
                out.extend(regions.iter().filter_map(|r| r.recommended.as_ref()));
            }
            AgentResult::RegionAggregation { .. }
            | AgentResult::SpecialtyDistribution { .. }
            | AgentResult::CoverageByRegion { .. }
            | AgentResult::RegionalEquity { .. }
            | AgentResult::CityDistance { .. }
            | AgentResult::Placement { .. }
            | AgentResult::CapacityPlanning { .. }
            | AgentResult::Failed { .. } => {}
        }
        out.retain(|f| f.has_coordinates());
        out
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, with_coords: bool) -> FacilitySummary {
        FacilitySummary {
            id: id.to_string(),
            name: id.to_string(),
            city: "Accra".to_string(),
            region: "Greater Accra".to_string(),
            facility_type: "hospital".to_string(),
            specialties: vec![],
            capacity: 10,
            doctors: 2,
            latitude: with_coords.then_some(5.6),
            longitude: with_coords.then_some(-0.2),
        }
    }

    #[test]
    fn test_action_tag_matches_serialization() {
        let result = AgentResult::CountFacilities {
            count: 0,
            facilities: vec![],
            filters_applied: vec![],
            citations: vec![],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["action"], result.action());
    }

    #[test]
    fn test_facilities_for_map_excludes_unlocated() {
        let result = AgentResult::CountFacilities {
            count: 2,
            facilities: vec![summary("a", true), summary("b", false)],
            filters_applied: vec![],
            citations: vec![],
        };
        let mapped = result.facilities_for_map();
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0].id, "a");
    }

    #[test]
    fn test_route_carries_all_slots_to_map() {
        let routed = |id: &str| RoutedFacility {
            facility: summary(id, true),
            distance_km: 10.0,
            capability_score: 55,
            travel_minutes: 10.0,
        };
        let result = AgentResult::EmergencyRoute {
            origin_lat: 5.6,
            origin_lng: -0.2,
            primary_facility: Some(routed("p")),
            backup_facility: Some(routed("b")),
            alternatives: vec![routed("x"), routed("y")],
            citations: vec![],
        };
        assert_eq!(result.facilities_for_map().len(), 4);
    }
}
