//! Planner
//!
//! Capability-scored emergency routing, 2-opt specialist tours, equipment
//! distribution, maximin new-facility placement, and per-region capacity
//! planning.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::corpus::{
    CorpusStore, EquipmentTag, Facility, GHANA_CENTROID, GHANA_LAT_MAX, GHANA_LAT_MIN,
    GHANA_LNG_MAX, GHANA_LNG_MIN, Specialty,
};
use crate::geocode::{Gazetteer, GeoPoint};
use crate::spatial::{haversine_km, SpatialIndex};

use super::{
    Agent, AgentContext, AgentError, AgentName, AgentResult, Citation, EquipmentRegionPlan,
    FacilitySummary, PlacementSuggestion, RegionCapacity, RoutedFacility, Severity, TourStop,
};

/// Emergency candidates are drawn from this radius
const EMERGENCY_RADIUS_KM: f64 = 100.0;

/// Assumed road speed for travel-time estimates, km/h
const TRAVEL_SPEED_KMH: f64 = 60.0;

/// Maximum stops on a specialist tour
const MAX_TOUR_STOPS: usize = 8;

/// Tour start: Accra
const TOUR_START: (f64, f64) = (5.6037, -0.1870);

/// 2-opt improvement epsilon
const TWO_OPT_EPSILON: f64 = 1e-9;

/// 2-opt pass cap
const TWO_OPT_MAX_PASSES: usize = 1000;

/// Placement grid step in degrees
const PLACEMENT_GRID_STEP: f64 = 0.3;

/// Placement suggestions reported
const MAX_PLACEMENTS: usize = 10;

/// Regions reported by equipment distribution
const MAX_EQUIPMENT_REGIONS: usize = 5;

/// Capability score for a facility against a requested specialty, 0-100
pub fn capability_score(facility: &Facility, specialty: Option<Specialty>) -> u32 {
    let mut score = 20;
    if specialty.is_some_and(|s| facility.has_specialty(s)) {
        score += 35;
    }
    if facility.has_capability(EquipmentTag::Icu)
        || facility.has_capability(EquipmentTag::OperatingTheater)
    {
        score += 20;
    }
    if facility.capacity > 20 {
        score += 10;
    }
    if facility.doctors > 0 {
        score += 10;
    }
    let has_imaging = facility.has_equipment(EquipmentTag::Ct)
        || facility.has_equipment(EquipmentTag::Mri)
        || facility.equipment.iter().any(|e| e.to_lowercase().contains("scanner"));
    if has_imaging {
        score += 5;
    }
    score
}

/// Length of the open tour `start -> coords[order[0]] -> ... -> coords[order[n-1]]`
fn tour_length(start: (f64, f64), order: &[usize], coords: &[(f64, f64)]) -> f64 {
    let mut total = 0.0;
    let mut prev = start;
    for &i in order {
        total += haversine_km(prev, coords[i]);
        prev = coords[i];
    }
    total
}

/// Greedy nearest-neighbour ordering of `coords`, starting from `start`
fn greedy_tour(start: (f64, f64), coords: &[(f64, f64)]) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..coords.len()).collect();
    let mut order = Vec::with_capacity(coords.len());
    let mut current = start;
    while !remaining.is_empty() {
        let (pos, &next) = remaining
            .iter()
            .enumerate()
            .min_by(|&(_, &a), &(_, &b)| {
                haversine_km(current, coords[a])
                    .partial_cmp(&haversine_km(current, coords[b]))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("remaining is non-empty");
        current = coords[next];
        order.push(next);
        remaining.remove(pos);
    }
    order
}

/// 2-opt local search on an open tour; the start point stays fixed.
/// Reverses any segment whose reversal shortens the tour, until no
/// improvement remains or the pass cap is hit.
fn two_opt(start: (f64, f64), order: &mut [usize], coords: &[(f64, f64)]) {
    let n = order.len();
    if n < 3 {
        return;
    }
    for _ in 0..TWO_OPT_MAX_PASSES {
        let mut improved = false;
        for i in 0..n - 1 {
            for j in i + 1..n {
                // reversing order[i..=j] replaces edges (i-1, i) and (j, j+1)
                let prev = if i == 0 { start } else { coords[order[i - 1]] };
                let before = haversine_km(prev, coords[order[i]])
                    + if j + 1 < n {
                        haversine_km(coords[order[j]], coords[order[j + 1]])
                    } else {
                        0.0
                    };
                let after = haversine_km(prev, coords[order[j]])
                    + if j + 1 < n {
                        haversine_km(coords[order[i]], coords[order[j + 1]])
                    } else {
                        0.0
                    };
                if before - after > TWO_OPT_EPSILON {
                    order[i..=j].reverse();
                    improved = true;
                }
            }
        }
        if !improved {
            break;
        }
    }
}

/// Planning analyst over the corpus and spatial index
pub struct PlannerAgent {
    corpus: Arc<CorpusStore>,
    spatial: Arc<SpatialIndex>,
    gazetteer: &'static Gazetteer,
}

impl PlannerAgent {
    pub fn new(corpus: Arc<CorpusStore>, spatial: Arc<SpatialIndex>) -> Self {
        Self { corpus, spatial, gazetteer: Gazetteer::bundled() }
    }

    /// Route a patient: radius search, capability scoring, then
    /// (score DESC, distance ASC)
    fn emergency_route(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let params = ctx.params;
        let origin = params
            .city
            .as_deref()
            .or(params.places.first().map(|s| s.as_str()))
            .and_then(|name| self.gazetteer.geocode(name))
            .unwrap_or(GeoPoint { lat: GHANA_CENTROID.0, lng: GHANA_CENTROID.1 });

        let mut candidates: Vec<RoutedFacility> = self
            .spatial
            .radius(origin, EMERGENCY_RADIUS_KM, None)
            .iter()
            .filter_map(|hit| {
                let facility = self.corpus.get(&hit.id)?;
                Some(RoutedFacility {
                    facility: FacilitySummary::from_facility(facility),
                    distance_km: hit.distance_km,
                    capability_score: capability_score(facility, params.specialty),
                    travel_minutes: hit.distance_km / TRAVEL_SPEED_KMH * 60.0,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.capability_score.cmp(&a.capability_score).then_with(|| {
                a.distance_km
                    .partial_cmp(&b.distance_km)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        let citations = candidates
            .iter()
            .take(5)
            .map(|c| Citation {
                facility_id: c.facility.id.clone(),
                field: "capability_score".to_string(),
                value: c.capability_score.to_string(),
                confidence: c.capability_score as f64 / 100.0,
                step_index: ctx.step_index,
            })
            .collect();

        let mut iter = candidates.into_iter();
        let primary_facility = iter.next();
        let backup_facility = iter.next();
        let alternatives: Vec<RoutedFacility> = iter.take(3).collect();

        AgentResult::EmergencyRoute {
            origin_lat: origin.lat,
            origin_lng: origin.lng,
            primary_facility,
            backup_facility,
            alternatives,
            citations,
        }
    }

    /// Greedy + 2-opt tour over the best facilities for a specialty
    fn specialist_tour(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let specialty = ctx.params.specialty.unwrap_or(Specialty::GeneralSurgery);

        let mut candidates: Vec<(&Facility, u32)> = self
            .corpus
            .by_specialty(specialty)
            .into_iter()
            .filter(|f| f.coordinates().is_some())
            .map(|f| (f, capability_score(f, Some(specialty))))
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        candidates.truncate(MAX_TOUR_STOPS);

        if candidates.is_empty() {
            return AgentResult::SpecialistTour {
                specialty: specialty.to_string(),
                stops: vec![],
                total_distance_km: 0.0,
                greedy_distance_km: 0.0,
                citations: vec![],
            };
        }

        let coords: Vec<(f64, f64)> = candidates
            .iter()
            .map(|(f, _)| f.coordinates().expect("filtered above"))
            .collect();

        let mut order = greedy_tour(TOUR_START, &coords);
        let greedy_distance_km = tour_length(TOUR_START, &order, &coords);

        two_opt(TOUR_START, &mut order, &coords);
        let total_distance_km = tour_length(TOUR_START, &order, &coords);

        let mut prev = TOUR_START;
        let stops: Vec<TourStop> = order
            .iter()
            .map(|&idx| {
                let (facility, score) = candidates[idx];
                let leg_km = haversine_km(prev, coords[idx]);
                prev = coords[idx];
                TourStop {
                    facility: FacilitySummary::from_facility(facility),
                    capability_score: score,
                    leg_km,
                }
            })
            .collect();

        let citations = stops
            .iter()
            .map(|s| Citation {
                facility_id: s.facility.id.clone(),
                field: "specialties".to_string(),
                value: specialty.to_string(),
                confidence: s.capability_score as f64 / 100.0,
                step_index: ctx.step_index,
            })
            .collect();

        AgentResult::SpecialistTour {
            specialty: specialty.to_string(),
            stops,
            total_distance_km,
            greedy_distance_km,
            citations,
        }
    }

    /// Rank regions by how many facilities lack the target equipment and
    /// recommend the highest-capacity lacking facility in each
    fn equipment_distribution(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let equipment = ctx.params.equipment.unwrap_or(EquipmentTag::Ultrasound);

        let mut per_region: BTreeMap<String, Vec<&Facility>> = BTreeMap::new();
        for facility in self.corpus.all() {
            if !facility.has_equipment(equipment) {
                per_region.entry(facility.region.clone()).or_default().push(facility);
            }
        }

        let mut regions: Vec<EquipmentRegionPlan> = per_region
            .into_iter()
            .map(|(region, lacking)| {
                let recommended = lacking
                    .iter()
                    .max_by_key(|f| f.capacity)
                    .map(|f| FacilitySummary::from_facility(f));
                EquipmentRegionPlan {
                    would_serve: lacking.len().saturating_sub(1),
                    facilities_lacking: lacking.len(),
                    region,
                    recommended,
                }
            })
            .collect();
        regions.sort_by(|a, b| b.facilities_lacking.cmp(&a.facilities_lacking));
        regions.truncate(MAX_EQUIPMENT_REGIONS);

        let citations = regions
            .iter()
            .filter_map(|r| r.recommended.as_ref())
            .map(|f| Citation {
                facility_id: f.id.clone(),
                field: "equipment".to_string(),
                value: format!("lacks {equipment}"),
                confidence: 1.0,
                step_index: ctx.step_index,
            })
            .collect();

        AgentResult::EquipmentDistribution {
            equipment: equipment.to_string(),
            regions,
            citations,
        }
    }

    /// Maximin siting: grid points ranked by distance to the nearest
    /// existing facility, furthest first
    fn placement(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let specialty = ctx.params.specialty;
        let mut suggestions: Vec<PlacementSuggestion> = Vec::new();

        let mut lat = GHANA_LAT_MIN;
        while lat <= GHANA_LAT_MAX {
            let mut lng = GHANA_LNG_MIN;
            while lng <= GHANA_LNG_MAX {
                let nearest = self.spatial.nearest(GeoPoint { lat, lng }, 1, specialty);
                let distance = nearest.first().map(|h| h.distance_km).unwrap_or(f64::INFINITY);
                let priority = if distance > 100.0 {
                    Severity::Critical
                } else if distance > 50.0 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                suggestions.push(PlacementSuggestion {
                    latitude: lat,
                    longitude: lng,
                    nearest_facility_km: distance,
                    priority,
                });
                lng += PLACEMENT_GRID_STEP;
            }
            lat += PLACEMENT_GRID_STEP;
        }

        suggestions.sort_by(|a, b| {
            b.nearest_facility_km
                .partial_cmp(&a.nearest_facility_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        suggestions.truncate(MAX_PLACEMENTS);

        AgentResult::Placement {
            specialty: specialty.map(|s| s.to_string()),
            suggestions,
            citations: vec![],
        }
    }

    /// Per-region bed and doctor density with a status grade
    fn capacity_planning(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let mut regions: Vec<RegionCapacity> = self
            .corpus
            .regions()
            .iter()
            .map(|region| {
                let facilities = self.corpus.by_region(region);
                let total = facilities.len();
                let beds: u64 = facilities.iter().map(|f| f.capacity as u64).sum();
                let doctors: u64 = facilities.iter().map(|f| f.doctors as u64).sum();
                let beds_per_facility = if total > 0 { beds as f64 / total as f64 } else { 0.0 };
                let doctors_per_facility =
                    if total > 0 { doctors as f64 / total as f64 } else { 0.0 };
                let status = if beds_per_facility < 5.0 && total > 3 {
                    "critical"
                } else if beds_per_facility < 15.0 {
                    "warning"
                } else {
                    "adequate"
                };
                RegionCapacity {
                    region: region.clone(),
                    total_facilities: total,
                    beds_per_facility,
                    doctors_per_facility,
                    status: status.to_string(),
                }
            })
            .collect();
        regions.sort_by(|a, b| {
            a.beds_per_facility
                .partial_cmp(&b.beds_per_facility)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let citations = regions
            .iter()
            .filter(|r| r.status == "critical")
            .flat_map(|r| {
                self.corpus.by_region(&r.region).into_iter().take(1).map(|f| Citation {
                    facility_id: f.id.clone(),
                    field: "capacity".to_string(),
                    value: f.capacity.to_string(),
                    confidence: 1.0,
                    step_index: ctx.step_index,
                })
            })
            .collect();

        AgentResult::CapacityPlanning { regions, citations }
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> AgentName {
        AgentName::Planner
    }

    async fn run(&self, ctx: &AgentContext<'_>) -> Result<AgentResult, AgentError> {
        let q = ctx.query.to_lowercase();
        let result = if q.contains("deploy") || q.contains("tour") || q.contains("route for") {
            self.specialist_tour(ctx)
        } else if q.contains("emergency") || q.contains("patient") {
            self.emergency_route(ctx)
        } else if ctx.params.equipment.is_some()
            && (q.contains("distribut") || q.contains("allocat"))
        {
            self.equipment_distribution(ctx)
        } else if q.contains("capacity") {
            self.capacity_planning(ctx)
        } else if q.contains("build") || q.contains("new facility") || q.contains("where should") {
            self.placement(ctx)
        } else {
            self.emergency_route(ctx)
        };
        Ok(result)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::FacilityType;
    use crate::intent::extract_params;
    use std::collections::BTreeMap as Map;

    fn facility(
        id: &str,
        region: &str,
        lat: f64,
        lng: f64,
        specialty: Option<Specialty>,
        capacity: u32,
        doctors: u32,
        equipment: &[&str],
    ) -> Facility {
        Facility {
            id: id.to_string(),
            name: format!("Facility {id}"),
            city: "Town".to_string(),
            region: region.to_string(),
            facility_type: FacilityType::Hospital,
            organization_type: String::new(),
            specialties: specialty.into_iter().collect(),
            procedures: vec![],
            equipment: equipment.iter().map(|s| s.to_string()).collect(),
            capabilities: vec![],
            capacity,
            doctors,
            latitude: Some(lat),
            longitude: Some(lng),
        }
    }

    fn setup() -> PlannerAgent {
        use Specialty::Cardiology;
        let corpus = Arc::new(
            CorpusStore::from_records(vec![
                facility("a", "Greater Accra", 5.60, -0.19, Some(Cardiology), 400, 50, &["ICU", "CT scanner"]),
                facility("b", "Ashanti", 6.69, -1.62, Some(Cardiology), 250, 30, &["ICU"]),
                facility("c", "Northern", 9.40, -0.84, Some(Cardiology), 120, 12, &[]),
                facility("d", "Volta", 6.61, 0.47, Some(Cardiology), 90, 8, &[]),
                facility("e", "Central", 5.11, -1.25, Some(Cardiology), 60, 5, &[]),
                facility("f", "Western", 4.93, -1.71, Some(Cardiology), 30, 2, &[]),
                facility("g", "Upper East", 10.79, -0.85, Some(Cardiology), 45, 4, &[]),
                facility("h", "Bono", 7.33, -2.31, Some(Cardiology), 75, 6, &[]),
                facility("i", "Eastern", 6.09, -0.26, Some(Cardiology), 55, 7, &[]),
                facility("z", "Savannah", 9.08, -1.82, None, 10, 1, &[]),
            ])
            .unwrap(),
        );
        let spatial = Arc::new(SpatialIndex::build(&corpus));
        PlannerAgent::new(corpus, spatial)
    }

    async fn run(agent: &PlannerAgent, query: &str) -> AgentResult {
        let params = extract_params(query, Gazetteer::bundled());
        let prior = Map::new();
        let ctx = AgentContext {
            query,
            intent: crate::intent::Intent::Planning,
            params: &params,
            prior: &prior,
            step_index: 1,
        };
        agent.run(&ctx).await.unwrap()
    }

    #[test]
    fn test_capability_score_components() {
        let full = facility("x", "Ashanti", 6.0, -1.0, Some(Specialty::Cardiology), 100, 10, &["ICU", "CT scanner"]);
        assert_eq!(capability_score(&full, Some(Specialty::Cardiology)), 100);
        let bare = facility("y", "Ashanti", 6.0, -1.0, None, 0, 0, &[]);
        assert_eq!(capability_score(&bare, Some(Specialty::Cardiology)), 20);
    }

    #[tokio::test]
    async fn test_specialist_tour_two_opt_never_worse() {
        let agent = setup();
        let result = run(&agent, "Deploy a cardiology specialist across Ghana").await;
        let AgentResult::SpecialistTour { stops, total_distance_km, greedy_distance_km, .. } =
            result
        else {
            panic!("wrong variant");
        };
        assert!(!stops.is_empty());
        assert!(stops.len() <= MAX_TOUR_STOPS);
        assert!(total_distance_km <= greedy_distance_km + 1e-9);
    }

    #[tokio::test]
    async fn test_emergency_route_ordering() {
        let agent = setup();
        let result = run(&agent, "emergency cardiology patient near Accra").await;
        let AgentResult::EmergencyRoute { primary_facility, backup_facility, .. } = result else {
            panic!("wrong variant");
        };
        let primary = primary_facility.expect("primary exists");
        // "a" has the specialty, ICU, imaging, beds, and doctors
        assert_eq!(primary.facility.id, "a");
        assert!(backup_facility.is_some());
        assert!((primary.travel_minutes - primary.distance_km).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_emergency_route_fallback_origin() {
        let agent = setup();
        let result = run(&agent, "route an emergency patient somewhere unknown").await;
        let AgentResult::EmergencyRoute { origin_lat, origin_lng, .. } = result else {
            panic!("wrong variant");
        };
        assert!((origin_lat - GHANA_CENTROID.0).abs() < 1e-9);
        assert!((origin_lng - GHANA_CENTROID.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_equipment_distribution_ranks_by_lack() {
        let agent = setup();
        let result = run(&agent, "distribute ultrasound machines to the regions").await;
        let AgentResult::EquipmentDistribution { equipment, regions, .. } = result else {
            panic!("wrong variant");
        };
        assert_eq!(equipment, "ultrasound");
        assert!(regions.len() <= MAX_EQUIPMENT_REGIONS);
        for pair in regions.windows(2) {
            assert!(pair[0].facilities_lacking >= pair[1].facilities_lacking);
        }
        for region in &regions {
            assert!(region.recommended.is_some());
        }
    }

    #[tokio::test]
    async fn test_placement_maximin() {
        let agent = setup();
        let result = run(&agent, "where should we build a new hospital").await;
        let AgentResult::Placement { suggestions, .. } = result else {
            panic!("wrong variant");
        };
        assert_eq!(suggestions.len(), MAX_PLACEMENTS);
        for pair in suggestions.windows(2) {
            assert!(pair[0].nearest_facility_km >= pair[1].nearest_facility_km);
        }
    }

    #[tokio::test]
    async fn test_capacity_planning_status() {
        let agent = setup();
        let result = run(&agent, "capacity planning for the regions").await;
        let AgentResult::CapacityPlanning { regions, .. } = result else {
            panic!("wrong variant");
        };
        // Savannah has one facility with 10 beds -> below 15 -> warning
        let savannah = regions.iter().find(|r| r.region == "Savannah").unwrap();
        assert_eq!(savannah.status, "warning");
        let accra = regions.iter().find(|r| r.region == "Greater Accra").unwrap();
        assert_eq!(accra.status, "adequate");
    }
}
