//! Geospatial Analyst
//!
//! Radius and k-NN queries over the ball-tree, grid cold-spot detection,
//! region-centroid medical deserts, Mahalanobis regional equity, and
//! city-to-city distances.

use async_trait::async_trait;
use std::sync::Arc;

use crate::corpus::{
    CorpusStore, GHANA_LAT_MAX, GHANA_LAT_MIN, GHANA_LNG_MAX, GHANA_LNG_MIN,
};
use crate::geocode::{Gazetteer, GeoPoint};
use crate::intent::Intent;
use crate::spatial::{haversine_km, SpatialHit, SpatialIndex};
use crate::stats::{MahalanobisDetector, CHI2_975_DF4};

use super::{
    Agent, AgentContext, AgentError, AgentName, AgentResult, Citation, ColdSpot, DesertEntry,
    DistancedFacility, EquityEntry, FacilitySummary, Severity,
};

/// Radius results are capped here
const MAX_RADIUS_RESULTS: usize = 30;

/// Default radius when the query names a place but no distance
const DEFAULT_RADIUS_KM: f64 = 50.0;

/// Default k for nearest-neighbour questions
const DEFAULT_NEAREST_K: usize = 10;

/// Cold-spot grid step in degrees (~468 cells over Ghana)
const COLD_SPOT_GRID_STEP: f64 = 0.25;

/// A grid cell further than this from any facility is a cold spot
const COLD_SPOT_THRESHOLD_KM: f64 = 55.0;

/// Cold-spot cells reported
const MAX_COLD_SPOTS: usize = 15;

/// Region whose nearest specialty facility exceeds this is a desert
const DESERT_THRESHOLD_KM: f64 = 75.0;

/// Geospatial analyst over the spatial index
pub struct GeoAgent {
    corpus: Arc<CorpusStore>,
    spatial: Arc<SpatialIndex>,
    gazetteer: &'static Gazetteer,
}

impl GeoAgent {
    pub fn new(corpus: Arc<CorpusStore>, spatial: Arc<SpatialIndex>) -> Self {
        Self { corpus, spatial, gazetteer: Gazetteer::bundled() }
    }

    fn summarize(&self, hit: &SpatialHit) -> Option<DistancedFacility> {
        let facility = self.corpus.get(&hit.id)?;
        Some(DistancedFacility {
            facility: FacilitySummary::from_facility(facility),
            distance_km: hit.distance_km,
        })
    }

    fn distance_citations(
        facilities: &[DistancedFacility],
        step_index: usize,
    ) -> Vec<Citation> {
        facilities
            .iter()
            .map(|f| Citation {
                facility_id: f.facility.id.clone(),
                field: "distance_km".to_string(),
                value: format!("{:.1}", f.distance_km),
                confidence: 1.0,
                step_index,
            })
            .collect()
    }

    fn unknown_location() -> AgentResult {
        AgentResult::Failed { error: "unknown_location".to_string(), citations: vec![] }
    }

    /// Radius or k-NN search around a named place
    fn proximity_search(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let params = ctx.params;
        let place = params.city.as_deref().or(params.places.first().map(|s| s.as_str()));
        let Some(center) = place.and_then(|name| self.gazetteer.geocode(name)) else {
            return Self::unknown_location();
        };

        let query = ctx.query.to_lowercase();
        let wants_nearest =
            params.radius_km.is_none() && (query.contains("nearest") || query.contains("closest"));

        if wants_nearest {
            let facilities: Vec<DistancedFacility> = self
                .spatial
                .nearest(center, DEFAULT_NEAREST_K, params.specialty)
                .iter()
                .filter_map(|hit| self.summarize(hit))
                .collect();
            let citations = Self::distance_citations(&facilities, ctx.step_index);
            return AgentResult::NearestFacilities {
                center_lat: center.lat,
                center_lng: center.lng,
                k: DEFAULT_NEAREST_K,
                specialty: params.specialty.map(|s| s.to_string()),
                facilities,
                citations,
            };
        }

        let radius_km = params.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
        let facilities: Vec<DistancedFacility> = self
            .spatial
            .radius(center, radius_km, params.specialty)
            .iter()
            .take(MAX_RADIUS_RESULTS)
            .filter_map(|hit| self.summarize(hit))
            .collect();
        let citations = Self::distance_citations(&facilities, ctx.step_index);
        AgentResult::RadiusSearch {
            center_lat: center.lat,
            center_lng: center.lng,
            radius_km,
            specialty: params.specialty.map(|s| s.to_string()),
            count: facilities.len(),
            facilities,
            citations,
        }
    }

    /// Distance between the two places the query names
    fn city_distance(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let places = &ctx.params.places;
        let (Some(from), Some(to)) = (places.first(), places.get(1)) else {
            return Self::unknown_location();
        };
        let (Some(a), Some(b)) = (self.gazetteer.geocode(from), self.gazetteer.geocode(to))
        else {
            return Self::unknown_location();
        };
        let distance_km = haversine_km((a.lat, a.lng), (b.lat, b.lng));
        AgentResult::CityDistance {
            from: from.clone(),
            to: to.clone(),
            distance_km,
            citations: vec![],
        }
    }

    /// Grid scan for cells whose nearest facility exceeds the threshold
    fn cold_spots(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let specialty = ctx.params.specialty;
        let mut cells: Vec<ColdSpot> = Vec::new();

        let mut lat = GHANA_LAT_MIN;
        while lat <= GHANA_LAT_MAX {
            let mut lng = GHANA_LNG_MIN;
            while lng <= GHANA_LNG_MAX {
                let center = GeoPoint { lat, lng };
                let nearest = self.spatial.nearest(center, 1, specialty);
                match nearest.first() {
                    Some(hit) if hit.distance_km > COLD_SPOT_THRESHOLD_KM => {
                        cells.push(ColdSpot {
                            latitude: lat,
                            longitude: lng,
                            nearest_distance_km: hit.distance_km,
                            nearest_facility: self
                                .corpus
                                .get(&hit.id)
                                .map(FacilitySummary::from_facility),
                        });
                    }
                    Some(_) => {}
                    None => {
                        // no facility offers the specialty at all
                        cells.push(ColdSpot {
                            latitude: lat,
                            longitude: lng,
                            nearest_distance_km: f64::INFINITY,
                            nearest_facility: None,
                        });
                    }
                }
                lng += COLD_SPOT_GRID_STEP;
            }
            lat += COLD_SPOT_GRID_STEP;
        }

        cells.sort_by(|a, b| {
            b.nearest_distance_km
                .partial_cmp(&a.nearest_distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        cells.truncate(MAX_COLD_SPOTS);

        let citations = cells
            .iter()
            .filter_map(|c| c.nearest_facility.as_ref())
            .map(|f| Citation {
                facility_id: f.id.clone(),
                field: "coordinates".to_string(),
                value: format!("{:?},{:?}", f.latitude, f.longitude),
                confidence: 1.0,
                step_index: ctx.step_index,
            })
            .collect();

        AgentResult::ColdSpots {
            specialty: specialty.map(|s| s.to_string()),
            threshold_km: COLD_SPOT_THRESHOLD_KM,
            cold_spots: cells,
            citations,
        }
    }

    /// Nearest specialty facility per region centroid, severity-graded
    fn medical_deserts(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let specialty = ctx.params.specialty;
        let mut deserts: Vec<DesertEntry> = self
            .gazetteer
            .regions()
            .iter()
            .filter_map(|(region, centroid)| {
                let nearest = self.spatial.nearest(*centroid, 1, specialty);
                let (distance, facility) = match nearest.first() {
                    Some(hit) => (
                        hit.distance_km,
                        self.corpus.get(&hit.id).map(FacilitySummary::from_facility),
                    ),
                    None => (f64::INFINITY, None),
                };
                let severity = if distance > 150.0 {
                    Severity::Critical
                } else if distance > 100.0 {
                    Severity::High
                } else if distance > DESERT_THRESHOLD_KM {
                    Severity::Medium
                } else {
                    return None;
                };
                Some(DesertEntry {
                    region: region.clone(),
                    nearest_distance_km: distance,
                    nearest_facility: facility,
                    severity,
                })
            })
            .collect();
        deserts.sort_by(|a, b| {
            b.nearest_distance_km
                .partial_cmp(&a.nearest_distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let citations = deserts
            .iter()
            .filter_map(|d| d.nearest_facility.as_ref().map(|f| (d, f)))
            .map(|(d, f)| Citation {
                facility_id: f.id.clone(),
                field: "distance_km".to_string(),
                value: format!("{:.1}", d.nearest_distance_km),
                confidence: 1.0,
                step_index: ctx.step_index,
            })
            .collect();

        AgentResult::MedicalDeserts {
            specialty: specialty.map(|s| s.to_string()),
            threshold_km: DESERT_THRESHOLD_KM,
            deserts,
            citations,
        }
    }

    /// Mahalanobis over per-region (density, specialties, doctors, beds)
    fn regional_equity(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let regions = self.corpus.regions();
        let rows: Vec<Vec<f64>> = regions
            .iter()
            .map(|region| {
                let facilities = self.corpus.by_region(region);
                let specialty_count: std::collections::BTreeSet<_> =
                    facilities.iter().flat_map(|f| f.specialties.iter().copied()).collect();
                let doctors: u64 = facilities.iter().map(|f| f.doctors as u64).sum();
                let beds: u64 = facilities.iter().map(|f| f.capacity as u64).sum();
                vec![
                    facilities.len() as f64,
                    specialty_count.len() as f64,
                    doctors as f64,
                    beds as f64,
                ]
            })
            .collect();

        let Some(detector) = MahalanobisDetector::fit(&rows) else {
            tracing::warn!("regional equity skipped (degenerate region features)");
            return AgentResult::RegionalEquity {
                flagged: vec![],
                threshold: CHI2_975_DF4,
                citations: vec![],
            };
        };

        let flagged: Vec<EquityEntry> = detector
            .outliers(&rows, CHI2_975_DF4)
            .into_iter()
            .map(|i| EquityEntry {
                region: regions[i].clone(),
                mahalanobis_sq: detector.distance_sq(&rows[i]),
                facility_count: rows[i][0] as usize,
                doctor_total: rows[i][2] as u64,
                bed_total: rows[i][3] as u64,
            })
            .collect();

        let citations = flagged
            .iter()
            .flat_map(|entry| {
                self.corpus.by_region(&entry.region).into_iter().take(1).map(|f| Citation {
                    facility_id: f.id.clone(),
                    field: "region".to_string(),
                    value: entry.region.clone(),
                    confidence: 0.9,
                    step_index: ctx.step_index,
                })
            })
            .collect();

        AgentResult::RegionalEquity { flagged, threshold: CHI2_975_DF4, citations }
    }

    fn wants_city_distance(ctx: &AgentContext<'_>) -> bool {
        let q = ctx.query.to_lowercase();
        ctx.params.places.len() >= 2
            && (q.contains("how far") || q.contains("distance") || q.contains(" to "))
    }

    fn wants_equity(query: &str) -> bool {
        let q = query.to_lowercase();
        q.contains("equity") || q.contains("equitable") || q.contains("fair")
    }
}

#[async_trait]
impl Agent for GeoAgent {
    fn name(&self) -> AgentName {
        AgentName::Geo
    }

    async fn run(&self, ctx: &AgentContext<'_>) -> Result<AgentResult, AgentError> {
        let result = match ctx.intent {
            Intent::CoverageGap => self.cold_spots(ctx),
            Intent::MedicalDesert => self.medical_deserts(ctx),
            Intent::Comparison => {
                if Self::wants_city_distance(ctx) {
                    self.city_distance(ctx)
                } else {
                    self.regional_equity(ctx)
                }
            }
            Intent::DistanceQuery => {
                if Self::wants_city_distance(ctx) {
                    self.city_distance(ctx)
                } else {
                    self.proximity_search(ctx)
                }
            }
            _ if Self::wants_equity(ctx.query) => self.regional_equity(ctx),
            _ => self.proximity_search(ctx),
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
    use crate::corpus::{Facility, FacilityType, Specialty};
    use crate::intent::extract_params;
    use std::collections::BTreeMap as Map;

    fn facility(id: &str, city: &str, lat: f64, lng: f64, specialty: Option<Specialty>) -> Facility {
        Facility {
            id: id.to_string(),
            name: format!("Facility {id}"),
            city: city.to_string(),
            region: "Northern".to_string(),
            facility_type: FacilityType::Hospital,
            organization_type: String::new(),
            specialties: specialty.into_iter().collect(),
            procedures: vec![],
            equipment: vec![],
            capabilities: vec![],
            capacity: 50,
            doctors: 8,
            latitude: Some(lat),
            longitude: Some(lng),
        }
    }

    fn setup() -> GeoAgent {
        let corpus = Arc::new(
            CorpusStore::from_records(vec![
                facility("tam-1", "Tamale", 9.4034, -0.8424, Some(Specialty::Cardiology)),
                facility("tam-2", "Savelugu", 9.6240, -0.8250, None),
                facility("acc-1", "Accra", 5.6037, -0.1870, Some(Specialty::Cardiology)),
            ])
            .unwrap(),
        );
        let spatial = Arc::new(SpatialIndex::build(&corpus));
        GeoAgent::new(corpus, spatial)
    }

    async fn run(agent: &GeoAgent, query: &str, intent: Intent) -> AgentResult {
        let params = extract_params(query, Gazetteer::bundled());
        let prior = Map::new();
        let ctx = AgentContext { query, intent, params: &params, prior: &prior, step_index: 1 };
        agent.run(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_radius_query_bounds_and_sorting() {
        let agent = setup();
        let result = run(&agent, "Hospitals within 30 km of Tamale", Intent::DistanceQuery).await;
        let AgentResult::RadiusSearch { facilities, radius_km, count, .. } = result else {
            panic!("wrong variant");
        };
        assert_eq!(radius_km, 30.0);
        assert_eq!(count, 2); // tam-1 and tam-2; Accra is ~600 km away
        for f in &facilities {
            assert!(f.distance_km <= 30.0 + 1e-6);
        }
        assert_eq!(facilities[0].facility.id, "tam-1");
    }

    #[tokio::test]
    async fn test_unknown_location_is_graceful() {
        let agent = setup();
        let result = run(&agent, "clinics within 10 km of Atlantis", Intent::DistanceQuery).await;
        let AgentResult::Failed { error, .. } = result else {
            panic!("wrong variant");
        };
        assert_eq!(error, "unknown_location");
    }

    #[tokio::test]
    async fn test_city_distance() {
        let agent = setup();
        let result = run(&agent, "How far is Kumasi from Accra?", Intent::DistanceQuery).await;
        let AgentResult::CityDistance { from, to, distance_km, .. } = result else {
            panic!("wrong variant");
        };
        assert_eq!(from, "kumasi");
        assert_eq!(to, "accra");
        assert!((distance_km - 200.0).abs() < 20.0, "got {distance_km}");
    }

    #[tokio::test]
    async fn test_cold_spots_sorted_and_capped() {
        let agent = setup();
        let result = run(&agent, "coverage gaps for cardiology", Intent::CoverageGap).await;
        let AgentResult::ColdSpots { cold_spots, threshold_km, .. } = result else {
            panic!("wrong variant");
        };
        assert_eq!(threshold_km, COLD_SPOT_THRESHOLD_KM);
        assert!(cold_spots.len() <= MAX_COLD_SPOTS);
        assert!(!cold_spots.is_empty());
        for pair in cold_spots.windows(2) {
            assert!(pair[0].nearest_distance_km >= pair[1].nearest_distance_km);
        }
        for cell in &cold_spots {
            assert!(cell.nearest_distance_km > COLD_SPOT_THRESHOLD_KM);
        }
    }

    #[tokio::test]
    async fn test_medical_deserts_severity() {
        let agent = setup();
        let result = run(&agent, "which regions are medical deserts", Intent::MedicalDesert).await;
        let AgentResult::MedicalDeserts { deserts, .. } = result else {
            panic!("wrong variant");
        };
        // with facilities only around Tamale and Accra, several regions are
        // far from everything
        assert!(!deserts.is_empty());
        for desert in &deserts {
            assert!(desert.nearest_distance_km > DESERT_THRESHOLD_KM);
            if desert.nearest_distance_km > 150.0 {
                assert_eq!(desert.severity, Severity::Critical);
            }
        }
    }
}
