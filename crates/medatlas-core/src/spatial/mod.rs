//! Spatial Index
//!
//! Ball-tree over facility coordinates in radians with the Haversine metric
//! (R = 6371.0 km). Supports radius and k-NN queries. Specialty-filtered
//! sub-trees are built on first use and cached; the corpus is immutable so a
//! cached sub-tree never goes stale.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::corpus::{CorpusStore, Specialty};
use crate::geocode::GeoPoint;

mod balltree;

pub use balltree::BallTree;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two (lat, lng) points in degrees
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    haversine_rad(
        (a.0.to_radians(), a.1.to_radians()),
        (b.0.to_radians(), b.1.to_radians()),
    )
}

/// Haversine distance in kilometres between two (lat, lng) points in radians
pub(crate) fn haversine_rad(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dlat = b.0 - a.0;
    let dlng = b.1 - a.1;
    let h = (dlat / 2.0).sin().powi(2) + a.0.cos() * b.0.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

// ============================================================================
// SPATIAL INDEX
// ============================================================================

/// One indexed facility position
#[derive(Debug, Clone)]
struct SpatialEntry {
    id: String,
    lat: f64,
    lng: f64,
    specialties: Vec<Specialty>,
}

/// A spatial query hit
#[derive(Debug, Clone)]
pub struct SpatialHit {
    /// Facility id
    pub id: String,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
    /// Haversine distance from the query center, km
    pub distance_km: f64,
}

/// Ball-tree spatial index over facilities with valid coordinates
pub struct SpatialIndex {
    entries: Vec<SpatialEntry>,
    all: BallTree,
    /// specialty -> (sub-tree, entry indices it was built from)
    subtrees: Mutex<HashMap<Specialty, Arc<(BallTree, Vec<usize>)>>>,
}

impl SpatialIndex {
    /// Build the index from every corpus facility with valid coordinates
    pub fn build(corpus: &CorpusStore) -> Self {
        let entries: Vec<SpatialEntry> = corpus
            .all()
            .filter_map(|f| {
                let (lat, lng) = f.coordinates()?;
                Some(SpatialEntry {
                    id: f.id.clone(),
                    lat,
                    lng,
                    specialties: f.specialties.iter().copied().collect(),
                })
            })
            .collect();

        let all = BallTree::build(entries.iter().map(|e| (e.lat, e.lng)).collect());
        tracing::debug!(indexed = entries.len(), "spatial index built");

        Self { entries, all, subtrees: Mutex::new(HashMap::new()) }
    }

    /// Number of indexed facilities
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff no facility had valid coordinates
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sub-tree for a specialty, building and caching it on first use.
    /// The mutex makes the build at-most-once; readers then share the `Arc`.
    fn subtree(&self, specialty: Specialty) -> Arc<(BallTree, Vec<usize>)> {
        let mut cache = self.subtrees.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .entry(specialty)
            .or_insert_with(|| {
                let indices: Vec<usize> = self
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.specialties.contains(&specialty))
                    .map(|(i, _)| i)
                    .collect();
                let tree =
                    BallTree::build(indices.iter().map(|&i| (self.entries[i].lat, self.entries[i].lng)).collect());
                tracing::debug!(specialty = %specialty, count = indices.len(), "specialty sub-tree built");
                Arc::new((tree, indices))
            })
            .clone()
    }

    fn to_hits(&self, raw: Vec<(usize, f64)>, remap: Option<&[usize]>) -> Vec<SpatialHit> {
        raw.into_iter()
            .map(|(idx, distance_km)| {
                let entry = match remap {
                    Some(indices) => &self.entries[indices[idx]],
                    None => &self.entries[idx],
                };
                SpatialHit {
                    id: entry.id.clone(),
                    lat: entry.lat,
                    lng: entry.lng,
                    distance_km,
                }
            })
            .collect()
    }

    /// All facilities within `radius_km` of `center`, sorted by distance
    pub fn radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
        specialty: Option<Specialty>,
    ) -> Vec<SpatialHit> {
        let center = (center.lat, center.lng);
        match specialty {
            None => {
                let raw = self.all.radius(center, radius_km);
                self.to_hits(raw, None)
            }
            Some(tag) => {
                let sub = self.subtree(tag);
                let raw = sub.0.radius(center, radius_km);
                self.to_hits(raw, Some(&sub.1))
            }
        }
    }

    /// The `k` facilities nearest to `center`, sorted by distance
    pub fn nearest(
        &self,
        center: GeoPoint,
        k: usize,
        specialty: Option<Specialty>,
    ) -> Vec<SpatialHit> {
        let center = (center.lat, center.lng);
        match specialty {
            None => {
                let raw = self.all.nearest(center, k);
                self.to_hits(raw, None)
            }
            Some(tag) => {
                let sub = self.subtree(tag);
                let raw = sub.0.nearest(center, k);
                self.to_hits(raw, Some(&sub.1))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Facility, FacilityType};
    use std::collections::BTreeSet;

    fn facility(id: &str, lat: f64, lng: f64, specialties: &[Specialty]) -> Facility {
        Facility {
            id: id.to_string(),
            name: id.to_string(),
            city: "Test".to_string(),
            region: "Ashanti".to_string(),
            facility_type: FacilityType::Hospital,
            organization_type: String::new(),
            specialties: specialties.iter().copied().collect::<BTreeSet<_>>(),
            procedures: vec![],
            equipment: vec![],
            capabilities: vec![],
            capacity: 0,
            doctors: 0,
            latitude: Some(lat),
            longitude: Some(lng),
        }
    }

    fn corpus() -> CorpusStore {
        CorpusStore::from_records(vec![
            facility("accra", 5.6037, -0.1870, &[Specialty::Cardiology]),
            facility("tema", 5.6698, -0.0166, &[]),
            facility("kumasi", 6.6885, -1.6244, &[Specialty::Cardiology]),
            facility("tamale", 9.4008, -0.8393, &[]),
            facility("nowhere", 7.0, -1.0, &[]),
        ])
        .unwrap()
    }

    #[test]
    fn test_haversine_known_distance() {
        // Accra to Kumasi is roughly 200 km
        let d = haversine_km((5.6037, -0.1870), (6.6885, -1.6244));
        assert!((d - 200.0).abs() < 15.0, "got {d}");
        // zero distance
        assert!(haversine_km((7.0, -1.0), (7.0, -1.0)) < 1e-9);
    }

    #[test]
    fn test_radius_respects_bound() {
        let index = SpatialIndex::build(&corpus());
        let center = GeoPoint { lat: 5.6037, lng: -0.1870 };
        let hits = index.radius(center, 30.0, None);
        assert_eq!(hits.len(), 2); // accra itself + tema
        for hit in &hits {
            assert!(hit.distance_km <= 30.0 + 1e-6);
        }
        // sorted ascending
        for pair in hits.windows(2) {
            assert!(pair[0].distance_km <= pair[1].distance_km);
        }
    }

    #[test]
    fn test_nearest_ordering() {
        let index = SpatialIndex::build(&corpus());
        let center = GeoPoint { lat: 5.6037, lng: -0.1870 };
        let hits = index.nearest(center, 3, None);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "accra");
        assert_eq!(hits[1].id, "tema");
    }

    #[test]
    fn test_specialty_subtree_filtering() {
        let index = SpatialIndex::build(&corpus());
        let center = GeoPoint { lat: 5.6037, lng: -0.1870 };
        let hits = index.radius(center, 500.0, Some(Specialty::Cardiology));
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["accra", "kumasi"]);
        // second call hits the cache and agrees
        let again = index.radius(center, 500.0, Some(Specialty::Cardiology));
        assert_eq!(again.len(), hits.len());
    }

    #[test]
    fn test_empty_specialty_subtree() {
        let index = SpatialIndex::build(&corpus());
        let center = GeoPoint { lat: 5.6037, lng: -0.1870 };
        assert!(index.radius(center, 1000.0, Some(Specialty::Dialysis)).is_empty());
        assert!(index.nearest(center, 3, Some(Specialty::Dialysis)).is_empty());
    }
}
