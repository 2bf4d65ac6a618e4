//! Corpus Store
//!
//! In-memory table of facility records, keyed by id, built once at startup
//! from a JSON snapshot and immutable afterwards. Secondary indices
//! (region, specialty, type) are cached at load so agent filters stay cheap.

use std::collections::HashMap;
use std::path::Path;

use super::facility::{Facility, FacilityType, Specialty};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Snapshot loading error
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// IO error reading the snapshot file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot is not valid JSON for the expected schema
    #[error("Snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Two records share an id
    #[error("Duplicate facility id: {0}")]
    DuplicateId(String),
    /// Snapshot contains no records
    #[error("Snapshot is empty")]
    Empty,
}

/// Corpus result type
pub type Result<T> = std::result::Result<T, SnapshotError>;

// ============================================================================
// CORPUS STORE
// ============================================================================

/// Immutable in-memory facility corpus with cached secondary indices
#[derive(Debug)]
pub struct CorpusStore {
    facilities: Vec<Facility>,
    by_id: HashMap<String, usize>,
    by_region: HashMap<String, Vec<usize>>,
    by_specialty: HashMap<Specialty, Vec<usize>>,
    by_type: HashMap<FacilityType, Vec<usize>>,
}

impl CorpusStore {
    /// Build a corpus from already-parsed records.
    ///
    /// Duplicate ids are fatal. Records with coordinates outside Ghana's
    /// bounding box keep their attributes but lose the coordinates, so they
    /// never enter spatial structures.
    pub fn from_records(records: Vec<Facility>) -> Result<Self> {
        if records.is_empty() {
            return Err(SnapshotError::Empty);
        }

        let mut facilities = Vec::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());
        let mut by_region: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_specialty: HashMap<Specialty, Vec<usize>> = HashMap::new();
        let mut by_type: HashMap<FacilityType, Vec<usize>> = HashMap::new();

        for mut facility in records {
            if facility.coordinates().is_none()
                && (facility.latitude.is_some() || facility.longitude.is_some())
            {
                tracing::warn!(
                    id = %facility.id,
                    "facility has coordinates outside Ghana's bounding box; dropping them"
                );
                facility.latitude = None;
                facility.longitude = None;
            }

            let idx = facilities.len();
            if by_id.insert(facility.id.clone(), idx).is_some() {
                return Err(SnapshotError::DuplicateId(facility.id));
            }

            by_region
                .entry(facility.region.to_lowercase())
                .or_default()
                .push(idx);
            for &specialty in &facility.specialties {
                by_specialty.entry(specialty).or_default().push(idx);
            }
            by_type.entry(facility.facility_type).or_default().push(idx);

            facilities.push(facility);
        }

        tracing::info!(count = facilities.len(), "corpus loaded");

        Ok(Self { facilities, by_id, by_region, by_specialty, by_type })
    }

    /// Load a corpus from a JSON snapshot file (an array of facility records)
    pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<Facility> = serde_json::from_str(&raw)?;
        Self::from_records(records)
    }

    /// Number of facilities
    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    /// True iff the corpus holds no facilities (never true post-load)
    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }

    /// Look up a facility by id
    pub fn get(&self, id: &str) -> Option<&Facility> {
        self.by_id.get(id).map(|&idx| &self.facilities[idx])
    }

    /// Iterate all facilities in load order
    pub fn all(&self) -> impl Iterator<Item = &Facility> {
        self.facilities.iter()
    }

    /// Facilities in a region (case-insensitive exact name)
    pub fn by_region(&self, region: &str) -> Vec<&Facility> {
        self.by_region
            .get(&region.to_lowercase())
            .map(|ids| ids.iter().map(|&i| &self.facilities[i]).collect())
            .unwrap_or_default()
    }

    /// Facilities offering a specialty
    pub fn by_specialty(&self, specialty: Specialty) -> Vec<&Facility> {
        self.by_specialty
            .get(&specialty)
            .map(|ids| ids.iter().map(|&i| &self.facilities[i]).collect())
            .unwrap_or_default()
    }

    /// Facilities of a given type
    pub fn by_type(&self, facility_type: FacilityType) -> Vec<&Facility> {
        self.by_type
            .get(&facility_type)
            .map(|ids| ids.iter().map(|&i| &self.facilities[i]).collect())
            .unwrap_or_default()
    }

    /// Filter facilities by predicate, preserving load order
    pub fn filter<F>(&self, predicate: F) -> Vec<&Facility>
    where
        F: Fn(&Facility) -> bool,
    {
        self.facilities.iter().filter(|f| predicate(f)).collect()
    }

    /// Distinct region names, as stored (original casing), sorted
    pub fn regions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_region
            .values()
            .filter_map(|ids| ids.first().map(|&i| self.facilities[i].region.clone()))
            .collect();
        names.sort();
        names
    }
}

// ============================================================================
// TESTS
// ============================================================================
