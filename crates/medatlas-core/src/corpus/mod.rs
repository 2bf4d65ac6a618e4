//! Corpus Module
//!
//! The immutable facility table and its query-text extractors:
//! - Facility records with closed specialty / type / equipment tag sets
//! - In-memory store with cached region / specialty / type indices
//! - Word-boundary extractors and negation detection for query parsing

mod facility;
mod store;

pub mod extract;

pub use facility::{
    in_ghana_bbox, EquipmentTag, Facility, FacilityType, Specialty, ALL_EQUIPMENT,
    ALL_SPECIALTIES, GHANA_CENTROID, GHANA_LAT_MAX, GHANA_LAT_MIN, GHANA_LNG_MAX, GHANA_LNG_MIN,
};
pub use store::{CorpusStore, Result, SnapshotError};
