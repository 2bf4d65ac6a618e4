//! Query parameter extraction
//!
//! Pulls the structured knobs out of a free-form query: specialty (and
//! whether it is negated), region, city, facility type, equipment tag,
//! radius, and the place names a distance query mentions. Also owns the
//! conservative location-qualifier stripping used by self-correction.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::corpus::extract::{
    extract_equipment, extract_facility_type, extract_region, extract_specialty, is_negated,
};
use crate::corpus::{EquipmentTag, FacilityType, Specialty};
use crate::geocode::Gazetteer;

/// Structured parameters extracted from a query
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Canonical specialty mentioned, if any
    pub specialty: Option<Specialty>,
    /// True when the specialty mention is negated ("without orthopedics")
    pub specialty_negated: bool,
    /// Ghana region named in the query
    pub region: Option<String>,
    /// Non-region gazetteer place named in the query
    pub city: Option<String>,
    /// Facility type mentioned
    pub facility_type: Option<FacilityType>,
    /// Recognized equipment tag mentioned
    pub equipment: Option<EquipmentTag>,
    /// Radius in km ("within 30 km")
    pub radius_km: Option<f64>,
    /// All gazetteer places mentioned, in text order (distance queries)
    pub places: Vec<String>,
}

fn radius_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:within|in a radius of)?\s*(\d+(?:\.\d+)?)\s*(?:km|kilometers?|kilometres?)\b")
            .expect("radius pattern is valid")
    })
}

/// Extract structured parameters from a query
pub fn extract_params(query: &str, gazetteer: &Gazetteer) -> QueryParams {
    let specialty = extract_specialty(query);
    let specialty_negated = specialty.is_some_and(|tag| {
        tag.keywords().iter().any(|keyword| is_negated(query, keyword))
    });

    let places = gazetteer.places_in(query, 4);
    let city = places.iter().find(|p| !p.is_region).map(|p| p.name.clone());

    QueryParams {
        specialty,
        specialty_negated,
        region: extract_region(query),
        city,
        facility_type: extract_facility_type(query),
        equipment: extract_equipment(query),
        radius_km: radius_pattern()
            .captures(query)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        places: places.into_iter().map(|p| p.name).collect(),
    }
}

/// Strip a trailing-style " in X" / " near X" qualifier, but only when `X`
/// geocodes. Returns the cleaned query, or `None` when nothing strippable
/// was found.
pub fn strip_location_qualifiers(query: &str, gazetteer: &Gazetteer) -> Option<String> {
    static QUALIFIER: OnceLock<Regex> = OnceLock::new();
    let pattern = QUALIFIER.get_or_init(|| {
        Regex::new(r"(?i)\s+(?:in|near|around)\s+([A-Za-z][A-Za-z'\- ]*)")
            .expect("qualifier pattern is valid")
    });

    for captures in pattern.captures_iter(query) {
        let full = captures.get(0)?;
        let tail = captures.get(1)?;

        // try progressively shorter place candidates: "Cape Coast with ICU"
        // -> "Cape Coast with" -> "Cape Coast"
        let words: Vec<&str> = tail.as_str().split_whitespace().collect();
        for take in (1..=words.len().min(3)).rev() {
            let candidate = words[..take].join(" ");
            if gazetteer.exact(&candidate).is_none() {
                continue;
            }
            // byte offset just past the `take`-th word of the tail
            let tail_str = tail.as_str();
            let mut end_rel = 0;
            let mut words_done = 0;
            let mut in_word = false;
            for (i, c) in tail_str.char_indices() {
                if c.is_whitespace() {
                    if in_word {
                        words_done += 1;
                        if words_done == take {
                            break;
                        }
                        in_word = false;
                    }
                } else {
                    in_word = true;
                    end_rel = i + c.len_utf8();
                }
            }
            let end = tail.start() + end_rel;
            let mut cleaned = String::with_capacity(query.len());
            cleaned.push_str(&query[..full.start()]);
            cleaned.push(' ');
            cleaned.push_str(query[end..].trim_start());
            let cleaned = cleaned.trim().to_string();
            tracing::debug!(original = %query, cleaned = %cleaned, "stripped location qualifier");
            return Some(cleaned);
        }
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================
