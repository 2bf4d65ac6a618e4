//! Geocoder
//!
//! Resolves a place-name string to coordinates over a static gazetteer of
//! Ghana cities and regions. Lookup cascade:
//!
//! 1. Exact match on the normalized name - O(1)
//! 2. Word-boundary match, gazetteer keys tried shortest-first so more
//!    specific names win ("wa" never matches inside "nkawkaw")
//! 3. Fuzzy match, best normalized-Levenshtein ratio >= 0.80
//!
//! Misses are `None`; callers handle them explicitly.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::corpus::extract::contains_phrase;

/// Minimum normalized Levenshtein ratio for a fuzzy geocode hit
const FUZZY_THRESHOLD: f64 = 0.80;

/// A resolved geographic point (degrees)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A gazetteer name found inside free text
#[derive(Debug, Clone)]
pub struct PlaceMatch {
    /// Normalized gazetteer key that matched
    pub name: String,
    /// Resolved coordinates
    pub point: GeoPoint,
    /// True when the name is one of the 16 regions
    pub is_region: bool,
    /// Token offset of the match in the input, for ordering
    pub token_start: usize,
}

#[derive(Debug, Deserialize)]
struct GazetteerFile {
    places: Vec<PlaceRecord>,
}

#[derive(Debug, Deserialize)]
struct PlaceRecord {
    name: String,
    lat: f64,
    lng: f64,
    kind: PlaceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PlaceKind {
    City,
    Region,
}

// ============================================================================
// GAZETTEER
// ============================================================================

/// Static gazetteer of Ghana cities and regions
pub struct Gazetteer {
    /// normalized name -> point
    entries: HashMap<String, GeoPoint>,
    /// normalized keys sorted shortest-first, for word-boundary scans
    keys_by_length: Vec<String>,
    /// (region display name, centroid) pairs
    regions: Vec<(String, GeoPoint)>,
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl Gazetteer {
    /// Load the bundled Ghana gazetteer (parsed once, shared)
    pub fn bundled() -> &'static Gazetteer {
        static GAZETTEER: OnceLock<Gazetteer> = OnceLock::new();
        GAZETTEER.get_or_init(|| {
            let raw = include_str!("../../data/gazetteer.json");
            Gazetteer::from_json(raw).expect("bundled gazetteer is valid")
        })
    }

    /// Parse a gazetteer from JSON
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let file: GazetteerFile = serde_json::from_str(raw)?;
        let mut entries = HashMap::with_capacity(file.places.len());
        let mut regions = Vec::new();
        for place in &file.places {
            let point = GeoPoint { lat: place.lat, lng: place.lng };
            entries.insert(normalize(&place.name), point);
            if place.kind == PlaceKind::Region {
                regions.push((place.name.clone(), point));
            }
        }
        let mut keys_by_length: Vec<String> = entries.keys().cloned().collect();
        keys_by_length.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        Ok(Self { entries, keys_by_length, regions })
    }

    /// Number of gazetteer entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff the gazetteer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The 16 region centroids, in file order
    pub fn regions(&self) -> &[(String, GeoPoint)] {
        &self.regions
    }

    /// Place names mentioned in free text, longest names first so
    /// "Bono East" wins over "Bono". Matched token spans are consumed, so
    /// overlapping shorter names are not reported again.
    pub fn places_in(&self, text: &str, limit: usize) -> Vec<PlaceMatch> {
        let tokens = crate::corpus::extract::tokenize(text);
        let mut consumed = vec![false; tokens.len()];
        let mut matches = Vec::new();

        for key in self.keys_by_length.iter().rev() {
            if matches.len() >= limit {
                break;
            }
            let needle = crate::corpus::extract::tokenize(key);
            if needle.is_empty() || needle.len() > tokens.len() {
                continue;
            }
            let hit = (0..=tokens.len() - needle.len()).find(|&start| {
                tokens[start..start + needle.len()]
                    .iter()
                    .zip(&needle)
                    .all(|(a, b)| a == b)
                    && !consumed[start..start + needle.len()].iter().any(|&c| c)
            });
            if let Some(start) = hit {
                for flag in &mut consumed[start..start + needle.len()] {
                    *flag = true;
                }
                matches.push(PlaceMatch {
                    name: key.clone(),
                    point: self.entries[key],
                    is_region: self.regions.iter().any(|(r, _)| normalize(r) == *key),
                    token_start: start,
                });
            }
        }

        matches.sort_by_key(|m| m.token_start);
        matches
    }

    /// Exact (normalized) lookup only - no word-boundary or fuzzy fallback.
    /// Used where a false hit is worse than a miss, e.g. qualifier stripping.
    pub fn exact(&self, name: &str) -> Option<GeoPoint> {
        self.entries.get(&normalize(name)).copied()
    }

    /// Resolve a place name to coordinates, or `None`
    pub fn geocode(&self, name: &str) -> Option<GeoPoint> {
        let query = normalize(name);
        if query.is_empty() {
            return None;
        }

        // 1. Exact
        if let Some(&point) = self.entries.get(&query) {
            return Some(point);
        }

        // 2. Word-boundary, shortest key first so the most specific name that
        //    actually appears as whole tokens wins
        for key in &self.keys_by_length {
            if contains_phrase(&query, key) {
                return Some(self.entries[key]);
            }
        }

        // 3. Fuzzy
        let (best_key, best_ratio) = self.entries.keys().fold(
            (None::<&String>, 0.0f64),
            |(best, best_ratio), key| {
                let ratio = strsim::normalized_levenshtein(&query, key);
                if ratio > best_ratio {
                    (Some(key), ratio)
                } else {
                    (best, best_ratio)
                }
            },
        );
        if best_ratio >= FUZZY_THRESHOLD {
            let key = best_key?;
            tracing::debug!(query = %name, matched = %key, ratio = best_ratio, "fuzzy geocode hit");
            return Some(self.entries[key]);
        }

        None
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let g = Gazetteer::bundled();
        let p = g.geocode("Tamale").unwrap();
        assert!((p.lat - 9.4008).abs() < 1e-6);
        assert!((p.lng - -0.8393).abs() < 1e-6);
    }

    #[test]
    fn test_normalization() {
        let g = Gazetteer::bundled();
        assert_eq!(g.geocode("  CAPE   coast! "), g.geocode("Cape Coast"));
        assert_eq!(g.geocode("dunkwa on offin"), g.geocode("Dunkwa-on-Offin"));
    }

    #[test]
    fn test_word_boundary_prevents_substring_hits() {
        let g = Gazetteer::bundled();
        // "wa" is a gazetteer key but must not fire inside "nkawkaw"
        let nkawkaw = g.geocode("hospitals around Nkawkaw").unwrap();
        let wa = g.geocode("Wa").unwrap();
        assert!((nkawkaw.lat - 6.5534).abs() < 1e-6);
        assert!((wa.lat - 10.0601).abs() < 1e-6);
    }

    #[test]
    fn test_embedded_place_name() {
        let g = Gazetteer::bundled();
        let p = g.geocode("clinics near Bolgatanga please").unwrap();
        assert!((p.lat - 10.7856).abs() < 1e-6);
    }

    #[test]
    fn test_fuzzy_match() {
        let g = Gazetteer::bundled();
        // single-letter typo
        assert_eq!(g.geocode("Kumassi"), g.geocode("Kumasi"));
        assert_eq!(g.geocode("Bolgatana"), g.geocode("Bolgatanga"));
    }

    #[test]
    fn test_miss_is_none() {
        let g = Gazetteer::bundled();
        assert!(g.geocode("Ouagadougou").is_none());
        assert!(g.geocode("").is_none());
    }

    #[test]
    fn test_sixteen_regions() {
        assert_eq!(Gazetteer::bundled().regions().len(), 16);
    }

    #[test]
    fn test_places_in_longest_match_priority() {
        let g = Gazetteer::bundled();
        let matches = g.places_in("clinics in Bono East near Techiman", 4);
        let names: Vec<&str> = matches.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["bono east", "techiman"]);
        assert!(matches[0].is_region);
        assert!(!matches[1].is_region);
    }

    #[test]
    fn test_places_in_reports_text_order() {
        let g = Gazetteer::bundled();
        let matches = g.places_in("route from Accra to Cape Coast", 4);
        let names: Vec<&str> = matches.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["accra", "cape coast"]);
    }
}
