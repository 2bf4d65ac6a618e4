//! Query-text extractors
//!
//! Pull canonical tags (specialty, region, facility type, equipment) out of
//! free-form query text using word-boundary matching, plus negation detection
//! ("facilities without orthopedic services" inverts the specialty filter).

use super::facility::{
    EquipmentTag, FacilityType, Specialty, ALL_EQUIPMENT, ALL_SPECIALTIES,
};

/// The 16 administrative regions of Ghana
pub const GHANA_REGIONS: [&str; 16] = [
    "Greater Accra",
    "Ashanti",
    "Western",
    "Western North",
    "Central",
    "Eastern",
    "Volta",
    "Oti",
    "Northern",
    "Savannah",
    "North East",
    "Upper East",
    "Upper West",
    "Bono",
    "Bono East",
    "Ahafo",
];

/// Negation triggers recognized by [`is_negated`]
const NEGATION_TRIGGERS: [&str; 9] = [
    "not", "without", "no", "lacking", "absence", "absent", "missing", "don't", "doesn't",
];

/// Tokens a negated tag must appear within, counted after the trigger
const NEGATION_WINDOW: usize = 6;

// ============================================================================
// WORD-BOUNDARY MATCHING
// ============================================================================

/// Lowercase word tokens; apostrophes stay inside tokens so "don't" survives
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '\'' {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// True iff `phrase` occurs in `text` surrounded by token boundaries.
///
/// Prevents "wa" from matching inside "nkawkaw": every phrase token must
/// align with a whole text token.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    phrase_position(&tokenize(text), phrase).is_some()
}

/// Position (token index) of the first whole-token occurrence of `phrase`
fn phrase_position(tokens: &[String], phrase: &str) -> Option<usize> {
    let needle = tokenize(phrase);
    if needle.is_empty() || needle.len() > tokens.len() {
        return None;
    }
    tokens
        .windows(needle.len())
        .position(|window| window.iter().zip(&needle).all(|(a, b)| a == b))
}

// ============================================================================
// EXTRACTORS
// ============================================================================

/// Extract the first canonical specialty mentioned in the text
pub fn extract_specialty(text: &str) -> Option<Specialty> {
    let tokens = tokenize(text);
    for specialty in ALL_SPECIALTIES {
        for keyword in specialty.keywords() {
            if phrase_position(&tokens, keyword).is_some() {
                return Some(specialty);
            }
        }
    }
    None
}

/// Extract a Ghana region name, preferring longer names first so
/// "Western North" wins over "Western" and "Upper East" over "East"
pub fn extract_region(text: &str) -> Option<String> {
    let tokens = tokenize(text);
    let mut regions = GHANA_REGIONS;
    regions.sort_by_key(|r| std::cmp::Reverse(r.len()));
    regions
        .iter()
        .find(|region| phrase_position(&tokens, region).is_some())
        .map(|r| r.to_string())
}

/// Extract a facility type mentioned in the text
pub fn extract_facility_type(text: &str) -> Option<FacilityType> {
    let tokens = tokenize(text);
    const CANDIDATES: [(FacilityType, &[&str]); 7] = [
        (FacilityType::Hospital, &["hospital", "hospitals"]),
        (FacilityType::Clinic, &["clinic", "clinics"]),
        (FacilityType::HealthCenter, &["health center", "health centre", "health centers", "health centres"]),
        (FacilityType::Pharmacy, &["pharmacy", "pharmacies"]),
        (FacilityType::Ngo, &["ngo", "ngos"]),
        (FacilityType::Laboratory, &["laboratory", "laboratories"]),
        (FacilityType::Dentist, &["dentist", "dentists"]),
    ];
    for (facility_type, keywords) in CANDIDATES {
        if keywords.iter().any(|kw| phrase_position(&tokens, kw).is_some()) {
            return Some(facility_type);
        }
    }
    None
}

/// Extract a recognized equipment tag mentioned in the text
pub fn extract_equipment(text: &str) -> Option<EquipmentTag> {
    let tokens = tokenize(text);
    for tag in ALL_EQUIPMENT {
        for keyword in tag.keywords() {
            if phrase_position(&tokens, keyword).is_some() {
                return Some(tag);
            }
        }
    }
    None
}

/// True iff `tag` appears within [`NEGATION_WINDOW`] tokens after any
/// negation trigger ("without", "no", "lacking", ...)
pub fn is_negated(text: &str, tag: &str) -> bool {
    let tokens = tokenize(text);
    let Some(tag_pos) = phrase_position(&tokens, tag) else {
        return false;
    };
    tokens.iter().enumerate().any(|(i, token)| {
        NEGATION_TRIGGERS.contains(&token.as_str())
            && tag_pos > i
            && tag_pos - i <= NEGATION_WINDOW
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_boundary_matching() {
        assert!(contains_phrase("hospitals in Wa today", "wa"));
        assert!(!contains_phrase("hospitals in Nkawkaw", "wa"));
        assert!(contains_phrase("near Cape Coast please", "cape coast"));
    }

    #[test]
    fn test_extract_specialty_keywords() {
        assert_eq!(extract_specialty("heart problems"), Some(Specialty::Cardiology));
        assert_eq!(extract_specialty("kidney dialysis units"), Some(Specialty::Dialysis));
        assert_eq!(extract_specialty("nothing medical here"), None);
    }

    #[test]
    fn test_extract_region_longest_first() {
        assert_eq!(extract_region("clinics in Western North"), Some("Western North".to_string()));
        assert_eq!(extract_region("clinics in Western region"), Some("Western".to_string()));
        assert_eq!(extract_region("Upper East facilities"), Some("Upper East".to_string()));
        assert_eq!(extract_region("facilities in Lagos"), None);
    }

    #[test]
    fn test_extract_facility_type() {
        assert_eq!(extract_facility_type("how many hospitals"), Some(FacilityType::Hospital));
        assert_eq!(extract_facility_type("health centres in Volta"), Some(FacilityType::HealthCenter));
        assert_eq!(extract_facility_type("just facilities"), None);
    }

    #[test]
    fn test_extract_equipment() {
        assert_eq!(extract_equipment("places with an MRI machine"), Some(EquipmentTag::Mri));
        assert_eq!(extract_equipment("cath lab availability"), Some(EquipmentTag::CardiacCatheterization));
    }

    #[test]
    fn test_negation_window() {
        assert!(is_negated("facilities without orthopedic services", "orthopedic"));
        assert!(is_negated("clinics that don't offer dialysis", "dialysis"));
        // trigger more than six tokens before the tag
        assert!(!is_negated(
            "no doubt the very best place in town for dialysis",
            "dialysis"
        ));
        // no trigger at all
        assert!(!is_negated("facilities with orthopedic services", "orthopedic"));
    }

    #[test]
    fn test_extract_region_idempotent() {
        let extracted = extract_region("hospitals in Ashanti without beds").unwrap();
        assert_eq!(extract_region(&extracted), Some(extracted.clone()));
    }
}
