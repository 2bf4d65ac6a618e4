//! Facility - The fundamental unit of the corpus
//!
//! Each facility record carries:
//! - Identity and location (city, region, coordinates)
//! - A closed set of canonical specialty tags
//! - Free-form procedure / equipment / capability strings, preserved verbatim
//! - Capacity figures (beds, doctors; 0 = unknown)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// GEOGRAPHIC BOUNDS
// ============================================================================

/// Ghana bounding box, southern edge (degrees north)
pub const GHANA_LAT_MIN: f64 = 4.74;
/// Ghana bounding box, northern edge
pub const GHANA_LAT_MAX: f64 = 11.17;
/// Ghana bounding box, western edge (degrees east)
pub const GHANA_LNG_MIN: f64 = -3.26;
/// Ghana bounding box, eastern edge
pub const GHANA_LNG_MAX: f64 = 1.20;

/// Geographic centroid of Ghana, used as the routing fallback origin
pub const GHANA_CENTROID: (f64, f64) = (7.9465, -1.0232);

/// True iff the coordinate pair lies inside Ghana's bounding box
pub fn in_ghana_bbox(lat: f64, lng: f64) -> bool {
    (GHANA_LAT_MIN..=GHANA_LAT_MAX).contains(&lat) && (GHANA_LNG_MIN..=GHANA_LNG_MAX).contains(&lng)
}

// ============================================================================
// SPECIALTIES
// ============================================================================

/// Canonical medical specialty tags (closed set of 15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    Cardiology,
    Neurosurgery,
    Oncology,
    Orthopedics,
    Ophthalmology,
    Obstetrics,
    Pediatrics,
    Dialysis,
    GeneralSurgery,
    Emergency,
    Dermatology,
    Psychiatry,
    Dentistry,
    Ent,
    Urology,
}

/// All specialty tags in declaration order
pub const ALL_SPECIALTIES: [Specialty; 15] = [
    Specialty::Cardiology,
    Specialty::Neurosurgery,
    Specialty::Oncology,
    Specialty::Orthopedics,
    Specialty::Ophthalmology,
    Specialty::Obstetrics,
    Specialty::Pediatrics,
    Specialty::Dialysis,
    Specialty::GeneralSurgery,
    Specialty::Emergency,
    Specialty::Dermatology,
    Specialty::Psychiatry,
    Specialty::Dentistry,
    Specialty::Ent,
    Specialty::Urology,
];

impl Specialty {
    /// Convert to the canonical tag string
    pub fn as_str(&self) -> &'static str {
        match self {
            Specialty::Cardiology => "cardiology",
            Specialty::Neurosurgery => "neurosurgery",
            Specialty::Oncology => "oncology",
            Specialty::Orthopedics => "orthopedics",
            Specialty::Ophthalmology => "ophthalmology",
            Specialty::Obstetrics => "obstetrics",
            Specialty::Pediatrics => "pediatrics",
            Specialty::Dialysis => "dialysis",
            Specialty::GeneralSurgery => "general_surgery",
            Specialty::Emergency => "emergency",
            Specialty::Dermatology => "dermatology",
            Specialty::Psychiatry => "psychiatry",
            Specialty::Dentistry => "dentistry",
            Specialty::Ent => "ent",
            Specialty::Urology => "urology",
        }
    }

    /// Parse from a canonical tag string
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cardiology" => Some(Specialty::Cardiology),
            "neurosurgery" => Some(Specialty::Neurosurgery),
            "oncology" => Some(Specialty::Oncology),
            "orthopedics" | "orthopedic" => Some(Specialty::Orthopedics),
            "ophthalmology" => Some(Specialty::Ophthalmology),
            "obstetrics" => Some(Specialty::Obstetrics),
            "pediatrics" => Some(Specialty::Pediatrics),
            "dialysis" => Some(Specialty::Dialysis),
            "general_surgery" | "general surgery" => Some(Specialty::GeneralSurgery),
            "emergency" => Some(Specialty::Emergency),
            "dermatology" => Some(Specialty::Dermatology),
            "psychiatry" => Some(Specialty::Psychiatry),
            "dentistry" => Some(Specialty::Dentistry),
            "ent" => Some(Specialty::Ent),
            "urology" => Some(Specialty::Urology),
            _ => None,
        }
    }

    /// Query keywords that indicate this specialty, beyond the tag itself
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Specialty::Cardiology => &["cardiology", "cardiac", "heart"],
            Specialty::Neurosurgery => &["neurosurgery", "neurosurgical", "brain surgery"],
            Specialty::Oncology => &["oncology", "cancer", "tumor", "chemotherapy"],
            Specialty::Orthopedics => &["orthopedics", "orthopedic", "orthopaedic", "bone", "fracture"],
            Specialty::Ophthalmology => &["ophthalmology", "eye", "cataract", "vision"],
            Specialty::Obstetrics => &["obstetrics", "maternity", "maternal", "antenatal", "delivery"],
            Specialty::Pediatrics => &["pediatrics", "pediatric", "paediatric", "children", "child"],
            Specialty::Dialysis => &["dialysis", "renal", "kidney"],
            Specialty::GeneralSurgery => &["general surgery", "surgical", "surgery"],
            Specialty::Emergency => &["emergency", "trauma", "casualty", "accident"],
            Specialty::Dermatology => &["dermatology", "skin"],
            Specialty::Psychiatry => &["psychiatry", "psychiatric", "mental health"],
            Specialty::Dentistry => &["dentistry", "dental", "tooth", "teeth"],
            Specialty::Ent => &["ent", "ear nose", "otolaryngology"],
            Specialty::Urology => &["urology", "urological", "prostate"],
        }
    }
}

impl std::fmt::Display for Specialty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// FACILITY TYPES
// ============================================================================

/// Facility classification (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FacilityType {
    Hospital,
    Clinic,
    HealthCenter,
    Pharmacy,
    Ngo,
    Laboratory,
    Dentist,
    #[default]
    Other,
}

impl FacilityType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityType::Hospital => "hospital",
            FacilityType::Clinic => "clinic",
            FacilityType::HealthCenter => "health_center",
            FacilityType::Pharmacy => "pharmacy",
            FacilityType::Ngo => "ngo",
            FacilityType::Laboratory => "laboratory",
            FacilityType::Dentist => "dentist",
            FacilityType::Other => "other",
        }
    }

    /// Parse from string name, defaulting to `Other`
    pub fn parse_name(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "hospital" => FacilityType::Hospital,
            "clinic" => FacilityType::Clinic,
            "health_center" | "health center" | "health centre" => FacilityType::HealthCenter,
            "pharmacy" => FacilityType::Pharmacy,
            "ngo" => FacilityType::Ngo,
            "laboratory" | "lab" => FacilityType::Laboratory,
            "dentist" | "dental" => FacilityType::Dentist,
            _ => FacilityType::Other,
        }
    }
}

impl std::fmt::Display for FacilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// EQUIPMENT TAGS
// ============================================================================

/// Recognized equipment tags (closed set of 13 keywords)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentTag {
    Ct,
    Mri,
    Ultrasound,
    XRay,
    Icu,
    OperatingTheater,
    Ventilator,
    DialysisMachine,
    CardiacCatheterization,
    Ophthalmoscope,
    SurgicalMicroscope,
    RadiationTherapy,
    Laboratory,
}

/// All equipment tags in declaration order
pub const ALL_EQUIPMENT: [EquipmentTag; 13] = [
    EquipmentTag::Ct,
    EquipmentTag::Mri,
    EquipmentTag::Ultrasound,
    EquipmentTag::XRay,
    EquipmentTag::Icu,
    EquipmentTag::OperatingTheater,
    EquipmentTag::Ventilator,
    EquipmentTag::DialysisMachine,
    EquipmentTag::CardiacCatheterization,
    EquipmentTag::Ophthalmoscope,
    EquipmentTag::SurgicalMicroscope,
    EquipmentTag::RadiationTherapy,
    EquipmentTag::Laboratory,
];

impl EquipmentTag {
    /// Convert to the canonical tag string
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentTag::Ct => "ct",
            EquipmentTag::Mri => "mri",
            EquipmentTag::Ultrasound => "ultrasound",
            EquipmentTag::XRay => "x-ray",
            EquipmentTag::Icu => "icu",
            EquipmentTag::OperatingTheater => "operating_theater",
            EquipmentTag::Ventilator => "ventilator",
            EquipmentTag::DialysisMachine => "dialysis_machine",
            EquipmentTag::CardiacCatheterization => "cardiac_catheterization",
            EquipmentTag::Ophthalmoscope => "ophthalmoscope",
            EquipmentTag::SurgicalMicroscope => "surgical_microscope",
            EquipmentTag::RadiationTherapy => "radiation_therapy",
            EquipmentTag::Laboratory => "laboratory",
        }
    }

    /// Text keywords that indicate this equipment in free-form strings
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            EquipmentTag::Ct => &["ct", "ct scan", "ct scanner", "computed tomography"],
            EquipmentTag::Mri => &["mri", "magnetic resonance"],
            EquipmentTag::Ultrasound => &["ultrasound", "sonograph", "ultrasonography"],
            EquipmentTag::XRay => &["x-ray", "xray", "x ray", "radiograph"],
            EquipmentTag::Icu => &["icu", "intensive care"],
            EquipmentTag::OperatingTheater => &["operating theater", "operating theatre", "operating room", "surgical theater"],
            EquipmentTag::Ventilator => &["ventilator"],
            EquipmentTag::DialysisMachine => &["dialysis machine", "dialysis unit", "dialyser", "dialyzer"],
            EquipmentTag::CardiacCatheterization => &["cardiac catheterization", "cath lab", "catheterization"],
            EquipmentTag::Ophthalmoscope => &["ophthalmoscope"],
            EquipmentTag::SurgicalMicroscope => &["surgical microscope", "operating microscope"],
            EquipmentTag::RadiationTherapy => &["radiation therapy", "radiotherapy", "linear accelerator"],
            EquipmentTag::Laboratory => &["laboratory", "lab services", "diagnostic lab"],
        }
    }
}

impl std::fmt::Display for EquipmentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// FACILITY
// ============================================================================

/// A healthcare facility in the corpus
///
/// Immutable after load. Facilities missing valid Ghana coordinates stay in the
/// corpus for attribute queries but are excluded from spatial structures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    /// Unique opaque identifier
    pub id: String,
    /// Facility name
    pub name: String,
    /// City or town
    pub city: String,
    /// Administrative region
    pub region: String,
    /// Facility classification
    pub facility_type: FacilityType,
    /// Free-form organization tag (e.g. "government", "chag", "private")
    #[serde(default)]
    pub organization_type: String,
    /// Canonical specialty tags
    #[serde(default)]
    pub specialties: BTreeSet<Specialty>,
    /// Free-form procedure strings, preserved verbatim
    #[serde(default)]
    pub procedures: Vec<String>,
    /// Free-form equipment strings, preserved verbatim
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Free-form capability strings, preserved verbatim
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Bed count (0 = unknown)
    #[serde(default)]
    pub capacity: u32,
    /// Doctor count (0 = unknown)
    #[serde(default)]
    pub doctors: u32,
    /// Latitude, if known
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude, if known
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Facility {
    /// Coordinates, if both are present and inside Ghana's bounding box
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if in_ghana_bbox(lat, lng) => Some((lat, lng)),
            _ => None,
        }
    }

    /// True iff the facility offers the given specialty
    pub fn has_specialty(&self, specialty: Specialty) -> bool {
        self.specialties.contains(&specialty)
    }

    /// Detect a recognized equipment tag in the free-form equipment strings
    pub fn has_equipment(&self, tag: EquipmentTag) -> bool {
        self.equipment.iter().any(|e| {
            let e = e.to_lowercase();
            tag.keywords().iter().any(|kw| e.contains(kw))
        })
    }

    /// Detect a recognized equipment tag in either equipment or capabilities
    pub fn has_capability(&self, tag: EquipmentTag) -> bool {
        self.has_equipment(tag)
            || self.capabilities.iter().any(|c| {
                let c = c.to_lowercase();
                tag.keywords().iter().any(|kw| c.contains(kw))
            })
    }

    /// Beds-per-doctor ratio, when both counts are known
    pub fn bed_doctor_ratio(&self) -> Option<f64> {
        if self.capacity > 0 && self.doctors > 0 {
            Some(self.capacity as f64 / self.doctors as f64)
        } else {
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn facility() -> Facility {
        Facility {
            id: "gh-001".to_string(),
            name: "Korle Bu Teaching Hospital".to_string(),
            city: "Accra".to_string(),
            region: "Greater Accra".to_string(),
            facility_type: FacilityType::Hospital,
            organization_type: "government".to_string(),
            specialties: [Specialty::Cardiology, Specialty::Neurosurgery].into(),
            procedures: vec!["open heart surgery".to_string()],
            equipment: vec!["CT scanner".to_string(), "ICU beds".to_string()],
            capabilities: vec!["24/7 operating theatre".to_string()],
            capacity: 2000,
            doctors: 250,
            latitude: Some(5.5365),
            longitude: Some(-0.2260),
        }
    }

    #[test]
    fn test_specialty_round_trip() {
        for tag in ALL_SPECIALTIES {
            assert_eq!(Specialty::parse_name(tag.as_str()), Some(tag));
        }
        assert_eq!(Specialty::parse_name("astrology"), None);
    }

    #[test]
    fn test_facility_type_lenient_parse() {
        assert_eq!(FacilityType::parse_name("Health Centre"), FacilityType::HealthCenter);
        assert_eq!(FacilityType::parse_name("weird"), FacilityType::Other);
    }

    #[test]
    fn test_bbox_validation() {
        assert!(in_ghana_bbox(5.6037, -0.1870));
        assert!(!in_ghana_bbox(51.5, -0.12)); // London
        let mut f = facility();
        assert!(f.coordinates().is_some());
        f.latitude = Some(48.85);
        assert!(f.coordinates().is_none());
    }

    #[test]
    fn test_equipment_detection() {
        let f = facility();
        assert!(f.has_equipment(EquipmentTag::Ct));
        assert!(f.has_equipment(EquipmentTag::Icu));
        assert!(!f.has_equipment(EquipmentTag::Mri));
        // operating theatre only appears under capabilities
        assert!(f.has_capability(EquipmentTag::OperatingTheater));
        assert!(!f.has_equipment(EquipmentTag::OperatingTheater));
    }

    #[test]
    fn test_bed_doctor_ratio() {
        let mut f = facility();
        assert_eq!(f.bed_doctor_ratio(), Some(8.0));
        f.doctors = 0;
        assert_eq!(f.bed_doctor_ratio(), None);
    }
}
