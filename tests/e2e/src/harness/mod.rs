//! Shared fixture corpus and engine builders

use std::sync::Arc;

use medatlas_core::{
    CorpusStore, EngineConfig, Facility, FacilityType, InMemoryVectorIndex, LlmChat, QueryEngine,
    Specialty, ALL_SPECIALTIES,
};

use crate::mocks::TokenHashEmbedder;

#[allow(clippy::too_many_arguments)]
fn facility(
    id: &str,
    name: &str,
    city: &str,
    region: &str,
    facility_type: FacilityType,
    specialties: &[Specialty],
    procedures: &[&str],
    equipment: &[&str],
    capacity: u32,
    doctors: u32,
    lat: f64,
    lng: f64,
) -> Facility {
    Facility {
        id: id.to_string(),
        name: name.to_string(),
        city: city.to_string(),
        region: region.to_string(),
        facility_type,
        organization_type: "government".to_string(),
        specialties: specialties.iter().copied().collect(),
        procedures: procedures.iter().map(|s| s.to_string()).collect(),
        equipment: equipment.iter().map(|s| s.to_string()).collect(),
        capabilities: vec!["outpatient care".to_string()],
        capacity,
        doctors,
        latitude: Some(lat),
        longitude: Some(lng),
    }
}

/// A deterministic, Ghana-shaped corpus:
///
/// - teaching/regional hospitals spread across the major cities, eight of
///   them offering cardiology (for tour planning)
/// - an Ashanti cluster with and without orthopedics (negation journeys)
/// - a Tamale-area pair within 30 km of the city (radius journeys)
/// - 30 filler clinics with mildly varied features (anomaly baseline)
/// - one synthetic suspect with inflated claims (anomaly target)
pub fn fixture_corpus() -> Arc<CorpusStore> {
    use FacilityType::{Clinic, HealthCenter, Hospital};
    use Specialty::*;

    let mut records = vec![
        facility(
            "gh-korle-bu",
            "Korle Bu Teaching Hospital",
            "Accra",
            "Greater Accra",
            Hospital,
            &[Cardiology, Neurosurgery, Oncology, GeneralSurgery, Emergency],
            &["open heart surgery", "cardiac catheterization", "craniotomy", "chemotherapy"],
            &["CT scanner", "MRI", "ICU", "operating theater", "cardiac catheterization lab", "laboratory"],
            600,
            120,
            5.5365,
            -0.2260,
        ),
        facility(
            "gh-ridge",
            "Greater Accra Regional Hospital",
            "Accra",
            "Greater Accra",
            Hospital,
            &[Obstetrics, Pediatrics, GeneralSurgery],
            &["caesarean section", "appendectomy"],
            &["ultrasound", "X-ray", "operating theater", "ICU"],
            420,
            80,
            5.5641,
            -0.1963,
        ),
        facility(
            "gh-komfo",
            "Komfo Anokye Teaching Hospital",
            "Kumasi",
            "Ashanti",
            Hospital,
            &[Cardiology, Orthopedics, Emergency, GeneralSurgery],
            &["joint replacement", "fracture repair", "bypass surgery"],
            &["CT scanner", "X-ray", "ICU", "operating theater", "ventilator"],
            500,
            95,
            6.6973,
            -1.6306,
        ),
        facility(
            "gh-kumasi-south",
            "Kumasi South Hospital",
            "Kumasi",
            "Ashanti",
            Hospital,
            &[Obstetrics, Pediatrics],
            &["antenatal care", "normal delivery"],
            &["ultrasound"],
            120,
            22,
            6.6618,
            -1.6012,
        ),
        facility(
            "gh-ejisu",
            "Ejisu Government Hospital",
            "Ejisu",
            "Ashanti",
            Hospital,
            &[GeneralSurgery],
            &["hernia repair"],
            &["X-ray", "operating theater"],
            90,
            14,
            6.7180,
            -1.4730,
        ),
        facility(
            "gh-tamale-teaching",
            "Tamale Teaching Hospital",
            "Tamale",
            "Northern",
            Hospital,
            &[Cardiology, Emergency, GeneralSurgery, Urology],
            &["dialysis", "emergency surgery"],
            &["CT scanner", "ICU", "operating theater", "dialysis machine"],
            400,
            70,
            9.4034,
            -0.8530,
        ),
        facility(
            "gh-savelugu",
            "Savelugu Municipal Hospital",
            "Savelugu",
            "Northern",
            HealthCenter,
            &[Obstetrics],
            &["antenatal care"],
            &["ultrasound"],
            60,
            8,
            9.6240,
            -0.8250,
        ),
        facility(
            "gh-ho",
            "Ho Teaching Hospital",
            "Ho",
            "Volta",
            Hospital,
            &[Cardiology, Dermatology, GeneralSurgery],
            &["skin grafting"],
            &["CT scanner", "ICU", "operating theater"],
            300,
            55,
            6.6119,
            0.4713,
        ),
        facility(
            "gh-takoradi",
            "Effia Nkwanta Regional Hospital",
            "Takoradi",
            "Western",
            Hospital,
            &[Cardiology, Obstetrics, Emergency],
            &["caesarean section"],
            &["X-ray", "ICU", "ultrasound"],
            280,
            48,
            4.9046,
            -1.7600,
        ),
        facility(
            "gh-bolga",
            "Upper East Regional Hospital",
            "Bolgatanga",
            "Upper East",
            Hospital,
            &[Cardiology, Pediatrics],
            &["pediatric care"],
            &["X-ray", "ultrasound"],
            180,
            25,
            10.7856,
            -0.8514,
        ),
        facility(
            "gh-cape-coast",
            "Cape Coast Teaching Hospital",
            "Cape Coast",
            "Central",
            Hospital,
            &[Cardiology, Ophthalmology, GeneralSurgery],
            &["cataract surgery"],
            &["ophthalmoscope", "surgical microscope", "operating theater", "ICU"],
            330,
            60,
            5.1315,
            -1.2795,
        ),
        facility(
            "gh-sunyani",
            "Sunyani Regional Hospital",
            "Sunyani",
            "Bono",
            Hospital,
            &[Cardiology, Psychiatry],
            &["mental health services"],
            &["X-ray", "ICU"],
            210,
            35,
            7.3349,
            -2.3123,
        ),
        facility(
            "gh-wa",
            "Wa Regional Hospital",
            "Wa",
            "Upper West",
            Hospital,
            &[Obstetrics, GeneralSurgery],
            &["caesarean section"],
            &["ultrasound", "operating theater"],
            150,
            20,
            10.0601,
            -2.5099,
        ),
        // dialysis exists at exactly one site beyond Tamale, keeping a
        // single-point-of-failure story in the data
        facility(
            "gh-dialysis-accra",
            "Accra Renal Unit",
            "Accra",
            "Greater Accra",
            Clinic,
            &[Dialysis],
            &["dialysis", "renal replacement therapy"],
            &["dialysis machine", "laboratory"],
            40,
            6,
            5.5900,
            -0.2100,
        ),
    ];

    // filler clinics: mildly varied feature columns, no two collinear
    let cities = [
        ("Accra", "Greater Accra", 5.60, -0.19),
        ("Kumasi", "Ashanti", 6.69, -1.62),
        ("Tema", "Greater Accra", 5.67, -0.02),
        ("Koforidua", "Eastern", 6.09, -0.26),
        ("Winneba", "Central", 5.35, -0.62),
        ("Hohoe", "Volta", 7.15, 0.47),
    ];
    for i in 0..30_usize {
        let (city, region, lat, lng) = cities[i % cities.len()];
        let specialties: Vec<Specialty> = if i % 3 == 0 {
            vec![Specialty::Pediatrics]
        } else if i % 3 == 1 {
            vec![Specialty::Obstetrics, Specialty::Pediatrics]
        } else {
            vec![]
        };
        let procedures: Vec<String> =
            (0..1 + (i % 4)).map(|p| format!("routine procedure {p}")).collect();
        let equipment: Vec<String> =
            (0..1 + ((i / 2) % 3)).map(|e| format!("basic equipment {e}")).collect();
        let capabilities: Vec<String> =
            (0..1 + ((i / 4) % 2)).map(|c| format!("community service {c}")).collect();
        let mut f = facility(
            &format!("gh-clinic-{i:02}"),
            &format!("Community Clinic {i:02}"),
            city,
            region,
            FacilityType::Clinic,
            &specialties,
            &[],
            &[],
            8 + (i as u32 % 5) * 4,
            1 + (i as u32 % 3),
            lat + (i as f64 * 0.013) % 0.09,
            lng + (i as f64 * 0.017) % 0.09,
        );
        f.procedures = procedures;
        f.equipment = equipment;
        f.capabilities = capabilities;
        records.push(f);
    }

    // the synthetic suspect from the anomaly scenario: sweeping claims,
    // no equipment, five beds, one doctor
    let mut suspect = facility(
        "gh-suspect",
        "Wonder Medical Centre",
        "Tema",
        "Greater Accra",
        FacilityType::Clinic,
        &ALL_SPECIALTIES[..10],
        &[],
        &[],
        5,
        1,
        5.6700,
        -0.0300,
    );
    suspect.procedures = (0..20).map(|i| format!("advanced procedure {i}")).collect();
    suspect.equipment = vec![];
    suspect.capabilities = vec!["all kinds of surgery and more".to_string()];
    records.push(suspect);

    Arc::new(CorpusStore::from_records(records).expect("fixture corpus is valid"))
}

/// Engine over the fixture corpus with the token-hash embedder, the
/// in-memory vector index, and no LLM
pub async fn engine() -> QueryEngine {
    engine_with_llm(None).await
}

/// Same, with an LLM stub plugged in
pub async fn engine_with_llm(llm: Option<Arc<dyn LlmChat>>) -> QueryEngine {
    QueryEngine::bootstrap(
        fixture_corpus(),
        Some(Arc::new(TokenHashEmbedder::new())),
        Arc::new(InMemoryVectorIndex::new()),
        llm,
        EngineConfig::default(),
    )
    .await
    .expect("engine bootstraps")
}
