//! Facility Index Builder
//!
//! Embeds the three per-facility text templates and upserts them as named
//! vectors with the indexed payload fields. Runs once at startup and on
//! corpus reload; the index is a derived view of the corpus.

use std::collections::HashMap;

use crate::corpus::{CorpusStore, Facility};
use crate::embeddings::{Embedder, EmbeddingError};

use super::{
    NamedVector, VectorIndex, VectorIndexError, VectorPoint, FIELD_CITY, FIELD_FACILITY_TYPE,
    FIELD_ORGANIZATION, FIELD_REGION,
};

/// Collection holding facility points
pub const FACILITY_COLLECTION: &str = "facilities";

/// Index build error
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum IndexBuildError {
    /// Embedding failure
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Index failure
    #[error(transparent)]
    Index(#[from] VectorIndexError),
}

fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

/// The three index-time text templates for one facility, in
/// `full_document`, `clinical_detail`, `specialties_context` order
pub fn facility_templates(facility: &Facility) -> [String; 3] {
    let specialties = facility
        .specialties
        .iter()
        .map(|s| s.as_str().to_string())
        .collect::<Vec<_>>();

    let full_document = format!(
        "{name}. {ftype} in {city}, {region} Region. Specialties: {specialties}. \
         Procedures: {procedures}. Equipment: {equipment}. Capabilities: {capabilities}. \
         Beds: {beds}. Doctors: {doctors}.",
        name = facility.name,
        ftype = facility.facility_type,
        city = facility.city,
        region = facility.region,
        specialties = join_or(&specialties, "none"),
        procedures = join_or(&facility.procedures, "none"),
        equipment = join_or(&facility.equipment, "none"),
        capabilities = join_or(&facility.capabilities, "none"),
        beds = facility.capacity,
        doctors = facility.doctors,
    );

    let clinical_detail = format!(
        "Procedures: {} | Equipment: {}",
        join_or(&facility.procedures, "none"),
        join_or(&facility.equipment, "none"),
    );

    let specialties_context =
        format!("facility with specialties: {}", join_or(&specialties, "none"));

    [full_document, clinical_detail, specialties_context]
}

fn facility_payload(facility: &Facility) -> HashMap<String, String> {
    [
        (FIELD_CITY.to_string(), facility.city.clone()),
        (FIELD_REGION.to_string(), facility.region.clone()),
        (FIELD_FACILITY_TYPE.to_string(), facility.facility_type.as_str().to_string()),
        (FIELD_ORGANIZATION.to_string(), facility.organization_type.clone()),
    ]
    .into()
}

/// Embed every facility's templates and upsert them into the index.
/// Returns the number of points written.
pub async fn build_facility_index(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    corpus: &CorpusStore,
) -> Result<usize, IndexBuildError> {
    let facilities: Vec<&Facility> = corpus.all().collect();

    // One batch per template column keeps the embedder's batching effective
    let mut columns: [Vec<String>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for facility in &facilities {
        let [full, clinical, specialties] = facility_templates(facility);
        columns[0].push(full);
        columns[1].push(clinical);
        columns[2].push(specialties);
    }

    let full = embedder.embed_batch(&columns[0]).await?;
    let clinical = embedder.embed_batch(&columns[1]).await?;
    let specialties = embedder.embed_batch(&columns[2]).await?;

    let points: Vec<VectorPoint> = facilities
        .iter()
        .zip(full)
        .zip(clinical)
        .zip(specialties)
        .map(|(((facility, full), clinical), specialties)| VectorPoint {
            id: facility.id.clone(),
            vectors: [
                (NamedVector::FullDocument, full),
                (NamedVector::ClinicalDetail, clinical),
                (NamedVector::SpecialtiesContext, specialties),
            ]
            .into(),
            payload: facility_payload(facility),
        })
        .collect();

    let count = points.len();
    index.upsert(FACILITY_COLLECTION, points).await?;
    tracing::info!(count, "facility vector index built");
    Ok(count)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{FacilityType, Specialty};

    fn facility() -> Facility {
        Facility {
            id: "gh-001".to_string(),
            name: "Ridge Hospital".to_string(),
            city: "Accra".to_string(),
            region: "Greater Accra".to_string(),
            facility_type: FacilityType::Hospital,
            organization_type: "government".to_string(),
            specialties: [Specialty::Cardiology].into(),
            procedures: vec!["angioplasty".to_string()],
            equipment: vec!["CT scanner".to_string()],
            capabilities: vec![],
            capacity: 420,
            doctors: 60,
            latitude: Some(5.5641),
            longitude: Some(-0.1963),
        }
    }

    #[test]
    fn test_templates_shapes() {
        let [full, clinical, specialties] = facility_templates(&facility());
        assert!(full.starts_with("Ridge Hospital. hospital in Accra, Greater Accra Region."));
        assert_eq!(clinical, "Procedures: angioplasty | Equipment: CT scanner");
        assert_eq!(specialties, "facility with specialties: cardiology");
    }

    #[test]
    fn test_payload_fields() {
        let payload = facility_payload(&facility());
        assert_eq!(payload[FIELD_CITY], "Accra");
        assert_eq!(payload[FIELD_REGION], "Greater Accra");
        assert_eq!(payload[FIELD_FACILITY_TYPE], "hospital");
        assert_eq!(payload[FIELD_ORGANIZATION], "government");
    }
}
