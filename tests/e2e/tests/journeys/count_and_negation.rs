//! Count journeys: filtered counting and negation-aware filtering

use medatlas_core::{AgentResult, FacilityType, Intent, Specialty};
use medatlas_e2e_tests::harness;

#[tokio::test]
async fn count_hospitals_offering_cardiology() {
    let corpus = harness::fixture_corpus();
    let engine = harness::engine().await;

    let response = engine.run("How many hospitals offer cardiology?").await.unwrap();

    assert_eq!(response.intent, Intent::Count);
    assert_eq!(response.agents_used, vec!["analyst"]);
    assert!(response.confidence >= 0.55, "confidence {}", response.confidence);

    let expected = corpus
        .filter(|f| {
            f.facility_type == FacilityType::Hospital && f.has_specialty(Specialty::Cardiology)
        })
        .len();
    let AgentResult::CountFacilities { count, .. } = &response.agent_results["analyst"] else {
        panic!("analyst did not count");
    };
    assert_eq!(*count, expected);
    assert!(expected > 0);
}

#[tokio::test]
async fn negated_specialty_inverts_the_mask() {
    let corpus = harness::fixture_corpus();
    let engine = harness::engine().await;

    let response = engine
        .run("Facilities in Ashanti without orthopedic services")
        .await
        .unwrap();

    assert_eq!(response.intent, Intent::Count);
    let AgentResult::CountFacilities { count, facilities, filters_applied, .. } =
        &response.agent_results["analyst"]
    else {
        panic!("analyst did not count");
    };

    let expected = corpus
        .filter(|f| {
            f.region.eq_ignore_ascii_case("Ashanti") && !f.has_specialty(Specialty::Orthopedics)
        })
        .len();
    assert_eq!(*count, expected);
    assert!(filters_applied.iter().any(|f| f.contains("specialty!=orthopedics")));

    // every returned facility is in Ashanti and lacks orthopedics
    for summary in facilities {
        assert_eq!(summary.region, "Ashanti");
        let stored = corpus.get(&summary.id).unwrap();
        assert!(!stored.has_specialty(Specialty::Orthopedics));
    }
}

#[tokio::test]
async fn region_aggregation_names_the_top_region() {
    let engine = harness::engine().await;
    let response = engine.run("Which region has the most facilities?").await.unwrap();

    assert_eq!(response.intent, Intent::Aggregate);
    let AgentResult::RegionAggregation { top_region, top_count, aggregation, .. } =
        &response.agent_results["analyst"]
    else {
        panic!("analyst did not aggregate");
    };
    let top = top_region.as_ref().expect("a top region exists");
    assert_eq!(aggregation[top], *top_count);
    assert!(aggregation.values().all(|&c| c <= *top_count));
}
