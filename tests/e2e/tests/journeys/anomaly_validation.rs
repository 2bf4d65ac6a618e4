//! Anomaly and validation journeys: two-stage gating and constraint checks

use medatlas_core::{AgentResult, Intent};
use medatlas_e2e_tests::harness;

#[tokio::test]
async fn two_stage_anomaly_flags_the_synthetic_suspect() {
    let engine = harness::engine().await;
    let response = engine.run("Find suspicious facility capability claims").await.unwrap();

    assert_eq!(response.intent, Intent::AnomalyDetection);
    assert_eq!(response.agents_used, vec!["analyst", "validator"]);

    let AgentResult::AnomalyScan {
        flagged,
        isolation_outliers,
        mahalanobis_outliers,
        mahalanobis_skipped,
        ..
    } = &response.agent_results["validator"]
    else {
        panic!("validator did not scan");
    };

    // both stages ran; the intersection can never exceed either stage
    assert!(!mahalanobis_skipped);
    assert!(flagged.len() <= *isolation_outliers);
    assert!(flagged.len() <= *mahalanobis_outliers);

    let suspect = flagged
        .iter()
        .find(|f| f.facility.id == "gh-suspect")
        .expect("the synthetic suspect is flagged");
    assert!(suspect.reasons.contains(&"procedures > 15 && capacity < 20".to_string()));
    assert!(suspect.reasons.contains(&"procedures > 10 && equipment < 2".to_string()));
    assert!(suspect.reasons.contains(&"specialties > 8".to_string()));

    // the analyst ran its ratio pass first and both results are present
    assert!(matches!(
        response.agent_results["analyst"],
        AgentResult::RatioAnomalies { .. }
    ));
}

#[tokio::test]
async fn validation_reports_missing_requirements() {
    let engine = harness::engine().await;
    let response = engine
        .run("Verify that these facilities can really perform neurosurgery")
        .await
        .unwrap();

    assert_eq!(response.intent, Intent::Validation);
    assert_eq!(response.agents_used, vec!["searcher", "validator"]);

    let AgentResult::Validation { validated, .. } = &response.agent_results["validator"] else {
        panic!("validator did not validate");
    };
    assert!(!validated.is_empty());

    for report in validated {
        assert!((0.10..=0.95).contains(&report.confidence));
    }

    // the suspect claims everything with no equipment: if it was among the
    // validated set it must carry issues and a red flag
    if let Some(report) = validated.iter().find(|v| v.facility.id == "gh-suspect") {
        assert!(!report.issues.is_empty());
        assert!(report.red_flags.iter().any(|r| r.category == "vague_claim"));
    }
}

#[tokio::test]
async fn single_point_of_failure_reports_rare_specialties() {
    let engine = harness::engine().await;
    let response = engine
        .run("Which specialties depend on only one facility?")
        .await
        .unwrap();

    assert_eq!(response.intent, Intent::SinglePointFailure);
    assert_eq!(response.agents_used, vec!["analyst", "validator"]);

    let AgentResult::SinglePointOfFailure { results, rare_specialties, .. } =
        &response.agent_results["validator"]
    else {
        panic!("validator did not rank rare specialties");
    };
    for entry in results {
        assert!(entry.facility_count <= 3);
        assert_eq!(rare_specialties[&entry.specialty], entry.facility_count);
    }
}
