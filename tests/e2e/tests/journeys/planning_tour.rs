//! Planning journeys: 2-opt tours and emergency routing

use medatlas_core::{AgentResult, Intent};
use medatlas_e2e_tests::harness;

#[tokio::test]
async fn specialist_tour_improves_on_greedy() {
    let engine = harness::engine().await;
    let response = engine.run("Deploy a cardiology specialist across Ghana").await.unwrap();

    assert_eq!(response.intent, Intent::Planning);
    assert_eq!(response.agents_used, vec!["planner"]);

    let AgentResult::SpecialistTour { stops, total_distance_km, greedy_distance_km, specialty, .. } =
        &response.agent_results["planner"]
    else {
        panic!("planner did not build a tour");
    };

    assert_eq!(specialty, "cardiology");
    assert!(!stops.is_empty());
    assert!(stops.len() <= 8);
    // 2-opt never loses to its greedy initialization
    assert!(*total_distance_km <= greedy_distance_km + 1e-9);
    // the tour departs from Accra; the first stop is the capital's
    // cardiology center
    assert_eq!(stops[0].facility.region, "Greater Accra");
    // every stop actually offers the specialty
    for stop in stops {
        assert!(stop.facility.specialties.contains(&"cardiology".to_string()));
    }
}

#[tokio::test]
async fn emergency_routing_prefers_capability_then_distance() {
    let engine = harness::engine().await;
    let response = engine
        .run("Route an emergency cardiology patient near Accra")
        .await
        .unwrap();

    assert_eq!(response.agents_used, vec!["planner"]);
    let AgentResult::EmergencyRoute { primary_facility, backup_facility, alternatives, .. } =
        &response.agent_results["planner"]
    else {
        panic!("planner did not route");
    };

    let primary = primary_facility.as_ref().expect("a primary facility exists");
    let backup = backup_facility.as_ref().expect("a backup facility exists");

    // capability-first ordering
    assert!(primary.capability_score >= backup.capability_score);
    for alt in alternatives {
        assert!(backup.capability_score >= alt.capability_score || backup.distance_km <= alt.distance_km);
    }
    // travel estimate at 60 km/h means minutes == kilometres
    assert!((primary.travel_minutes - primary.distance_km).abs() < 1e-9);
    // Korle Bu has the specialty, ICU, imaging, beds, and doctors
    assert_eq!(primary.facility.id, "gh-korle-bu");
}

#[tokio::test]
async fn capacity_planning_grades_every_region_present() {
    let corpus = harness::fixture_corpus();
    let engine = harness::engine().await;
    let response = engine.run("Capacity planning for the regions").await.unwrap();

    assert_eq!(response.intent, Intent::Planning);
    let AgentResult::CapacityPlanning { regions, .. } = &response.agent_results["planner"] else {
        panic!("planner did not plan capacity");
    };
    assert_eq!(regions.len(), corpus.regions().len());
    for region in regions {
        assert!(["critical", "warning", "adequate"].contains(&region.status.as_str()));
    }
}
