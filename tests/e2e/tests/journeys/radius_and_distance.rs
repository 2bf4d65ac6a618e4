//! Geospatial journeys: radius bounds, city distance, graceful geocode miss

use medatlas_core::{haversine_km, AgentResult, Intent};
use medatlas_e2e_tests::harness;

/// Tamale city center, from the gazetteer
const TAMALE: (f64, f64) = (9.4008, -0.8393);

#[tokio::test]
async fn radius_query_respects_the_bound() {
    let engine = harness::engine().await;
    let response = engine.run("Hospitals within 30 km of Tamale").await.unwrap();

    assert_eq!(response.intent, Intent::DistanceQuery);
    assert_eq!(response.agents_used, vec!["geo"]);

    let AgentResult::RadiusSearch { facilities, radius_km, center_lat, center_lng, count, .. } =
        &response.agent_results["geo"]
    else {
        panic!("geo did not run a radius search");
    };
    assert_eq!(*radius_km, 30.0);
    assert!((center_lat - TAMALE.0).abs() < 1e-6);
    assert!((center_lng - TAMALE.1).abs() < 1e-6);
    assert!(*count > 0);

    for hit in facilities {
        // recompute independently of the agent's arithmetic
        let lat = hit.facility.latitude.unwrap();
        let lng = hit.facility.longitude.unwrap();
        assert!(haversine_km(TAMALE, (lat, lng)) <= 30.0 + 1e-6);
        assert!(hit.distance_km <= 30.0 + 1e-6);
    }

    // results are map-ready
    assert!(response.map_facilities.iter().any(|f| f.id == "gh-tamale-teaching"));
}

#[tokio::test]
async fn city_distance_between_two_known_cities() {
    let engine = harness::engine().await;
    let response = engine.run("How far is Kumasi from Accra?").await.unwrap();

    assert_eq!(response.agents_used, vec!["geo"]);
    let AgentResult::CityDistance { from, to, distance_km, .. } = &response.agent_results["geo"]
    else {
        panic!("geo did not compute a city distance");
    };
    assert_eq!(from, "kumasi");
    assert_eq!(to, "accra");
    assert!((*distance_km - 200.0).abs() < 20.0, "got {distance_km}");
}

#[tokio::test]
async fn unknown_location_surfaces_in_band() {
    let engine = harness::engine().await;
    let response = engine.run("Hospitals within 25 km of Shangri-La").await.unwrap();

    let AgentResult::Failed { error, .. } = &response.agent_results["geo"] else {
        panic!("expected a graceful failure");
    };
    assert_eq!(error, "unknown_location");
    // a graceful in-band failure is not a partial response
    assert!(!response.partial);
}
