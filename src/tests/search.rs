use std::time::{Duration, Instant};

use crate::{
    prelude::*,
    tests::fixtures::{ecef_samples, leo_store, satellite_from_samples, OrbitSpec, T0_UNIX_S},
};

const SITE: (f64, f64) = (45.0, -75.0);

fn poi_of_days(days: u32) -> PeriodOfInterest {
    PeriodOfInterest {
        start_time: "20180101T00:00:00.0".to_string(),
        end_time: format!("201801{:02}T00:00:00.0", 1 + days),
    }
}

fn query(platform_ids: Option<Vec<u64>>, days: u32) -> SearchQuery {
    SearchQuery {
        target: SITE,
        poi: poi_of_days(days),
        platform_ids,
    }
}

#[test]
fn rejects_malformed_poi() {
    let (store, platform_id) = leo_store(&OrbitSpec::polar_leo(), 7200.0, 60.0);
    let cache = ResponseCache::new();
    let config = SearchConfig::default();

    let mut bad = query(Some(vec![platform_id]), 1);
    bad.poi.start_time = "not-a-time".to_string();
    assert!(matches!(
        search(&store, &cache, &bad, &config, None),
        Err(Error::Input(InputError::MalformedTimestamp(_))),
    ));

    let mut reversed = query(Some(vec![platform_id]), 1);
    reversed.poi.start_time = "20180105T00:00:00.0".to_string();
    reversed.poi.end_time = "20180101T00:00:00.0".to_string();
    assert!(matches!(
        search(&store, &cache, &reversed, &config, None),
        Err(Error::Input(InputError::PoiOrder { .. })),
    ));

    assert!(cache.is_empty(), "failed requests must not be cached");
}

#[test]
fn rejects_unknown_platform() {
    let (store, _) = leo_store(&OrbitSpec::polar_leo(), 7200.0, 60.0);
    let cache = ResponseCache::new();
    let config = SearchConfig::default();

    assert!(matches!(
        search(&store, &cache, &query(Some(vec![42]), 1), &config, None),
        Err(Error::Input(InputError::UnknownPlatform(42))),
    ));
}

#[test]
fn two_day_search_is_well_formed() {
    let days = 2;
    let duration_s = days as f64 * 86400.0;
    let (store, platform_id) = leo_store(&OrbitSpec::polar_leo(), duration_s + 120.0, 60.0);
    let cache = ResponseCache::new();
    let config = SearchConfig::default();

    let request = query(Some(vec![platform_id]), days);
    let poi = request.poi.resolve().unwrap();
    let response = search(&store, &cache, &request, &config, None).unwrap();

    assert!(!response.opportunities.is_empty(), "no passes over two days");

    for window in &response.opportunities {
        assert_eq!(window.platform_id, platform_id);
        assert!(window.start_time >= poi.start_s);
        assert!(window.end_time <= poi.end_s);
        assert!(window.start_time < window.end_time);
    }

    for pair in response.opportunities.windows(2) {
        assert!(
            pair[0].end_time < pair[1].start_time,
            "windows must be sorted and disjoint",
        );
    }

    // response caching round-trip
    let cached = cache.get(response.id).expect("response was not cached");
    let opportunities: Vec<Opportunity> = serde_json::from_str(&cached).unwrap();
    assert_eq!(opportunities, response.opportunities);

    assert!(cache.get(response.id + 1).is_none());
}

#[test]
fn defaults_to_all_platforms_in_id_order() {
    let duration_s = 86400.0 + 120.0;
    let mut store = EphemerisStore::new();

    let east = OrbitSpec::polar_leo();
    let west = OrbitSpec {
        raan_deg: 110.0,
        ..east
    };

    let first = store.insert(satellite_from_samples(
        "east",
        ecef_samples(&east, T0_UNIX_S, duration_s, 60.0),
    ));
    let second = store.insert(satellite_from_samples(
        "west",
        ecef_samples(&west, T0_UNIX_S, duration_s, 60.0),
    ));
    assert!(first < second);

    let cache = ResponseCache::new();
    let config = SearchConfig::default();
    let response = search(&store, &cache, &query(None, 1), &config, None).unwrap();

    let ids: Vec<u64> = response
        .opportunities
        .iter()
        .map(|opportunity| opportunity.platform_id)
        .collect();

    assert!(ids.contains(&first) && ids.contains(&second));

    // stable output: ascending platform id, ascending start time within
    let mut expected = ids.clone();
    expected.sort_unstable();
    assert_eq!(ids, expected);
}

#[test]
fn search_matches_manual_pipeline() {
    // the orchestrator must agree with a by-hand single-interval run;
    // a tightened error target keeps both runs close to the true
    // crossings despite their different step phasing
    let (store, platform_id) = leo_store(&OrbitSpec::polar_leo(), 86400.0 + 120.0, 60.0);
    let cache = ResponseCache::new();
    let config = SearchConfig {
        error_bound: 0.01,
        ..SearchConfig::default()
    };

    let request = query(Some(vec![platform_id]), 1);
    let poi = request.poi.resolve().unwrap();
    let response = search(&store, &cache, &request, &config, None).unwrap();

    let finder =
        VisibilityFinder::new(&store, platform_id, SITE, poi, &config, None).unwrap();
    let reference = finder.determine_visibility().unwrap();

    // the cone changes the step phasing, so the two runs only agree to
    // the configured interpolation error margin
    assert_eq!(response.opportunities.len(), reference.len());
    for (opportunity, window) in response.opportunities.iter().zip(&reference) {
        assert!(
            (opportunity.start_time - window.start_s).abs() < 60.0,
            "start {} vs reference {}",
            opportunity.start_time,
            window.start_s,
        );
        assert!((opportunity.end_time - window.end_s).abs() < 60.0);
    }
}

#[test]
fn area_search_is_the_vertex_intersection() {
    let (store, platform_id) = leo_store(&OrbitSpec::polar_leo(), 86400.0 + 120.0, 60.0);
    let cache = ResponseCache::new();
    let config = SearchConfig::default();

    let vertices = vec![(45.0, -75.0), (45.4, -74.6), (44.6, -74.8)];

    let area_request = AreaSearchQuery {
        target_area: vertices.clone(),
        poi: poi_of_days(1),
        platform_ids: Some(vec![platform_id]),
    };
    let response = search_area(&store, &cache, &area_request, &config, None).unwrap();

    // cross-check against the N-way intersection of point searches
    let per_vertex: Vec<Vec<TimeInterval>> = vertices
        .iter()
        .map(|&vertex| {
            let request = SearchQuery {
                target: vertex,
                poi: poi_of_days(1),
                platform_ids: Some(vec![platform_id]),
            };
            search(&store, &cache, &request, &config, None)
                .unwrap()
                .opportunities
                .into_iter()
                .map(|opportunity| {
                    TimeInterval::new(opportunity.start_time, opportunity.end_time)
                })
                .collect()
        })
        .collect();

    let expected = common_intervals(&per_vertex);

    assert_eq!(response.opportunities.len(), expected.len());
    for (opportunity, window) in response.opportunities.iter().zip(&expected) {
        assert!((opportunity.start_time - window.start_s).abs() < 1e-6);
        assert!((opportunity.end_time - window.end_s).abs() < 1e-6);
    }

    // every area window is visible from every vertex
    for windows in &per_vertex {
        for opportunity in &response.opportunities {
            assert!(windows.iter().any(|window| {
                window.start_s <= opportunity.start_time && opportunity.end_time <= window.end_s
            }));
        }
    }
}

#[test]
fn rejects_degenerate_polygons() {
    let (store, platform_id) = leo_store(&OrbitSpec::polar_leo(), 7200.0, 60.0);
    let cache = ResponseCache::new();
    let config = SearchConfig::default();

    let request = AreaSearchQuery {
        target_area: vec![(45.0, -75.0), (46.0, -75.0)],
        poi: poi_of_days(1),
        platform_ids: Some(vec![platform_id]),
    };

    assert!(matches!(
        search_area(&store, &cache, &request, &config, None),
        Err(Error::Input(InputError::PolygonTooSmall(2))),
    ));
}

#[test]
fn cancelled_requests_are_not_cached() {
    let (store, platform_id) = leo_store(&OrbitSpec::polar_leo(), 86400.0 + 120.0, 60.0);
    let cache = ResponseCache::new();
    let config = SearchConfig::default();

    let expired = Instant::now() - Duration::from_secs(1);
    let result = search(
        &store,
        &cache,
        &query(Some(vec![platform_id]), 1),
        &config,
        Some(expired),
    );

    assert!(matches!(
        result,
        Err(Error::Visibility(VisibilityError::Cancelled)),
    ));
    assert!(cache.is_empty());
}

#[test]
fn uncovered_poi_is_an_error() {
    // ephemeris covers one day, the request asks for the next week
    let (store, platform_id) = leo_store(&OrbitSpec::polar_leo(), 7200.0, 60.0);
    let cache = ResponseCache::new();
    let config = SearchConfig::default();

    let request = SearchQuery {
        target: SITE,
        poi: PeriodOfInterest {
            start_time: "20180105T00:00:00.0".to_string(),
            end_time: "20180107T00:00:00.0".to_string(),
        },
        platform_ids: Some(vec![platform_id]),
    };

    assert!(matches!(
        search(&store, &cache, &request, &config, None),
        Err(Error::Interpolation(InterpolationError::NoSegment { .. })),
    ));
    assert!(cache.is_empty());
}
