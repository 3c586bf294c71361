use std::time::{Duration, Instant};

use crate::{
    prelude::*,
    tests::fixtures::{leo_store, OrbitSpec, T0_UNIX_S},
};

const SITE: (f64, f64) = (45.0, -75.0);

fn finder_over<'a>(
    store: &'a EphemerisStore,
    platform_id: u64,
    poi: TimeInterval,
    config: &SearchConfig,
) -> VisibilityFinder<'a> {
    VisibilityFinder::new(store, platform_id, SITE, poi, config, None).unwrap()
}

#[test]
fn precision_context() {
    assert!(Precision::default().bits() >= 333);
    assert!(Precision::from_decimal_digits(20).bits() >= 67);
    assert!(Precision::from_decimal_digits(20).bits() < Precision::default().bits());
}

#[test]
fn visibility_sign_tracks_elevation() {
    let spec = OrbitSpec::polar_leo();
    let poi = TimeInterval::new(T0_UNIX_S, T0_UNIX_S + 86400.0);
    let (store, platform_id) = leo_store(&spec, poi.duration_s() + 120.0, 60.0);
    let config = SearchConfig::default();
    let finder = finder_over(&store, platform_id, poi, &config);

    // over a full day a polar LEO both rises over and hides from a
    // mid-latitude site
    let mut above = 0_usize;
    let mut below = 0_usize;

    let mut time_s = poi.start_s;
    while time_s <= poi.end_s {
        if finder.visibility(time_s).unwrap() > 0.0 {
            above += 1;
        } else {
            below += 1;
        }
        time_s += 60.0;
    }

    assert!(above > 0, "no epoch above the horizon");
    assert!(below > above, "a LEO is below the horizon most of the time");
}

#[test]
fn derivative_matches_finite_differences() {
    let spec = OrbitSpec::polar_leo();
    let poi = TimeInterval::new(T0_UNIX_S, T0_UNIX_S + 3600.0);
    // dense ephemeris: the analytic derivative reads interpolated
    // velocity, the finite difference differentiates interpolated
    // position, and they only meet up to the sampling error
    let (store, platform_id) = leo_store(&spec, poi.duration_s() + 120.0, 10.0);
    let config = SearchConfig::default();
    let finder = finder_over(&store, platform_id, poi, &config);

    let delta_s = 0.25;
    for k in 1..=5 {
        // offsets chosen away from the sample epochs, so the finite
        // difference never straddles an interpolation window shift
        let t = poi.start_s + 601.3 * k as f64;

        let analytic = finder.visibility_first_derivative(t).unwrap().to_f64();
        let numeric = (finder.visibility(t + delta_s).unwrap().to_f64()
            - finder.visibility(t - delta_s).unwrap().to_f64())
            / (2.0 * delta_s);

        assert!(
            (analytic - numeric).abs() < 1e-6,
            "V'({t}) = {analytic}, finite difference {numeric}",
        );
    }
}

/// The reference check for the adaptive search: every window the finder
/// reports must match a sign change of a brute-force scan, and no sign
/// change may go unreported.
#[test]
fn windows_agree_with_brute_force_scan() {
    let spec = OrbitSpec::polar_leo();
    let poi = TimeInterval::new(T0_UNIX_S, T0_UNIX_S + 86400.0);
    let (store, platform_id) = leo_store(&spec, poi.duration_s() + 120.0, 60.0);

    // a tightened error target keeps every boundary well inside the
    // comparison margin, shallow grazing passes included
    let config = SearchConfig {
        error_bound: 0.01,
        ..SearchConfig::default()
    };
    let finder = finder_over(&store, platform_id, poi, &config);

    let windows = finder.determine_visibility().unwrap();
    assert!(!windows.is_empty(), "a full day must contain passes");

    // brute-force crossing scan at 10 s resolution
    let grid_s = 10.0;
    let mut crossings = Vec::new();
    let mut previous = finder.visibility(poi.start_s).unwrap().to_f64();
    let mut time_s = poi.start_s + grid_s;
    while time_s <= poi.end_s {
        let current = finder.visibility(time_s).unwrap().to_f64();
        if (previous <= 0.0) != (current <= 0.0) {
            crossings.push(time_s);
        }
        previous = current;
        time_s += grid_s;
    }

    let boundaries: Vec<f64> = windows
        .iter()
        .flat_map(|window| [window.start_s, window.end_s])
        .filter(|&t| t > poi.start_s && t < poi.end_s)
        .collect();

    assert_eq!(
        boundaries.len(),
        crossings.len(),
        "windows {windows:?} vs scan crossings {crossings:?}",
    );

    // the Hermite fit is bounded by the configured error target, not by
    // machine precision: allow the reference 60 s agreement margin
    for (boundary, crossing) in boundaries.iter().zip(&crossings) {
        assert!(
            (boundary - crossing).abs() <= 60.0,
            "boundary {boundary} far from scanned crossing {crossing}",
        );
    }

    // well-formedness and sign agreement
    for window in &windows {
        assert!(window.start_s >= poi.start_s && window.end_s <= poi.end_s);
        assert!(window.start_s < window.end_s);
        assert!(
            finder.visibility(window.midpoint_s()).unwrap() > 0.0,
            "window midpoint below horizon",
        );
    }

    for pair in windows.windows(2) {
        assert!(pair[0].end_s < pair[1].start_s);
    }
}

#[test]
fn lower_precision_finds_the_same_passes() {
    let spec = OrbitSpec::polar_leo();
    let poi = TimeInterval::new(T0_UNIX_S, T0_UNIX_S + 4.0 * 3600.0);
    let (store, platform_id) = leo_store(&spec, poi.duration_s() + 120.0, 60.0);

    let reference = finder_over(&store, platform_id, poi, &SearchConfig::default())
        .determine_visibility()
        .unwrap();

    let config = SearchConfig {
        precision_digits: 50,
        ..SearchConfig::default()
    };
    let windows = finder_over(&store, platform_id, poi, &config)
        .determine_visibility()
        .unwrap();

    assert_eq!(reference.len(), windows.len());
    for (a, b) in reference.iter().zip(&windows) {
        assert!((a.start_s - b.start_s).abs() < 1.0);
        assert!((a.end_s - b.end_s).abs() < 1.0);
    }
}

#[test]
fn cancellation_between_steps() {
    let spec = OrbitSpec::polar_leo();
    let poi = TimeInterval::new(T0_UNIX_S, T0_UNIX_S + 3600.0);
    let (store, platform_id) = leo_store(&spec, poi.duration_s() + 120.0, 60.0);
    let config = SearchConfig::default();

    let expired = Instant::now() - Duration::from_secs(1);
    let finder =
        VisibilityFinder::new(&store, platform_id, SITE, poi, &config, Some(expired)).unwrap();

    assert!(matches!(
        finder.determine_visibility(),
        Err(Error::Visibility(VisibilityError::Cancelled)),
    ));
}
