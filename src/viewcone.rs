//! Viewing cone reduction: closed-form exclusion of the sub-periods of
//! a day during which visibility is geometrically impossible.
//!
//! The satellite's geocentric distance is bounded by `q_max`, so from a
//! given site the satellite can only clear the horizon while the site
//! sits within a band around the orbit plane. The band crossings of the
//! rotating site have closed-form solutions; everything outside the
//! crossings is excluded before the expensive root finding runs.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use log::debug;

use crate::{
    constants::{
        EARTH_ANGULAR_VELOCITY_RAD_S, EARTH_A_AXIS_M, EARTH_B_AXIS_M, SIDEREAL_DAY_S,
        THETA_NAUGHT_RAD,
    },
    coords::{geocentric_eci_lon_deg, geodetic_to_geocentric_lat},
    errors::ViewConeError,
    interval::{fuse_neighbors, trim_to, TimeInterval},
    Vector3D,
};

/// The four band-crossing epochs of one sidereal window, as offsets
/// from the period start (seconds). `(t1, t2)` bounds the inner cone,
/// `(t3, t4)` the outer; visibility is possible inside `[t3, t1]` and
/// `[t2, t4]`.
struct Crossings {
    t1: f64,
    t2: f64,
    t3: f64,
    t4: f64,
}

/// Computes the viewing cone crossings for one orbit state vector and
/// one sidereal window `m`.
///
/// Fails with [ViewConeError::NoAnalyticRoots] whenever a boundary
/// `asin` argument leaves `[-1, 1]`: the site then never crosses that
/// boundary during the window, and the method cannot shrink the period.
fn view_cone_crossings(
    lat_geoc_rad: f64,
    lon_eci_rad: f64,
    position_eci_m: &Vector3D,
    velocity_eci_m_s: &Vector3D,
    q_max_m: f64,
    m: u32,
) -> Result<Crossings, ViewConeError> {
    // orbit plane normal
    let p_hat =
        position_eci_m.cross(velocity_eci_m_s) / (position_eci_m.norm() * velocity_eci_m_s.norm());

    // Earth radius at the site's geocentric latitude
    let r_site_m = EARTH_A_AXIS_M * EARTH_B_AXIS_M
        / ((EARTH_A_AXIS_M * lat_geoc_rad.sin()).powi(2)
            + (EARTH_B_AXIS_M * lat_geoc_rad.cos()).powi(2))
        .sqrt();

    let sin_apex = r_site_m * (FRAC_PI_2 + THETA_NAUGHT_RAD).sin() / q_max_m;
    if !sin_apex.is_finite() || sin_apex.abs() > 1.0 {
        return Err(ViewConeError::NoAnalyticRoots);
    }

    // cone half angles, measured from the orbit normal
    let gamma_1 = THETA_NAUGHT_RAD + sin_apex.asin();
    let gamma_2 = PI - gamma_1;

    let denom = (p_hat.x.powi(2) + p_hat.y.powi(2)).sqrt() * lat_geoc_rad.cos();
    let arg_1 = (gamma_1.cos() - p_hat.z * lat_geoc_rad.sin()) / denom;
    let arg_2 = (gamma_2.cos() - p_hat.z * lat_geoc_rad.sin()) / denom;

    for arg in [arg_1, arg_2] {
        if !arg.is_finite() || arg.abs() > 1.0 {
            return Err(ViewConeError::NoAnalyticRoots);
        }
    }

    // site hour angle within the orbit plane frame
    let base = lon_eci_rad + p_hat.x.atan2(p_hat.y);
    let revolution = TAU * m as f64;

    let offset = |angle_rad: f64| -> f64 {
        (angle_rad.rem_euclid(TAU) + revolution) / EARTH_ANGULAR_VELOCITY_RAD_S
    };

    Ok(Crossings {
        t1: offset(arg_1.asin() - base),
        t2: offset(PI - arg_1.asin() - base),
        t3: offset(arg_2.asin() - base),
        t4: offset(PI - arg_2.asin() - base),
    })
}

/// Reduces a period of interest to the sub-intervals during which
/// visibility of the site is geometrically possible.
///
/// ## Input
/// - `site_lat_lon_deg`: target site, geodetic decimal degrees
/// - `states_eci`: orbit state vectors in ECI spanning the period
///   (typically the two period endpoints)
/// - `q_max_m`: supremum of the satellite's geocentric distance
/// - `poi`: the period of interest, usually a single day
///
/// ## Output
/// Possible-visibility intervals, trimmed to the period and fused.
/// Every excluded instant is provably below the horizon; the returned
/// intervals may still contain invisible stretches.
pub fn reduce_poi(
    site_lat_lon_deg: (f64, f64),
    states_eci: &[(Vector3D, Vector3D)],
    q_max_m: f64,
    poi: TimeInterval,
) -> Result<Vec<TimeInterval>, ViewConeError> {
    if states_eci.is_empty() {
        return Err(ViewConeError::NoStateVectors);
    }

    let (site_lat_deg, site_lon_deg) = site_lat_lon_deg;
    let lat_geoc_rad = geodetic_to_geocentric_lat(site_lat_deg).to_radians();
    let lon_eci_rad = geocentric_eci_lon_deg(site_lon_deg, poi.start_s).to_radians();

    // The crossing angles wrap with the sidereal day, slightly shorter
    // than the solar day: counting windows in solar days would leave
    // the tail of the period uncovered.
    let windows = (poi.duration_s() / SIDEREAL_DAY_S).ceil().max(1.0) as u32;

    let mut possible = Vec::<TimeInterval>::new();

    for m in 0..windows {
        let mut t1 = f64::NEG_INFINITY;
        let mut t2 = f64::INFINITY;
        let mut t3 = f64::INFINITY;
        let mut t4 = f64::NEG_INFINITY;

        for (position, velocity) in states_eci {
            let crossings =
                view_cone_crossings(lat_geoc_rad, lon_eci_rad, position, velocity, q_max_m, m)?;

            // tighten the inner pair, widen the outer pair
            t1 = t1.max(crossings.t1);
            t2 = t2.min(crossings.t2);
            t3 = t3.min(crossings.t3);
            t4 = t4.max(crossings.t4);
        }

        let window_start = m as f64 * SIDEREAL_DAY_S;
        let window_end = (m + 1) as f64 * SIDEREAL_DAY_S;

        let first_wraps = t3 >= t1;
        let second_wraps = t2 >= t4;

        if first_wraps && second_wraps {
            return Err(ViewConeError::InconsistentGeometry);
        }

        if first_wraps {
            possible.push(TimeInterval::new(window_start, t1.max(window_start)));
            possible.push(TimeInterval::new(t3.min(window_end), window_end));
        } else {
            possible.push(TimeInterval::new(t3, t1));
        }

        if second_wraps {
            possible.push(TimeInterval::new(window_start, t4.max(window_start)));
            possible.push(TimeInterval::new(t2.min(window_end), window_end));
        } else {
            possible.push(TimeInterval::new(t2, t4));
        }
    }

    // back to absolute epochs, clipped to the period
    let absolute: Vec<TimeInterval> = possible
        .iter()
        .map(|interval| {
            TimeInterval::new(poi.start_s + interval.start_s, poi.start_s + interval.end_s)
        })
        .collect();

    let reduced = fuse_neighbors(trim_to(&absolute, &poi));

    debug!(
        "viewing cone kept {:.0}s of a {:.0}s period across {} interval(s)",
        reduced.iter().map(TimeInterval::duration_s).sum::<f64>(),
        poi.duration_s(),
        reduced.len(),
    );

    Ok(reduced)
}
