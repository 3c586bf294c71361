//! Geodetic, Earth-fixed and inertial coordinate conversions.

use nalgebra::Rotation3;

use crate::{
    constants::{
        EARTH_ANGULAR_VELOCITY_RAD_S, GMST_J2000_DEG, J2000_UNIX_S, SIDEREAL_DAY_S,
        WGS84_ECCENTRICITY, WGS84_FLATTENING, WGS84_SEMI_MAJOR_AXIS_M,
    },
    Vector3D,
};

/// Converts geodetic latitude, longitude (decimal degrees) and height
/// above the WGS-84 ellipsoid (m) to Earth-centered Earth-fixed
/// Cartesian coordinates, in meters.
pub fn lla_to_ecef(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Vector3D {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();

    let a = WGS84_SEMI_MAJOR_AXIS_M;
    let e2 = WGS84_ECCENTRICITY * WGS84_ECCENTRICITY;

    // prime vertical radius of curvature
    let n = a / (1.0 - e2 * lat.sin().powi(2)).sqrt();

    Vector3D::new(
        (n + alt_m) * lat.cos() * lon.cos(),
        (n + alt_m) * lat.cos() * lon.sin(),
        ((1.0 - e2) * n + alt_m) * lat.sin(),
    )
}

/// Converts ECEF Cartesian coordinates (m) back to geodetic latitude,
/// longitude (decimal degrees) and height (m), by fixed-point iteration
/// on the latitude.
pub fn ecef_to_lla(position_m: &Vector3D) -> (f64, f64, f64) {
    let (x, y, z) = (position_m.x, position_m.y, position_m.z);

    let a = WGS84_SEMI_MAJOR_AXIS_M;
    let e2 = WGS84_ECCENTRICITY * WGS84_ECCENTRICITY;
    let b = a * (1.0 - WGS84_FLATTENING);

    let lon = y.atan2(x);
    let p = (x * x + y * y).sqrt();

    if p < 1e-9 {
        // polar axis
        let lat = if z < 0.0 {
            -std::f64::consts::FRAC_PI_2
        } else {
            std::f64::consts::FRAC_PI_2
        };
        return (lat.to_degrees(), lon.to_degrees(), z.abs() - b);
    }

    let mut lat = z.atan2(p * (1.0 - e2));
    let mut alt = 0.0;

    for _ in 0..8 {
        let n = a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        alt = p / lat.cos() - n;
        let next = (z / p).atan2(1.0 - e2 * n / (n + alt));
        if (next - lat).abs() < 1e-14 {
            lat = next;
            break;
        }
        lat = next;
    }

    (lat.to_degrees(), lon.to_degrees(), alt)
}

/// Converts geodetic latitude to geocentric latitude, both in decimal
/// degrees: `φ_gc = atan((1 - f)² tan(φ_gd))`.
pub fn geodetic_to_geocentric_lat(lat_deg: f64) -> f64 {
    let ratio = (1.0 - WGS84_FLATTENING).powi(2);
    (ratio * lat_deg.to_radians().tan()).atan().to_degrees()
}

/// Greenwich mean sidereal time at a Unix epoch, in degrees `[0, 360)`.
pub fn gmst_deg(time_s: f64) -> f64 {
    ((time_s - J2000_UNIX_S) * (360.0 / SIDEREAL_DAY_S) + GMST_J2000_DEG).rem_euclid(360.0)
}

/// Earth-centered inertial longitude of a site at a Unix epoch, in
/// degrees `[0, 360)`: geodetic longitude advanced by GMST.
pub fn geocentric_eci_lon_deg(lon_deg: f64, time_s: f64) -> f64 {
    (lon_deg + gmst_deg(time_s)).rem_euclid(360.0)
}

/// Rotates ECEF state vectors into the Earth-centered inertial frame at
/// the paired epochs. Velocities receive the `ω⊕ × r` Earth rotation
/// correction.
///
/// The rotation is the GMST spin about the pole, without precession,
/// nutation or polar motion: adequate for visibility work (roughly the
/// 200 m class position error the GCRS shortcut accepts), and exactly
/// consistent with the sidereal longitudes the viewing cone uses.
pub fn ecef_to_eci(
    states: &[(Vector3D, Vector3D)],
    times_s: &[f64],
) -> Vec<(Vector3D, Vector3D)> {
    let omega = Vector3D::new(0.0, 0.0, EARTH_ANGULAR_VELOCITY_RAD_S);

    states
        .iter()
        .zip(times_s.iter())
        .map(|(&(position, velocity), &time_s)| {
            let rotation =
                Rotation3::from_axis_angle(&Vector3D::z_axis(), gmst_deg(time_s).to_radians());
            (
                rotation * position,
                rotation * (velocity + omega.cross(&position)),
            )
        })
        .collect()
}

/// Inverse of [ecef_to_eci] at identical epochs.
pub fn eci_to_ecef(
    states: &[(Vector3D, Vector3D)],
    times_s: &[f64],
) -> Vec<(Vector3D, Vector3D)> {
    let omega = Vector3D::new(0.0, 0.0, EARTH_ANGULAR_VELOCITY_RAD_S);

    states
        .iter()
        .zip(times_s.iter())
        .map(|(&(position, velocity), &time_s)| {
            let rotation =
                Rotation3::from_axis_angle(&Vector3D::z_axis(), -gmst_deg(time_s).to_radians());
            let position_ecef = rotation * position;
            (position_ecef, rotation * velocity - omega.cross(&position_ecef))
        })
        .collect()
}
