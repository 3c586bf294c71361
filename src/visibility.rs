//! Visibility function and the self-adaptive Hermite access finder.
//!
//! Implements the method of Han, Gao & Sun (*Rapid Satellite-to-Site
//! Visibility Determination Based on Self-Adaptive Interpolation
//! Technique*): the step length over each reduced period adapts to a
//! bound on the fourth derivative of the visibility function, a cubic
//! Hermite approximant is fitted per step, and its real roots are the
//! access boundaries.
//!
//! All function values run in arbitrary precision (MPFR): the root
//! finding downstream is sensitive to cancellation, and the fourth
//! derivative bound subtracts terms that agree to many digits.

use std::time::Instant;

use log::{debug, trace};
use rug::{ops::Pow, Float};

use crate::{
    coords::lla_to_ecef,
    cubic::real_cubic_roots,
    errors::{Error, InterpolationError, VisibilityError},
    interpolator::Interpolator,
    interval::TimeInterval,
    search::SearchConfig,
    store::EphemerisStore,
    Vector3D,
};

/// Working precision context for the visibility computations, expressed
/// in decimal digits and carried explicitly instead of through global
/// state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Precision {
    bits: u32,
}

impl Precision {
    /// Precision of roughly `digits` significant decimal digits.
    pub fn from_decimal_digits(digits: u32) -> Self {
        let bits = (digits as f64 * std::f64::consts::LOG2_10).ceil() as u32 + 8;
        Self { bits }
    }

    /// Mantissa width, in bits.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub(crate) fn float(&self, value: f64) -> Float {
        Float::with_val(self.bits, value)
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::from_decimal_digits(100)
    }
}

fn vector(precision: &Precision, v: &Vector3D) -> [Float; 3] {
    [
        precision.float(v.x),
        precision.float(v.y),
        precision.float(v.z),
    ]
}

fn dot(a: &[Float; 3], b: &[Float; 3]) -> Float {
    let mut acc = a[0].clone() * &b[0];
    acc += a[1].clone() * &b[1];
    acc += a[2].clone() * &b[2];
    acc
}

fn norm(a: &[Float; 3]) -> Float {
    dot(a, a).sqrt()
}

fn sub(a: &[Float; 3], b: &[Float; 3]) -> [Float; 3] {
    [
        a[0].clone() - &b[0],
        a[1].clone() - &b[1],
        a[2].clone() - &b[2],
    ]
}

/// Locates the visibility windows of one site from one satellite over a
/// period of interest.
pub struct VisibilityFinder<'a> {
    interpolator: Interpolator<'a>,
    config: SearchConfig,
    precision: Precision,
    poi: TimeInterval,
    deadline: Option<Instant>,

    /// Site position in the ephemeris fixed frame
    site_m: [Float; 3],

    /// Site zenith direction. The site is static in the fixed frame, so
    /// the zenith rate is zero and the direction is computed once.
    zenith: [Float; 3],
}

impl<'a> VisibilityFinder<'a> {
    /// Binds a finder to a platform, a site (geodetic degrees) and a
    /// period of interest.
    pub fn new(
        store: &'a EphemerisStore,
        platform_id: u64,
        site_lat_lon_deg: (f64, f64),
        poi: TimeInterval,
        config: &SearchConfig,
        deadline: Option<Instant>,
    ) -> Result<Self, InterpolationError> {
        let interpolator = Interpolator::new(store, platform_id)?;
        let precision = Precision::from_decimal_digits(config.precision_digits);

        let site_ecef = lla_to_ecef(site_lat_lon_deg.0, site_lat_lon_deg.1, 0.0);
        let site_m = vector(&precision, &site_ecef);
        let site_norm = norm(&site_m);
        let zenith = [
            site_m[0].clone() / &site_norm,
            site_m[1].clone() / &site_norm,
            site_m[2].clone() / &site_norm,
        ];

        Ok(Self {
            interpolator,
            config: config.clone(),
            precision,
            poi,
            deadline,
            site_m,
            zenith,
        })
    }

    /// The visibility function `V(t)`: cosine of the angle between the
    /// site-to-satellite vector and the site zenith. The satellite is at
    /// or above the horizon exactly when `V(t) >= 0`.
    pub fn visibility(&self, time_s: f64) -> Result<Float, InterpolationError> {
        let (position, _) = self
            .interpolator
            .interpolate(time_s, self.config.interpolation)?;

        let range = sub(&vector(&self.precision, &position), &self.site_m);
        Ok(dot(&range, &self.zenith) / norm(&range))
    }

    /// Analytic first derivative of [Self::visibility]:
    /// `V' = ⟨d', ẑ⟩/‖d‖ - ⟨d, d'⟩⟨d, ẑ⟩/‖d‖³`,
    /// with the site static in the fixed frame (`ẑ' = 0`).
    pub fn visibility_first_derivative(&self, time_s: f64) -> Result<Float, InterpolationError> {
        let (position, velocity) = self
            .interpolator
            .interpolate(time_s, self.config.interpolation)?;

        let range = sub(&vector(&self.precision, &position), &self.site_m);
        let range_rate = vector(&self.precision, &velocity);
        let range_norm = norm(&range);

        let first = dot(&range_rate, &self.zenith) / &range_norm;
        let second = dot(&range, &range_rate) * dot(&range, &self.zenith)
            / range_norm.pow(3);

        Ok(first - second)
    }

    /// Bound on `|V⁗|` over a sub-interval, following the paper's
    /// quintic-fit approximation (its `a₅`/`a₄` coefficients evaluated
    /// at both interval ends).
    fn visibility_fourth_derivative_max(
        &self,
        interval: (f64, f64),
    ) -> Result<Float, InterpolationError> {
        let (start_s, end_s) = interval;
        let mid_s = start_s + (end_s - start_s) / 2.0;

        let v_start = self.visibility(start_s)?;
        let v_mid = self.visibility(mid_s)?;
        let v_end = self.visibility(end_s)?;

        let d_start = self.visibility_first_derivative(start_s)?;
        let d_mid = self.visibility_first_derivative(mid_s)?;
        let d_end = self.visibility_first_derivative(end_s)?;

        let p = &self.precision;
        let length = p.float(end_s) - p.float(start_s);
        let length_4 = length.clone().pow(4);
        let length_5 = length.pow(5);

        let a5 = p.float(24.0) / &length_5 * (v_start.clone() - &v_end)
            + p.float(4.0) / &length_4
                * (d_start.clone() + p.float(4.0) * &d_mid + &d_end);

        // a4 split in three parts, matching the reference derivation
        let start_weight = p.float(start_s) * 2 + p.float(end_s) * 3;
        let mid_weight = p.float(start_s) + p.float(end_s);
        let end_weight = p.float(start_s) * 3 + p.float(end_s) * 2;

        let a4_first = p.float(4.0) / &length_4
            * (v_start.clone() + p.float(4.0) * &v_mid + &v_end);
        let a4_second = p.float(4.0) / &length_4
            * (d_start * &start_weight
                + p.float(10.0) * &d_mid * &mid_weight
                + d_end * &end_weight);
        let a4_third = p.float(24.0) / &length_5
            * (v_start * &start_weight - v_end * &end_weight);

        let a4 = a4_first - a4_second - a4_third;

        let at_start =
            (p.float(120.0) * &a5 * p.float(start_s) + p.float(24.0) * &a4).abs();
        let at_end = (p.float(120.0) * &a5 * p.float(end_s) + p.float(24.0) * &a4).abs();

        Ok(at_start.max(&at_end))
    }

    /// New step length bounding the Hermite interpolation error over the
    /// sub-interval to the configured tolerance (eq. 9 of the paper).
    fn bound_time_step(
        &self,
        interval: (f64, f64),
        remaining_s: f64,
    ) -> Result<f64, InterpolationError> {
        let fourth_max = self.visibility_fourth_derivative_max(interval)?;

        if fourth_max.is_zero() {
            // quartic term vanished: any cubic fit is exact, take the rest
            return Ok(remaining_s);
        }

        let step = (self.precision.float(384.0) * self.precision.float(self.config.error_bound)
            / fourth_max)
            .root(4)
            .to_f64();

        if !step.is_finite() || step <= 0.0 {
            return Ok(remaining_s);
        }

        Ok(step)
    }

    /// Real roots of the cubic Hermite approximant over a step, in
    /// ascending time order, clipped to `[start, bound]`.
    ///
    /// The cubic is fitted on the normalized abscissa `s = (t-t_s)/h`:
    /// identical to the absolute-time expansion, but conditioned.
    fn hermite_roots(
        &self,
        start_s: f64,
        end_s: f64,
        bound_s: f64,
    ) -> Result<Vec<f64>, InterpolationError> {
        let p = &self.precision;
        let step = end_s - start_s;

        let v_start = self.visibility(start_s)?;
        let v_end = self.visibility(end_s)?;
        let scaled_d_start = p.float(step) * self.visibility_first_derivative(start_s)?;
        let scaled_d_end = p.float(step) * self.visibility_first_derivative(end_s)?;

        // Hermite basis collected over s³, s², s, 1
        let c3 = p.float(2.0) * &v_start + &scaled_d_start - p.float(2.0) * &v_end
            + &scaled_d_end;
        let c2 = p.float(-3.0) * &v_start - p.float(2.0) * &scaled_d_start
            + p.float(3.0) * &v_end
            - &scaled_d_end;
        let c1 = scaled_d_start;
        let c0 = v_start;

        let mut roots: Vec<f64> = real_cubic_roots(&c3, &c2, &c1, &c0)
            .into_iter()
            .filter(|s| *s >= -1e-12 && *s <= 1.0 + 1e-12)
            .map(|s| start_s + s.to_f64().clamp(0.0, 1.0) * step)
            .filter(|t| *t >= start_s && *t < bound_s)
            .collect();

        roots.sort_by(f64::total_cmp);
        Ok(roots)
    }

    /// Runs the self-adaptive search over the whole period of interest
    /// and assembles the visibility windows.
    ///
    /// Fails with [VisibilityError::UnclosedAccess] when an access is
    /// still open at the period end although `V(end) <= 0`, and with
    /// [VisibilityError::Cancelled] when the deadline expires between
    /// adaptive steps.
    pub fn determine_visibility(&self) -> Result<Vec<TimeInterval>, Error> {
        let (start_s, end_s) = (self.poi.start_s, self.poi.end_s);

        let mut windows = Vec::<TimeInterval>::new();
        let mut sub_start = start_s;
        let mut sub_end = start_s;
        let mut prev_step = self.config.initial_step_s;

        // began inside an access?
        let mut access_start = if self.visibility(start_s)? > 0.0 {
            Some(start_s)
        } else {
            None
        };

        while sub_end < end_s {
            if self.expired() {
                return Err(VisibilityError::Cancelled.into());
            }

            let remaining = end_s - sub_start;
            let mut step = prev_step;
            let mut iterations = 0_u32;

            loop {
                // the trial interval never leaves the period: the
                // ephemeris may end right at its boundary
                sub_end = (sub_start + step).min(end_s);

                let next = self.bound_time_step((sub_start, sub_end), remaining)?;
                if ((next - step).abs() / step) <= self.config.tolerance_ratio {
                    break;
                }

                if iterations >= self.config.max_iterations && step <= next {
                    break;
                }

                if iterations >= self.config.max_iterations.saturating_mul(10) {
                    debug!("step adaptation stalled at h = {step}, keeping it");
                    break;
                }

                step = next;
                iterations += 1;
            }

            sub_end = (sub_start + step).min(end_s);
            trace!("step [{sub_start}, {sub_end}] after {iterations} refinement(s)");

            for root in self.hermite_roots(sub_start, sub_end, end_s.min(sub_end))? {
                match access_start.take() {
                    None => access_start = Some(root),
                    Some(opened) => {
                        // a double root is a grazing pass, not a window
                        if root > opened {
                            windows.push(TimeInterval::new(opened, root));
                        }
                    },
                }
            }

            sub_start = sub_end;
            prev_step = step;
        }

        if let Some(opened) = access_start {
            if self.visibility(end_s)? <= 0.0 {
                return Err(VisibilityError::UnclosedAccess {
                    access_start_s: opened,
                    poi_end_s: end_s,
                }
                .into());
            }
            windows.push(TimeInterval::new(opened, end_s));
        }

        debug!(
            "found {} visibility window(s) over [{start_s}, {end_s}]",
            windows.len(),
        );

        Ok(windows)
    }

    fn expired(&self) -> bool {
        self.deadline
            .map_or(false, |deadline| Instant::now() >= deadline)
    }
}
