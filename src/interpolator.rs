//! Piecewise polynomial reconstruction of satellite state vectors.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    errors::InterpolationError, segment::OrbitSegment, store::EphemerisStore, Satellite, Vector3D,
};

/// Interpolation kind: the polynomial degree of the local fit, which
/// fixes the sample window width.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InterpolationKind {
    /// Degree 1 over the 2 bracketing samples
    Linear,

    /// Degree 2 over the nearest 3 samples
    #[default]
    Quadratic,

    /// Degree 3 over the nearest 4 samples
    Cubic,
}

impl InterpolationKind {
    pub(crate) fn window_len(&self) -> usize {
        match self {
            Self::Linear => 2,
            Self::Quadratic => 3,
            Self::Cubic => 4,
        }
    }
}

/// Per-segment sample series, re-laid out as parallel arrays once and
/// memoized for the lifetime of the interpolator.
#[derive(Debug)]
struct SegmentSeries {
    times_s: Vec<f64>,
    positions_m: Vec<Vector3D>,
    velocities_m_s: Vec<Vector3D>,
}

impl SegmentSeries {
    fn from_segment(segment: &OrbitSegment) -> Self {
        Self {
            times_s: segment.samples.iter().map(|s| s.time_s).collect(),
            positions_m: segment.samples.iter().map(|s| s.position_m).collect(),
            velocities_m_s: segment.samples.iter().map(|s| s.velocity_m_s).collect(),
        }
    }
}

/// Reconstructs position and velocity of one platform at arbitrary
/// times. Pure and thread compatible: the only interior state is the
/// per-segment memo table. Holds the segments by reference; the store
/// outlives every request-scoped interpolator.
#[derive(Debug)]
pub struct Interpolator<'a> {
    satellite: &'a Satellite,
    series: RwLock<HashMap<u64, Arc<SegmentSeries>>>,
}

impl<'a> Interpolator<'a> {
    /// Binds an interpolator to a platform of the store.
    pub fn new(store: &'a EphemerisStore, platform_id: u64) -> Result<Self, InterpolationError> {
        let satellite = store
            .satellite(platform_id)
            .ok_or(InterpolationError::UnknownSatellite(platform_id))?;

        Ok(Self {
            satellite,
            series: RwLock::new(HashMap::new()),
        })
    }

    pub fn platform_id(&self) -> u64 {
        self.satellite.platform_id
    }

    /// Estimates `(position, velocity)` at a Unix epoch with the default
    /// (quadratic) interpolation kind.
    pub fn interpolate_default(
        &self,
        time_s: f64,
    ) -> Result<(Vector3D, Vector3D), InterpolationError> {
        self.interpolate(time_s, InterpolationKind::default())
    }

    /// Estimates `(position, velocity)` at a Unix epoch.
    ///
    /// The interpolation window never crosses a segment boundary; on a
    /// boundary epoch shared by two segments, the later segment serves
    /// the query. Segments shorter than the nominal window degrade to
    /// the largest fitting window; fewer than 2 samples is
    /// [InterpolationError::InsufficientData].
    pub fn interpolate(
        &self,
        time_s: f64,
        kind: InterpolationKind,
    ) -> Result<(Vector3D, Vector3D), InterpolationError> {
        let segment = self.satellite.segment_containing(time_s).ok_or(
            InterpolationError::NoSegment {
                platform_id: self.satellite.platform_id,
                time_s,
            },
        )?;

        let series = self.series_of(segment)?;
        let (lo, hi) = window_bounds(&series.times_s, time_s, kind.window_len());
        let times = &series.times_s[lo..hi];

        Ok((
            lagrange_eval(times, &series.positions_m[lo..hi], time_s),
            lagrange_eval(times, &series.velocities_m_s[lo..hi], time_s),
        ))
    }

    fn series_of(&self, segment: &OrbitSegment) -> Result<Arc<SegmentSeries>, InterpolationError> {
        if segment.samples.len() < 2 {
            return Err(InterpolationError::InsufficientData {
                segment_id: segment.segment_id,
                available: segment.samples.len(),
            });
        }

        {
            let memo = self
                .series
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(series) = memo.get(&segment.segment_id) {
                return Ok(series.clone());
            }
        }

        let series = Arc::new(SegmentSeries::from_segment(segment));
        self.series
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(segment.segment_id, series.clone());

        Ok(series)
    }
}

/// Picks the `window_len` samples centered around `time_s`, clamped to
/// the series (and therefore to the segment).
fn window_bounds(times_s: &[f64], time_s: f64, window_len: usize) -> (usize, usize) {
    let len = times_s.len();
    let n = window_len.min(len);

    let bracket = times_s.partition_point(|&t| t < time_s);
    let lo = bracket.saturating_sub(n / 2).min(len - n);

    (lo, lo + n)
}

/// Lagrange interpolation of a vector series at `time_s`, over the
/// supplied window.
fn lagrange_eval(times_s: &[f64], values: &[Vector3D], time_s: f64) -> Vector3D {
    let mut acc = Vector3D::zeros();

    for (i, (&t_i, value)) in times_s.iter().zip(values.iter()).enumerate() {
        let mut l_i = 1.0_f64;

        for (j, &t_j) in times_s.iter().enumerate() {
            if j != i {
                l_i *= (time_s - t_j) / (t_i - t_j);
            }
        }

        acc += value * l_i;
    }

    acc
}
