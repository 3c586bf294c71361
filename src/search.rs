//! Visibility search orchestration: one function call per request of
//! the service layer.
//!
//! The flow per `(satellite, site, period)` request: split the period
//! into one-day windows, sample the satellite at the day boundaries,
//! batch-convert those states to ECI once, reduce each day with the
//! viewing cone, run the adaptive Hermite finder over the reduced
//! intervals, fuse the results and cache the serialized response under
//! a fresh id. Satellites fan out in parallel; output order is restored
//! at the join (ascending start time per satellite, satellites by id).

use std::time::Instant;

use itertools::Itertools;
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    constants::SOLAR_DAY_S,
    coords::ecef_to_eci,
    errors::{Error, InputError},
    interpolator::{InterpolationKind, Interpolator},
    interval::{common_intervals, fuse_neighbors, trim_to, TimeInterval},
    store::{EphemerisStore, ResponseCache},
    time::utc_to_unix,
    viewcone::reduce_poi,
    visibility::VisibilityFinder,
    Vector3D,
};

/// Tuning knobs of the visibility pipeline. The defaults mirror the
/// reference implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Working precision of the visibility computations, decimal digits
    pub precision_digits: u32,

    /// Target bound on the Hermite interpolation error per step
    pub error_bound: f64,

    /// Step convergence: relative step change considered settled
    pub tolerance_ratio: f64,

    /// Step convergence: refinement iterations cap per sub-interval
    pub max_iterations: u32,

    /// Step length seeding the first sub-interval (seconds)
    pub initial_step_s: f64,

    /// Ephemeris interpolation kind
    pub interpolation: InterpolationKind,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            precision_digits: 100,
            error_bound: 0.1,
            tolerance_ratio: 0.1,
            max_iterations: 100,
            initial_step_s: 1000.0,
            interpolation: InterpolationKind::Quadratic,
        }
    }
}

impl SearchConfig {
    /// Default configuration with the `CALCULATION_PRECISION`
    /// environment option applied when present.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(digits) = std::env::var("CALCULATION_PRECISION")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
        {
            config.precision_digits = digits;
        }

        config
    }
}

/// Period of interest, as the UTC timestamps of the request document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodOfInterest {
    #[serde(rename = "startTime")]
    pub start_time: String,

    #[serde(rename = "endTime")]
    pub end_time: String,
}

impl PeriodOfInterest {
    /// Parses and validates the period into a [TimeInterval].
    pub fn resolve(&self) -> Result<TimeInterval, InputError> {
        let start_s = utc_to_unix(&self.start_time)?;
        let end_s = utc_to_unix(&self.end_time)?;

        if start_s > end_s {
            return Err(InputError::PoiOrder { start_s, end_s });
        }

        Ok(TimeInterval::new(start_s, end_s))
    }
}

/// Point-target visibility request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Target site `(latitude, longitude)`, geodetic decimal degrees
    #[serde(rename = "Target")]
    pub target: (f64, f64),

    #[serde(rename = "POI")]
    pub poi: PeriodOfInterest,

    /// Platforms to consider; all registered satellites when absent
    #[serde(rename = "PlatformID", default, skip_serializing_if = "Option::is_none")]
    pub platform_ids: Option<Vec<u64>>,
}

/// Polygon-target visibility request: opportunities must see every
/// vertex simultaneously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaSearchQuery {
    /// Target polygon vertices `(latitude, longitude)`, at least 3
    #[serde(rename = "TargetArea")]
    pub target_area: Vec<(f64, f64)>,

    #[serde(rename = "POI")]
    pub poi: PeriodOfInterest,

    #[serde(rename = "PlatformID", default, skip_serializing_if = "Option::is_none")]
    pub platform_ids: Option<Vec<u64>>,
}

/// One visibility window of one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(rename = "PlatformID")]
    pub platform_id: u64,

    pub start_time: f64,

    pub end_time: f64,
}

/// Response document: the opportunity list plus the cache id it was
/// stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub id: u64,

    #[serde(rename = "Opportunities")]
    pub opportunities: Vec<Opportunity>,
}

/// Runs a point-target visibility search.
///
/// The serialized opportunity list is cached under the returned
/// response id; nothing is cached when the request fails or is
/// cancelled.
pub fn search(
    store: &EphemerisStore,
    cache: &ResponseCache,
    query: &SearchQuery,
    config: &SearchConfig,
    deadline: Option<Instant>,
) -> Result<SearchResponse, Error> {
    let poi = query.poi.resolve()?;
    let platform_ids = resolve_platforms(store, query.platform_ids.as_deref())?;

    let results: Vec<(u64, Vec<TimeInterval>)> = platform_ids
        .par_iter()
        .map(|&platform_id| {
            satellite_windows(store, platform_id, query.target, poi, config, deadline)
                .map(|windows| (platform_id, windows))
        })
        .collect::<Result<_, Error>>()?;

    respond(cache, results)
}

/// Runs a polygon-target visibility search: the per-vertex windows are
/// intersected N-way, so an opportunity covers the entire area at once.
pub fn search_area(
    store: &EphemerisStore,
    cache: &ResponseCache,
    query: &AreaSearchQuery,
    config: &SearchConfig,
    deadline: Option<Instant>,
) -> Result<SearchResponse, Error> {
    if query.target_area.len() < 3 {
        return Err(InputError::PolygonTooSmall(query.target_area.len()).into());
    }

    let poi = query.poi.resolve()?;
    let platform_ids = resolve_platforms(store, query.platform_ids.as_deref())?;

    let results: Vec<(u64, Vec<TimeInterval>)> = platform_ids
        .par_iter()
        .map(|&platform_id| {
            let per_vertex = query
                .target_area
                .iter()
                .map(|&vertex| {
                    satellite_windows(store, platform_id, vertex, poi, config, deadline)
                })
                .collect::<Result<Vec<_>, Error>>()?;

            Ok((platform_id, common_intervals(&per_vertex)))
        })
        .collect::<Result<_, Error>>()?;

    respond(cache, results)
}

/// Validates the requested platform list, or selects every registered
/// satellite when the request names none.
fn resolve_platforms(
    store: &EphemerisStore,
    requested: Option<&[u64]>,
) -> Result<Vec<u64>, InputError> {
    let platform_ids: Vec<u64> = match requested {
        Some(ids) => {
            for &platform_id in ids {
                if store.satellite(platform_id).is_none() {
                    return Err(InputError::UnknownPlatform(platform_id));
                }
            }
            ids.iter().copied().unique().sorted().collect()
        },
        None => store
            .satellites_iter()
            .map(|satellite| satellite.platform_id)
            .collect(),
    };

    Ok(platform_ids)
}

/// Splits a period of interest into one-day windows
/// `[t, min(t + 86400, end)]`.
fn day_windows(poi: &TimeInterval) -> Vec<TimeInterval> {
    let mut windows = Vec::new();
    let mut start_s = poi.start_s;

    while start_s < poi.end_s {
        let end_s = (start_s + SOLAR_DAY_S).min(poi.end_s);
        windows.push(TimeInterval::new(start_s, end_s));
        start_s = end_s;
    }

    if windows.is_empty() {
        // empty period: keep one degenerate window so the finder can
        // still classify the single instant
        windows.push(*poi);
    }

    windows
}

/// Full pipeline for one satellite: day split, boundary sampling, one
/// vectorized ECEF→ECI conversion, viewing cone reduction, adaptive
/// Hermite search, fuse.
fn satellite_windows(
    store: &EphemerisStore,
    platform_id: u64,
    target: (f64, f64),
    poi: TimeInterval,
    config: &SearchConfig,
    deadline: Option<Instant>,
) -> Result<Vec<TimeInterval>, Error> {
    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        return Err(crate::errors::VisibilityError::Cancelled.into());
    }

    let satellite = store
        .satellite(platform_id)
        .ok_or(InputError::UnknownPlatform(platform_id))?;

    let interpolator = Interpolator::new(store, platform_id)?;
    let days = day_windows(&poi);

    // sample the satellite at every day boundary
    let mut boundary_times: Vec<f64> = days.iter().map(|day| day.start_s).collect();
    boundary_times.push(poi.end_s);

    let mut sampled: Vec<Option<(Vector3D, Vector3D)>> = Vec::with_capacity(boundary_times.len());
    let mut last_error = Option::<Error>::None;

    for &time_s in &boundary_times {
        match interpolator.interpolate(time_s, config.interpolation) {
            Ok(state) => sampled.push(Some(state)),
            Err(error) => {
                warn!("platform {platform_id}: cannot sample {time_s}: {error}");
                last_error = Some(error.into());
                sampled.push(None);
            },
        }
    }

    // single vectorized frame conversion over the available states
    let mut available = Vec::with_capacity(sampled.len());
    let mut states_ecef = Vec::with_capacity(sampled.len());
    let mut times = Vec::with_capacity(sampled.len());

    for (i, state) in sampled.iter().enumerate() {
        if let Some(state) = state {
            available.push(i);
            states_ecef.push(*state);
            times.push(boundary_times[i]);
        }
    }

    let converted = ecef_to_eci(&states_ecef, &times);

    let mut states_eci: Vec<Option<(Vector3D, Vector3D)>> = vec![None; sampled.len()];
    for (i, state) in available.into_iter().zip(converted) {
        states_eci[i] = Some(state);
    }

    // viewing cone per day window
    let mut reduced = Vec::<TimeInterval>::new();
    let mut dropped = 0_usize;

    for (m, day) in days.iter().enumerate() {
        match (states_eci[m], states_eci[m + 1]) {
            (Some(state_in), Some(state_out)) => {
                match reduce_poi(
                    target,
                    &[state_in, state_out],
                    satellite.maximum_altitude_m,
                    *day,
                ) {
                    Ok(intervals) => reduced.extend(intervals),
                    Err(error) => {
                        // geometric pre-filter is best-effort only
                        warn!(
                            "platform {platform_id}: viewing cone undecided over \
                             [{}, {}] ({error}), keeping the whole day",
                            day.start_s, day.end_s,
                        );
                        reduced.push(*day);
                    },
                }
            },
            _ => {
                dropped += 1;
            },
        }
    }

    if dropped == days.len() {
        // the ephemeris never covered the request
        return Err(last_error.unwrap_or_else(|| {
            crate::errors::InterpolationError::NoSegment {
                platform_id,
                time_s: poi.start_s,
            }
            .into()
        }));
    }

    if dropped > 0 {
        debug!("platform {platform_id}: dropped {dropped}/{} day window(s)", days.len());
    }

    let reduced = fuse_neighbors(reduced);

    // adaptive Hermite search over what the cone kept
    let mut windows = Vec::<TimeInterval>::new();
    for interval in &reduced {
        let finder =
            VisibilityFinder::new(store, platform_id, target, *interval, config, deadline)?;
        windows.extend(finder.determine_visibility()?);
    }

    Ok(fuse_neighbors(trim_to(&windows, &poi)))
}

/// Assembles, caches and numbers the response.
fn respond(
    cache: &ResponseCache,
    results: Vec<(u64, Vec<TimeInterval>)>,
) -> Result<SearchResponse, Error> {
    let opportunities: Vec<Opportunity> = results
        .into_iter()
        .flat_map(|(platform_id, windows)| {
            windows.into_iter().map(move |window| Opportunity {
                platform_id,
                start_time: window.start_s,
                end_time: window.end_s,
            })
        })
        .collect();

    let id = cache.insert(serde_json::to_string(&opportunities)?);
    debug!("cached {} opportunity(ies) as response {id}", opportunities.len());

    Ok(SearchResponse { id, opportunities })
}
