//! Satellite-to-ground visibility determination.
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

/*
 * satvis: satellite-to-site visibility window determination.
 * This crate is shipped under Mozilla Public V2 license.
 */

use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

mod constants;
mod coords;
mod cubic;
mod errors;
mod header;
mod interpolator;
mod interval;
mod parsing;
mod sample;
mod search;
mod segment;
mod store;
mod time;
mod viewcone;
mod visibility;

/// Cartesian triple: position in meters or velocity in meters per
/// second, in a named frame (ECEF or ECI).
pub type Vector3D = nalgebra::Vector3<f64>;

pub mod prelude {
    pub use crate::{
        coords::{
            ecef_to_eci, ecef_to_lla, eci_to_ecef, geocentric_eci_lon_deg,
            geodetic_to_geocentric_lat, gmst_deg, lla_to_ecef,
        },
        errors::{
            Error, InputError, InterpolationError, ParsingError, ViewConeError, VisibilityError,
        },
        header::Header,
        interpolator::{InterpolationKind, Interpolator},
        interval::{common_intervals, fuse_neighbors, trim_to, TimeInterval},
        sample::OrbitSample,
        search::{
            search, search_area, AreaSearchQuery, Opportunity, PeriodOfInterest, SearchConfig,
            SearchQuery, SearchResponse,
        },
        segment::OrbitSegment,
        store::{EphemerisStore, ResponseCache},
        time::{jdate_to_unix, unix_to_utc, utc_to_unix},
        viewcone::reduce_poi,
        visibility::{Precision, VisibilityFinder},
        Satellite, SatelliteSummary, Vector3D,
    };
}

use sample::OrbitSample;
use segment::OrbitSegment;

/// A satellite and its complete parsed ephemeris: time-sorted,
/// non-overlapping [OrbitSegment]s of [OrbitSample]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Satellite {
    /// Store-assigned unique platform identifier
    pub platform_id: u64,

    /// Platform name, from the ephemeris file stem
    pub platform_name: String,

    /// Supremum of the geocentric distance across all samples (m),
    /// the `q_max` bound the viewing cone consumes
    pub maximum_altitude_m: f64,

    /// Ephemeris file [header::Header]
    pub header: header::Header,

    /// Ephemeris segments, sorted by start time
    pub segments: Vec<OrbitSegment>,
}

/// Identity row for satellite listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteSummary {
    pub id: u64,
    pub satellite_name: String,
}

impl Satellite {
    /// Epoch of the very first ephemeris sample.
    pub fn first_time_s(&self) -> Option<f64> {
        self.segments.first().map(|segment| segment.start_time_s)
    }

    /// Epoch of the very last ephemeris sample.
    pub fn last_time_s(&self) -> Option<f64> {
        self.segments.last().map(|segment| segment.end_time_s)
    }

    /// True when both `start_s` and `end_s` fall inside a segment of
    /// this satellite.
    pub fn covers(&self, start_s: f64, end_s: f64) -> bool {
        self.segment_containing(start_s).is_some() && self.segment_containing(end_s).is_some()
    }

    /// [OrbitSegment] iterator, in ascending start time order.
    pub fn segments_iter(&self) -> impl Iterator<Item = &OrbitSegment> + '_ {
        self.segments.iter()
    }

    /// Flat [OrbitSample] iterator across all segments, in time order.
    pub fn samples_iter(&self) -> impl Iterator<Item = &OrbitSample> + '_ {
        self.segments.iter().flat_map(|segment| segment.samples.iter())
    }

    /// Total number of ephemeris samples.
    pub fn total_samples(&self) -> usize {
        self.segments.iter().map(|segment| segment.samples.len()).sum()
    }

    /// The segment containing `time_s`. A boundary epoch belongs to two
    /// segments; the one with the greater start time wins, so that
    /// interpolation windows stay on the fresher side of the boundary.
    pub fn segment_containing(&self, time_s: f64) -> Option<&OrbitSegment> {
        let candidates = self
            .segments
            .partition_point(|segment| segment.start_time_s <= time_s);

        self.segments[..candidates]
            .iter()
            .rev()
            .take(2)
            .find(|segment| segment.contains(time_s))
    }

    /// Samples of one of this satellite's segments.
    pub fn samples_of(&self, segment_id: u64) -> Option<&[OrbitSample]> {
        self.segments
            .iter()
            .find(|segment| segment.segment_id == segment_id)
            .map(|segment| segment.samples.as_slice())
    }

    /// Identity row for the satellite listing endpoint.
    pub fn summary(&self) -> SatelliteSummary {
        SatelliteSummary {
            id: self.platform_id,
            satellite_name: self.platform_name.clone(),
        }
    }
}
