use thiserror::Error;

use std::io::Error as IoError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Parsing error: {0}")]
    Parsing(#[from] ParsingError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    #[error("Viewing cone error: {0}")]
    ViewCone(#[from] ViewConeError),

    #[error("Visibility error: {0}")]
    Visibility(#[from] VisibilityError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File i/o error: {0}")]
    FileIo(#[from] IoError),
}

/// Errors that may rise while parsing an ephemeris file
#[derive(Debug, Error)]
pub enum ParsingError {
    #[error("ephemeris data block without a scenario epoch")]
    MissingScenarioEpoch,

    #[error("failed to parse scenario epoch from \"{0}\"")]
    MalformedScenarioEpoch(String),

    #[error("failed to parse segment boundary from \"{0}\"")]
    MalformedSegmentBoundary(String),

    #[error("failed to parse state vector from \"{0}\"")]
    MalformedStateVector(String),

    #[error("ephemeris file contains no state vectors")]
    EmptyEphemeris,
}

/// Semantically invalid request content
#[derive(Debug, Error)]
pub enum InputError {
    #[error("malformed UTC timestamp \"{0}\"")]
    MalformedTimestamp(String),

    #[error("timestamp \"{0}\" is before the Unix epoch")]
    TimestampBeforeEpoch(String),

    #[error("period of interest ends ({end_s}) before it starts ({start_s})")]
    PoiOrder { start_s: f64, end_s: f64 },

    #[error("no such platform: {0}")]
    UnknownPlatform(u64),

    #[error("target area requires at least 3 vertices, got {0}")]
    PolygonTooSmall(usize),
}

/// The interpolator cannot serve a query
#[derive(Debug, Error)]
pub enum InterpolationError {
    #[error("no such satellite: {0}")]
    UnknownSatellite(u64),

    #[error("no segment of platform {platform_id} contains {time_s}")]
    NoSegment { platform_id: u64, time_s: f64 },

    #[error("segment {segment_id} holds {available} sample(s), interpolation needs at least 2")]
    InsufficientData { segment_id: u64, available: usize },
}

/// The viewing cone method cannot resolve the geometry.
/// All variants are recoverable by treating the whole day
/// as possibly visible.
#[derive(Debug, Error)]
pub enum ViewConeError {
    #[error("no orbit state vectors supplied")]
    NoStateVectors,

    #[error("boundary equation has fewer than four real roots over the period")]
    NoAnalyticRoots,

    #[error("both in/out boundary pairs wrap around the day")]
    InconsistentGeometry,
}

/// Fatal inconsistencies of the visibility finder
#[derive(Debug, Error)]
pub enum VisibilityError {
    #[error("access opened at {access_start_s} was never closed by {poi_end_s}")]
    UnclosedAccess { access_start_s: f64, poi_end_s: f64 },

    #[error("deadline exceeded")]
    Cancelled,
}
