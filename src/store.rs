//! In-memory satellite/segment tables and the response cache.
//!
//! These are the two persistence contracts the visibility pipeline
//! consumes; a service layer may replace them with database-backed
//! implementations holding the same semantics.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use crate::{errors::Error, sample::OrbitSample, segment::OrbitSegment, Satellite};

/// Read-mostly satellite table. Satellites and their segments are
/// immutable once inserted; platform and segment identifiers are
/// assigned on insertion and never reused.
#[derive(Debug)]
pub struct EphemerisStore {
    satellites: BTreeMap<u64, Satellite>,
    next_platform_id: u64,
    next_segment_id: u64,
}

impl EphemerisStore {
    pub fn new() -> Self {
        Self {
            satellites: BTreeMap::new(),
            next_platform_id: 1,
            next_segment_id: 1,
        }
    }

    /// Inserts a parsed [Satellite], assigning its platform id and
    /// store-wide unique segment ids. Returns the platform id.
    pub fn insert(&mut self, mut satellite: Satellite) -> u64 {
        let platform_id = self.next_platform_id;
        self.next_platform_id += 1;

        satellite.platform_id = platform_id;
        for segment in satellite.segments.iter_mut() {
            segment.platform_id = platform_id;
            segment.segment_id = self.next_segment_id;
            self.next_segment_id += 1;
        }

        self.satellites.insert(platform_id, satellite);
        platform_id
    }

    /// Parses an ephemeris file and registers the satellite.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<u64, Error> {
        let satellite = Satellite::from_file(path)?;
        Ok(self.insert(satellite))
    }

    /// Parses a gzip compressed ephemeris file and registers the
    /// satellite.
    #[cfg(feature = "flate2")]
    #[cfg_attr(docsrs, doc(cfg(feature = "flate2")))]
    pub fn load_gzip_file(&mut self, path: impl AsRef<Path>) -> Result<u64, Error> {
        let satellite = Satellite::from_gzip_file(path)?;
        Ok(self.insert(satellite))
    }

    pub fn satellite(&self, platform_id: u64) -> Option<&Satellite> {
        self.satellites.get(&platform_id)
    }

    /// All registered satellites, in ascending platform id order.
    pub fn satellites_iter(&self) -> impl Iterator<Item = &Satellite> + '_ {
        self.satellites.values()
    }

    pub fn total_satellites(&self) -> usize {
        self.satellites.len()
    }

    /// The segment of `platform_id` containing `time_s`. On a boundary
    /// epoch shared by two segments, the later segment wins.
    pub fn segment_containing(&self, platform_id: u64, time_s: f64) -> Option<&OrbitSegment> {
        self.satellite(platform_id)?.segment_containing(time_s)
    }

    /// Samples of a segment, in ascending time order.
    pub fn samples_of(&self, segment_id: u64) -> Option<&[OrbitSample]> {
        self.satellites
            .values()
            .flat_map(|satellite| satellite.segments.iter())
            .find(|segment| segment.segment_id == segment_id)
            .map(|segment| segment.samples.as_slice())
    }
}

/// Append-only cache of serialized responses, keyed by fresh ids.
/// Writers never conflict: ids come from an atomic counter and entries
/// are immutable once stored.
#[derive(Debug)]
pub struct ResponseCache {
    entries: RwLock<BTreeMap<u64, String>>,
    next_id: AtomicU64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Stores a serialized response document under a fresh id.
    pub fn insert(&self, response: String) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, response);
        id
    }

    /// Retrieves a previously cached response document.
    pub fn get(&self, id: u64) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EphemerisStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
