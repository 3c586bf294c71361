use crate::sample::OrbitSample;

/// A maximal run of ephemeris samples that interpolation may use
/// together. Samples of different segments must never feed one
/// interpolation window: segment boundaries mark discontinuities
/// (maneuvers, ephemeris regeneration).
///
/// Invariants, enforced by the parser and assumed downstream:
/// - `samples` is non-empty and sorted by strictly increasing time,
/// - `start_time_s == samples[0].time_s`,
/// - `end_time_s == samples[last].time_s`,
/// - segments of one platform do not overlap in time.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitSegment {
    /// Store-wide unique segment identifier
    pub segment_id: u64,

    /// Owning platform
    pub platform_id: u64,

    /// First sample epoch, Unix seconds
    pub start_time_s: f64,

    /// Last sample epoch, Unix seconds
    pub end_time_s: f64,

    /// Time-sorted ephemeris samples
    pub samples: Vec<OrbitSample>,
}

impl OrbitSegment {
    /// Builds a segment from time-sorted samples.
    /// Panics on an empty sample list (parser bug, not user error).
    pub fn from_samples(segment_id: u64, platform_id: u64, samples: Vec<OrbitSample>) -> Self {
        let start_time_s = samples.first().expect("empty orbit segment").time_s;
        let end_time_s = samples.last().expect("empty orbit segment").time_s;

        Self {
            segment_id,
            platform_id,
            start_time_s,
            end_time_s,
            samples,
        }
    }

    pub fn contains(&self, time_s: f64) -> bool {
        self.start_time_s <= time_s && time_s <= self.end_time_s
    }

    pub fn duration_s(&self) -> f64 {
        self.end_time_s - self.start_time_s
    }
}
