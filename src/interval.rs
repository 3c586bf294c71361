//! Time interval algebra.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Half-open-agnostic time span over Unix seconds.
/// Invariant: `start_s <= end_s`; the interval is empty when both match.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start_s: f64,
    pub end_s: f64,
}

impl TimeInterval {
    pub fn new(start_s: f64, end_s: f64) -> Self {
        debug_assert!(start_s <= end_s, "degenerate interval [{start_s}, {end_s}]");
        Self { start_s, end_s }
    }

    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }

    pub fn is_empty(&self) -> bool {
        self.start_s == self.end_s
    }

    pub fn midpoint_s(&self) -> f64 {
        self.start_s + self.duration_s() / 2.0
    }

    pub fn contains(&self, time_s: f64) -> bool {
        self.start_s <= time_s && time_s <= self.end_s
    }

    /// Returns the overlap with `rhs`, `None` when disjoint or reduced
    /// to a single point.
    pub fn intersection(&self, rhs: &Self) -> Option<Self> {
        let start_s = self.start_s.max(rhs.start_s);
        let end_s = self.end_s.min(rhs.end_s);
        (start_s < end_s).then(|| Self::new(start_s, end_s))
    }
}

impl PartialOrd for TimeInterval {
    fn partial_cmp(&self, rhs: &Self) -> Option<std::cmp::Ordering> {
        Some(
            self.start_s
                .total_cmp(&rhs.start_s)
                .then(self.end_s.total_cmp(&rhs.end_s)),
        )
    }
}

/// Clips every interval to `bound`; intervals entirely outside are dropped.
pub fn trim_to(intervals: &[TimeInterval], bound: &TimeInterval) -> Vec<TimeInterval> {
    intervals
        .iter()
        .filter_map(|interval| interval.intersection(bound))
        .collect()
}

/// Merges neighboring intervals that share a boundary:
/// `[(0, 100), (100, 200), (300, 400)]` becomes `[(0, 200), (300, 400)]`.
///
/// Assumes the intervals do not overlap and that at most two of them
/// share any one boundary.
pub fn fuse_neighbors(intervals: Vec<TimeInterval>) -> Vec<TimeInterval> {
    let mut fused = Vec::<TimeInterval>::with_capacity(intervals.len());

    for interval in intervals
        .into_iter()
        .sorted_by(|a, b| a.start_s.total_cmp(&b.start_s))
    {
        match fused.last_mut() {
            Some(last) if last.end_s == interval.start_s => {
                last.end_s = interval.end_s;
            },
            _ => fused.push(interval),
        }
    }

    fused
}

/// Intersects two interval lists pairwise.
fn common_pair(lhs: &[TimeInterval], rhs: &[TimeInterval]) -> Vec<TimeInterval> {
    let mut common = Vec::new();
    for a in lhs {
        for b in rhs {
            if let Some(overlap) = a.intersection(b) {
                common.push(overlap);
            }
        }
    }
    common
}

/// N-way common intersection: the times present in every supplied list.
pub fn common_intervals(lists: &[Vec<TimeInterval>]) -> Vec<TimeInterval> {
    let Some((first, rest)) = lists.split_first() else {
        return Vec::new();
    };

    rest.iter()
        .fold(first.clone(), |acc, list| common_pair(&acc, list))
}
