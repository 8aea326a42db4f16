//! Interval algebra over half-open UTC time ranges.
//!
//! Pure set operations used by the availability projector: pairwise
//! intersection and sequential subtraction. Zero- and negative-length ranges
//! are dropped rather than rejected, so malformed windows yield empty results
//! instead of errors.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether the range contains no time at all.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Two ranges overlap iff `a.start < b.end && b.start < a.end`; ranges
    /// that merely touch do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether the range fully contains `[start, end]`, endpoints included.
    pub fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start <= start && self.end >= end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Intersect two sets of ranges pairwise.
///
/// For every pair `(b, o)` the overlap `[max(b.start, o.start),
/// min(b.end, o.end))` is emitted iff it is non-empty. The output is not
/// merged or deduplicated -- downstream consumers must tolerate overlapping
/// ranges.
///
/// # Examples
///
/// ```
/// use bookable_core::interval::{intersect, TimeRange};
///
/// let base = vec![TimeRange::new(
///     "2024-01-01T09:00:00Z".parse().unwrap(),
///     "2024-01-01T17:00:00Z".parse().unwrap(),
/// )];
/// let overlay = vec![TimeRange::new(
///     "2024-01-01T12:00:00Z".parse().unwrap(),
///     "2024-01-01T20:00:00Z".parse().unwrap(),
/// )];
///
/// let out = intersect(&base, &overlay);
/// assert_eq!(out.len(), 1);
/// assert_eq!(out[0].start, "2024-01-01T12:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap());
/// assert_eq!(out[0].end, "2024-01-01T17:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap());
/// ```
pub fn intersect(base: &[TimeRange], overlays: &[TimeRange]) -> Vec<TimeRange> {
    let mut result = Vec::new();

    for b in base {
        for o in overlays {
            let start = b.start.max(o.start);
            let end = b.end.min(o.end);

            if start < end {
                result.push(TimeRange { start, end });
            }
        }
    }

    result
}

/// Subtract blocker ranges from a set of base ranges.
///
/// Each blocker is applied sequentially against the accumulated result: a
/// full miss keeps the range unchanged, a full cover drops it, and a partial
/// overlap splits it into the left and/or right remainder, keeping only
/// non-empty pieces. Sequential application is deliberate -- self-overlapping
/// blockers are safe because later blockers only narrow further.
pub fn subtract(base: &[TimeRange], blockers: &[TimeRange]) -> Vec<TimeRange> {
    let mut result: Vec<TimeRange> = base.to_vec();

    for block in blockers {
        let mut remaining = Vec::with_capacity(result.len());

        for range in &result {
            // No overlap
            if block.end <= range.start || block.start >= range.end {
                remaining.push(*range);
                continue;
            }

            // Left remainder
            if block.start > range.start {
                remaining.push(TimeRange {
                    start: range.start,
                    end: block.start,
                });
            }

            // Right remainder
            if block.end < range.end {
                remaining.push(TimeRange {
                    start: block.end,
                    end: range.end,
                });
            }
        }

        result = remaining;
    }

    result
}
