//! Time intervals and the raw splitter descriptions they are built from.

use crate::error::{Error, Result};
use crate::event::Timestamp;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Destination (output group) tag.
pub type Destination = i32;

/// Destination of events that no interval claims.
pub const EXCLUDED: Destination = -1;

/// Half-open time range `[start, stop)` tagged with a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeInterval {
    start: Timestamp,
    stop: Timestamp,
    destination: Destination,
}

impl TimeInterval {
    /// Creates an interval, rejecting empty or inverted ranges.
    pub fn new(start: Timestamp, stop: Timestamp, destination: Destination) -> Result<Self> {
        if start >= stop {
            return Err(Error::splitter(format!(
                "interval start {} is not before stop {}",
                start.0, stop.0
            )));
        }
        Ok(Self {
            start,
            stop,
            destination,
        })
    }

    /// Inclusive start.
    #[inline]
    #[must_use]
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Exclusive stop.
    #[inline]
    #[must_use]
    pub fn stop(&self) -> Timestamp {
        self.stop
    }

    /// Destination tag.
    #[inline]
    #[must_use]
    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// Returns true if `time` lies in `[start, stop)`.
    ///
    /// An interval unbounded above also holds `Timestamp::MAX`, where
    /// saturated event times land.
    #[inline]
    #[must_use]
    pub fn contains(&self, time: Timestamp) -> bool {
        self.start <= time && !self.ends_before(time)
    }

    /// Returns true if the interval is over by `time`.
    #[inline]
    #[must_use]
    pub fn ends_before(&self, time: Timestamp) -> bool {
        self.stop <= time && self.stop != Timestamp::MAX
    }

    /// Returns true if the two intervals share any instant.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    /// The same range moved by `ns`; unbounded ends stay unbounded.
    ///
    /// Fails if a finite bound would leave the finite range.
    pub fn shifted(&self, ns: i64) -> Result<Self> {
        match (self.start.checked_offset(ns), self.stop.checked_offset(ns)) {
            (Some(start), Some(stop)) => Ok(Self {
                start,
                stop,
                destination: self.destination,
            }),
            _ => Err(Error::splitter(format!(
                "shifting [{}, {}) by {ns} ns leaves the representable time range",
                self.start.0, self.stop.0
            ))),
        }
    }

    /// The part of this interval inside `[lower, upper)`, if any.
    #[must_use]
    pub fn clipped(&self, lower: Timestamp, upper: Timestamp) -> Option<Self> {
        let start = self.start.max(lower);
        let stop = self.stop.min(upper);
        (start < stop).then_some(Self {
            start,
            stop,
            destination: self.destination,
        })
    }

    pub(crate) fn with_stop(mut self, stop: Timestamp) -> Self {
        self.stop = stop;
        self
    }
}

/// One row of a two-column splitter table: the time a target becomes active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplitterRow {
    /// Time at which `target` starts.
    pub time: Timestamp,
    /// Destination active from `time` until the next row.
    pub target: Destination,
}

/// Raw splitter description, before normalization.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum SplitterSource {
    /// Explicit `(start, stop, destination)` triples.
    Intervals {
        /// Intervals in non-decreasing start order.
        intervals: Vec<TimeInterval>,
    },
    /// `(time, target)` rows; each row ends where the next begins.
    Table {
        /// Rows in non-decreasing time order.
        rows: Vec<SplitterRow>,
        /// Extend the last row to +inf instead of dropping it.
        #[cfg_attr(feature = "serde", serde(default))]
        open_ended_last: bool,
    },
    /// Dense boundaries with one group index per segment.
    Matrix {
        /// `N + 1` strictly increasing boundaries.
        boundaries: Vec<Timestamp>,
        /// `N` destinations, one per `[boundaries[k], boundaries[k + 1])`.
        groups: Vec<Destination>,
    },
}

impl SplitterSource {
    /// Returns true for the dense matrix representation.
    #[must_use]
    pub fn is_matrix(&self) -> bool {
        matches!(self, Self::Matrix { .. })
    }

    /// Expands the description into raw intervals.
    ///
    /// Negative destinations are kept here; normalization turns them into gaps.
    pub fn to_intervals(&self) -> Result<Vec<TimeInterval>> {
        match self {
            Self::Intervals { intervals } => {
                for iv in intervals {
                    if iv.start >= iv.stop {
                        return Err(Error::splitter(format!(
                            "interval start {} is not before stop {}",
                            iv.start.0, iv.stop.0
                        )));
                    }
                }
                Ok(intervals.clone())
            }
            Self::Table {
                rows,
                open_ended_last,
            } => table_to_intervals(rows, *open_ended_last),
            Self::Matrix { boundaries, groups } => matrix_to_intervals(boundaries, groups),
        }
    }
}

fn table_to_intervals(rows: &[SplitterRow], open_ended_last: bool) -> Result<Vec<TimeInterval>> {
    let mut intervals = Vec::with_capacity(rows.len());
    for (i, pair) in rows.windows(2).enumerate() {
        let (row, next) = (pair[0], pair[1]);
        if next.time < row.time {
            return Err(Error::splitter(format!(
                "splitter table time decreases at row {}: {} -> {}",
                i + 1,
                row.time.0,
                next.time.0
            )));
        }
        if next.time > row.time {
            intervals.push(TimeInterval::new(row.time, next.time, row.target)?);
        }
    }
    if open_ended_last {
        if let Some(last) = rows.last() {
            if last.time < Timestamp::MAX {
                intervals.push(TimeInterval::new(last.time, Timestamp::MAX, last.target)?);
            }
        }
    }
    Ok(intervals)
}

fn matrix_to_intervals(
    boundaries: &[Timestamp],
    groups: &[Destination],
) -> Result<Vec<TimeInterval>> {
    if groups.is_empty() && boundaries.len() <= 1 {
        return Ok(Vec::new());
    }
    if boundaries.len() != groups.len() + 1 {
        return Err(Error::splitter(format!(
            "matrix splitter needs {} boundaries for {} groups, got {}",
            groups.len() + 1,
            groups.len(),
            boundaries.len()
        )));
    }
    boundaries
        .windows(2)
        .zip(groups)
        .enumerate()
        .map(|(k, (edge, &group))| {
            if edge[1] <= edge[0] {
                return Err(Error::splitter(format!(
                    "matrix splitter boundaries not strictly increasing at index {}",
                    k + 1
                )));
            }
            TimeInterval::new(edge[0], edge[1], group)
        })
        .collect()
}

/// Normalizes raw intervals: drops negative destinations, rejects
/// decreasing starts and overlaps, merges abutting same-destination ranges.
pub fn normalize_intervals(raw: &[TimeInterval]) -> Result<Vec<TimeInterval>> {
    let mut out: Vec<TimeInterval> = Vec::with_capacity(raw.len());
    let mut prev_start = Timestamp::MIN;
    for (i, iv) in raw.iter().enumerate() {
        if iv.start < prev_start {
            return Err(Error::splitter(format!(
                "interval {i} starts at {} before the previous start {}",
                iv.start.0, prev_start.0
            )));
        }
        prev_start = iv.start;
        if iv.destination < 0 {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.overlaps(iv) => {
                return Err(Error::splitter(format!(
                    "interval {i} [{}, {}) -> {} overlaps [{}, {}) -> {}",
                    iv.start.0,
                    iv.stop.0,
                    iv.destination,
                    last.start.0,
                    last.stop.0,
                    last.destination
                )));
            }
            Some(last) if last.stop == iv.start && last.destination == iv.destination => {
                *last = last.with_stop(iv.stop);
            }
            _ => out.push(*iv),
        }
    }
    Ok(out)
}

/// Pretty output names keyed by destination.
pub type DestinationNames = BTreeMap<Destination, String>;

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: i64, stop: i64, dest: Destination) -> TimeInterval {
        TimeInterval::new(Timestamp(start), Timestamp(stop), dest).unwrap()
    }

    #[test]
    fn test_interval_rejects_empty_range() {
        assert!(TimeInterval::new(Timestamp(5), Timestamp(5), 0).is_err());
        assert!(TimeInterval::new(Timestamp(6), Timestamp(5), 0).is_err());
    }

    #[test]
    fn test_interval_stop_is_exclusive() {
        let i = iv(10, 20, 0);
        assert!(i.contains(Timestamp(10)));
        assert!(i.contains(Timestamp(19)));
        assert!(!i.contains(Timestamp(20)));
    }

    #[test]
    fn test_unbounded_interval_holds_max() {
        let open = TimeInterval::new(Timestamp(0), Timestamp::MAX, 0).unwrap();
        assert!(open.contains(Timestamp::MAX));
        assert!(!open.ends_before(Timestamp::MAX));
        assert!(!open.contains(Timestamp(-1)));

        let bounded = iv(0, i64::MAX - 1, 0);
        assert!(!bounded.contains(Timestamp::MAX));
        assert!(bounded.ends_before(Timestamp(i64::MAX - 1)));
    }

    #[test]
    fn test_shift_rejects_saturation() {
        let shifted = iv(10, 20, 3).shifted(-15).unwrap();
        assert_eq!(shifted, iv(-5, 5, 3));

        let open = TimeInterval::new(Timestamp::MIN, Timestamp(0), 0).unwrap();
        assert_eq!(open.shifted(100).unwrap().start(), Timestamp::MIN);

        let near_end = iv(i64::MAX - 20, i64::MAX - 10, 0);
        assert!(matches!(near_end.shifted(10), Err(Error::InvalidSplitter(_))));
        assert!(near_end.shifted(i64::MAX).is_err());
        assert!(near_end.shifted(9).is_ok());
    }

    #[test]
    fn test_table_pairs_rows() {
        let source = SplitterSource::Table {
            rows: vec![
                SplitterRow { time: Timestamp(0), target: 0 },
                SplitterRow { time: Timestamp(10), target: 1 },
                SplitterRow { time: Timestamp(10), target: 2 },
                SplitterRow { time: Timestamp(30), target: 3 },
            ],
            open_ended_last: false,
        };
        let intervals = source.to_intervals().unwrap();
        assert_eq!(intervals, vec![iv(0, 10, 0), iv(10, 30, 2)]);
    }

    #[test]
    fn test_table_open_ended_last() {
        let source = SplitterSource::Table {
            rows: vec![
                SplitterRow { time: Timestamp(0), target: 0 },
                SplitterRow { time: Timestamp(10), target: 1 },
            ],
            open_ended_last: true,
        };
        let intervals = source.to_intervals().unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[1].stop(), Timestamp::MAX);
        assert!(intervals[1].contains(Timestamp::MAX));
    }

    #[test]
    fn test_table_rejects_decreasing_time() {
        let source = SplitterSource::Table {
            rows: vec![
                SplitterRow { time: Timestamp(10), target: 0 },
                SplitterRow { time: Timestamp(5), target: 1 },
            ],
            open_ended_last: false,
        };
        assert!(matches!(source.to_intervals(), Err(Error::InvalidSplitter(_))));
    }

    #[test]
    fn test_matrix_length_mismatch() {
        let source = SplitterSource::Matrix {
            boundaries: vec![Timestamp(0), Timestamp(10)],
            groups: vec![0, 1],
        };
        assert!(source.to_intervals().is_err());
    }

    #[test]
    fn test_matrix_expands_segments() {
        let source = SplitterSource::Matrix {
            boundaries: vec![Timestamp(0), Timestamp(10), Timestamp(20)],
            groups: vec![1, -1],
        };
        assert_eq!(source.to_intervals().unwrap(), vec![iv(0, 10, 1), iv(10, 20, -1)]);
    }

    #[test]
    fn test_normalize_merges_and_drops_gaps() {
        let raw = vec![iv(0, 10, 0), iv(10, 20, 0), iv(20, 30, -1), iv(30, 40, 1)];
        let normalized = normalize_intervals(&raw).unwrap();
        assert_eq!(normalized, vec![iv(0, 20, 0), iv(30, 40, 1)]);
    }

    #[test]
    fn test_normalize_rejects_overlap() {
        let raw = vec![iv(0, 15, 0), iv(10, 20, 1)];
        assert!(matches!(normalize_intervals(&raw), Err(Error::InvalidSplitter(_))));
    }

    #[test]
    fn test_normalize_rejects_unsorted() {
        let raw = vec![iv(20, 30, 0), iv(0, 10, 1)];
        assert!(normalize_intervals(&raw).is_err());
    }
}
