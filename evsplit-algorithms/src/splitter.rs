//! Interval-indexed time splitter.
//!
//! A `TimeSplitter` holds normalized, sorted, non-overlapping intervals and
//! answers "which destination owns time t?" in O(log n). Every interval also
//! carries a dense slot index so callers can keep one bucket per destination
//! in a plain `Vec`.
//!
//! Stops are exclusive everywhere: a time equal to an interval's stop belongs
//! to the next interval (or to nobody), never to the one it ends. The one
//! exception is `Timestamp::MAX`, which an interval unbounded above owns.

use evsplit_core::error::{Error, Result};
use evsplit_core::interval::{normalize_intervals, DestinationNames};
use evsplit_core::{Destination, SplitterSource, TimeInterval, Timestamp, EXCLUDED};
use std::collections::BTreeSet;

/// Sorted, non-overlapping intervals with destination lookup.
#[derive(Debug, Clone, Default)]
pub struct TimeSplitter {
    intervals: Vec<TimeInterval>,
    starts: Vec<Timestamp>,
    slots: Vec<usize>,
    destinations: Vec<Destination>,
    names: DestinationNames,
    prefers_sweep: bool,
}

impl TimeSplitter {
    /// Builds a splitter from any raw description.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSplitter`] for inverted, unsorted or
    /// overlapping input.
    pub fn from_source(source: &SplitterSource) -> Result<Self> {
        let mut splitter = Self::from_intervals(&source.to_intervals()?)?;
        splitter.prefers_sweep = source.is_matrix();
        Ok(splitter)
    }

    /// Builds a splitter from raw intervals in non-decreasing start order.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSplitter`] for unsorted or overlapping input.
    pub fn from_intervals(raw: &[TimeInterval]) -> Result<Self> {
        let intervals = normalize_intervals(raw)?;
        let destinations: Vec<Destination> = intervals
            .iter()
            .map(TimeInterval::destination)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let slots = intervals
            .iter()
            .map(|iv| destinations.binary_search(&iv.destination()).unwrap_or(0))
            .collect();
        let starts = intervals.iter().map(TimeInterval::start).collect();
        Ok(Self {
            intervals,
            starts,
            slots,
            destinations,
            names: DestinationNames::new(),
            prefers_sweep: false,
        })
    }

    /// Attaches pretty names to destinations.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSplitter`] if a name is empty or used twice.
    pub fn with_names(mut self, names: DestinationNames) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for (dest, name) in &names {
            if name.trim().is_empty() {
                return Err(Error::splitter(format!("destination {dest} has an empty name")));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::splitter(format!(
                    "output name '{name}' is used by more than one destination"
                )));
            }
        }
        self.names = names;
        Ok(self)
    }

    /// Same splitter with every bound moved by `ns`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSplitter`] if a finite bound would leave
    /// the representable time range.
    pub fn shifted(&self, ns: i64) -> Result<Self> {
        let intervals = self
            .intervals
            .iter()
            .map(|iv| iv.shifted(ns))
            .collect::<Result<Vec<_>>>()?;
        let starts = intervals.iter().map(TimeInterval::start).collect();
        Ok(Self {
            intervals,
            starts,
            slots: self.slots.clone(),
            destinations: self.destinations.clone(),
            names: self.names.clone(),
            prefers_sweep: self.prefers_sweep,
        })
    }

    /// Number of normalized intervals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Returns true if no interval claims any time.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Normalized intervals in start order.
    #[must_use]
    pub fn intervals(&self) -> &[TimeInterval] {
        &self.intervals
    }

    /// Sorted destinations owning at least one interval.
    #[must_use]
    pub fn destinations_in_use(&self) -> &[Destination] {
        &self.destinations
    }

    /// Number of dense destination slots.
    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.destinations.len()
    }

    /// Dense slot of a destination.
    #[must_use]
    pub fn slot_of(&self, destination: Destination) -> Option<usize> {
        self.destinations.binary_search(&destination).ok()
    }

    /// Destination stored in a slot.
    #[must_use]
    pub fn destination_of_slot(&self, slot: usize) -> Destination {
        self.destinations.get(slot).copied().unwrap_or(EXCLUDED)
    }

    /// Pretty name of a destination, if one was attached.
    #[must_use]
    pub fn name_of(&self, destination: Destination) -> Option<&str> {
        self.names.get(&destination).map(String::as_str)
    }

    /// Whether the splitter came from a dense matrix description.
    #[must_use]
    pub fn prefers_sweep(&self) -> bool {
        self.prefers_sweep
    }

    /// Index of the interval containing `time`.
    #[inline]
    #[must_use]
    pub fn interval_index_at(&self, time: Timestamp) -> Option<usize> {
        let idx = self.starts.partition_point(|&start| start <= time);
        let candidate = idx.checked_sub(1)?;
        self.intervals[candidate]
            .contains(time)
            .then_some(candidate)
    }

    /// Slot of the destination owning `time`.
    #[inline]
    #[must_use]
    pub fn slot_at(&self, time: Timestamp) -> Option<usize> {
        self.interval_index_at(time).map(|i| self.slots[i])
    }

    /// Destination owning `time`, or [`EXCLUDED`].
    #[inline]
    #[must_use]
    pub fn destination_at(&self, time: Timestamp) -> Destination {
        self.interval_index_at(time)
            .map_or(EXCLUDED, |i| self.intervals[i].destination())
    }

    /// Intervals sharing any instant with `[start, stop)`.
    #[must_use]
    pub fn intervals_overlapping(&self, start: Timestamp, stop: Timestamp) -> &[TimeInterval] {
        let first = self.intervals.partition_point(|iv| iv.stop() <= start);
        let end = self.intervals.partition_point(|iv| iv.start() < stop);
        if first >= end {
            &[]
        } else {
            &self.intervals[first..end]
        }
    }

    /// Intervals assigned to `destination`, in start order.
    #[must_use]
    pub fn intervals_for(&self, destination: Destination) -> Vec<TimeInterval> {
        self.intervals
            .iter()
            .filter(|iv| iv.destination() == destination)
            .copied()
            .collect()
    }

    /// Earliest start and latest stop.
    #[must_use]
    pub fn span(&self) -> Option<(Timestamp, Timestamp)> {
        Some((
            self.intervals.first()?.start(),
            self.intervals.last()?.stop(),
        ))
    }

    /// Cursor for lookups with non-decreasing times.
    #[must_use]
    pub fn sweep(&self) -> SweepCursor<'_> {
        SweepCursor {
            splitter: self,
            pos: 0,
        }
    }
}

/// Forward-only lookup over a [`TimeSplitter`].
///
/// Times passed to [`SweepCursor::slot_at`] must not decrease.
#[derive(Debug)]
pub struct SweepCursor<'a> {
    splitter: &'a TimeSplitter,
    pos: usize,
}

impl SweepCursor<'_> {
    /// Slot owning `time`; amortized O(1) over a sorted sequence.
    #[inline]
    pub fn slot_at(&mut self, time: Timestamp) -> Option<usize> {
        let intervals = &self.splitter.intervals;
        while self.pos < intervals.len() && intervals[self.pos].ends_before(time) {
            self.pos += 1;
        }
        let iv = intervals.get(self.pos)?;
        (iv.start() <= time).then(|| self.splitter.slots[self.pos])
    }
}
