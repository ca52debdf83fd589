//! Per-spectrum event partitioning.
//!
//! # Code paths
//! Both paths first decide a destination slot for every event, then move the
//! events into per-slot buckets, so their results are identical:
//!
//! - **Binary search**: one `O(log n)` splitter lookup per event, works on
//!   unsorted input directly.
//! - **Sweep**: events are ordered by their split time and walked together
//!   with the intervals, `O(1)` amortized per event after the sort. This wins
//!   when the splitter has many short intervals (per-pulse filtering).
//!
//! With `stable_order` the sweep sorts an index permutation and buckets keep
//! input order; without it the event list itself is sorted and buckets come
//! out in time order.
//!
//! Every event ends up in exactly one place: a destination bucket, the
//! unfiltered bucket, or a counter (`excluded` / `skipped`).

use crate::correction::{SpectrumCorrection, TofCorrection};
use crate::splitter::TimeSplitter;
use evsplit_core::{Event, EventList, FilterConfig, PartitionStrategy, Timestamp};

/// Options that shape partitioning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionOptions {
    /// Split on pulse time alone.
    pub filter_by_pulse_time: bool,
    /// Keep excluded events instead of dropping them.
    pub keep_unfiltered: bool,
    /// Preserve input order inside buckets.
    pub stable_order: bool,
    /// Destination lookup code path.
    pub strategy: PartitionStrategy,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self {
            filter_by_pulse_time: false,
            keep_unfiltered: false,
            stable_order: true,
            strategy: PartitionStrategy::Auto,
        }
    }
}

impl From<&FilterConfig> for PartitionOptions {
    fn from(config: &FilterConfig) -> Self {
        Self {
            filter_by_pulse_time: config.filter_by_pulse_time,
            keep_unfiltered: config.output_unfiltered_events,
            stable_order: config.stable_order,
            strategy: config.strategy,
        }
    }
}

/// Partitioned events of one spectrum.
#[derive(Clone, Debug, Default)]
pub struct SpectrumPartition {
    /// The spectrum's mapping, without events.
    pub shell: EventList,
    /// One bucket per splitter slot.
    pub buckets: Vec<Vec<Event>>,
    /// Events outside every interval, when kept.
    pub unfiltered: Vec<Event>,
    /// Events outside every interval that were dropped.
    pub excluded: usize,
    /// Events of a skipped spectrum.
    pub skipped: usize,
    /// Events never looked at because the run was cancelled.
    pub unprocessed: usize,
    /// Why the spectrum was skipped.
    pub skip_reason: Option<String>,
}

impl SpectrumPartition {
    fn empty(shell: EventList, num_slots: usize) -> Self {
        Self {
            shell,
            buckets: vec![Vec::new(); num_slots],
            ..Self::default()
        }
    }

    /// Partition of a spectrum that was not processed because of cancellation.
    #[must_use]
    pub fn cancelled(spectrum: &EventList, num_slots: usize) -> Self {
        let mut partition = Self::empty(spectrum.shell(), num_slots);
        partition.unprocessed = spectrum.len();
        partition
    }

    /// Events placed in destination buckets.
    #[must_use]
    pub fn assigned(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Total events accounted for.
    #[must_use]
    pub fn accounted(&self) -> usize {
        self.assigned() + self.unfiltered.len() + self.excluded + self.skipped + self.unprocessed
    }

    #[inline]
    fn place(&mut self, event: Event, slot: Option<usize>, keep_unfiltered: bool) {
        match slot {
            Some(slot) => self.buckets[slot].push(event),
            None if keep_unfiltered => self.unfiltered.push(event),
            None => self.excluded += 1,
        }
    }
}

/// Splits event lists against a shared [`TimeSplitter`].
#[derive(Clone, Copy, Debug)]
pub struct EventPartitioner<'a> {
    splitter: &'a TimeSplitter,
    options: PartitionOptions,
}

impl<'a> EventPartitioner<'a> {
    /// Creates a partitioner.
    #[must_use]
    pub fn new(splitter: &'a TimeSplitter, options: PartitionOptions) -> Self {
        Self { splitter, options }
    }

    /// Options in use.
    #[must_use]
    pub fn options(&self) -> &PartitionOptions {
        &self.options
    }

    /// Code path used for a spectrum with `num_events` events.
    #[must_use]
    pub fn resolve_strategy(&self, num_events: usize) -> PartitionStrategy {
        match self.options.strategy {
            PartitionStrategy::Auto
                if self.splitter.prefers_sweep() || self.splitter.len() > num_events =>
            {
                PartitionStrategy::Sweep
            }
            PartitionStrategy::Auto => PartitionStrategy::BinarySearch,
            explicit => explicit,
        }
    }

    /// Moves every event of `spectrum` into its destination bucket.
    pub fn partition(
        &self,
        mut spectrum: EventList,
        correction: &SpectrumCorrection,
    ) -> SpectrumPartition {
        let mut out = SpectrumPartition::empty(spectrum.shell(), self.splitter.num_slots());

        let tof = match correction {
            _ if self.options.filter_by_pulse_time => TofCorrection::IDENTITY,
            SpectrumCorrection::Corrected(c) => *c,
            SpectrumCorrection::Bypassed { .. } => TofCorrection::IDENTITY,
            SpectrumCorrection::Missing { reason } => {
                out.skipped = spectrum.len();
                out.skip_reason = Some(reason.clone());
                return out;
            }
        };

        if spectrum.is_empty() || self.splitter.is_empty() {
            let events = spectrum.take_events();
            for event in events {
                out.place(event, None, self.options.keep_unfiltered);
            }
            return out;
        }

        match self.resolve_strategy(spectrum.len()) {
            PartitionStrategy::Sweep if self.options.stable_order => {
                self.sweep_stable(spectrum.take_events(), tof, &mut out);
            }
            PartitionStrategy::Sweep => self.sweep_sorted(spectrum, tof, &mut out),
            PartitionStrategy::BinarySearch | PartitionStrategy::Auto => {
                self.binary_search(spectrum.take_events(), tof, &mut out);
            }
        }
        out
    }

    #[inline]
    fn split_time(&self, event: &Event, tof: TofCorrection) -> Timestamp {
        if self.options.filter_by_pulse_time {
            event.pulse_time
        } else {
            event.full_time(tof.factor, tof.shift)
        }
    }

    fn binary_search(&self, events: Vec<Event>, tof: TofCorrection, out: &mut SpectrumPartition) {
        let keep = self.options.keep_unfiltered;
        for event in events {
            let slot = self.splitter.slot_at(self.split_time(&event, tof));
            out.place(event, slot, keep);
        }
    }

    fn sweep_stable(&self, events: Vec<Event>, tof: TofCorrection, out: &mut SpectrumPartition) {
        let mut order: Vec<(Timestamp, usize)> = events
            .iter()
            .enumerate()
            .map(|(i, e)| (self.split_time(e, tof), i))
            .collect();
        order.sort_unstable();

        let mut slots = vec![None; events.len()];
        let mut cursor = self.splitter.sweep();
        for (time, index) in order {
            slots[index] = cursor.slot_at(time);
        }

        let keep = self.options.keep_unfiltered;
        for (event, slot) in events.into_iter().zip(slots) {
            out.place(event, slot, keep);
        }
    }

    fn sweep_sorted(
        &self,
        mut spectrum: EventList,
        tof: TofCorrection,
        out: &mut SpectrumPartition,
    ) {
        if self.options.filter_by_pulse_time {
            spectrum.sort_by_pulse_time();
        } else {
            spectrum.sort_by_full_time(tof.factor, tof.shift);
        }

        let keep = self.options.keep_unfiltered;
        let mut cursor = self.splitter.sweep();
        for event in spectrum.take_events() {
            let slot = cursor.slot_at(self.split_time(&event, tof));
            out.place(event, slot, keep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evsplit_core::{Destination, TimeInterval};

    fn iv(start: i64, stop: i64, dest: Destination) -> TimeInterval {
        TimeInterval::new(Timestamp(start), Timestamp(stop), dest).unwrap()
    }

    fn spectrum(pulse_times: &[i64]) -> EventList {
        EventList::new(1, vec![1]).with_events(
            pulse_times
                .iter()
                .enumerate()
                .map(|(i, &t)| Event::new(1, Timestamp(t), f64::from(u32::try_from(i).unwrap())))
                .collect(),
        )
    }

    fn identity() -> SpectrumCorrection {
        SpectrumCorrection::Corrected(TofCorrection::IDENTITY)
    }

    fn pulse_only(strategy: PartitionStrategy, stable: bool) -> PartitionOptions {
        PartitionOptions {
            filter_by_pulse_time: true,
            strategy,
            stable_order: stable,
            ..PartitionOptions::default()
        }
    }

    fn pulse_times(events: &[Event]) -> Vec<i64> {
        events.iter().map(|e| e.pulse_time.0).collect()
    }

    #[test]
    fn test_all_strategies_agree() {
        let splitter =
            TimeSplitter::from_intervals(&[iv(0, 10, 0), iv(10, 20, 1), iv(20, 30, 0)]).unwrap();
        let input = [35, 5, 25, 15, 20, 10, -1, 0];

        let reference = EventPartitioner::new(
            &splitter,
            pulse_only(PartitionStrategy::BinarySearch, true),
        )
        .partition(spectrum(&input), &identity());
        assert_eq!(pulse_times(&reference.buckets[0]), vec![5, 25, 20, 0]);
        assert_eq!(pulse_times(&reference.buckets[1]), vec![15, 10]);
        assert_eq!(reference.excluded, 2);

        let stable_sweep =
            EventPartitioner::new(&splitter, pulse_only(PartitionStrategy::Sweep, true))
                .partition(spectrum(&input), &identity());
        assert_eq!(stable_sweep.buckets, reference.buckets);

        let sorted_sweep =
            EventPartitioner::new(&splitter, pulse_only(PartitionStrategy::Sweep, false))
                .partition(spectrum(&input), &identity());
        assert_eq!(pulse_times(&sorted_sweep.buckets[0]), vec![0, 5, 20, 25]);
        assert_eq!(pulse_times(&sorted_sweep.buckets[1]), vec![10, 15]);
        assert_eq!(sorted_sweep.excluded, 2);
    }

    #[test]
    fn test_tof_correction_applied() {
        // pulse 0, tof 15us -> 15_000 ns; with factor 0.5 -> 7_500 ns
        let splitter =
            TimeSplitter::from_intervals(&[iv(0, 10_000, 0), iv(10_000, 20_000, 1)]).unwrap();
        let list = EventList::new(1, vec![1]).with_events(vec![Event::new(1, Timestamp(0), 15.0)]);
        let partitioner = EventPartitioner::new(&splitter, PartitionOptions::default());

        let raw = partitioner.partition(list.clone(), &identity());
        assert_eq!(raw.buckets[1].len(), 1);

        let halved = SpectrumCorrection::Corrected(TofCorrection::new(0.5, 0.0));
        let corrected = partitioner.partition(list, &halved);
        assert_eq!(corrected.buckets[0].len(), 1);
    }

    #[test]
    fn test_unfiltered_bucket_keeps_excluded() {
        let splitter = TimeSplitter::from_intervals(&[iv(0, 10, 0), iv(20, 30, 1)]).unwrap();
        let options = PartitionOptions {
            keep_unfiltered: true,
            ..pulse_only(PartitionStrategy::BinarySearch, true)
        };
        let out = EventPartitioner::new(&splitter, options)
            .partition(spectrum(&[5, 15, 25]), &identity());
        assert_eq!(out.excluded, 0);
        assert_eq!(pulse_times(&out.unfiltered), vec![15]);
        assert_eq!(out.accounted(), 3);
    }

    #[test]
    fn test_missing_correction_skips_spectrum() {
        let splitter = TimeSplitter::from_intervals(&[iv(0, 100, 0)]).unwrap();
        let missing = SpectrumCorrection::Missing {
            reason: "detector 1 is a monitor".to_string(),
        };
        let out = EventPartitioner::new(&splitter, PartitionOptions::default())
            .partition(spectrum(&[1, 2, 3]), &missing);
        assert_eq!(out.skipped, 3);
        assert_eq!(out.assigned(), 0);
        assert_eq!(out.skip_reason.as_deref(), Some("detector 1 is a monitor"));
        assert_eq!(out.shell.detector_ids, vec![1]);
        assert_eq!(out.buckets.len(), 1);
    }

    #[test]
    fn test_pulse_time_mode_ignores_missing_correction() {
        let splitter = TimeSplitter::from_intervals(&[iv(0, 100, 0)]).unwrap();
        let missing = SpectrumCorrection::Missing {
            reason: "no detectors".to_string(),
        };
        let out = EventPartitioner::new(&splitter, pulse_only(PartitionStrategy::Auto, true))
            .partition(spectrum(&[1, 2]), &missing);
        assert_eq!(out.assigned(), 2);
        assert!(out.skip_reason.is_none());
    }

    #[test]
    fn test_empty_spectrum_gives_empty_buckets() {
        let splitter = TimeSplitter::from_intervals(&[iv(0, 10, 0), iv(10, 20, 3)]).unwrap();
        let out = EventPartitioner::new(&splitter, PartitionOptions::default())
            .partition(EventList::new(9, vec![4]), &identity());
        assert_eq!(out.buckets.len(), 2);
        assert!(out.buckets.iter().all(Vec::is_empty));
        assert_eq!(out.accounted(), 0);
    }

    #[test]
    fn test_auto_strategy_selection() {
        let splitter = TimeSplitter::from_intervals(&[iv(0, 10, 0), iv(10, 20, 1)]).unwrap();
        let partitioner = EventPartitioner::new(&splitter, PartitionOptions::default());
        assert_eq!(partitioner.resolve_strategy(100), PartitionStrategy::BinarySearch);
        assert_eq!(partitioner.resolve_strategy(1), PartitionStrategy::Sweep);
    }
}
