//! The `FilterEvents` orchestrator.
//!
//! A run moves through [`RunState`]s in order:
//!
//! ```text
//! Uninitialized -> PropertiesValidated -> SplitterBuilt -> CorrectionsBuilt
//!               -> Partitioning -> Aggregating -> Done
//! ```
//!
//! Any error moves the run to `Failed`; a cancellation observed during
//! partitioning ends it in `Cancelled`. The splitter and the correction table
//! are built once and shared read-only by every worker, and each worker owns
//! the spectrum it partitions.

use crate::aggregate::{AggregatorOptions, OutputAggregator, OutputSet};
use crate::correction::{
    CorrectionTable, SpectrumCorrection, TofCorrection, TofCorrectionCalculator,
};
use crate::partition::{EventPartitioner, PartitionOptions, SpectrumPartition};
use crate::progress::{CancelFlag, Progress};
use crate::splitter::TimeSplitter;
use evsplit_core::error::{Error, Result};
use evsplit_core::{
    Destination, DestinationNames, EventList, EventWorkspace, FilterConfig, RunMetadata,
    SplitterSource,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Stage of a filter run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing checked yet.
    Uninitialized,
    /// Configuration checked.
    PropertiesValidated,
    /// Splitter normalized and ready for queries.
    SplitterBuilt,
    /// Per-spectrum corrections resolved.
    CorrectionsBuilt,
    /// Spectra being partitioned.
    Partitioning,
    /// Outputs being assembled.
    Aggregating,
    /// Outputs returned.
    Done,
    /// Stopped on request during partitioning.
    Cancelled,
    /// Stopped on an error.
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::PropertiesValidated => "properties validated",
            Self::SplitterBuilt => "splitter built",
            Self::CorrectionsBuilt => "corrections built",
            Self::Partitioning => "partitioning",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A spectrum whose correction could not be computed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SkipRecord {
    /// Position in the input workspace.
    pub spectrum_index: usize,
    /// Spectrum number from the input.
    pub spectrum_number: i32,
    /// Why the correction is missing.
    pub reason: String,
}

/// Event accounting for a run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FilterSummary {
    /// Events in the input.
    pub total_events: usize,
    /// Events routed to each destination in use.
    pub per_destination: BTreeMap<Destination, usize>,
    /// Events outside every interval that were dropped.
    pub excluded: usize,
    /// Events outside every interval kept in the unfiltered output.
    pub unfiltered: usize,
    /// Events of spectra skipped for missing corrections.
    pub skipped_events: usize,
    /// Events not looked at because the run was cancelled.
    pub unprocessed: usize,
    /// Spectra fully partitioned.
    pub spectra_processed: usize,
    /// Spectra skipped for missing corrections.
    pub skipped: Vec<SkipRecord>,
    /// Spectra split with the identity because their correction is missing.
    pub bypassed: Vec<SkipRecord>,
    /// Whether the run was cancelled.
    pub cancelled: bool,
}

impl FilterSummary {
    fn collect(
        splitter: &TimeSplitter,
        corrections: &CorrectionTable,
        partitions: &[SpectrumPartition],
        total_events: usize,
        cancelled: bool,
    ) -> Self {
        let mut summary = Self {
            total_events,
            per_destination: splitter
                .destinations_in_use()
                .iter()
                .map(|&d| (d, 0))
                .collect(),
            cancelled,
            ..Self::default()
        };
        for (index, partition) in partitions.iter().enumerate() {
            for (slot, bucket) in partition.buckets.iter().enumerate() {
                *summary
                    .per_destination
                    .entry(splitter.destination_of_slot(slot))
                    .or_default() += bucket.len();
            }
            summary.excluded += partition.excluded;
            summary.unfiltered += partition.unfiltered.len();
            summary.skipped_events += partition.skipped;
            summary.unprocessed += partition.unprocessed;

            let spectrum_number = partition.shell.spectrum_number;
            if let Some(reason) = &partition.skip_reason {
                summary.skipped.push(SkipRecord {
                    spectrum_index: index,
                    spectrum_number,
                    reason: reason.clone(),
                });
            } else if partition.unprocessed == 0 {
                summary.spectra_processed += 1;
                if let Some(SpectrumCorrection::Bypassed { reason }) = corrections.get(index) {
                    summary.bypassed.push(SkipRecord {
                        spectrum_index: index,
                        spectrum_number,
                        reason: reason.clone(),
                    });
                }
            }
        }
        summary
    }

    /// Events placed in destination outputs.
    #[must_use]
    pub fn assigned(&self) -> usize {
        self.per_destination.values().sum()
    }

    /// Events that reached no output.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.excluded + self.skipped_events
    }

    /// Events found in outputs, drop counters or the unprocessed count.
    #[must_use]
    pub fn accounted(&self) -> usize {
        self.assigned() + self.unfiltered + self.dropped() + self.unprocessed
    }

    /// Returns true if every input event is accounted for exactly once.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.accounted() == self.total_events
    }
}

/// Outputs of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    /// Output containers.
    pub outputs: OutputSet,
    /// Event accounting.
    pub summary: FilterSummary,
    /// Correction used for each input spectrum.
    pub corrections: CorrectionTable,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// All spectra were partitioned.
    Completed(FilterResult),
    /// Cancellation was requested; partial work was discarded.
    Cancelled(FilterSummary),
}

impl FilterOutcome {
    /// The run's summary.
    #[must_use]
    pub fn summary(&self) -> &FilterSummary {
        match self {
            Self::Completed(result) => &result.summary,
            Self::Cancelled(summary) => summary,
        }
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The result of a completed run.
    #[must_use]
    pub fn completed(self) -> Option<FilterResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Cancelled(_) => None,
        }
    }
}

/// Read-only tables shared by every partitioning worker.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Splitter in absolute time.
    pub splitter: TimeSplitter,
    /// Correction per input spectrum.
    pub corrections: CorrectionTable,
}

/// Splits an event workspace into one output per destination.
#[derive(Debug, Clone)]
pub struct FilterEvents {
    config: FilterConfig,
    state: RunState,
    cancel: CancelFlag,
    progress: Progress,
}

impl FilterEvents {
    /// Creates an orchestrator for `config`.
    #[must_use]
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            state: RunState::Uninitialized,
            cancel: CancelFlag::new(),
            progress: Progress::new(),
        }
    }

    /// Uses an externally owned cancellation flag.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Uses an externally owned progress counter.
    #[must_use]
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Current stage.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Flag that cancels the run when set.
    #[must_use]
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Per-spectrum progress.
    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    fn transition(&mut self, next: RunState) {
        debug!("FilterEvents: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Runs the whole pipeline on `workspace`.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`], [`Error::InvalidSplitter`],
    /// [`Error::InvalidCorrection`] or [`Error::MissingCorrectionData`]
    /// before any spectrum is partitioned. The state is left at
    /// [`RunState::Failed`].
    pub fn execute(
        &mut self,
        workspace: EventWorkspace,
        source: &SplitterSource,
        names: DestinationNames,
    ) -> Result<FilterOutcome> {
        self.state = RunState::Uninitialized;
        let outcome = self.run(workspace, source, names);
        if let Err(e) = &outcome {
            warn!("FilterEvents failed in state '{}': {e}", self.state);
            self.transition(RunState::Failed);
        }
        outcome
    }

    fn run(
        &mut self,
        workspace: EventWorkspace,
        source: &SplitterSource,
        names: DestinationNames,
    ) -> Result<FilterOutcome> {
        let RunContext {
            splitter,
            corrections,
        } = self.build_context(&workspace, source, names)?;
        let aggregator = OutputAggregator::new(&splitter, AggregatorOptions::from(&self.config));

        let total_events = workspace.event_count();
        let EventWorkspace { metadata, spectra } = workspace;
        self.transition(RunState::Partitioning);
        let (partitions, cancelled) = self.partition_all(&splitter, &corrections, spectra);

        let summary =
            FilterSummary::collect(&splitter, &corrections, &partitions, total_events, cancelled);
        if !summary.is_complete() {
            warn!(
                "FilterEvents accounted for {} of {} input events",
                summary.accounted(),
                total_events
            );
        }
        for record in &summary.skipped {
            warn!(
                "Spectrum {} (index {}) skipped: {}",
                record.spectrum_number, record.spectrum_index, record.reason
            );
        }
        if cancelled {
            info!(
                "FilterEvents cancelled after {} of {} spectra",
                summary.spectra_processed + summary.skipped.len(),
                partitions.len()
            );
            self.transition(RunState::Cancelled);
            return Ok(FilterOutcome::Cancelled(summary));
        }

        self.transition(RunState::Aggregating);
        let outputs = aggregator.aggregate(&metadata, partitions);
        info!(
            "FilterEvents: {} events into {} outputs ({} assigned, {} unfiltered, {} dropped)",
            summary.total_events,
            outputs.len(),
            summary.assigned(),
            summary.unfiltered,
            summary.dropped()
        );
        self.transition(RunState::Done);

        Ok(FilterOutcome::Completed(FilterResult {
            outputs,
            summary,
            corrections,
        }))
    }

    fn build_context(
        &mut self,
        workspace: &EventWorkspace,
        source: &SplitterSource,
        names: DestinationNames,
    ) -> Result<RunContext> {
        self.config.validate()?;
        self.transition(RunState::PropertiesValidated);

        let splitter = self.build_splitter(&workspace.metadata, source, names)?;
        OutputAggregator::new(&splitter, AggregatorOptions::from(&self.config)).output_names()?;
        self.transition(RunState::SplitterBuilt);

        let corrections = self.build_corrections(workspace)?;
        self.transition(RunState::CorrectionsBuilt);
        Ok(RunContext {
            splitter,
            corrections,
        })
    }

    fn build_splitter(
        &self,
        metadata: &RunMetadata,
        source: &SplitterSource,
        names: DestinationNames,
    ) -> Result<TimeSplitter> {
        let mut splitter = TimeSplitter::from_source(source)?.with_names(names)?;
        if self.config.relative_time {
            let start = metadata.run_start.ok_or_else(|| {
                Error::config("relative splitter times need a run start")
            })?;
            splitter = splitter.shifted(start.as_nanos())?;
        }

        if splitter.is_empty() {
            warn!("Splitter has no intervals; every event will be excluded");
        } else if let (Some(run_start), Some((_, last_stop))) =
            (metadata.run_start, splitter.span())
        {
            if last_stop <= run_start {
                warn!(
                    "Every splitter interval ends before the run start ({} ns); \
                     the splitter may be relative to the run start",
                    run_start.as_nanos()
                );
            }
        }
        debug!(
            "Splitter: {} intervals, destinations {:?}",
            splitter.len(),
            splitter.destinations_in_use()
        );
        Ok(splitter)
    }

    fn build_corrections(&self, workspace: &EventWorkspace) -> Result<CorrectionTable> {
        if self.config.filter_by_pulse_time {
            return Ok(CorrectionTable::identity(workspace.num_spectra()));
        }
        let calculator = TofCorrectionCalculator::new(&self.config, &workspace.metadata)?;
        let table = calculator.build_table(&workspace.spectra, self.config.missing_detector)?;
        if calculator.policy().needs_detector_data()
            && !table.is_empty()
            && table
                .entries()
                .iter()
                .all(|c| !matches!(c, SpectrumCorrection::Corrected(_)))
        {
            warn!(
                "No spectrum has {:?} correction data",
                calculator.policy()
            );
        }
        Ok(table)
    }

    fn partition_all(
        &self,
        splitter: &TimeSplitter,
        corrections: &CorrectionTable,
        spectra: Vec<EventList>,
    ) -> (Vec<SpectrumPartition>, bool) {
        let partitioner = EventPartitioner::new(splitter, PartitionOptions::from(&self.config));
        let num_slots = splitter.num_slots();
        let cancel = &self.cancel;
        let progress = &self.progress;
        progress.reset(spectra.len());

        let work = |(index, spectrum): (usize, EventList)| {
            if cancel.is_cancelled() {
                return SpectrumPartition::cancelled(&spectrum, num_slots);
            }
            let partition = match corrections.get(index) {
                Some(correction) => partitioner.partition(spectrum, correction),
                None => partitioner.partition(
                    spectrum,
                    &SpectrumCorrection::Corrected(TofCorrection::IDENTITY),
                ),
            };
            progress.increment();
            partition
        };

        let partitions: Vec<SpectrumPartition> = if self.config.parallel {
            spectra.into_par_iter().enumerate().map(&work).collect()
        } else {
            spectra.into_iter().enumerate().map(&work).collect()
        };
        let cancelled = partitions.iter().any(|p| p.unprocessed > 0) || cancel.is_cancelled();
        (partitions, cancelled)
    }

    /// Builds the shared tables without partitioning anything.
    ///
    /// # Errors
    /// Same as the validation stages of [`FilterEvents::execute`].
    pub fn prepare(
        &mut self,
        workspace: &EventWorkspace,
        source: &SplitterSource,
        names: DestinationNames,
    ) -> Result<RunContext> {
        self.state = RunState::Uninitialized;
        let context = self.build_context(workspace, source, names);
        if context.is_err() {
            self.transition(RunState::Failed);
        }
        context
    }
}

/// Runs [`FilterEvents`] once with `config`.
///
/// # Errors
/// See [`FilterEvents::execute`].
pub fn filter_events(
    workspace: EventWorkspace,
    source: &SplitterSource,
    config: FilterConfig,
) -> Result<FilterOutcome> {
    FilterEvents::new(config).execute(workspace, source, DestinationNames::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::OutputWorkspace;
    use evsplit_core::{
        CorrectionPolicy, DetectorGeometry, Event, Instrument, MissingDetectorPolicy, Timestamp,
        TimeInterval,
    };

    fn iv(start: i64, stop: i64, dest: Destination) -> TimeInterval {
        TimeInterval::new(Timestamp(start), Timestamp(stop), dest).unwrap()
    }

    fn workspace(metadata: RunMetadata) -> EventWorkspace {
        let mut ws = EventWorkspace::new(metadata);
        for spec in 1..=3 {
            ws = ws.with_spectrum(EventList::new(spec, vec![spec]).with_events(
                [5, 15, 25, 35]
                    .iter()
                    .map(|&t| Event::new(spec, Timestamp(t), 0.0))
                    .collect(),
            ));
        }
        ws
    }

    fn scenario() -> SplitterSource {
        SplitterSource::Intervals {
            intervals: vec![iv(0, 10, 0), iv(10, 20, 1), iv(20, 30, 0)],
        }
    }

    #[test]
    fn test_execute_reaches_done() {
        let mut filter = FilterEvents::new(FilterConfig::new().with_parallel(false));
        let outcome = filter
            .execute(workspace(RunMetadata::default()), &scenario(), DestinationNames::new())
            .unwrap();
        assert_eq!(filter.state(), RunState::Done);
        assert_eq!(filter.progress().done(), 3);

        let result = outcome.completed().unwrap();
        assert_eq!(result.summary.per_destination[&0], 6);
        assert_eq!(result.summary.per_destination[&1], 3);
        assert_eq!(result.summary.excluded, 3);
        assert!(result.summary.is_complete());
        assert_eq!(result.outputs.len(), 2);
    }

    #[test]
    fn test_invalid_splitter_fails_before_partitioning() {
        let mut filter = FilterEvents::new(FilterConfig::new());
        let source = SplitterSource::Intervals {
            intervals: vec![iv(0, 20, 0), iv(10, 30, 1)],
        };
        let err = filter
            .execute(workspace(RunMetadata::default()), &source, DestinationNames::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSplitter(_)));
        assert_eq!(filter.state(), RunState::Failed);
        assert_eq!(filter.progress().done(), 0);
    }

    #[test]
    fn test_cancel_before_run_returns_cancelled() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut filter = FilterEvents::new(FilterConfig::new()).with_cancel_flag(cancel);
        let outcome = filter
            .execute(workspace(RunMetadata::default()), &scenario(), DestinationNames::new())
            .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(filter.state(), RunState::Cancelled);
        let summary = outcome.summary();
        assert_eq!(summary.unprocessed, 12);
        assert!(summary.is_complete());
    }

    #[test]
    fn test_cancel_between_spectra() {
        let cancel = CancelFlag::new();
        let flag = cancel.clone();
        let progress = Progress::with_callback(move |done, _| {
            if done == 1 {
                flag.cancel();
            }
        });
        let mut filter = FilterEvents::new(FilterConfig::new().with_parallel(false))
            .with_cancel_flag(cancel)
            .with_progress(progress);
        let outcome = filter
            .execute(workspace(RunMetadata::default()), &scenario(), DestinationNames::new())
            .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(filter.state(), RunState::Cancelled);
        assert_eq!(filter.progress().done(), 1);

        let summary = outcome.summary();
        assert!(summary.cancelled);
        assert_eq!(summary.spectra_processed, 1);
        assert_eq!(summary.total_events, 12);
        assert_eq!(summary.unprocessed, 8);
        // Spectrum 1 was split before the flag was seen.
        assert_eq!(summary.per_destination[&0], 2);
        assert_eq!(summary.per_destination[&1], 1);
        assert_eq!(summary.excluded, 1);
        assert!(summary.is_complete());
    }

    #[test]
    fn test_summary_total_comes_from_input() {
        let splitter = TimeSplitter::from_intervals(&[iv(0, 10, 0)]).unwrap();
        let partition = SpectrumPartition {
            shell: EventList::new(1, vec![1]),
            buckets: vec![vec![Event::new(1, Timestamp(5), 0.0)]],
            ..SpectrumPartition::default()
        };
        let corrections = CorrectionTable::identity(1);
        let lossy = FilterSummary::collect(&splitter, &corrections, &[partition.clone()], 2, false);
        assert_eq!(lossy.total_events, 2);
        assert_eq!(lossy.accounted(), 1);
        assert!(!lossy.is_complete());

        let exact = FilterSummary::collect(&splitter, &corrections, &[partition], 1, false);
        assert!(exact.is_complete());
    }

    #[test]
    fn test_summary_matches_bucket_sizes() {
        let ws = workspace(RunMetadata::default());
        let input = ws.event_count();
        let config = FilterConfig::new()
            .with_parallel(false)
            .with_output_unfiltered_events(true);
        let result = filter_events(ws, &scenario(), config)
            .unwrap()
            .completed()
            .unwrap();
        let in_outputs: usize = result
            .outputs
            .members()
            .iter()
            .map(OutputWorkspace::event_count)
            .sum();
        assert_eq!(result.summary.total_events, input);
        assert_eq!(in_outputs + result.summary.dropped(), input);
        assert!(result.summary.is_complete());
    }

    #[test]
    fn test_relative_time_needs_run_start() {
        let config = FilterConfig::new().with_relative_time(true);
        let err =
            filter_events(workspace(RunMetadata::default()), &scenario(), config).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let metadata = RunMetadata::default().with_run_window(Timestamp(-10), Timestamp(100));
        let config = FilterConfig::new().with_relative_time(true);
        let result = filter_events(workspace(metadata), &scenario(), config)
            .unwrap()
            .completed()
            .unwrap();
        // Shifted splitter: [-10,0)->0, [0,10)->1, [10,20)->0
        assert_eq!(result.summary.per_destination[&1], 3);
        assert_eq!(result.summary.per_destination[&0], 3);
        assert_eq!(result.summary.excluded, 6);
    }

    #[test]
    fn test_skip_records_for_missing_geometry() {
        let instrument =
            Instrument::new("test", 10.0).with_detector(DetectorGeometry::new(1, 2.0, 0.5));
        let config = FilterConfig::new()
            .with_correction(CorrectionPolicy::Elastic)
            .with_parallel(false);
        let result = filter_events(workspace(RunMetadata::new(instrument)), &scenario(), config)
            .unwrap()
            .completed()
            .unwrap();
        let summary = &result.summary;
        assert_eq!(summary.skipped.len(), 2);
        assert_eq!(summary.skipped[0].spectrum_number, 2);
        assert_eq!(summary.skipped_events, 8);
        assert_eq!(summary.spectra_processed, 1);
        assert!(summary.is_complete());
        // Skipped spectra stay in every output without events.
        for output in result.outputs.members() {
            assert_eq!(output.workspace.num_spectra(), 3);
        }
    }

    #[test]
    fn test_bypass_splits_with_identity() {
        let instrument =
            Instrument::new("test", 10.0).with_detector(DetectorGeometry::new(1, 2.0, 0.5));
        let config = FilterConfig::new()
            .with_correction(CorrectionPolicy::Elastic)
            .with_missing_detector(MissingDetectorPolicy::Bypass)
            .with_parallel(false);
        let result = filter_events(workspace(RunMetadata::new(instrument)), &scenario(), config)
            .unwrap()
            .completed()
            .unwrap();
        let summary = &result.summary;
        assert!(summary.skipped.is_empty());
        assert_eq!(summary.skipped_events, 0);
        assert_eq!(summary.spectra_processed, 3);
        let bypassed: Vec<i32> = summary.bypassed.iter().map(|r| r.spectrum_number).collect();
        assert_eq!(bypassed, vec![2, 3]);
        assert_eq!(summary.bypassed[0].spectrum_index, 1);
        assert!(!summary.bypassed[0].reason.is_empty());
        assert!(matches!(
            result.corrections.get(1),
            Some(SpectrumCorrection::Bypassed { .. })
        ));

        // Zero TOF keeps every split time at the pulse time.
        assert_eq!(summary.per_destination[&0], 6);
        assert_eq!(summary.per_destination[&1], 3);
        assert_eq!(summary.excluded, 3);
        assert!(summary.is_complete());
        let first = result.outputs.members()[0].workspace.spectra[2].len();
        assert_eq!(first, 2);
    }

    #[test]
    fn test_fail_policy_aborts() {
        let instrument = Instrument::new("test", 10.0);
        let config = FilterConfig::new()
            .with_correction(CorrectionPolicy::Elastic)
            .with_missing_detector(MissingDetectorPolicy::Fail);
        let mut filter = FilterEvents::new(config);
        let err = filter
            .execute(workspace(RunMetadata::new(instrument)), &scenario(), DestinationNames::new())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingCorrectionData {
                spectrum_index: 0,
                ..
            }
        ));
        assert_eq!(filter.state(), RunState::Failed);
    }

    #[test]
    fn test_prepare_builds_context() {
        let mut filter = FilterEvents::new(FilterConfig::new());
        let ws = workspace(RunMetadata::default());
        let context = filter.prepare(&ws, &scenario(), DestinationNames::new()).unwrap();
        assert_eq!(filter.state(), RunState::CorrectionsBuilt);
        assert_eq!(context.splitter.destinations_in_use(), &[0, 1]);
        assert_eq!(context.corrections.len(), 3);
    }
}
