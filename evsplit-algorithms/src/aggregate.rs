//! Collects partitioned spectra into named output workspaces.

use crate::partition::SpectrumPartition;
use crate::splitter::TimeSplitter;
use evsplit_core::error::{Error, Result};
use evsplit_core::{
    Destination, EventList, EventWorkspace, FilterConfig, LogValue, RunMetadata, TimeInterval,
    Timestamp,
};
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Per-pulse proton charge time series.
pub const PROTON_CHARGE_LOG: &str = "proton_charge";
/// Integrated proton charge written to each split output.
pub const INTEGRATED_CHARGE_LOG: &str = "gd_prtn_chrg";
/// Seconds covered by the destination's intervals.
pub const DURATION_LOG: &str = "splitter_duration";

/// Suffix of the output holding events no interval claimed.
pub const UNFILTERED_SUFFIX: &str = "unfiltered";

/// One output container.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputWorkspace {
    /// Output name.
    pub name: String,
    /// Destination it collects, `None` for the unfiltered output.
    pub destination: Option<Destination>,
    /// Spectra and copied metadata.
    pub workspace: EventWorkspace,
}

impl OutputWorkspace {
    /// Total events held.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.workspace.event_count()
    }

    /// Returns true for the unfiltered output.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.destination.is_none()
    }
}

/// Result containers of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputSet {
    /// Independent named outputs.
    Separate(Vec<OutputWorkspace>),
    /// Outputs wrapped into one group handle.
    Grouped {
        /// Group name.
        name: String,
        /// Member outputs.
        members: Vec<OutputWorkspace>,
    },
}

impl OutputSet {
    /// The outputs, destination order first, unfiltered last.
    #[must_use]
    pub fn members(&self) -> &[OutputWorkspace] {
        match self {
            Self::Separate(members) | Self::Grouped { members, .. } => members,
        }
    }

    /// Consumes the set into its outputs.
    #[must_use]
    pub fn into_members(self) -> Vec<OutputWorkspace> {
        match self {
            Self::Separate(members) | Self::Grouped { members, .. } => members,
        }
    }

    /// Group name when grouped.
    #[must_use]
    pub fn group_name(&self) -> Option<&str> {
        match self {
            Self::Separate(_) => None,
            Self::Grouped { name, .. } => Some(name),
        }
    }

    /// Number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members().len()
    }

    /// Returns true if there are no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }

    /// Output by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OutputWorkspace> {
        self.members().iter().find(|w| w.name == name)
    }

    /// Output collecting `destination`.
    #[must_use]
    pub fn for_destination(&self, destination: Destination) -> Option<&OutputWorkspace> {
        self.members()
            .iter()
            .find(|w| w.destination == Some(destination))
    }

    /// The unfiltered output, if requested.
    #[must_use]
    pub fn unfiltered(&self) -> Option<&OutputWorkspace> {
        self.members().iter().find(|w| w.is_unfiltered())
    }
}

/// Naming, log and grouping options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorOptions {
    /// Base output name.
    pub base_name: String,
    /// Name by rank from 1 instead of by destination.
    pub index_from_one: bool,
    /// Prefer the splitter's destination names.
    pub descriptive_names: bool,
    /// Restrict time-series logs per destination.
    pub split_sample_logs: bool,
    /// Wrap outputs into a group.
    pub group_outputs: bool,
    /// Emit the unfiltered output.
    pub keep_unfiltered: bool,
}

impl From<&FilterConfig> for AggregatorOptions {
    fn from(config: &FilterConfig) -> Self {
        Self {
            base_name: config.base_name.clone(),
            index_from_one: config.index_from_one,
            descriptive_names: config.descriptive_names,
            split_sample_logs: config.split_sample_logs,
            group_outputs: config.group_outputs,
            keep_unfiltered: config.output_unfiltered_events,
        }
    }
}

/// Builds [`OutputSet`]s from partitioned spectra.
#[derive(Debug, Clone)]
pub struct OutputAggregator<'a> {
    splitter: &'a TimeSplitter,
    options: AggregatorOptions,
}

impl<'a> OutputAggregator<'a> {
    /// Creates an aggregator.
    #[must_use]
    pub fn new(splitter: &'a TimeSplitter, options: AggregatorOptions) -> Self {
        Self { splitter, options }
    }

    /// Output name for a destination slot.
    #[must_use]
    pub fn output_name(&self, slot: usize) -> String {
        let base = &self.options.base_name;
        let destination = self.splitter.destination_of_slot(slot);
        if self.options.descriptive_names {
            if let Some(name) = self.splitter.name_of(destination) {
                return format!("{base}_{name}");
            }
        }
        if self.options.index_from_one {
            format!("{base}_{}", slot + 1)
        } else {
            format!("{base}_{destination}")
        }
    }

    /// All output names, checked for collisions.
    ///
    /// # Errors
    /// [`Error::ConfigError`] if two outputs would share a name.
    pub fn output_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = (0..self.splitter.num_slots())
            .map(|slot| self.output_name(slot))
            .collect();
        if self.options.keep_unfiltered {
            names.push(format!("{}_{UNFILTERED_SUFFIX}", self.options.base_name));
        }
        let mut seen = BTreeSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(Error::config(format!("output name '{name}' would be used twice")));
            }
        }
        Ok(names)
    }

    /// Metadata for the output of `destination`.
    #[must_use]
    pub fn output_metadata(&self, source: &RunMetadata, destination: Destination) -> RunMetadata {
        if !self.options.split_sample_logs {
            return source.clone();
        }
        let intervals = self.splitter.intervals_for(destination);
        let mut metadata = source.with_logs_filtered(&intervals);
        if let Some(LogValue::TimeSeries(charge)) = source.logs.get(PROTON_CHARGE_LOG) {
            metadata.logs.insert(
                INTEGRATED_CHARGE_LOG.to_string(),
                LogValue::Number(charge.sum_within(&intervals)),
            );
        }
        metadata.logs.insert(
            DURATION_LOG.to_string(),
            LogValue::Number(covered_seconds(&intervals, source.run_start, source.run_end)),
        );
        metadata
    }

    /// Moves every bucket into its output, preserving spectrum order.
    ///
    /// Every destination in use gets an output, even when it received no
    /// events.
    #[must_use]
    pub fn aggregate(
        &self,
        metadata: &RunMetadata,
        partitions: Vec<SpectrumPartition>,
    ) -> OutputSet {
        let num_slots = self.splitter.num_slots();
        let num_spectra = partitions.len();
        let mut columns: Vec<Vec<EventList>> = (0..num_slots)
            .map(|_| Vec::with_capacity(num_spectra))
            .collect();
        let mut unfiltered: Vec<EventList> = Vec::with_capacity(if self.options.keep_unfiltered {
            num_spectra
        } else {
            0
        });

        for partition in partitions {
            let SpectrumPartition {
                shell,
                buckets,
                unfiltered: rest,
                ..
            } = partition;
            for (column, bucket) in columns.iter_mut().zip(buckets) {
                column.push(shell.shell().with_events(bucket));
            }
            if self.options.keep_unfiltered {
                unfiltered.push(shell.with_events(rest));
            }
        }

        let mut members: Vec<OutputWorkspace> = columns
            .into_par_iter()
            .enumerate()
            .map(|(slot, spectra)| {
                let destination = self.splitter.destination_of_slot(slot);
                OutputWorkspace {
                    name: self.output_name(slot),
                    destination: Some(destination),
                    workspace: EventWorkspace {
                        metadata: self.output_metadata(metadata, destination),
                        spectra,
                    },
                }
            })
            .collect();

        if self.options.keep_unfiltered {
            members.push(OutputWorkspace {
                name: format!("{}_{UNFILTERED_SUFFIX}", self.options.base_name),
                destination: None,
                workspace: EventWorkspace {
                    metadata: metadata.clone(),
                    spectra: unfiltered,
                },
            });
        }

        if self.options.group_outputs {
            OutputSet::Grouped {
                name: self.options.base_name.clone(),
                members,
            }
        } else {
            OutputSet::Separate(members)
        }
    }
}

/// Seconds covered by `intervals` inside the run window.
///
/// Intervals still unbounded after clipping do not contribute.
fn covered_seconds(
    intervals: &[TimeInterval],
    run_start: Option<Timestamp>,
    run_end: Option<Timestamp>,
) -> f64 {
    let lower = run_start.unwrap_or(Timestamp::MIN);
    let upper = run_end.unwrap_or(Timestamp::MAX);
    intervals
        .iter()
        .filter_map(|iv| iv.clipped(lower, upper))
        .filter(|iv| iv.start().is_finite() && iv.stop().is_finite())
        .map(|iv| iv.stop().seconds_since(iv.start()))
        .sum()
}
