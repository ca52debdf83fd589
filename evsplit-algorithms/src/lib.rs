//! evsplit-algorithms: Time-splitter based event filtering.
//!
//! This crate provides the FilterEvents pipeline:
//! - **`TimeSplitter`** - normalized interval table with point, range and sweep queries
//! - **`TofCorrectionCalculator`** - per-spectrum TOF `(factor, shift)` from geometry or
//!   calibration
//! - **`EventPartitioner`** - moves each event of a spectrum into its destination bucket
//! - **`OutputAggregator`** - one named output per destination, with copied metadata
//! - **`FilterEvents`** - the orchestrator, parallel over spectra with rayon
//!
#![warn(missing_docs)]

mod aggregate;
mod correction;
mod filter;
mod partition;
mod progress;
pub mod splitter;

pub use aggregate::{
    AggregatorOptions, OutputAggregator, OutputSet, OutputWorkspace, DURATION_LOG,
    INTEGRATED_CHARGE_LOG, PROTON_CHARGE_LOG, UNFILTERED_SUFFIX,
};
pub use correction::{
    compute_correction, CorrectionTable, FlightGeometry, SpectrumCorrection, TofCorrection,
    TofCorrectionCalculator, INCIDENT_ENERGY_LOG,
};
pub use filter::{
    filter_events, FilterEvents, FilterOutcome, FilterResult, FilterSummary, RunContext,
    RunState, SkipRecord,
};
pub use partition::{EventPartitioner, PartitionOptions, SpectrumPartition};
pub use progress::{CancelFlag, Progress};
pub use splitter::{SweepCursor, TimeSplitter};

// Re-export the configuration types callers need alongside the pipeline
pub use evsplit_core::{CorrectionPolicy, FilterConfig, MissingDetectorPolicy, PartitionStrategy};
