//! evsplit-core: Core types for time-splitter based event filtering.
//!
//! This crate provides the value types shared by the filtering pipeline:
//! events and per-spectrum event lists, time intervals and raw splitter
//! descriptions, instrument geometry, run metadata with sample logs,
//! and the filter configuration.
//!

pub mod config;
pub mod error;
pub mod event;
pub mod instrument;
pub mod interval;
pub mod run;
pub mod workspace;

pub use config::{
    CorrectionEntry, CorrectionPolicy, FilterConfig, MissingDetectorPolicy, PartitionStrategy,
};
pub use error::{Error, Result};
pub use event::{DetectorId, Event, EventList, Timestamp};
pub use instrument::{neutron_speed, DetectorGeometry, Instrument};
pub use interval::{
    normalize_intervals, Destination, DestinationNames, SplitterRow, SplitterSource,
    TimeInterval, EXCLUDED,
};
pub use run::{LogEntry, LogValue, RunMetadata, TimeSeries};
pub use workspace::EventWorkspace;
