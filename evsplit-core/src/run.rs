//! Run metadata: instrument, run window and sample logs.

use crate::event::Timestamp;
use crate::instrument::Instrument;
use crate::interval::TimeInterval;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One sample of a time-series log.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogEntry {
    /// When the value was recorded.
    pub time: Timestamp,
    /// Recorded value.
    pub value: f64,
}

/// A numeric time-series sample log.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(from = "Vec<LogEntry>", into = "Vec<LogEntry>")
)]
pub struct TimeSeries {
    entries: Vec<LogEntry>,
}

impl From<Vec<LogEntry>> for TimeSeries {
    fn from(entries: Vec<LogEntry>) -> Self {
        Self::new(entries)
    }
}

impl From<TimeSeries> for Vec<LogEntry> {
    fn from(series: TimeSeries) -> Self {
        series.entries
    }
}

impl TimeSeries {
    /// Creates a series, sorting entries by time.
    #[must_use]
    pub fn new(mut entries: Vec<LogEntry>) -> Self {
        entries.sort_by_key(|e| e.time);
        Self { entries }
    }

    /// Entries in time order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the series has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value in effect at `time` (the latest entry at or before it).
    #[must_use]
    pub fn value_at(&self, time: Timestamp) -> Option<f64> {
        let idx = self.entries.partition_point(|e| e.time <= time);
        idx.checked_sub(1).map(|i| self.entries[i].value)
    }

    /// Restricts the series to `intervals` (sorted, non-overlapping).
    ///
    /// Entries inside an interval are kept. The value in effect when an
    /// interval opens is re-stamped at the interval start.
    #[must_use]
    pub fn filtered(&self, intervals: &[TimeInterval]) -> Self {
        let mut entries = Vec::new();
        for iv in intervals {
            let first = self.entries.partition_point(|e| e.time < iv.start());
            let end = self.entries.partition_point(|e| e.time < iv.stop());
            let starts_exactly = self
                .entries
                .get(first)
                .is_some_and(|e| e.time == iv.start());
            if !starts_exactly {
                if let Some(prev) = first.checked_sub(1).map(|i| self.entries[i]) {
                    entries.push(LogEntry {
                        time: iv.start(),
                        value: prev.value,
                    });
                }
            }
            entries.extend_from_slice(&self.entries[first..end]);
        }
        Self { entries }
    }

    /// Sum of the values recorded inside `intervals`.
    #[must_use]
    pub fn sum_within(&self, intervals: &[TimeInterval]) -> f64 {
        intervals
            .iter()
            .map(|iv| {
                let first = self.entries.partition_point(|e| e.time < iv.start());
                let end = self.entries.partition_point(|e| e.time < iv.stop());
                self.entries[first..end].iter().map(|e| e.value).sum::<f64>()
            })
            .sum()
    }
}

/// A sample log value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum LogValue {
    /// Single number.
    Number(f64),
    /// Free text.
    Text(String),
    /// Numeric time series.
    TimeSeries(TimeSeries),
}

impl LogValue {
    /// Returns the number for single-value numeric logs.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// Non-event metadata copied into every output.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunMetadata {
    /// Run start, if recorded.
    #[cfg_attr(feature = "serde", serde(default))]
    pub run_start: Option<Timestamp>,
    /// Run end, if recorded.
    #[cfg_attr(feature = "serde", serde(default))]
    pub run_end: Option<Timestamp>,
    /// Instrument geometry.
    #[cfg_attr(feature = "serde", serde(default))]
    pub instrument: Instrument,
    /// Sample logs by name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub logs: BTreeMap<String, LogValue>,
}

impl RunMetadata {
    /// Creates metadata for the given instrument.
    #[must_use]
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            ..Self::default()
        }
    }

    /// Sets the run window.
    #[must_use]
    pub fn with_run_window(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.run_start = Some(start);
        self.run_end = Some(end);
        self
    }

    /// Adds or replaces a log.
    #[must_use]
    pub fn with_log(mut self, name: impl Into<String>, value: LogValue) -> Self {
        self.logs.insert(name.into(), value);
        self
    }

    /// Numeric single-value log by name.
    #[must_use]
    pub fn number_log(&self, name: &str) -> Option<f64> {
        self.logs.get(name).and_then(LogValue::as_number)
    }

    /// Copy with every time-series log restricted to `intervals`.
    #[must_use]
    pub fn with_logs_filtered(&self, intervals: &[TimeInterval]) -> Self {
        let logs = self
            .logs
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    LogValue::TimeSeries(series) => {
                        LogValue::TimeSeries(series.filtered(intervals))
                    }
                    other => other.clone(),
                };
                (name.clone(), value)
            })
            .collect();
        Self {
            run_start: self.run_start,
            run_end: self.run_end,
            instrument: self.instrument.clone(),
            logs,
        }
    }
}
