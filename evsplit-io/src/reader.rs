//! Loading runs, splitters, configurations and calibration tables.
//!
//! Runs, splitters and configurations are JSON. Calibration tables are CSV
//! with a `detector_id,factor,shift` header; blank lines and lines starting
//! with `#` are ignored.

use crate::{Error, Result};
use evsplit_core::{CorrectionEntry, DestinationNames, EventWorkspace, FilterConfig, SplitterSource};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const CALIBRATION_HEADER: [&str; 3] = ["detector_id", "factor", "shift"];

/// Contents of a splitter file.
///
/// ```json
/// {
///   "splitter": { "kind": "table", "rows": [{"time": 0, "target": 1}], "open_ended_last": true },
///   "names": { "1": "warm" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitterFile {
    /// Raw splitter description.
    pub splitter: SplitterSource,
    /// Optional destination names.
    #[serde(default, skip_serializing_if = "DestinationNames::is_empty")]
    pub names: DestinationNames,
}

impl SplitterFile {
    /// Wraps a splitter without names.
    #[must_use]
    pub fn new(splitter: SplitterSource) -> Self {
        Self {
            splitter,
            names: DestinationNames::new(),
        }
    }
}

/// Parses an event workspace from JSON.
pub fn parse_workspace(json: &str) -> Result<EventWorkspace> {
    Ok(serde_json::from_str(json)?)
}

/// Reads an event workspace from a JSON file.
pub fn read_workspace<P: AsRef<Path>>(path: P) -> Result<EventWorkspace> {
    let workspace = parse_workspace(&fs::read_to_string(path.as_ref())?)?;
    debug!(
        "Loaded {} spectra ({} events) from {}",
        workspace.num_spectra(),
        workspace.event_count(),
        path.as_ref().display()
    );
    Ok(workspace)
}

/// Parses a splitter file from JSON.
pub fn parse_splitter(json: &str) -> Result<SplitterFile> {
    Ok(serde_json::from_str(json)?)
}

/// Reads a splitter file.
pub fn read_splitter<P: AsRef<Path>>(path: P) -> Result<SplitterFile> {
    parse_splitter(&fs::read_to_string(path)?)
}

/// Parses a filter configuration; missing fields take their defaults.
pub fn parse_config(json: &str) -> Result<FilterConfig> {
    Ok(serde_json::from_str(json)?)
}

/// Reads a filter configuration file.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<FilterConfig> {
    parse_config(&fs::read_to_string(path)?)
}

/// Parses a calibration table.
pub fn parse_calibration(text: &str) -> Result<Vec<CorrectionEntry>> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let Some((_, header)) = lines.next() else {
        return Err(Error::InvalidFormat("calibration table is empty".to_string()));
    };
    let columns: Vec<String> = header.split(',').map(|c| c.trim().to_lowercase()).collect();
    if columns != CALIBRATION_HEADER {
        return Err(Error::InvalidFormat(format!(
            "calibration header must be '{}', got '{header}'",
            CALIBRATION_HEADER.join(",")
        )));
    }

    lines
        .map(|(line_no, line)| parse_calibration_row(line_no, line))
        .collect()
}

fn parse_calibration_row(line_no: usize, line: &str) -> Result<CorrectionEntry> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [id, factor, shift] = fields.as_slice() else {
        return Err(Error::InvalidFormat(format!(
            "line {line_no}: expected 3 columns, got {}",
            fields.len()
        )));
    };
    let bad = |what: &str, value: &str| {
        Error::InvalidFormat(format!("line {line_no}: invalid {what} '{value}'"))
    };
    Ok(CorrectionEntry::new(
        id.parse().map_err(|_| bad("detector id", id))?,
        factor.parse().map_err(|_| bad("factor", factor))?,
        shift.parse().map_err(|_| bad("shift", shift))?,
    ))
}

/// Reads a calibration table from a CSV file.
pub fn read_calibration<P: AsRef<Path>>(path: P) -> Result<Vec<CorrectionEntry>> {
    let rows = parse_calibration(&fs::read_to_string(path.as_ref())?)?;
    debug!(
        "Loaded {} calibration rows from {}",
        rows.len(),
        path.as_ref().display()
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evsplit_core::{CorrectionPolicy, Timestamp};

    #[test]
    fn test_parse_partial_config() {
        let config = parse_config(r#"{"base_name": "hot", "correction": "elastic"}"#).unwrap();
        assert_eq!(config.base_name, "hot");
        assert_eq!(config.correction, CorrectionPolicy::Elastic);
        assert!(config.stable_order);
        assert!(config.parallel);
    }

    #[test]
    fn test_parse_splitter_with_names() {
        let file = parse_splitter(
            r#"{
                "splitter": {"kind": "intervals", "intervals": [
                    {"start": 0, "stop": 10, "destination": 0},
                    {"start": 10, "stop": 20, "destination": 1}
                ]},
                "names": {"1": "warm"}
            }"#,
        )
        .unwrap();
        assert_eq!(file.names.get(&1).map(String::as_str), Some("warm"));
        let intervals = file.splitter.to_intervals().unwrap();
        assert_eq!(intervals[1].start(), Timestamp(10));
    }

    #[test]
    fn test_parse_table_splitter() {
        let file = parse_splitter(
            r#"{"splitter": {"kind": "table", "rows": [
                {"time": 0, "target": 2}, {"time": 50, "target": -1}
            ]}}"#,
        )
        .unwrap();
        assert!(file.names.is_empty());
        assert!(matches!(
            file.splitter,
            SplitterSource::Table {
                open_ended_last: false,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_calibration() {
        let csv = "# calibration\ndetector_id,factor,shift\n1, 0.5, 2\n\n7,1,-3.5\n";
        let rows = parse_calibration(csv).unwrap();
        assert_eq!(
            rows,
            vec![
                CorrectionEntry::new(1, 0.5, 2.0),
                CorrectionEntry::new(7, 1.0, -3.5)
            ]
        );
    }

    #[test]
    fn test_calibration_errors_name_the_line() {
        let err = parse_calibration("detector_id,factor,shift\n1,0.5\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = parse_calibration("detector_id,factor,shift\n1,abc,0\n").unwrap_err();
        assert!(err.to_string().contains("factor"));

        assert!(parse_calibration("id,a,b\n").is_err());
        assert!(parse_calibration("").is_err());
    }
}
