//! Writers for filter results.
//!
//! An output directory holds one CSV per output workspace
//! (`spectrum,detector_id,pulse_time,tof`), `corrections.csv` and
//! `summary.json`. Grouped outputs go into a subdirectory named after the
//! group.

use crate::Result;
use evsplit_algorithms::{
    CorrectionTable, FilterResult, FilterSummary, OutputSet, OutputWorkspace, SpectrumCorrection,
};
use evsplit_core::Destination;
use log::{debug, info};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name of the run summary.
pub const SUMMARY_FILE: &str = "summary.json";
/// File name of the per-spectrum correction table.
pub const CORRECTIONS_FILE: &str = "corrections.csv";

#[derive(Serialize)]
struct OutputEntry<'a> {
    name: &'a str,
    destination: Option<Destination>,
    events: usize,
    file: String,
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<&'a str>,
    outputs: Vec<OutputEntry<'a>>,
    dropped: usize,
    #[serde(flatten)]
    summary: &'a FilterSummary,
}

/// Writes filter results below a directory.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    /// Creates the output directory if needed.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn outputs_dir(&self, outputs: &OutputSet) -> PathBuf {
        match outputs.group_name() {
            Some(group) => self.dir.join(group),
            None => self.dir.clone(),
        }
    }

    /// Writes one output workspace as CSV into `dir`.
    pub fn write_output(&self, dir: &Path, output: &OutputWorkspace) -> Result<PathBuf> {
        let path = dir.join(format!("{}.csv", output.name));
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "spectrum,detector_id,pulse_time,tof")?;
        for spectrum in &output.workspace.spectra {
            for e in &spectrum.events {
                writeln!(
                    writer,
                    "{},{},{},{}",
                    spectrum.spectrum_number,
                    e.detector_id,
                    e.pulse_time.as_nanos(),
                    e.tof
                )?;
            }
        }
        writer.flush()?;
        debug!("Wrote {} events to {}", output.event_count(), path.display());
        Ok(path)
    }

    /// Writes every output of `outputs`.
    pub fn write_outputs(&self, outputs: &OutputSet) -> Result<Vec<PathBuf>> {
        let dir = self.outputs_dir(outputs);
        fs::create_dir_all(&dir)?;
        outputs
            .members()
            .iter()
            .map(|output| self.write_output(&dir, output))
            .collect()
    }

    /// Writes the correction used for each spectrum.
    pub fn write_corrections(&self, corrections: &CorrectionTable) -> Result<PathBuf> {
        let path = self.dir.join(CORRECTIONS_FILE);
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "spectrum_index,status,factor,shift,reason")?;
        for (index, correction) in corrections.entries().iter().enumerate() {
            match correction {
                SpectrumCorrection::Corrected(c) => {
                    writeln!(writer, "{index},corrected,{},{},", c.factor, c.shift)?;
                }
                SpectrumCorrection::Bypassed { reason } => {
                    writeln!(writer, "{index},bypassed,1,0,\"{}\"", reason.replace('"', "'"))?;
                }
                SpectrumCorrection::Missing { reason } => {
                    writeln!(writer, "{index},missing,,,\"{}\"", reason.replace('"', "'"))?;
                }
            }
        }
        writer.flush()?;
        Ok(path)
    }

    /// Writes the run summary as JSON.
    pub fn write_summary(&self, outputs: &OutputSet, summary: &FilterSummary) -> Result<PathBuf> {
        let path = self.dir.join(SUMMARY_FILE);
        let dir = self.outputs_dir(outputs);
        let file = SummaryFile {
            group: outputs.group_name(),
            outputs: outputs
                .members()
                .iter()
                .map(|o| OutputEntry {
                    name: &o.name,
                    destination: o.destination,
                    events: o.event_count(),
                    file: dir.join(format!("{}.csv", o.name)).display().to_string(),
                })
                .collect(),
            dropped: summary.dropped(),
            summary,
        };
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &file)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(path)
    }

    /// Writes outputs, corrections and summary of a completed run.
    pub fn write_result(&self, result: &FilterResult) -> Result<Vec<PathBuf>> {
        let mut written = self.write_outputs(&result.outputs)?;
        written.push(self.write_corrections(&result.corrections)?);
        written.push(self.write_summary(&result.outputs, &result.summary)?);
        info!("Wrote {} files to {}", written.len(), self.dir.display());
        Ok(written)
    }
}
