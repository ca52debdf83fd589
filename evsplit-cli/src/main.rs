//! evsplit CLI
//!
//! Splits an event run into one output per splitter destination.
#![allow(clippy::uninlined_format_args, clippy::struct_excessive_bools)]

use clap::{Parser, ValueEnum};

use evsplit_algorithms::{FilterEvents, FilterOutcome, Progress};
use evsplit_core::{CorrectionPolicy, FilterConfig, MissingDetectorPolicy, PartitionStrategy};
use evsplit_io::{read_calibration, read_config, read_splitter, read_workspace, OutputWriter};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    EvsplitIo(#[from] evsplit_io::Error),

    #[error("Filter error: {0}")]
    Core(#[from] evsplit_core::Error),
}

/// TOF correction selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Correction {
    /// Raw TOF
    None,
    /// Elastic scattering, time at the sample
    Elastic,
    /// Direct geometry, needs the incident energy
    Direct,
    /// Indirect geometry, needs per-analyser final energies
    Indirect,
    /// Per-detector factor and shift from --calibration
    Customized,
}

impl From<Correction> for CorrectionPolicy {
    fn from(c: Correction) -> Self {
        match c {
            Correction::None => Self::None,
            Correction::Elastic => Self::Elastic,
            Correction::Direct => Self::Direct,
            Correction::Indirect => Self::Indirect,
            Correction::Customized => Self::Customized,
        }
    }
}

/// Handling of spectra without correction data.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum MissingPolicy {
    /// Keep the spectrum, route none of its events
    Skip,
    /// Split with the raw TOF
    Bypass,
    /// Abort the run
    Fail,
}

impl From<MissingPolicy> for MissingDetectorPolicy {
    fn from(m: MissingPolicy) -> Self {
        match m {
            MissingPolicy::Skip => Self::Skip,
            MissingPolicy::Bypass => Self::Bypass,
            MissingPolicy::Fail => Self::Fail,
        }
    }
}

/// Destination lookup selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// Choose per spectrum
    Auto,
    /// Binary search per event
    BinarySearch,
    /// Sorted sweep over events and intervals
    Sweep,
}

impl From<Strategy> for PartitionStrategy {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Auto => Self::Auto,
            Strategy::BinarySearch => Self::BinarySearch,
            Strategy::Sweep => Self::Sweep,
        }
    }
}

/// Split neutron event data by a time splitter.
#[derive(Parser)]
#[command(name = "evsplit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input run (JSON event workspace)
    input: PathBuf,

    /// Splitter file (JSON)
    #[arg(short, long)]
    splitter: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Filter configuration (JSON); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base name of the outputs
    #[arg(long)]
    base_name: Option<String>,

    /// TOF correction
    #[arg(long, value_enum)]
    correction: Option<Correction>,

    /// Incident energy in meV (direct geometry)
    #[arg(long)]
    incident_energy: Option<f64>,

    /// Final energy in meV (indirect geometry fallback)
    #[arg(long)]
    efixed: Option<f64>,

    /// Calibration CSV (detector_id,factor,shift); selects customized correction
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Handling of spectra without correction data
    #[arg(long, value_enum)]
    missing_detector: Option<MissingPolicy>,

    /// Destination lookup strategy
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Split on pulse time only
    #[arg(long)]
    pulse_time_only: bool,

    /// Write outputs into one group directory
    #[arg(long)]
    group: bool,

    /// Restrict time-series logs to each destination
    #[arg(long)]
    split_logs: bool,

    /// Keep events outside every interval in an extra output
    #[arg(long)]
    keep_unfiltered: bool,

    /// Splitter times are relative to the run start
    #[arg(long)]
    relative_time: bool,

    /// Name outputs base_1..base_n
    #[arg(long)]
    index_from_one: bool,

    /// Name outputs by the splitter's destination names
    #[arg(long)]
    descriptive_names: bool,

    /// Allow time-ordered output spectra
    #[arg(long)]
    unstable_order: bool,

    /// Partition on the current thread only
    #[arg(long)]
    sequential: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn filter_config(&self) -> Result<FilterConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => FilterConfig::default(),
        };
        if let Some(name) = &self.base_name {
            config = config.with_base_name(name.clone());
        }
        if let Some(correction) = self.correction {
            config = config.with_correction(correction.into());
        }
        if let Some(ei) = self.incident_energy {
            config = config.with_incident_energy(ei);
        }
        if let Some(ef) = self.efixed {
            config = config.with_efixed(ef);
        }
        if let Some(path) = &self.calibration {
            config = config.with_calibration(read_calibration(path)?);
        }
        if let Some(policy) = self.missing_detector {
            config = config.with_missing_detector(policy.into());
        }
        if let Some(strategy) = self.strategy {
            config = config.with_strategy(strategy.into());
        }
        let flags = [
            (self.pulse_time_only, &mut config.filter_by_pulse_time),
            (self.group, &mut config.group_outputs),
            (self.split_logs, &mut config.split_sample_logs),
            (self.keep_unfiltered, &mut config.output_unfiltered_events),
            (self.relative_time, &mut config.relative_time),
            (self.index_from_one, &mut config.index_from_one),
            (self.descriptive_names, &mut config.descriptive_names),
        ];
        for (set, field) in flags {
            if set {
                *field = true;
            }
        }
        if self.unstable_order {
            config.stable_order = false;
        }
        if self.sequential {
            config.parallel = false;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = cli.filter_config()?;
    debug!("Configuration: {:?}", config);

    let start = Instant::now();
    let workspace = read_workspace(&cli.input)?;
    let splitter = read_splitter(&cli.splitter)?;
    println!(
        "Loaded {} spectra, {} events in {:.2}s",
        workspace.num_spectra(),
        workspace.event_count(),
        start.elapsed().as_secs_f64()
    );

    let progress = Progress::with_callback(|done, total| {
        let step = (total / 10).max(1);
        if done % step == 0 || done == total {
            debug!("Partitioned {done}/{total} spectra");
        }
    });
    let mut filter = FilterEvents::new(config).with_progress(progress);

    let split_start = Instant::now();
    let outcome = filter.execute(workspace, &splitter.splitter, splitter.names)?;
    let result = match outcome {
        FilterOutcome::Completed(result) => result,
        FilterOutcome::Cancelled(summary) => {
            println!(
                "Cancelled: {} of {} events unprocessed",
                summary.unprocessed, summary.total_events
            );
            return Ok(());
        }
    };
    info!("Split in {:.2}s", split_start.elapsed().as_secs_f64());

    let writer = OutputWriter::create(&cli.output_dir)?;
    writer.write_result(&result)?;

    let summary = &result.summary;
    for output in result.outputs.members() {
        println!("  {:<24} {:>12} events", output.name, output.event_count());
    }
    println!(
        "Total: {} events, {} assigned, {} unfiltered, {} dropped ({} excluded, {} skipped)",
        summary.total_events,
        summary.assigned(),
        summary.unfiltered,
        summary.dropped(),
        summary.excluded,
        summary.skipped_events
    );
    for record in &summary.skipped {
        println!(
            "  skipped spectrum {}: {}",
            record.spectrum_number, record.reason
        );
    }
    println!("Outputs written to {}", cli.output_dir.display());
    Ok(())
}
