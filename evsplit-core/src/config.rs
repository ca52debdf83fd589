//! Filter configuration and policy selection.

use crate::error::{Error, Result};
use crate::event::DetectorId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How recorded TOF is adjusted before events are tested against the splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CorrectionPolicy {
    /// Raw TOF (factor 1, shift 0).
    #[default]
    None,
    /// Time the neutron passed the sample, elastic scattering.
    Elastic,
    /// Direct geometry: time at the sample from the incident energy.
    Direct,
    /// Indirect geometry: time at the sample from each analyser's final energy.
    Indirect,
    /// Caller supplied `(factor, shift)` per detector.
    Customized,
}

impl CorrectionPolicy {
    /// Returns true if the policy needs per-detector geometry or calibration.
    #[must_use]
    pub fn needs_detector_data(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// What to do with spectra whose detectors lack correction data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MissingDetectorPolicy {
    /// Keep the spectrum in the output but route none of its events.
    #[default]
    Skip,
    /// Split the spectrum with the uncorrected TOF.
    Bypass,
    /// Abort the run.
    Fail,
}

/// Destination lookup code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PartitionStrategy {
    /// Pick per spectrum.
    #[default]
    Auto,
    /// Binary search per event.
    BinarySearch,
    /// Sort by time, then walk events and intervals together.
    Sweep,
}

/// One row of a user supplied TOF calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrectionEntry {
    /// Detector the row applies to.
    pub detector_id: DetectorId,
    /// Multiplicative TOF factor.
    pub factor: f64,
    /// Additive TOF shift in microseconds.
    pub shift: f64,
}

impl CorrectionEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(detector_id: DetectorId, factor: f64, shift: f64) -> Self {
        Self {
            detector_id,
            factor,
            shift,
        }
    }
}

/// Configuration for a filter run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FilterConfig {
    /// Base name for output workspaces.
    pub base_name: String,
    /// TOF correction applied before splitting.
    pub correction: CorrectionPolicy,
    /// Incident energy (meV) for direct geometry.
    pub incident_energy: Option<f64>,
    /// Fallback final energy (meV) for indirect geometry.
    pub efixed: Option<f64>,
    /// Calibration rows for [`CorrectionPolicy::Customized`].
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub calibration: Vec<CorrectionEntry>,
    /// Handling of spectra without correction data.
    pub missing_detector: MissingDetectorPolicy,
    /// Split on pulse time alone, ignoring TOF.
    pub filter_by_pulse_time: bool,
    /// Wrap outputs into one group.
    pub group_outputs: bool,
    /// Restrict time-series logs to each destination's intervals.
    pub split_sample_logs: bool,
    /// Keep excluded events in an extra output.
    pub output_unfiltered_events: bool,
    /// Splitter times are relative to the run start.
    pub relative_time: bool,
    /// Name outputs `base_1..base_n` instead of by destination.
    pub index_from_one: bool,
    /// Use the splitter's destination names when present.
    pub descriptive_names: bool,
    /// Keep input event order inside each output spectrum.
    pub stable_order: bool,
    /// Destination lookup code path.
    pub strategy: PartitionStrategy,
    /// Partition spectra on the rayon pool.
    pub parallel: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            base_name: "split".to_string(),
            correction: CorrectionPolicy::None,
            incident_energy: None,
            efixed: None,
            calibration: Vec::new(),
            missing_detector: MissingDetectorPolicy::Skip,
            filter_by_pulse_time: false,
            group_outputs: false,
            split_sample_logs: false,
            output_unfiltered_events: false,
            relative_time: false,
            index_from_one: false,
            descriptive_names: false,
            stable_order: true,
            strategy: PartitionStrategy::Auto,
            parallel: true,
        }
    }
}

impl FilterConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output base name.
    #[must_use]
    pub fn with_base_name(mut self, name: impl Into<String>) -> Self {
        self.base_name = name.into();
        self
    }

    /// Sets the correction policy.
    #[must_use]
    pub fn with_correction(mut self, policy: CorrectionPolicy) -> Self {
        self.correction = policy;
        self
    }

    /// Sets the incident energy for direct geometry.
    #[must_use]
    pub fn with_incident_energy(mut self, energy_mev: f64) -> Self {
        self.incident_energy = Some(energy_mev);
        self
    }

    /// Sets the fallback final energy for indirect geometry.
    #[must_use]
    pub fn with_efixed(mut self, energy_mev: f64) -> Self {
        self.efixed = Some(energy_mev);
        self
    }

    /// Selects customized correction with the given calibration rows.
    #[must_use]
    pub fn with_calibration(mut self, rows: Vec<CorrectionEntry>) -> Self {
        self.correction = CorrectionPolicy::Customized;
        self.calibration = rows;
        self
    }

    /// Sets the missing-detector policy.
    #[must_use]
    pub fn with_missing_detector(mut self, policy: MissingDetectorPolicy) -> Self {
        self.missing_detector = policy;
        self
    }

    /// Splits on pulse time only.
    #[must_use]
    pub fn with_filter_by_pulse_time(mut self, enabled: bool) -> Self {
        self.filter_by_pulse_time = enabled;
        self
    }

    /// Groups outputs.
    #[must_use]
    pub fn with_group_outputs(mut self, enabled: bool) -> Self {
        self.group_outputs = enabled;
        self
    }

    /// Splits sample logs per destination.
    #[must_use]
    pub fn with_split_sample_logs(mut self, enabled: bool) -> Self {
        self.split_sample_logs = enabled;
        self
    }

    /// Keeps excluded events in an extra output.
    #[must_use]
    pub fn with_output_unfiltered_events(mut self, enabled: bool) -> Self {
        self.output_unfiltered_events = enabled;
        self
    }

    /// Treats splitter times as relative to the run start.
    #[must_use]
    pub fn with_relative_time(mut self, enabled: bool) -> Self {
        self.relative_time = enabled;
        self
    }

    /// Names outputs by rank starting at 1.
    #[must_use]
    pub fn with_index_from_one(mut self, enabled: bool) -> Self {
        self.index_from_one = enabled;
        self
    }

    /// Uses splitter destination names.
    #[must_use]
    pub fn with_descriptive_names(mut self, enabled: bool) -> Self {
        self.descriptive_names = enabled;
        self
    }

    /// Keeps input order inside output spectra.
    #[must_use]
    pub fn with_stable_order(mut self, enabled: bool) -> Self {
        self.stable_order = enabled;
        self
    }

    /// Sets the partition strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enables or disables the rayon fan-out.
    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Returns true unless missing correction data aborts the run.
    #[must_use]
    pub fn tolerates_missing_corrections(&self) -> bool {
        self.missing_detector != MissingDetectorPolicy::Fail
    }

    /// Checks values that do not depend on the input data.
    pub fn validate(&self) -> Result<()> {
        if self.base_name.trim().is_empty() {
            return Err(Error::config("output base name is empty"));
        }
        for (label, value) in [
            ("incident energy", self.incident_energy),
            ("efixed", self.efixed),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(Error::config(format!("{label} must be positive, got {v}")));
                }
            }
        }
        if self.correction == CorrectionPolicy::Customized && self.calibration.is_empty() {
            return Err(Error::config(
                "customized correction selected without a calibration table",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_config_builder() {
        let config = FilterConfig::new()
            .with_base_name("run42")
            .with_correction(CorrectionPolicy::Direct)
            .with_incident_energy(12.0)
            .with_group_outputs(true)
            .with_missing_detector(MissingDetectorPolicy::Fail)
            .with_parallel(false);

        assert_eq!(config.base_name, "run42");
        assert_eq!(config.correction, CorrectionPolicy::Direct);
        assert_eq!(config.incident_energy, Some(12.0));
        assert!(config.group_outputs);
        assert!(!config.tolerates_missing_corrections());
        assert!(!config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_energy() {
        let config = FilterConfig::new().with_incident_energy(-1.0);
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_validate_requires_calibration() {
        let config = FilterConfig::new().with_correction(CorrectionPolicy::Customized);
        assert!(config.validate().is_err());

        let config = FilterConfig::new().with_calibration(vec![CorrectionEntry::new(1, 1.0, 0.0)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        assert!(FilterConfig::new().with_base_name("  ").validate().is_err());
    }
}
