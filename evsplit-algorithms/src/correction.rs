//! Per-detector TOF correction.
//!
//! Each policy is resolved once per spectrum into a `(factor, shift)` pair so
//! the per-event path is a single fused multiply-add:
//!
//! | policy     | factor            | shift (us)           |
//! |------------|-------------------|----------------------|
//! | None       | 1                 | 0                    |
//! | Elastic    | L1 / (L1 + L2)    | 0                    |
//! | Direct     | 0                 | L1 / v(Ei) * 1e6     |
//! | Indirect   | 1                 | -L2 / v(Ef) * 1e6    |
//! | Customized | from calibration  | from calibration     |

use evsplit_core::error::{Error, Result};
use evsplit_core::instrument::neutron_speed;
use evsplit_core::{
    CorrectionEntry, CorrectionPolicy, DetectorGeometry, DetectorId, EventList, FilterConfig,
    MissingDetectorPolicy, RunMetadata,
};
use log::debug;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Name of the sample log consulted for the incident energy.
pub const INCIDENT_ENERGY_LOG: &str = "Ei";

/// A resolved `tof * factor + shift` correction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct TofCorrection {
    /// Multiplicative factor.
    pub factor: f64,
    /// Additive shift in microseconds.
    pub shift: f64,
}

impl TofCorrection {
    /// Leaves TOF unchanged.
    pub const IDENTITY: Self = Self {
        factor: 1.0,
        shift: 0.0,
    };

    /// Creates a correction.
    #[must_use]
    pub fn new(factor: f64, shift: f64) -> Self {
        Self { factor, shift }
    }

    /// Applies the correction to a TOF value.
    #[inline]
    #[must_use]
    pub fn apply(&self, tof: f64) -> f64 {
        tof.mul_add(self.factor, self.shift)
    }

    fn mean(items: &[Self]) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let n = items.len() as f64;
        Self {
            factor: items.iter().map(|c| c.factor).sum::<f64>() / n,
            shift: items.iter().map(|c| c.shift).sum::<f64>() / n,
        }
    }
}

/// Flight-path inputs for one detector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlightGeometry {
    /// Source-to-sample distance (m).
    pub l1: Option<f64>,
    /// Sample-to-detector distance (m).
    pub l2: Option<f64>,
    /// Scattering angle (rad).
    pub two_theta: f64,
    /// Final energy (meV), indirect geometry.
    pub efixed: Option<f64>,
    /// Incident energy (meV), direct geometry.
    pub incident_energy: Option<f64>,
}

/// Computes the correction for one detector under a geometry-based policy.
///
/// Returns the reason as `Err` when an input the policy needs is missing.
/// [`CorrectionPolicy::Customized`] is not geometry based and yields the
/// identity here.
pub fn compute_correction(
    policy: CorrectionPolicy,
    geometry: &FlightGeometry,
) -> std::result::Result<TofCorrection, String> {
    let l1 = || geometry.l1.ok_or_else(|| "no source-to-sample distance".to_string());
    let l2 = || geometry.l2.ok_or_else(|| "no sample-to-detector distance".to_string());
    match policy {
        CorrectionPolicy::None | CorrectionPolicy::Customized => Ok(TofCorrection::IDENTITY),
        CorrectionPolicy::Elastic => {
            let (l1, l2) = (l1()?, l2()?);
            let total = l1 + l2;
            if total <= 0.0 {
                return Err(format!("total flight path {total} m is not positive"));
            }
            Ok(TofCorrection::new(l1 / total, 0.0))
        }
        CorrectionPolicy::Direct => {
            let l1 = l1()?;
            let ei = geometry
                .incident_energy
                .ok_or_else(|| "no incident energy".to_string())?;
            Ok(TofCorrection::new(0.0, l1 / neutron_speed(ei) * 1e6))
        }
        CorrectionPolicy::Indirect => {
            let l2 = l2()?;
            let ef = geometry
                .efixed
                .filter(|e| *e > 0.0)
                .ok_or_else(|| "no analyser final energy".to_string())?;
            Ok(TofCorrection::new(1.0, -l2 / neutron_speed(ef) * 1e6))
        }
    }
}

/// Correction resolved for one spectrum.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "snake_case"))]
pub enum SpectrumCorrection {
    /// Correction computed from geometry or calibration.
    Corrected(TofCorrection),
    /// Data missing, identity used instead.
    Bypassed {
        /// Why the correction could not be computed.
        reason: String,
    },
    /// Data missing, spectrum contributes no events.
    Missing {
        /// Why the correction could not be computed.
        reason: String,
    },
}

impl SpectrumCorrection {
    /// Correction to apply, or `None` if the spectrum must be skipped.
    #[must_use]
    pub fn effective(&self) -> Option<TofCorrection> {
        match self {
            Self::Corrected(c) => Some(*c),
            Self::Bypassed { .. } => Some(TofCorrection::IDENTITY),
            Self::Missing { .. } => None,
        }
    }
}

/// Per-spectrum corrections, indexed like the workspace spectra.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CorrectionTable {
    entries: Vec<SpectrumCorrection>,
}

impl CorrectionTable {
    /// Identity correction for `num_spectra` spectra.
    #[must_use]
    pub fn identity(num_spectra: usize) -> Self {
        Self {
            entries: vec![SpectrumCorrection::Corrected(TofCorrection::IDENTITY); num_spectra],
        }
    }

    /// Correction of a spectrum.
    #[must_use]
    pub fn get(&self, spectrum_index: usize) -> Option<&SpectrumCorrection> {
        self.entries.get(spectrum_index)
    }

    /// All entries in spectrum order.
    #[must_use]
    pub fn entries(&self) -> &[SpectrumCorrection] {
        &self.entries
    }

    /// Number of spectra covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table covers no spectra.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds [`CorrectionTable`]s for a run.
#[derive(Debug)]
pub struct TofCorrectionCalculator<'a> {
    policy: CorrectionPolicy,
    l1: Option<f64>,
    incident_energy: Option<f64>,
    efixed: Option<f64>,
    detectors: HashMap<DetectorId, &'a DetectorGeometry>,
    calibration: HashMap<DetectorId, TofCorrection>,
}

impl<'a> TofCorrectionCalculator<'a> {
    /// Prepares a calculator and checks the run-level inputs of the policy.
    ///
    /// # Errors
    /// [`Error::ConfigError`] when a run-level input (L1, incident energy) is
    /// absent, [`Error::InvalidCorrection`] for a bad calibration table.
    pub fn new(config: &FilterConfig, metadata: &'a RunMetadata) -> Result<Self> {
        let policy = config.correction;
        let l1 = metadata.instrument.l1.filter(|l1| l1.is_finite() && *l1 > 0.0);
        let incident_energy = config
            .incident_energy
            .or_else(|| metadata.number_log(INCIDENT_ENERGY_LOG));

        match policy {
            CorrectionPolicy::Elastic | CorrectionPolicy::Direct if l1.is_none() => {
                return Err(Error::config(format!(
                    "{policy:?} correction requires a positive source-to-sample distance (L1)"
                )));
            }
            CorrectionPolicy::Direct => match incident_energy {
                Some(ei) if ei.is_finite() && ei > 0.0 => {}
                Some(ei) => {
                    return Err(Error::config(format!(
                        "incident energy must be positive, got {ei}"
                    )))
                }
                None => {
                    return Err(Error::config(format!(
                        "Direct correction requires an incident energy \
                         (option or '{INCIDENT_ENERGY_LOG}' log)"
                    )))
                }
            },
            _ => {}
        }

        let calibration = if policy == CorrectionPolicy::Customized {
            validate_calibration(&config.calibration)?
        } else {
            HashMap::new()
        };

        debug!(
            "TOF correction {:?}: L1={:?} Ei={:?} {} detectors, {} calibration rows",
            policy,
            l1,
            incident_energy,
            metadata.instrument.detectors.len(),
            calibration.len()
        );

        Ok(Self {
            policy,
            l1,
            incident_energy,
            efixed: config.efixed,
            detectors: metadata.instrument.detector_index(),
            calibration,
        })
    }

    /// Policy in use.
    #[must_use]
    pub fn policy(&self) -> CorrectionPolicy {
        self.policy
    }

    /// Correction for a single detector.
    ///
    /// # Errors
    /// The reason the detector cannot be corrected.
    pub fn detector_correction(
        &self,
        id: DetectorId,
    ) -> std::result::Result<TofCorrection, String> {
        match self.policy {
            CorrectionPolicy::None => Ok(TofCorrection::IDENTITY),
            CorrectionPolicy::Customized => self
                .calibration
                .get(&id)
                .copied()
                .ok_or_else(|| format!("detector {id} is not in the calibration table")),
            policy => {
                let det = self
                    .detectors
                    .get(&id)
                    .ok_or_else(|| format!("detector {id} is not in the instrument"))?;
                if det.is_monitor {
                    return Err(format!("detector {id} is a monitor"));
                }
                let geometry = FlightGeometry {
                    l1: self.l1,
                    l2: det.flight_path(),
                    two_theta: det.two_theta,
                    efixed: det.efixed.or(self.efixed),
                    incident_energy: self.incident_energy,
                };
                compute_correction(policy, &geometry).map_err(|r| format!("detector {id}: {r}"))
            }
        }
    }

    /// Correction for a spectrum; grouped detectors are averaged.
    ///
    /// # Errors
    /// The reason the spectrum cannot be corrected.
    pub fn spectrum_correction(
        &self,
        detector_ids: &[DetectorId],
    ) -> std::result::Result<TofCorrection, String> {
        if !self.policy.needs_detector_data() {
            return Ok(TofCorrection::IDENTITY);
        }
        match detector_ids {
            [] => Err("spectrum has no detectors".to_string()),
            [id] => self.detector_correction(*id),
            ids => {
                let members = ids
                    .iter()
                    .map(|&id| self.detector_correction(id))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(TofCorrection::mean(&members))
            }
        }
    }

    /// Resolves every spectrum under `missing`.
    ///
    /// # Errors
    /// [`Error::MissingCorrectionData`] for the first unresolvable spectrum
    /// when `missing` is [`MissingDetectorPolicy::Fail`].
    pub fn build_table(
        &self,
        spectra: &[EventList],
        missing: MissingDetectorPolicy,
    ) -> Result<CorrectionTable> {
        let entries = spectra
            .iter()
            .enumerate()
            .map(|(index, spectrum)| {
                match (self.spectrum_correction(&spectrum.detector_ids), missing) {
                    (Ok(c), _) => Ok(SpectrumCorrection::Corrected(c)),
                    (Err(reason), MissingDetectorPolicy::Skip) => {
                        Ok(SpectrumCorrection::Missing { reason })
                    }
                    (Err(reason), MissingDetectorPolicy::Bypass) => {
                        Ok(SpectrumCorrection::Bypassed { reason })
                    }
                    (Err(reason), MissingDetectorPolicy::Fail) => {
                        Err(Error::MissingCorrectionData {
                            spectrum_index: index,
                            reason,
                        })
                    }
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CorrectionTable { entries })
    }
}

fn validate_calibration(rows: &[CorrectionEntry]) -> Result<HashMap<DetectorId, TofCorrection>> {
    if rows.is_empty() {
        return Err(Error::InvalidCorrection(
            "calibration table is empty".to_string(),
        ));
    }
    let mut table = HashMap::with_capacity(rows.len());
    for row in rows {
        if !(row.factor.is_finite() && row.shift.is_finite()) {
            return Err(Error::InvalidCorrection(format!(
                "detector {} has a non-finite factor or shift",
                row.detector_id
            )));
        }
        if row.factor < 0.0 {
            return Err(Error::InvalidCorrection(format!(
                "detector {} has negative factor {}",
                row.detector_id, row.factor
            )));
        }
        if table
            .insert(row.detector_id, TofCorrection::new(row.factor, row.shift))
            .is_some()
        {
            return Err(Error::InvalidCorrection(format!(
                "detector {} appears twice in the calibration table",
                row.detector_id
            )));
        }
    }
    Ok(table)
}
