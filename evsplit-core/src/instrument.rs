//! Instrument geometry consumed by the TOF correction.

use crate::event::DetectorId;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Joules per milli-electronvolt.
pub const MEV_TO_JOULE: f64 = 1.602_176_634e-22;

/// Neutron mass in kilograms.
pub const NEUTRON_MASS_KG: f64 = 1.674_927_498_04e-27;

/// Speed in m/s of a neutron with kinetic energy `energy_mev`.
#[inline]
#[must_use]
pub fn neutron_speed(energy_mev: f64) -> f64 {
    (2.0 * energy_mev * MEV_TO_JOULE / NEUTRON_MASS_KG).sqrt()
}

/// Per-detector geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorGeometry {
    /// Detector identifier.
    pub id: DetectorId,
    /// Sample-to-detector distance in metres. `None` when unknown.
    #[cfg_attr(feature = "serde", serde(default))]
    pub l2: Option<f64>,
    /// Scattering angle in radians.
    #[cfg_attr(feature = "serde", serde(default))]
    pub two_theta: f64,
    /// Final energy in meV for indirect-geometry analysers.
    #[cfg_attr(feature = "serde", serde(default))]
    pub efixed: Option<f64>,
    /// Monitors have no meaningful sample-to-detector path.
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_monitor: bool,
}

impl DetectorGeometry {
    /// Creates a regular detector at distance `l2`.
    #[must_use]
    pub fn new(id: DetectorId, l2: f64, two_theta: f64) -> Self {
        Self {
            id,
            l2: Some(l2),
            two_theta,
            efixed: None,
            is_monitor: false,
        }
    }

    /// Creates a monitor.
    #[must_use]
    pub fn monitor(id: DetectorId) -> Self {
        Self {
            id,
            l2: None,
            two_theta: 0.0,
            efixed: None,
            is_monitor: true,
        }
    }

    /// Sets the analyser final energy.
    #[must_use]
    pub fn with_efixed(mut self, efixed: f64) -> Self {
        self.efixed = Some(efixed);
        self
    }

    /// L2 if this detector has a usable flight path.
    #[must_use]
    pub fn flight_path(&self) -> Option<f64> {
        if self.is_monitor {
            None
        } else {
            self.l2.filter(|l2| l2.is_finite() && *l2 >= 0.0)
        }
    }
}

/// Instrument description.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instrument {
    /// Instrument name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    /// Source-to-sample distance in metres.
    #[cfg_attr(feature = "serde", serde(default))]
    pub l1: Option<f64>,
    /// Detectors, in no particular order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub detectors: Vec<DetectorGeometry>,
}

impl Instrument {
    /// Creates an instrument with the given primary flight path.
    #[must_use]
    pub fn new(name: impl Into<String>, l1: f64) -> Self {
        Self {
            name: name.into(),
            l1: Some(l1),
            detectors: Vec::new(),
        }
    }

    /// Adds a detector.
    #[must_use]
    pub fn with_detector(mut self, detector: DetectorGeometry) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Builds an id lookup over the detectors.
    #[must_use]
    pub fn detector_index(&self) -> HashMap<DetectorId, &DetectorGeometry> {
        self.detectors.iter().map(|d| (d.id, d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_neutron_speed_thermal() {
        // 25.3 meV thermal neutrons travel at about 2200 m/s
        assert_relative_eq!(neutron_speed(25.3), 2200.0, max_relative = 1e-3);
    }

    #[test]
    fn test_monitor_has_no_flight_path() {
        assert!(DetectorGeometry::monitor(1).flight_path().is_none());
        assert_eq!(DetectorGeometry::new(2, 3.0, 0.5).flight_path(), Some(3.0));
    }

    #[test]
    fn test_detector_index() {
        let inst = Instrument::new("TEST", 10.0)
            .with_detector(DetectorGeometry::new(5, 2.0, 0.1))
            .with_detector(DetectorGeometry::monitor(-1));
        let index = inst.detector_index();
        assert_eq!(index.len(), 2);
        assert!(index[&-1].is_monitor);
    }
}
