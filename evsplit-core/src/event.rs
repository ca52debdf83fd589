//! Event and event list types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Detector identifier as recorded by the instrument.
pub type DetectorId = i32;

/// Absolute time in nanoseconds.
///
/// `Timestamp::MIN` and `Timestamp::MAX` stand in for minus and plus
/// infinity when used as interval bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Lower unbounded time.
    pub const MIN: Self = Self(i64::MIN);
    /// Upper unbounded time.
    pub const MAX: Self = Self(i64::MAX);

    /// Creates a timestamp from nanoseconds.
    #[inline]
    #[must_use]
    pub const fn from_nanos(ns: i64) -> Self {
        Self(ns)
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn as_nanos(&self) -> i64 {
        self.0
    }

    /// Returns true unless this is one of the unbounded sentinels.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        *self != Self::MIN && *self != Self::MAX
    }

    /// Shifts the timestamp, leaving the unbounded sentinels untouched.
    ///
    /// Returns `None` if a finite time would overflow or reach a sentinel.
    #[inline]
    #[must_use]
    pub fn checked_offset(&self, ns: i64) -> Option<Self> {
        if !self.is_finite() {
            return Some(*self);
        }
        self.0
            .checked_add(ns)
            .map(Self)
            .filter(Self::is_finite)
    }

    /// Seconds elapsed from `earlier` to `self`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn seconds_since(&self, earlier: Self) -> f64 {
        (self.0 as f64 - earlier.0 as f64) * 1e-9
    }
}

/// A single detected neutron or muon.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Detector that recorded the event.
    pub detector_id: DetectorId,
    /// Pulse (macroscopic) time.
    pub pulse_time: Timestamp,
    /// Time of flight in microseconds, relative to `pulse_time`.
    pub tof: f64,
}

impl Event {
    /// Creates a new event.
    #[inline]
    #[must_use]
    pub fn new(detector_id: DetectorId, pulse_time: Timestamp, tof: f64) -> Self {
        Self {
            detector_id,
            pulse_time,
            tof,
        }
    }

    /// Time of flight after applying `tof * factor + shift` (microseconds).
    #[inline]
    #[must_use]
    pub fn corrected_tof(&self, factor: f64, shift: f64) -> f64 {
        self.tof.mul_add(factor, shift)
    }

    /// Absolute time: pulse time plus the corrected TOF, truncated to nanoseconds.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn full_time(&self, factor: f64, shift: f64) -> Timestamp {
        let tof_ns = (self.corrected_tof(factor, shift) * 1000.0) as i64;
        Timestamp(self.pulse_time.0.saturating_add(tof_ns))
    }
}

/// Events belonging to one spectrum.
///
/// Events are not required to be sorted.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventList {
    /// Spectrum number as labelled by the instrument.
    pub spectrum_number: i32,
    /// Detectors contributing to this spectrum.
    #[cfg_attr(feature = "serde", serde(default))]
    pub detector_ids: Vec<DetectorId>,
    /// Whether the spectrum is masked. Carried through unchanged.
    #[cfg_attr(feature = "serde", serde(default))]
    pub masked: bool,
    /// The events.
    #[cfg_attr(feature = "serde", serde(default))]
    pub events: Vec<Event>,
}

impl EventList {
    /// Creates an empty event list for a spectrum.
    #[must_use]
    pub fn new(spectrum_number: i32, detector_ids: Vec<DetectorId>) -> Self {
        Self {
            spectrum_number,
            detector_ids,
            masked: false,
            events: Vec::new(),
        }
    }

    /// Replaces the events of this list.
    #[must_use]
    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the list holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Appends an event.
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Moves all events out, leaving the list empty.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// An event-less copy carrying the same spectrum-detector mapping.
    #[must_use]
    pub fn shell(&self) -> Self {
        Self {
            spectrum_number: self.spectrum_number,
            detector_ids: self.detector_ids.clone(),
            masked: self.masked,
            events: Vec::new(),
        }
    }

    /// Sorts events by pulse time.
    pub fn sort_by_pulse_time(&mut self) {
        if !self.events.is_sorted_by_key(|e| e.pulse_time) {
            self.events.sort_by_key(|e| e.pulse_time);
        }
    }

    /// Sorts events by absolute time `pulse + tof * factor + shift`.
    pub fn sort_by_full_time(&mut self, factor: f64, shift: f64) {
        if !self.events.is_sorted_by_key(|e| e.full_time(factor, shift)) {
            self.events.sort_by_key(|e| e.full_time(factor, shift));
        }
    }
}
