//! Event workspace: spectra plus run metadata.

use crate::event::EventList;
use crate::run::RunMetadata;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ordered spectra and the metadata shared by all of them.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventWorkspace {
    /// Instrument, run window and sample logs.
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: RunMetadata,
    /// Spectra in workspace-index order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub spectra: Vec<EventList>,
}

impl EventWorkspace {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            metadata,
            spectra: Vec::new(),
        }
    }

    /// Adds a spectrum.
    #[must_use]
    pub fn with_spectrum(mut self, spectrum: EventList) -> Self {
        self.spectra.push(spectrum);
        self
    }

    /// Number of spectra.
    #[must_use]
    pub fn num_spectra(&self) -> usize {
        self.spectra.len()
    }

    /// Total number of events over all spectra.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.spectra.iter().map(EventList::len).sum()
    }
}
