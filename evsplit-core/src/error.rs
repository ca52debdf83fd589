//! Error types for evsplit-core.

use thiserror::Error;

/// Result type alias for evsplit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for event filtering.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed, non-monotonic or overlapping splitter input.
    #[error("invalid splitter: {0}")]
    InvalidSplitter(String),

    /// A correction policy needs geometry or calibration data that is absent.
    #[error("missing correction data for spectrum {spectrum_index}: {reason}")]
    MissingCorrectionData {
        /// Workspace index of the offending spectrum.
        spectrum_index: usize,
        /// Human readable reason.
        reason: String,
    },

    /// Correction table or parameter that cannot be used.
    #[error("invalid correction: {0}")]
    InvalidCorrection(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidSplitter`].
    pub fn splitter(msg: impl Into<String>) -> Self {
        Self::InvalidSplitter(msg.into())
    }

    /// Shorthand for [`Error::ConfigError`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
