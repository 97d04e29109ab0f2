//! # Error Module
//!
//! Hard failures of the detection engine. These are configuration or setup
//! problems that make the detector unable to operate at all; they are reported
//! at construction or configuration time and never retried.
//!
//! Routine "nothing to report" outcomes (silence, weak peaks, low confidence)
//! are not errors. See [`crate::NoDetectionReason`].

use thiserror::Error;

/// Errors raised while configuring or starting a detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The analysis window cannot be used for a spectral transform.
    #[error("invalid window size {0}: must be even and at least {min}", min = crate::settings::MIN_WINDOW_SIZE)]
    InvalidWindowSize(usize),

    /// The hop size is zero or larger than the window.
    #[error("invalid hop size {hop}: must be between 1 and the window size {window}")]
    InvalidHopSize {
        /// Requested hop size.
        hop: usize,
        /// Configured window size.
        window: usize,
    },

    /// The sample rate is zero, negative or not a number.
    #[error("invalid sample rate {0}: must be positive and finite")]
    InvalidSampleRate(f32),

    /// A settings field is outside its allowed range.
    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The requested timestamp is not a finite number.
    #[error("invalid timestamp {0}: must be finite")]
    InvalidTimestamp(f64),

    /// The injected audio session refused to activate.
    #[error("audio session failed to activate: {0}")]
    Session(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn analysis worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DetectorError>;
