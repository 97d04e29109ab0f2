// pitch-core/src/lib.rs

//! The core logic for real-time vocal pitch detection.
//! This crate turns a stream of mono samples into periodic pitch estimates
//! (frequency + confidence) and can analyze a single moment of a stored
//! recording. It is completely headless: it contains no audio device, file
//! or GUI code.
//!
//! Pipeline per cycle: silence gate → Blackman-Harris window + FFT →
//! harmonic product spectrum → Quinn sub-bin refinement → confidence score.

use std::time::Duration;

pub mod accumulator;
pub mod confidence;
pub mod detector;
pub mod error;
pub mod fft;
pub mod hps;
pub mod offline;
pub mod pipeline;
pub mod refine;
pub mod session;
pub mod settings;

pub use detector::{AppendStatus, AudioChunk, DetectionEvent, DetectorState, PitchDetector};
pub use error::DetectorError;
pub use offline::OfflineAnalyzer;
pub use session::{AudioSession, NullSession};
pub use settings::{DetectionSettings, DetectorConfig};

/// A single accepted pitch measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Refined fundamental frequency in Hz, inside the configured band.
    pub frequency_hz: f32,
    /// Reliability score between 0.0 and 1.0.
    pub confidence: f32,
    /// Position of the analyzed audio: end of the window for live input,
    /// the requested moment for recordings.
    pub timestamp: Duration,
}

/// Why a cycle produced no estimate. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoDetectionReason {
    /// Window RMS at or below the silence threshold.
    Silence,
    /// The harmonic product peak was too small to trust.
    WeakPeak,
    /// The confidence score did not exceed the acceptance threshold.
    LowConfidence,
    /// The frequency band maps to no usable bins at this sample rate.
    InvalidRange,
    /// The input chunk or window was malformed (NaN/Inf, wrong length, ...).
    MalformedInput,
}

/// Outcome of one analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    Detected(PitchEstimate),
    NotDetected(NoDetectionReason),
}

impl Detection {
    pub fn estimate(&self) -> Option<PitchEstimate> {
        match self {
            Detection::Detected(estimate) => Some(*estimate),
            Detection::NotDetected(_) => None,
        }
    }

    pub fn reason(&self) -> Option<NoDetectionReason> {
        match self {
            Detection::Detected(_) => None,
            Detection::NotDetected(reason) => Some(*reason),
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, Detection::Detected(_))
    }
}

impl From<NoDetectionReason> for Detection {
    fn from(reason: NoDetectionReason) -> Self {
        Detection::NotDetected(reason)
    }
}

/// Converts a position in seconds to a timestamp, saturating at the ends.
pub(crate) fn seconds_to_timestamp(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}
