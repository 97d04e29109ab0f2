//! # Settings Module
//!
//! Runtime detection settings and construction-time detector configuration.
//!
//! [`DetectionSettings`] may be swapped while the detector runs; the new values
//! apply to the next analysis cycle. [`DetectorConfig`] fixes the transform
//! size, hop cadence and worker layout for the lifetime of a detector.
//!
//! Both derive `serde` so a front-end can persist them as JSON.

use serde::{Deserialize, Serialize};

use crate::error::{DetectorError, Result};

/// Smallest window accepted by [`DetectorConfig::validate`].
pub const MIN_WINDOW_SIZE: usize = 16;

/// Fraction of the live confidence threshold applied to recorded audio.
pub const OFFLINE_THRESHOLD_RATIO: f32 = 0.75;

/// Parameters of a single analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Windows whose RMS is at or below this value are treated as silence.
    pub silence_rms_threshold: f32,
    /// Estimates must score strictly above this to be accepted.
    pub confidence_threshold: f32,
    /// Lowest fundamental considered, in Hz.
    pub min_frequency_hz: f32,
    /// Highest fundamental considered, in Hz.
    pub max_frequency_hz: f32,
    /// Number of harmonics multiplied into the HPS (including the fundamental).
    pub harmonic_count: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self::live()
    }
}

impl DetectionSettings {
    /// Defaults for live singing captured from a microphone.
    pub fn live() -> Self {
        Self {
            silence_rms_threshold: 0.01,
            confidence_threshold: 0.5,
            min_frequency_hz: 100.0,
            max_frequency_hz: 800.0,
            harmonic_count: 7,
        }
    }

    /// Defaults for recorded audio: narrower band, fewer harmonics and a
    /// relaxed acceptance threshold.
    pub fn offline() -> Self {
        let live = Self::live();
        Self {
            silence_rms_threshold: 0.005,
            confidence_threshold: live.confidence_threshold * OFFLINE_THRESHOLD_RATIO,
            min_frequency_hz: 100.0,
            max_frequency_hz: 500.0,
            harmonic_count: 5,
        }
    }

    /// Checks every field, returning the first violation found.
    pub fn validate(&self) -> Result<()> {
        if !(self.silence_rms_threshold.is_finite() && self.silence_rms_threshold > 0.0) {
            return Err(invalid(
                "silence_rms_threshold",
                format!("{} is not a positive number", self.silence_rms_threshold),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid(
                "confidence_threshold",
                format!("{} is outside [0, 1]", self.confidence_threshold),
            ));
        }
        if !(self.min_frequency_hz.is_finite() && self.min_frequency_hz > 0.0) {
            return Err(invalid(
                "min_frequency_hz",
                format!("{} is not a positive frequency", self.min_frequency_hz),
            ));
        }
        if !self.max_frequency_hz.is_finite() || self.min_frequency_hz >= self.max_frequency_hz {
            return Err(invalid(
                "max_frequency_hz",
                format!(
                    "{} must be greater than min_frequency_hz ({})",
                    self.max_frequency_hz, self.min_frequency_hz
                ),
            ));
        }
        if self.harmonic_count < 2 {
            return Err(invalid(
                "harmonic_count",
                format!("{} is below the minimum of 2", self.harmonic_count),
            ));
        }
        Ok(())
    }
}

/// Shape of the live pipeline. Fixed once a detector is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Transform size and length of the rolling sample window.
    pub window_size: usize,
    /// New samples required between two analysis cycles.
    pub hop_size: usize,
    /// Sample rate assumed until the first chunk reports the real one.
    pub nominal_sample_rate: f32,
    /// When set, chunks of any other length are rejected.
    pub expected_chunk_len: Option<usize>,
    /// Analysis threads serving the job queue.
    pub worker_threads: usize,
    /// Pending jobs allowed before new cycles are dropped.
    pub queue_capacity: usize,
    /// Lower edge of the visualization spectrum, in Hz.
    pub display_min_hz: f32,
    /// Upper edge of the visualization spectrum, in Hz.
    pub display_max_hz: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 8192,
            hop_size: 2048,
            nominal_sample_rate: 44_100.0,
            expected_chunk_len: None,
            worker_threads: 2,
            queue_capacity: 4,
            display_min_hz: 80.0,
            display_max_hz: 1000.0,
        }
    }
}

impl DetectorConfig {
    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        validate_window_size(self.window_size)?;
        if self.hop_size == 0 || self.hop_size > self.window_size {
            return Err(DetectorError::InvalidHopSize {
                hop: self.hop_size,
                window: self.window_size,
            });
        }
        validate_sample_rate(self.nominal_sample_rate)?;
        if self.expected_chunk_len == Some(0) {
            return Err(invalid("expected_chunk_len", "must not be zero".into()));
        }
        if self.worker_threads == 0 {
            return Err(invalid("worker_threads", "at least one worker is required".into()));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must not be zero".into()));
        }
        if !(self.display_min_hz >= 0.0 && self.display_min_hz < self.display_max_hz) {
            return Err(invalid(
                "display_max_hz",
                format!(
                    "display band {}..{} Hz is empty",
                    self.display_min_hz, self.display_max_hz
                ),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_window_size(window_size: usize) -> Result<()> {
    if window_size < MIN_WINDOW_SIZE || window_size % 2 != 0 {
        return Err(DetectorError::InvalidWindowSize(window_size));
    }
    Ok(())
}

pub(crate) fn validate_sample_rate(sample_rate: f32) -> Result<()> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(DetectorError::InvalidSampleRate(sample_rate))
    }
}

fn invalid(field: &'static str, reason: String) -> DetectorError {
    DetectorError::InvalidSetting { field, reason }
}
