//! # Offline Analysis Module
//!
//! Pitch at a given moment of an already loaded recording. Runs the same
//! pipeline as the live detector, synchronously, on one window centred on the
//! requested timestamp. Defaults are tuned for recorded voice: a narrower
//! band and a relaxed acceptance threshold (see
//! [`DetectionSettings::offline`]).

use crate::accumulator;
use crate::error::{DetectorError, Result};
use crate::pipeline::PitchPipeline;
use crate::settings::{validate_sample_rate, DetectionSettings};
use crate::{seconds_to_timestamp, Detection, NoDetectionReason};

/// Default transform size for recordings.
pub const DEFAULT_OFFLINE_WINDOW: usize = 4096;

/// Synchronous single-window analyzer.
#[derive(Debug, Clone)]
pub struct OfflineAnalyzer {
    pipeline: PitchPipeline,
    settings: DetectionSettings,
}

impl OfflineAnalyzer {
    /// Analyzer with the default window and offline settings.
    pub fn new() -> Result<Self> {
        Self::with_settings(DEFAULT_OFFLINE_WINDOW, DetectionSettings::offline())
    }

    pub fn with_settings(window_size: usize, settings: DetectionSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            pipeline: PitchPipeline::new(window_size)?,
            settings,
        })
    }

    pub fn window_size(&self) -> usize {
        self.pipeline.window_size()
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    /// Estimates the pitch around `timestamp_secs` in `samples`.
    ///
    /// The window is centred on the timestamp and shifted to stay inside the
    /// recording; recordings shorter than the window are zero-padded.
    pub fn analyze(
        &self,
        samples: &[f32],
        sample_rate: f32,
        timestamp_secs: f64,
    ) -> Result<Detection> {
        validate_sample_rate(sample_rate)?;
        if !timestamp_secs.is_finite() {
            return Err(DetectorError::InvalidTimestamp(timestamp_secs));
        }

        let window = extract_window(samples, sample_rate, timestamp_secs, self.window_size());
        if window.iter().any(|s| !s.is_finite()) {
            return Ok(Detection::NotDetected(NoDetectionReason::MalformedInput));
        }
        if accumulator::is_silent(&window, self.settings.silence_rms_threshold) {
            return Ok(Detection::NotDetected(NoDetectionReason::Silence));
        }

        let analysis = self.pipeline.analyze(
            &window,
            sample_rate,
            &self.settings,
            seconds_to_timestamp(timestamp_secs),
        );
        Ok(analysis.detection)
    }

    /// Runs [`analyze`](Self::analyze) every `step_secs` from the start of the
    /// recording to its end, returning each timestamp with its result.
    pub fn analyze_track(
        &self,
        samples: &[f32],
        sample_rate: f32,
        step_secs: f64,
    ) -> Result<Vec<(f64, Detection)>> {
        validate_sample_rate(sample_rate)?;
        if !(step_secs.is_finite() && step_secs > 0.0) {
            return Err(DetectorError::InvalidTimestamp(step_secs));
        }

        let duration = samples.len() as f64 / sample_rate as f64;
        let steps = (duration / step_secs).floor() as usize;
        (0..=steps)
            .map(|i| {
                let t = i as f64 * step_secs;
                self.analyze(samples, sample_rate, t).map(|d| (t, d))
            })
            .collect()
    }
}

/// Copies `window_size` samples centred on `timestamp_secs`.
fn extract_window(
    samples: &[f32],
    sample_rate: f32,
    timestamp_secs: f64,
    window_size: usize,
) -> Vec<f32> {
    if samples.len() <= window_size {
        let mut window = samples.to_vec();
        window.resize(window_size, 0.0);
        return window;
    }

    let centre = (timestamp_secs * sample_rate as f64).round().max(0.0) as usize;
    let start = centre
        .saturating_sub(window_size / 2)
        .min(samples.len() - window_size);
    samples[start..start + window_size].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_centred_and_clamped() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let mid = extract_window(&samples, 10.0, 5.0, 10);
        assert_eq!(mid.first(), Some(&45.0));

        let head = extract_window(&samples, 10.0, 0.0, 10);
        assert_eq!(head.first(), Some(&0.0));

        let tail = extract_window(&samples, 10.0, 1_000.0, 10);
        assert_eq!(tail.last(), Some(&99.0));
        assert_eq!(tail.len(), 10);
    }

    #[test]
    fn short_recording_is_padded() {
        let window = extract_window(&[0.5; 4], 10.0, 0.2, 8);
        assert_eq!(window, vec![0.5, 0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn rejects_bad_arguments() {
        let analyzer = OfflineAnalyzer::new().unwrap();
        assert!(matches!(
            analyzer.analyze(&[0.0; 16], 0.0, 0.0),
            Err(DetectorError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            analyzer.analyze(&[0.0; 16], 44_100.0, f64::NAN),
            Err(DetectorError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn silent_recording_is_not_detected() {
        let analyzer = OfflineAnalyzer::new().unwrap();
        let detection = analyzer.analyze(&vec![0.0; 10_000], 44_100.0, 0.1).unwrap();
        assert_eq!(detection, Detection::NotDetected(NoDetectionReason::Silence));
    }

    #[test]
    fn non_finite_samples_are_malformed() {
        let analyzer = OfflineAnalyzer::new().unwrap();
        let mut samples = vec![0.2; 8192];
        samples[4000] = f32::NAN;
        let detection = analyzer.analyze(&samples, 44_100.0, 0.09).unwrap();
        assert_eq!(detection.reason(), Some(NoDetectionReason::MalformedInput));
    }

    #[test]
    fn track_covers_the_recording() {
        let analyzer = OfflineAnalyzer::new().unwrap();
        let results = analyzer.analyze_track(&vec![0.0; 44_100], 44_100.0, 0.25).unwrap();
        let times: Vec<f64> = results.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}
