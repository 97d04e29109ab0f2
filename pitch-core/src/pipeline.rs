//! # Analysis Pipeline Module
//!
//! One analysis cycle over a prepared window: transform, harmonic product
//! spectrum, sub-bin refinement and confidence scoring.
//!
//! The pipeline holds only the planned FFT and window coefficients, so the
//! same window and settings always produce the same result regardless of
//! which thread runs it or when.

use std::time::Duration;

use crate::confidence::{self, ConfidenceBreakdown};
use crate::error::Result;
use crate::fft::{frequency_to_bin, SpectrumAnalyzer};
use crate::hps::{BinRange, HpsFrame};
use crate::refine::refined_frequency;
use crate::settings::DetectionSettings;
use crate::{Detection, NoDetectionReason, PitchEstimate};

/// Everything one cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleAnalysis {
    pub detection: Detection,
    /// Full magnitude spectrum; empty when the cycle stopped before the
    /// transform.
    pub magnitudes: Vec<f32>,
    /// Score cues, present once a peak was found.
    pub breakdown: Option<ConfidenceBreakdown>,
}

impl CycleAnalysis {
    fn rejected(reason: NoDetectionReason, magnitudes: Vec<f32>) -> Self {
        Self {
            detection: Detection::NotDetected(reason),
            magnitudes,
            breakdown: None,
        }
    }
}

/// Transform → HPS → refine → score, for windows of one fixed size.
#[derive(Debug, Clone)]
pub struct PitchPipeline {
    analyzer: SpectrumAnalyzer,
}

impl PitchPipeline {
    pub fn new(window_size: usize) -> Result<Self> {
        Ok(Self {
            analyzer: SpectrumAnalyzer::new(window_size)?,
        })
    }

    pub fn window_size(&self) -> usize {
        self.analyzer.size()
    }

    /// Runs one cycle. The caller is responsible for the silence gate.
    pub fn analyze(
        &self,
        window: &[f32],
        sample_rate: f32,
        settings: &DetectionSettings,
        timestamp: Duration,
    ) -> CycleAnalysis {
        if window.iter().any(|s| !s.is_finite()) {
            return CycleAnalysis::rejected(NoDetectionReason::MalformedInput, Vec::new());
        }

        let window_size = self.window_size();
        let magnitudes = self.analyzer.magnitudes(window);

        let Some(range) = BinRange::for_band(
            settings.min_frequency_hz,
            settings.max_frequency_hz,
            sample_rate,
            window_size,
        ) else {
            return CycleAnalysis::rejected(NoDetectionReason::InvalidRange, magnitudes);
        };

        let hps = HpsFrame::compute(&magnitudes, range, settings.harmonic_count);
        let Some((peak_bin, _)) = hps.strong_peak() else {
            return CycleAnalysis::rejected(NoDetectionReason::WeakPeak, magnitudes);
        };

        // Refinement may step just past the outermost candidate bin.
        let frequency_hz = refined_frequency(&hps, peak_bin, sample_rate, window_size)
            .clamp(settings.min_frequency_hz, settings.max_frequency_hz);

        let breakdown = confidence::score(&magnitudes, peak_bin, range);
        let detection = if breakdown.confidence > settings.confidence_threshold {
            Detection::Detected(PitchEstimate {
                frequency_hz,
                confidence: breakdown.confidence,
                timestamp,
            })
        } else {
            Detection::NotDetected(NoDetectionReason::LowConfidence)
        };

        CycleAnalysis {
            detection,
            magnitudes,
            breakdown: Some(breakdown),
        }
    }
}

/// Magnitudes whose bin frequency lies within `[min_hz, max_hz]`.
pub fn display_band(
    magnitudes: &[f32],
    sample_rate: f32,
    window_size: usize,
    min_hz: f32,
    max_hz: f32,
) -> Vec<f32> {
    if magnitudes.is_empty() {
        return Vec::new();
    }
    let first = frequency_to_bin(min_hz, sample_rate, window_size).ceil().max(0.0) as usize;
    let last = (frequency_to_bin(max_hz, sample_rate, window_size).floor().max(0.0) as usize)
        .min(magnitudes.len() - 1);
    if first > last {
        return Vec::new();
    }
    magnitudes[first..=last].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn harmonic_tone(freq: f32, amplitudes: &[f32], sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate;
                amplitudes
                    .iter()
                    .enumerate()
                    .map(|(h, a)| a * (2.0 * PI * freq * (h + 1) as f32 * t).sin())
                    .sum::<f32>()
                    + 0.001 * noise(i)
            })
            .collect()
    }

    /// Deterministic white noise in [-1, 1].
    fn noise(i: usize) -> f32 {
        let mut x = (i as u32).wrapping_add(0x9E37_79B9).wrapping_mul(0x85EB_CA6B);
        x ^= x >> 13;
        x = x.wrapping_mul(0xC2B2_AE35);
        x ^= x >> 16;
        x as f32 / u32::MAX as f32 * 2.0 - 1.0
    }

    #[test]
    fn detects_sung_a4() {
        let pipeline = PitchPipeline::new(4096).unwrap();
        let signal = harmonic_tone(440.0, &[0.5, 0.25, 0.125, 0.06], 44_100.0, 4096);
        let analysis = pipeline.analyze(
            &signal,
            44_100.0,
            &DetectionSettings::live(),
            Duration::from_millis(250),
        );
        let estimate = analysis.detection.estimate().expect("tone should be detected");
        assert!((estimate.frequency_hz - 440.0).abs() < 8.0, "{estimate:?}");
        assert_eq!(estimate.timestamp, Duration::from_millis(250));
        assert_eq!(analysis.magnitudes.len(), 2048);
    }

    #[test]
    fn band_above_nyquist_is_invalid_range() {
        let pipeline = PitchPipeline::new(1024).unwrap();
        let settings = DetectionSettings {
            min_frequency_hz: 9000.0,
            max_frequency_hz: 12_000.0,
            ..DetectionSettings::live()
        };
        let signal = harmonic_tone(440.0, &[0.5], 16_000.0, 1024);
        let analysis = pipeline.analyze(&signal, 16_000.0, &settings, Duration::ZERO);
        assert_eq!(
            analysis.detection,
            Detection::NotDetected(NoDetectionReason::InvalidRange)
        );
    }

    #[test]
    fn zero_window_is_weak_peak() {
        let pipeline = PitchPipeline::new(1024).unwrap();
        let analysis = pipeline.analyze(
            &[0.0; 1024],
            44_100.0,
            &DetectionSettings::live(),
            Duration::ZERO,
        );
        assert_eq!(analysis.detection.reason(), Some(NoDetectionReason::WeakPeak));
    }

    #[test]
    fn non_finite_window_is_malformed() {
        let pipeline = PitchPipeline::new(64).unwrap();
        let mut window = vec![0.1; 64];
        window[3] = f32::INFINITY;
        let analysis = pipeline.analyze(&window, 8000.0, &DetectionSettings::live(), Duration::ZERO);
        assert_eq!(
            analysis.detection.reason(),
            Some(NoDetectionReason::MalformedInput)
        );
        assert!(analysis.magnitudes.is_empty());
    }

    #[test]
    fn unreachable_threshold_rejects_as_low_confidence() {
        let pipeline = PitchPipeline::new(4096).unwrap();
        let settings = DetectionSettings {
            confidence_threshold: 1.0,
            harmonic_count: 4,
            ..DetectionSettings::live()
        };
        let signal = harmonic_tone(300.0, &[0.5, 0.25, 0.125, 0.06], 44_100.0, 4096);
        let analysis = pipeline.analyze(&signal, 44_100.0, &settings, Duration::ZERO);
        assert_eq!(
            analysis.detection.reason(),
            Some(NoDetectionReason::LowConfidence)
        );
        assert!(analysis.breakdown.is_some());
    }

    #[test]
    fn display_band_slices_by_frequency() {
        let mags: Vec<f32> = (0..100).map(|i| i as f32).collect();
        // 10 Hz per bin.
        let band = display_band(&mags, 2000.0, 200, 95.0, 300.0);
        assert_eq!(band.first(), Some(&10.0));
        assert_eq!(band.last(), Some(&30.0));
        assert!(display_band(&[], 2000.0, 200, 0.0, 100.0).is_empty());
    }
}
