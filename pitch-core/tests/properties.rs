//! Property-based tests for the analysis invariants.
//!
//! Uses proptest to check that accepted estimates stay inside the configured
//! band, that quiet input is never detected and that analysis is a pure
//! function of its input.

mod common;

use std::time::Duration;

use pitch_core::pipeline::PitchPipeline;
use pitch_core::{DetectionSettings, NoDetectionReason, OfflineAnalyzer};
use proptest::prelude::*;

const SAMPLE_RATE: f32 = 44_100.0;
const WINDOW: usize = 2048;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For any tone and any valid band, an accepted estimate lies inside the
    /// band and its confidence inside [0, 1].
    #[test]
    fn accepted_estimates_respect_band(
        fundamental in 60.0f32..1200.0f32,
        level in 0.05f32..0.6f32,
        min_hz in 80.0f32..300.0f32,
        span in 150.0f32..900.0f32,
        harmonics in 2usize..8,
    ) {
        let settings = DetectionSettings {
            min_frequency_hz: min_hz,
            max_frequency_hz: min_hz + span,
            harmonic_count: harmonics,
            confidence_threshold: 0.2,
            ..DetectionSettings::live()
        };
        let signal = common::harmonic_tone(
            fundamental,
            &[level, level * 0.5, level * 0.25],
            SAMPLE_RATE,
            WINDOW,
        );
        let pipeline = PitchPipeline::new(WINDOW).unwrap();
        let analysis = pipeline.analyze(&signal, SAMPLE_RATE, &settings, Duration::ZERO);

        if let Some(breakdown) = analysis.breakdown {
            prop_assert!((0.0..=1.0).contains(&breakdown.confidence));
        }
        if let Some(estimate) = analysis.detection.estimate() {
            prop_assert!(estimate.frequency_hz >= settings.min_frequency_hz);
            prop_assert!(estimate.frequency_hz <= settings.max_frequency_hz);
            prop_assert!((0.0..=1.0).contains(&estimate.confidence));
        }
    }

    /// Any window whose samples never exceed the threshold has an RMS at or
    /// below it and is reported as silence, whatever the other settings.
    #[test]
    fn quiet_input_is_silence(
        samples in prop::collection::vec(-0.02f32..=0.02f32, WINDOW),
        confidence_threshold in 0.0f32..=1.0f32,
        harmonics in 2usize..8,
    ) {
        let settings = DetectionSettings {
            silence_rms_threshold: 0.02,
            confidence_threshold,
            harmonic_count: harmonics,
            ..DetectionSettings::offline()
        };
        let analyzer = OfflineAnalyzer::with_settings(WINDOW, settings).unwrap();
        let detection = analyzer.analyze(&samples, SAMPLE_RATE, 0.0).unwrap();
        prop_assert_eq!(detection.reason(), Some(NoDetectionReason::Silence));
    }

    /// The same window and settings always give the same result.
    #[test]
    fn analysis_is_deterministic(
        fundamental in 100.0f32..800.0f32,
        level in 0.0f32..0.8f32,
    ) {
        let signal = common::harmonic_tone(fundamental, &[level, level * 0.5], SAMPLE_RATE, WINDOW);
        let settings = DetectionSettings::live();
        let first = PitchPipeline::new(WINDOW).unwrap();
        let second = PitchPipeline::new(WINDOW).unwrap();

        let a = first.analyze(&signal, SAMPLE_RATE, &settings, Duration::ZERO);
        let b = first.analyze(&signal, SAMPLE_RATE, &settings, Duration::ZERO);
        let c = second.analyze(&signal, SAMPLE_RATE, &settings, Duration::ZERO);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&a, &c);
    }
}
