//! End-to-end tests of the live detector: lifecycle, streaming detection and
//! teardown guarantees.

mod common;

use std::time::Duration;

use pitch_core::{
    AppendStatus, AudioChunk, Detection, DetectionSettings, DetectorConfig, DetectorState,
    NoDetectionReason, PitchDetector,
};

const CHUNK: usize = 1024;

fn detector() -> PitchDetector {
    let _ = env_logger::builder().is_test(true).try_init();
    PitchDetector::new(DetectorConfig::default(), DetectionSettings::live()).unwrap()
}

/// Pushes `signal` in fixed chunks and returns every status.
fn feed(detector: &PitchDetector, signal: &[f32], sample_rate: f32) -> Vec<AppendStatus> {
    signal
        .chunks(CHUNK)
        .map(|chunk| detector.append(AudioChunk::new(chunk, sample_rate)))
        .collect()
}

#[test]
fn streams_sung_note_to_subscribers() {
    let detector = detector();
    let events = detector.subscribe();
    detector.start().unwrap();

    let statuses = feed(&detector, &common::sung_a4(44_100.0, 8192 * 2), 44_100.0);
    assert!(statuses.iter().any(|s| matches!(s, AppendStatus::Dispatched(_))));

    let event = loop {
        let event = events
            .recv_timeout(Duration::from_secs(10))
            .expect("a cycle should complete");
        if event.detection.is_detected() {
            break event;
        }
    };
    let estimate = event.detection.estimate().unwrap();
    assert!((435.0..=445.0).contains(&estimate.frequency_hz), "{estimate:?}");
    assert!(estimate.confidence > 0.5);
    // 80-1000 Hz at 44100/8192 Hz per bin covers bins 15..=185.
    assert_eq!(event.spectrum.len(), 171);

    detector.stop();
}

#[test]
fn first_full_window_dispatches_then_every_hop() {
    let detector = detector();
    detector.start().unwrap();

    let statuses = feed(&detector, &common::sung_a4(44_100.0, 8192 + 4096), 44_100.0);
    // Window of 8192 fills on the 8th chunk; hop of 2048 means every 2nd chunk after.
    let dispatched: Vec<usize> = statuses
        .iter()
        .enumerate()
        .filter(|(_, s)| !matches!(s, AppendStatus::Buffering))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(dispatched, vec![7, 9, 11]);
    detector.stop();
}

#[test]
fn discovers_hardware_sample_rate() {
    let detector = detector();
    detector.start().unwrap();
    assert_eq!(detector.discovered_sample_rate(), None);

    feed(&detector, &common::sung_a4(48_000.0, CHUNK), 48_000.0);
    assert_eq!(detector.discovered_sample_rate(), Some(48_000.0));

    // A different rate mid-run is a malformed chunk.
    assert_eq!(
        detector.append(AudioChunk::new(&[0.1; CHUNK], 44_100.0)),
        AppendStatus::Rejected
    );

    detector.stop();
    detector.start().unwrap();
    assert_eq!(detector.discovered_sample_rate(), None);
    detector.stop();
}

#[test]
fn silence_is_reported_without_analysis() {
    let detector = detector();
    detector.start().unwrap();

    let statuses = feed(&detector, &vec![0.0; 8192], 44_100.0);
    assert_eq!(statuses.last(), Some(&AppendStatus::Silent));
    assert_eq!(
        detector.latest(),
        Some(Detection::NotDetected(NoDetectionReason::Silence))
    );
    detector.stop();
}

#[test]
fn stop_is_idempotent_and_final() {
    let detector = detector();
    let events = detector.subscribe();
    detector.start().unwrap();
    feed(&detector, &common::sung_a4(44_100.0, 8192 * 3), 44_100.0);

    detector.stop();
    assert_eq!(detector.state(), DetectorState::Idle);
    assert_eq!(detector.latest(), None);
    assert!(detector.latest_spectrum().is_empty());

    // Drain whatever was published before stop returned; nothing may follow.
    while events.try_recv().is_ok() {}
    assert_eq!(
        detector.append(AudioChunk::new(&[0.3; CHUNK], 44_100.0)),
        AppendStatus::Ignored
    );
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());

    detector.stop();
    assert_eq!(detector.state(), DetectorState::Idle);
}

#[test]
fn settings_update_applies_to_next_cycle() {
    let detector = detector();
    detector.start().unwrap();

    // Raise the silence threshold above the tone's level: the next due
    // window is gated without analysis.
    detector
        .update_settings(DetectionSettings {
            silence_rms_threshold: 0.9,
            ..DetectionSettings::live()
        })
        .unwrap();
    let statuses = feed(&detector, &common::sung_a4(44_100.0, 8192), 44_100.0);
    assert_eq!(statuses.last(), Some(&AppendStatus::Silent));
    detector.stop();
}

#[test]
fn dropping_a_running_detector_shuts_it_down() {
    let detector = detector();
    detector.start().unwrap();
    feed(&detector, &common::sung_a4(44_100.0, 8192 * 2), 44_100.0);
    drop(detector);
}
