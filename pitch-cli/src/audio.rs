//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! It selects an input device and configuration, and pushes every callback
//! buffer straight into the pitch detector.
//!
//! ## Features
//! - Automatic audio device selection
//! - Mono f32 capture preferred, other channel layouts downmixed
//! - Detector fed directly from the audio callback (no extra thread)
//! - Input device check wired in as the detector's audio session

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use log::{error, info, warn};
use pitch_core::{AudioChunk, AudioSession, PitchDetector};

/// Sample rate requested from the device. The detector adapts if the device
/// delivers another one.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Audio session that requires a default input device to be present.
#[derive(Debug, Default)]
pub struct InputDeviceSession;

impl AudioSession for InputDeviceSession {
    fn activate(&self) -> std::result::Result<(), String> {
        let host = cpal::default_host();
        match host.default_input_device() {
            Some(device) => {
                info!(
                    "audio session active on '{}'",
                    device.name().unwrap_or_else(|_| "unknown device".into())
                );
                Ok(())
            }
            None => Err("no input device available".into()),
        }
    }

    fn deactivate(&self) {
        info!("audio session released");
    }
}

/// Starts audio capture from the default input device.
///
/// This function:
/// 1. Selects the default audio input device
/// 2. Configures the stream, preferring mono 32-bit float near 44.1 kHz
/// 3. Feeds every callback buffer to `detector` as one chunk
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and sample rate
/// * `Err(e)` - Error if audio setup fails
pub fn start_audio_capture(detector: Arc<PitchDetector>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = cpal::SampleRate(TARGET_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    ));
    let config = supported_config.with_sample_rate(sample_rate);

    let sample_rate_val = config.sample_rate().0;
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    info!("Selected sample rate: {} Hz, {} channel(s)", sample_rate_val, channels);

    let err_fn = |err| error!("An error occurred on the audio stream: {}", err);

    // Reused for downmixing so the callback does not allocate per buffer.
    let mut mono = Vec::new();

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples = if channels == 1 {
                    data
                } else {
                    downmix(data, channels, &mut mono);
                    &mono[..]
                };
                detector.append(AudioChunk::new(samples, sample_rate_val as f32));
            },
            err_fn,
            None,
        )
        .context("failed to open the input stream")?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Averages interleaved frames into `out`.
fn downmix(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Mono is preferred; among equals the
/// configuration whose rate range lies closest to `target_rate` wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    let best = configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let covers = c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let rate_penalty = if covers { 0 } else { min_diff.min(max_diff) };
            (c.channels() != 1, rate_penalty)
        });
    if let Some(config) = &best {
        if config.channels() != 1 {
            warn!("no mono input format; downmixing {} channels", config.channels());
        }
    }
    best
}
