//! # Sample Accumulator Module
//!
//! Keeps the rolling window of the most recent samples and decides when a
//! new analysis cycle is due. Also hosts the RMS silence gate, which lets the
//! caller skip the transform entirely for quiet windows.
//!
//! The accumulator never hands out references into its own storage: a cycle
//! receives an owned copy of the window, so the producer can keep appending
//! while the copy is analyzed elsewhere.

use std::collections::VecDeque;

/// Root-mean-square amplitude of a block of samples.
///
/// Returns 0.0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Silence gate. Detection requires an RMS strictly above the threshold.
pub fn is_silent(samples: &[f32], threshold: f32) -> bool {
    rms(samples) <= threshold
}

/// Why a chunk was refused by [`SampleAccumulator::push`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChunkRejection {
    /// The chunk contained no samples.
    Empty,
    /// The chunk length differs from the configured chunk length.
    WrongLength { expected: usize, actual: usize },
    /// At least one sample was NaN or infinite.
    NonFinite,
    /// The chunk reported an unusable sample rate.
    BadSampleRate(f32),
    /// The sample rate changed after it was discovered for this session.
    SampleRateChanged { discovered: f32, reported: f32 },
}

/// A window that is ready for analysis.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    /// Copy of the most recent `window_size` samples, oldest first.
    pub samples: Vec<f32>,
    /// Sample rate discovered for this session.
    pub sample_rate: f32,
    /// Stream position of the last sample, in seconds since the session began.
    pub position_secs: f64,
}

/// Rolling sample window with hop-based release.
#[derive(Debug)]
pub struct SampleAccumulator {
    window: VecDeque<f32>,
    window_size: usize,
    hop_size: usize,
    expected_chunk_len: Option<usize>,
    nominal_sample_rate: f32,
    discovered_sample_rate: Option<f32>,
    since_release: usize,
    released_once: bool,
    total_samples: u64,
}

impl SampleAccumulator {
    pub fn new(
        window_size: usize,
        hop_size: usize,
        nominal_sample_rate: f32,
        expected_chunk_len: Option<usize>,
    ) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            hop_size,
            expected_chunk_len,
            nominal_sample_rate,
            discovered_sample_rate: None,
            since_release: 0,
            released_once: false,
            total_samples: 0,
        }
    }

    /// Forgets every sample and the discovered sample rate.
    pub fn reset(&mut self) {
        self.window.clear();
        self.discovered_sample_rate = None;
        self.since_release = 0;
        self.released_once = false;
        self.total_samples = 0;
    }

    /// Sample rate used for bin/frequency conversion: the discovered one once
    /// a chunk has arrived, the nominal one before that.
    pub fn sample_rate(&self) -> f32 {
        self.discovered_sample_rate.unwrap_or(self.nominal_sample_rate)
    }

    pub fn discovered_sample_rate(&self) -> Option<f32> {
        self.discovered_sample_rate
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.window_size
    }

    /// Appends a chunk and returns a snapshot if a cycle is due.
    ///
    /// A rejected chunk leaves the window untouched.
    pub fn push(
        &mut self,
        samples: &[f32],
        sample_rate: f32,
    ) -> Result<Option<WindowSnapshot>, ChunkRejection> {
        self.check_chunk(samples, sample_rate)?;

        if self.discovered_sample_rate.is_none() {
            if (sample_rate - self.nominal_sample_rate).abs() > f32::EPSILON {
                log::info!(
                    "input sample rate is {} Hz (nominal {} Hz); using the reported rate",
                    sample_rate,
                    self.nominal_sample_rate
                );
            }
            self.discovered_sample_rate = Some(sample_rate);
        }

        self.window.extend(samples.iter().copied());
        if self.window.len() > self.window_size {
            let excess = self.window.len() - self.window_size;
            self.window.drain(..excess);
        }
        self.since_release += samples.len();
        self.total_samples += samples.len() as u64;

        if !self.is_full() {
            return Ok(None);
        }
        if self.released_once && self.since_release < self.hop_size {
            return Ok(None);
        }

        self.released_once = true;
        self.since_release = 0;
        let sample_rate = self.sample_rate();
        Ok(Some(WindowSnapshot {
            samples: self.window.iter().copied().collect(),
            sample_rate,
            position_secs: self.total_samples as f64 / sample_rate as f64,
        }))
    }

    fn check_chunk(&self, samples: &[f32], sample_rate: f32) -> Result<(), ChunkRejection> {
        if samples.is_empty() {
            return Err(ChunkRejection::Empty);
        }
        if let Some(expected) = self.expected_chunk_len {
            if samples.len() != expected {
                return Err(ChunkRejection::WrongLength {
                    expected,
                    actual: samples.len(),
                });
            }
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(ChunkRejection::BadSampleRate(sample_rate));
        }
        if let Some(discovered) = self.discovered_sample_rate {
            if (discovered - sample_rate).abs() > f32::EPSILON {
                return Err(ChunkRejection::SampleRateChanged {
                    discovered,
                    reported: sample_rate,
                });
            }
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(ChunkRejection::NonFinite);
        }
        Ok(())
    }
}
