//! # Confidence Scoring Module
//!
//! Scores how believable a detected fundamental is from three independent
//! cues in the magnitude spectrum:
//!
//! - **Peak prominence**: how far the fundamental stands above the average
//!   level of the candidate band.
//! - **Harmonic consistency**: how many of harmonics 2..=5 rise clearly above
//!   the noise floor. Weighted most heavily, since a sung note always carries
//!   overtones.
//! - **Spectral clarity**: how far the fundamental stands above the noise
//!   floor of the whole spectrum.

use crate::hps::BinRange;

const EPSILON: f32 = 1e-10;

const PROMINENCE_WEIGHT: f32 = 0.3;
const HARMONIC_WEIGHT: f32 = 0.5;
const CLARITY_WEIGHT: f32 = 0.2;

/// Ratio (peak over reference) that earns a full prominence or clarity score.
const FULL_SCORE_RATIO: f32 = 10.0;

/// Harmonics checked for consistency.
const CHECKED_HARMONICS: std::ops::RangeInclusive<usize> = 2..=5;

/// Individual cues and their weighted combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceBreakdown {
    pub noise_floor: f32,
    pub peak_prominence: f32,
    pub harmonic_consistency: f32,
    pub spectral_clarity: f32,
    /// Weighted sum, clamped to `[0, 1]`.
    pub confidence: f32,
}

/// Mean of the quietest 10% of magnitudes (at least one value).
pub fn noise_floor(magnitudes: &[f32]) -> f32 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let mut sorted = magnitudes.to_vec();
    sorted.sort_unstable_by(f32::total_cmp);
    let count = (sorted.len() / 10).max(1);
    sorted[..count].iter().sum::<f32>() / count as f32
}

/// Scores the fundamental at `fundamental_bin`.
///
/// `range` is the candidate band used for the prominence average.
pub fn score(magnitudes: &[f32], fundamental_bin: usize, range: BinRange) -> ConfidenceBreakdown {
    let floor = noise_floor(magnitudes);
    let peak = magnitudes.get(fundamental_bin).copied().unwrap_or(0.0);

    let band = &magnitudes[range.min.min(magnitudes.len())..(range.max + 1).min(magnitudes.len())];
    let band_average = if band.is_empty() {
        0.0
    } else {
        band.iter().sum::<f32>() / band.len() as f32
    };

    let peak_prominence = ((peak / (band_average + EPSILON)) / FULL_SCORE_RATIO).min(1.0);

    let present = CHECKED_HARMONICS
        .clone()
        .filter(|&h| {
            magnitudes
                .get(fundamental_bin * h)
                .is_some_and(|&m| m > 2.0 * floor)
        })
        .count();
    let harmonic_consistency = present as f32 / CHECKED_HARMONICS.count() as f32;

    let spectral_clarity = (peak / (floor + EPSILON) / FULL_SCORE_RATIO).min(1.0);

    let weighted = PROMINENCE_WEIGHT * peak_prominence
        + HARMONIC_WEIGHT * harmonic_consistency
        + CLARITY_WEIGHT * spectral_clarity;
    let confidence = if weighted.is_finite() {
        weighted.clamp(0.0, 1.0)
    } else {
        0.0
    };

    ConfidenceBreakdown {
        noise_floor: floor,
        peak_prominence,
        harmonic_consistency,
        spectral_clarity,
        confidence,
    }
}
