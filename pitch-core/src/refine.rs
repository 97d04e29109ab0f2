//! # Sub-bin Refinement Module
//!
//! Moves the integer HPS peak to a fractional bin using the values of its two
//! neighbours (Quinn's first estimator in its quadratic form), which gives far
//! better pitch resolution than the raw bin spacing.

use crate::fft::bin_to_frequency;
use crate::hps::HpsFrame;

const DENOMINATOR_EPSILON: f32 = 1e-12;

/// Fractional offset of the true peak from `beta`'s bin.
///
/// `alpha`, `beta` and `gamma` are the values at `peak-1`, `peak` and
/// `peak+1`. A positive offset points toward `gamma`. Returns 0.0 when the
/// curve is flat or the offset would leave the neighbourhood.
pub fn quinn_offset(alpha: f32, beta: f32, gamma: f32) -> f32 {
    let numerator = gamma - alpha;
    let denominator = 2.0 * (2.0 * beta - alpha - gamma);
    if denominator.abs() <= DENOMINATOR_EPSILON {
        return 0.0;
    }
    let tau = numerator / denominator;
    if tau.is_finite() && tau.abs() <= 1.0 {
        tau
    } else {
        0.0
    }
}

/// Fractional bin of the HPS peak at `peak_bin`.
///
/// Peaks on either edge of the candidate range have only one neighbour and
/// are returned unrefined.
pub fn refine_peak(hps: &HpsFrame, peak_bin: usize) -> f32 {
    let range = hps.range();
    if peak_bin <= range.min || peak_bin >= range.max {
        return peak_bin as f32;
    }
    match (hps.get(peak_bin - 1), hps.get(peak_bin), hps.get(peak_bin + 1)) {
        (Some(alpha), Some(beta), Some(gamma)) => {
            peak_bin as f32 + quinn_offset(alpha, beta, gamma)
        }
        _ => peak_bin as f32,
    }
}

/// Refined peak frequency in Hz.
pub fn refined_frequency(
    hps: &HpsFrame,
    peak_bin: usize,
    sample_rate: f32,
    window_size: usize,
) -> f32 {
    bin_to_frequency(refine_peak(hps, peak_bin), sample_rate, window_size)
}
