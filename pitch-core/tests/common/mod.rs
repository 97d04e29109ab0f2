#![allow(dead_code)]

use std::f32::consts::PI;

/// Deterministic white noise in [-1, 1].
pub fn noise(i: usize) -> f32 {
    let mut x = (i as u32).wrapping_add(0x9E37_79B9).wrapping_mul(0x85EB_CA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2_AE35);
    x ^= x >> 16;
    x as f32 / u32::MAX as f32 * 2.0 - 1.0
}

/// A tone whose `n`-th harmonic has amplitude `amplitudes[n - 1]`, over a
/// faint noise floor like a quiet microphone.
pub fn harmonic_tone(
    fundamental: f32,
    amplitudes: &[f32],
    sample_rate: f32,
    len: usize,
) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate;
            let tone: f32 = amplitudes
                .iter()
                .enumerate()
                .map(|(h, a)| a * (2.0 * PI * fundamental * (h + 1) as f32 * t).sin())
                .sum();
            tone + 0.001 * noise(i)
        })
        .collect()
}

/// 440 Hz with the 2nd, 3rd and 4th harmonics at 0.5x, 0.25x and 0.125x.
pub fn sung_a4(sample_rate: f32, len: usize) -> Vec<f32> {
    harmonic_tone(440.0, &[0.4, 0.2, 0.1, 0.05], sample_rate, len)
}

/// 200 Hz whose 2nd harmonic (400 Hz) is twice as loud as the fundamental.
pub fn boosted_octave_g3(sample_rate: f32, len: usize) -> Vec<f32> {
    harmonic_tone(200.0, &[0.2, 0.4, 0.15, 0.1, 0.05], sample_rate, len)
}
