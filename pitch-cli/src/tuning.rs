//! # Musical Tuning Module
//!
//! Note names and cent deviations for detected frequencies, based on equal
//! temperament with A4 = 440 Hz.
//!
//! ## Features
//! - Note table covering C1 to B7 (MIDI 24 to 107), wide enough for any voice
//! - Nearest-note lookup
//! - Cent deviation calculations

use once_cell::sync::Lazy;

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

const FIRST_MIDI: u8 = 24;
const LAST_MIDI: u8 = 107;
const A4_MIDI: f32 = 69.0;

/// Equal-tempered notes from C1 to B7, computed once on first use.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    (FIRST_MIDI..=LAST_MIDI)
        .map(|midi| {
            // f = 440 * 2^((m - 69) / 12)
            let frequency = 440.0 * 2.0_f32.powf((midi as f32 - A4_MIDI) / 12.0);
            let octave = midi as i32 / 12 - 1;
            let name = format!("{}{}", NOTE_NAMES[midi as usize % 12], octave);
            Note { name, frequency }
        })
        .collect()
});

/// Finds the closest note to a given frequency.
///
/// The comparison is done in cents so that the split between two
/// neighbours sits at the quarter tone, not at the arithmetic midpoint.
///
/// # Returns
/// * `Some((note_name, target_frequency))`, or `None` for a non-positive or
///   non-finite input
pub fn find_nearest_note(freq: f32) -> Option<(String, f32)> {
    if !(freq.is_finite() && freq > 0.0) {
        return None;
    }
    NOTES
        .iter()
        .min_by(|a, b| {
            let diff_a = calculate_cents_deviation(freq, a.frequency).abs();
            let diff_b = calculate_cents_deviation(freq, b.frequency).abs();
            diff_a.total_cmp(&diff_b)
        })
        .map(|note| (note.name.clone(), note.frequency))
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
