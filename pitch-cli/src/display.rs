//! # Text Display Module
//!
//! Terminal renderings of detection results: a cent meter with a needle and
//! a coarse log-magnitude spectrum line.

use pitch_core::{Detection, DetectionEvent, NoDetectionReason, PitchEstimate};

use crate::tuning::{calculate_cents_deviation, find_nearest_note};

/// Meter range in cents on each side of the target.
const METER_RANGE: f32 = 50.0;
/// Character cells per side of the meter.
const METER_HALF_WIDTH: usize = 20;
const EPSILON: f32 = 1e-12;
const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// How close a pitch is to its nearest note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningZone {
    InTune,
    Close,
    Off,
}

impl TuningZone {
    pub fn from_cents(cents: f32) -> Self {
        let abs = cents.abs();
        if abs < 5.0 {
            TuningZone::InTune
        } else if abs < 20.0 {
            TuningZone::Close
        } else {
            TuningZone::Off
        }
    }

    fn label(self) -> &'static str {
        match self {
            TuningZone::InTune => "in tune",
            TuningZone::Close => "close",
            TuningZone::Off => "off",
        }
    }
}

/// Draws `[-----|-----]` with the needle at `cents`, clamped to the range.
pub fn cent_meter(cents: f32) -> String {
    let clamped = cents.clamp(-METER_RANGE, METER_RANGE);
    let width = METER_HALF_WIDTH * 2 + 1;
    let needle = ((clamped / METER_RANGE + 1.0) * METER_HALF_WIDTH as f32).round() as usize;
    let cells: String = (0..width)
        .map(|i| {
            if i == needle {
                '●'
            } else if i == METER_HALF_WIDTH {
                '|'
            } else {
                '-'
            }
        })
        .collect();
    format!("[{cells}]")
}

/// One line per accepted estimate: note, cents, meter and confidence.
pub fn estimate_line(estimate: &PitchEstimate) -> String {
    let freq = estimate.frequency_hz;
    match find_nearest_note(freq) {
        Some((name, target)) => {
            let cents = calculate_cents_deviation(freq, target);
            format!(
                "{:>8.2} Hz  {:<4} {:+6.1}¢ {} {:<7} conf {:.2}",
                freq,
                name,
                cents,
                cent_meter(cents),
                TuningZone::from_cents(cents).label(),
                estimate.confidence
            )
        }
        None => format!("{:>8.2} Hz  conf {:.2}", freq, estimate.confidence),
    }
}

pub fn reason_label(reason: NoDetectionReason) -> &'static str {
    match reason {
        NoDetectionReason::Silence => "silence",
        NoDetectionReason::WeakPeak => "no clear pitch",
        NoDetectionReason::LowConfidence => "low confidence",
        NoDetectionReason::InvalidRange => "band outside spectrum",
        NoDetectionReason::MalformedInput => "malformed input",
    }
}

pub fn detection_line(detection: &Detection) -> String {
    match detection {
        Detection::Detected(estimate) => estimate_line(estimate),
        Detection::NotDetected(reason) => format!("{:>8}     -- {}", "", reason_label(*reason)),
    }
}

/// Squeezes `magnitudes` into `width` columns of block characters, using the
/// peak of each column on a log scale relative to the loudest column.
pub fn spectrum_line(magnitudes: &[f32], width: usize) -> String {
    if magnitudes.is_empty() || width == 0 {
        return String::new();
    }
    let columns = width.min(magnitudes.len());
    let peaks: Vec<f32> = (0..columns)
        .map(|c| {
            let start = c * magnitudes.len() / columns;
            let end = ((c + 1) * magnitudes.len() / columns).max(start + 1);
            magnitudes[start..end].iter().copied().fold(0.0, f32::max)
        })
        .collect();

    let max = peaks.iter().copied().fold(0.0, f32::max);
    if max <= EPSILON {
        return BARS[0].to_string().repeat(columns);
    }

    // 60 dB of range below the loudest column.
    let floor_db = -60.0;
    peaks
        .iter()
        .map(|&p| {
            let db = 20.0 * ((p + EPSILON) / max).log10();
            let level = ((db - floor_db) / -floor_db).clamp(0.0, 1.0);
            BARS[(level * (BARS.len() - 1) as f32).round() as usize]
        })
        .collect()
}

/// Spectrum line of a published event. The event spectrum already starts at
/// the lower edge of the display band.
pub fn event_spectrum_line(event: &DetectionEvent, width: usize) -> String {
    spectrum_line(&event.spectrum, width)
}
