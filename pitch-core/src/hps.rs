//! # Harmonic Product Spectrum Module
//!
//! Locates the most likely fundamental bin by multiplying the magnitude
//! spectrum with its own harmonics. A true fundamental lines up with energy at
//! 2f, 3f, ... and so dominates the product, which keeps a strong second
//! harmonic from being reported as the pitch.

use crate::fft::frequency_to_bin;

/// Peaks below this product are too weak to call.
pub const MIN_HPS_PEAK: f32 = 0.01;

/// Inclusive range of candidate fundamental bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinRange {
    pub min: usize,
    pub max: usize,
}

impl BinRange {
    /// Maps a frequency band onto the bins of a `window_size` transform.
    ///
    /// The lower edge rounds up and the upper edge rounds down so every
    /// candidate bin lies inside the band. DC is never a candidate and the
    /// upper edge is capped to the last magnitude bin. Returns `None` when the
    /// band collapses (`min >= max`).
    pub fn for_band(
        min_hz: f32,
        max_hz: f32,
        sample_rate: f32,
        window_size: usize,
    ) -> Option<Self> {
        let spectrum_len = window_size / 2;
        if spectrum_len < 2 {
            return None;
        }
        let min = frequency_to_bin(min_hz, sample_rate, window_size).ceil();
        let max = frequency_to_bin(max_hz, sample_rate, window_size).floor();
        if !(min.is_finite() && max.is_finite()) || max < 0.0 {
            return None;
        }
        let min = (min.max(1.0) as usize).max(1);
        let max = (max as usize).min(spectrum_len - 1);
        (min < max).then_some(Self { min, max })
    }

    pub fn contains(&self, bin: usize) -> bool {
        (self.min..=self.max).contains(&bin)
    }
}

/// Product spectrum over a candidate range.
#[derive(Debug, Clone, PartialEq)]
pub struct HpsFrame {
    range: BinRange,
    values: Vec<f32>,
}

impl HpsFrame {
    /// `hps[bin] = Π_{h=1}^{H} magnitude[bin·h]`, skipping `bin·h` past the
    /// end of the spectrum.
    pub fn compute(magnitudes: &[f32], range: BinRange, harmonic_count: usize) -> Self {
        let values = (range.min..=range.max)
            .map(|bin| {
                (1..=harmonic_count)
                    .map(|h| bin * h)
                    .take_while(|&idx| idx < magnitudes.len())
                    .map(|idx| magnitudes[idx])
                    .product()
            })
            .collect();
        Self { range, values }
    }

    pub fn range(&self) -> BinRange {
        self.range
    }

    /// Product value at an absolute bin index, if the bin is a candidate.
    pub fn get(&self, bin: usize) -> Option<f32> {
        if self.range.contains(bin) {
            self.values.get(bin - self.range.min).copied()
        } else {
            None
        }
    }

    /// Absolute bin of the largest product and its value.
    ///
    /// Ties resolve to the lowest bin.
    pub fn peak(&self) -> Option<(usize, f32)> {
        self.values
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
                Some((_, bv)) if bv >= v => best,
                _ => Some((i, v)),
            })
            .map(|(i, v)| (self.range.min + i, v))
    }

    /// The peak, provided it clears [`MIN_HPS_PEAK`].
    pub fn strong_peak(&self) -> Option<(usize, f32)> {
        self.peak().filter(|&(_, v)| v >= MIN_HPS_PEAK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_maps_to_inclusive_bins() {
        // 10 Hz per bin.
        let range = BinRange::for_band(100.0, 800.0, 1000.0, 100).unwrap();
        assert_eq!(range, BinRange { min: 10, max: 49 });

        let range = BinRange::for_band(105.0, 795.0, 10_000.0, 1000).unwrap();
        assert_eq!(range, BinRange { min: 11, max: 79 });
    }

    #[test]
    fn collapsed_band_has_no_range() {
        assert!(BinRange::for_band(100.0, 101.0, 44_100.0, 1024).is_none());
        assert!(BinRange::for_band(30_000.0, 40_000.0, 44_100.0, 1024).is_none());
    }

    #[test]
    fn fundamental_beats_stronger_second_harmonic() {
        let mut mags = vec![0.1f32; 64];
        mags[5] = 2.0;
        mags[10] = 4.0;
        mags[15] = 1.5;
        mags[20] = 1.0;
        let range = BinRange { min: 2, max: 12 };
        let hps = HpsFrame::compute(&mags, range, 4);
        assert_eq!(hps.peak().map(|(bin, _)| bin), Some(5));
    }

    #[test]
    fn out_of_spectrum_harmonics_are_skipped() {
        let mags = vec![2.0f32; 10];
        let range = BinRange { min: 1, max: 9 };
        let hps = HpsFrame::compute(&mags, range, 3);
        assert_eq!(hps.get(3), Some(8.0)); // 3, 6, 9
        assert_eq!(hps.get(4), Some(4.0)); // 4, 8
        assert_eq!(hps.get(9), Some(2.0)); // 9
        assert_eq!(hps.get(0), None);
    }

    #[test]
    fn weak_peak_is_not_strong() {
        let mags = vec![0.01f32; 32];
        let hps = HpsFrame::compute(&mags, BinRange { min: 1, max: 10 }, 3);
        assert!(hps.peak().is_some());
        assert!(hps.strong_peak().is_none());
    }
}
