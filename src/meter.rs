//! Spectral-display snapshot surface (spec.md §6): a read-only, UI-rate
//! view of the engine's `O*B` envelope magnitudes and bin center
//! frequencies, plus a dirty flag so a consumer only re-reads frequencies
//! when tuning actually changed.
//!
//! Grounded on the teacher's `shared.rs` (`Shared`, a wrapper exposing
//! real-time-produced values to a non-real-time reader without locking),
//! generalized here from a single `f64` to a flat `O*B` snapshot array.

/// A snapshot of one channel's spectral display data, updated once per
/// internal block by the engine and read at whatever rate the UI polls.
pub struct MeterSnapshot {
    octaves: usize,
    bins: usize,
    magnitudes: Vec<f64>,
    frequencies: Vec<f64>,
    frequencies_changed: bool,
}

impl MeterSnapshot {
    pub fn new(octaves: usize, bins: usize) -> Self {
        Self {
            octaves,
            bins,
            magnitudes: vec![0.0; octaves * bins],
            frequencies: vec![0.0; octaves * bins],
            frequencies_changed: true,
        }
    }

    #[inline]
    fn index(&self, octave: usize, bin: usize) -> usize {
        octave * self.bins + bin
    }

    /// Called by the engine once per internal block with the current
    /// envelope-smoothed magnitude for one bin.
    #[inline]
    pub fn set_magnitude(&mut self, octave: usize, bin: usize, magnitude: f64) {
        let idx = self.index(octave, bin);
        self.magnitudes[idx] = magnitude;
    }

    /// Called by the engine whenever tuning changes and bin center
    /// frequencies are recomputed.
    pub fn set_frequencies(&mut self, octave: usize, freqs: &[f64]) {
        debug_assert_eq!(freqs.len(), self.bins);
        let start = octave * self.bins;
        self.frequencies[start..start + self.bins].copy_from_slice(freqs);
        self.frequencies_changed = true;
    }

    #[inline]
    pub fn magnitude(&self, octave: usize, bin: usize) -> f64 {
        self.magnitudes[self.index(octave, bin)]
    }

    #[inline]
    pub fn frequency(&self, octave: usize, bin: usize) -> f64 {
        self.frequencies[self.index(octave, bin)]
    }

    /// Whether bin center frequencies changed since the last call to
    /// [`Self::clear_frequencies_changed`]. Spec.md §6: the consumer
    /// (not the engine) decides when it has finished reacting to a retune.
    #[inline]
    pub fn frequencies_changed(&self) -> bool {
        self.frequencies_changed
    }

    pub fn clear_frequencies_changed(&mut self) {
        self.frequencies_changed = false;
    }

    #[inline]
    pub fn octaves(&self) -> usize {
        self.octaves
    }

    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_frequencies_changed_set() {
        let meter = MeterSnapshot::new(2, 3);
        assert!(meter.frequencies_changed());
    }

    #[test]
    fn clearing_the_flag_holds_until_next_retune() {
        let mut meter = MeterSnapshot::new(2, 3);
        meter.clear_frequencies_changed();
        assert!(!meter.frequencies_changed());
        meter.set_magnitude(0, 0, 1.0);
        assert!(!meter.frequencies_changed());
        meter.set_frequencies(0, &[1.0, 2.0, 3.0]);
        assert!(meter.frequencies_changed());
    }

    #[test]
    fn magnitude_and_frequency_round_trip_per_bin() {
        let mut meter = MeterSnapshot::new(2, 2);
        meter.set_magnitude(1, 0, 0.42);
        meter.set_frequencies(1, &[100.0, 200.0]);
        assert_eq!(meter.magnitude(1, 0), 0.42);
        assert_eq!(meter.frequency(1, 1), 200.0);
        assert_eq!(meter.magnitude(0, 0), 0.0);
    }
}
