//! Complex wavetable oscillator bank: one process-wide read-only cos/-sin
//! table, shared by reference across many lightweight per-bin oscillator
//! instances.

use lazy_static::lazy_static;

/// Wavetable length. Power of two so phase wraparound is a bitmask.
pub const WAVETABLE_SIZE: usize = 512;

lazy_static! {
    /// The one process-wide read-only pair of tables, built lazily on first
    /// use and shared immutably thereafter.
    static ref TABLE: StaticWavetable = StaticWavetable::new(WAVETABLE_SIZE);
}

/// A single cycle of cosine and (negated) sine, precomputed once.
pub struct StaticWavetable {
    cos: Vec<f64>,
    neg_sin: Vec<f64>,
    mask: usize,
}

impl StaticWavetable {
    fn new(size: usize) -> Self {
        assert!(size.is_power_of_two());
        let mut cos = Vec::with_capacity(size);
        let mut neg_sin = Vec::with_capacity(size);
        let step = core::f64::consts::TAU / size as f64;
        for i in 0..size {
            let phase = i as f64 * step;
            cos.push(phase.cos());
            neg_sin.push(-phase.sin());
        }
        Self {
            cos,
            neg_sin,
            mask: size - 1,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.cos.len()
    }

    /// Linearly interpolated `(cos, -sin)` pair at fractional index `phase`
    /// (not normalized to `0..1`; in raw table-index units).
    #[inline]
    fn read(&self, phase: f64) -> (f64, f64) {
        let idx_low = phase.floor();
        let i0 = (idx_low as i64 as usize) & self.mask;
        let i1 = (i0 + 1) & self.mask;
        let frac = phase - idx_low;
        let one_minus = 1.0 - frac;
        let c = self.cos[i0] * one_minus + self.cos[i1] * frac;
        let s = self.neg_sin[i0] * one_minus + self.neg_sin[i1] * frac;
        (c, s)
    }
}

/// Returns the shared process-wide table, constructing it on first use.
#[inline]
fn shared_table() -> &'static StaticWavetable {
    &TABLE
}

/// A complex oscillator reading from the shared wavetable, one per (octave,
/// bin) in the engine's oscillator bank.
#[derive(Clone, Copy, Debug)]
pub struct ComplexOscillator {
    frequency: f64,
    sample_rate: f64,
    phase: f64,
    phase_increment: f64,
}

impl ComplexOscillator {
    pub fn new(sample_rate: f64, frequency: f64) -> Self {
        let mut osc = Self {
            frequency,
            sample_rate,
            phase: 0.0,
            phase_increment: 0.0,
        };
        osc.update_increment();
        osc
    }

    #[inline]
    fn update_increment(&mut self) {
        let table_len = shared_table().len() as f64;
        self.phase_increment = self.frequency * table_len / self.sample_rate;
    }

    /// Retune the oscillator. Per spec.md §4.7, frequencies are set at init
    /// and whenever tuning changes; this does not reset phase.
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
        self.update_increment();
    }

    /// Change the sample rate this oscillator runs at (its octave's
    /// decimated rate) and recompute the phase increment.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.update_increment();
    }

    pub fn reset_phase(&mut self) {
        self.phase = 0.0;
    }

    /// Produce the next `(re, im)` sample and advance phase.
    #[inline]
    pub fn generate_sample(&mut self) -> (f64, f64) {
        let table = shared_table();
        let value = table.read(self.phase);
        self.phase += self.phase_increment;
        let len = table.len() as f64;
        // Wrap into [0, len) regardless of how many periods were crossed.
        self.phase -= len * (self.phase / len).floor();
        value
    }

    /// Fill `out` with `out.len()` successive complex samples.
    #[inline]
    pub fn generate_block(&mut self, out: &mut [(f64, f64)]) {
        for slot in out.iter_mut() {
            *slot = self.generate_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_a_unit_circle() {
        let table = StaticWavetable::new(64);
        for i in 0..64 {
            let (c, s) = (table.cos[i], -table.neg_sin[i]);
            assert!((c * c + s * s - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn oscillator_phase_wraps_and_stays_unit_magnitude() {
        let mut osc = ComplexOscillator::new(48000.0, 440.0);
        for _ in 0..48000 {
            let (re, im) = osc.generate_sample();
            let mag = (re * re + im * im).sqrt();
            assert!((mag - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn dc_oscillator_is_constant() {
        // Zero frequency should not advance phase, so every sample equals
        // the first.
        let mut osc = ComplexOscillator::new(48000.0, 0.0);
        let first = osc.generate_sample();
        for _ in 0..10 {
            let next = osc.generate_sample();
            assert!((next.0 - first.0).abs() < 1e-12);
            assert!((next.1 - first.1).abs() < 1e-12);
        }
    }

    #[test]
    fn retuning_changes_period_without_reset() {
        let mut osc = ComplexOscillator::new(48000.0, 100.0);
        osc.generate_sample();
        osc.set_frequency(1000.0);
        // Should not panic and should keep producing unit-magnitude samples.
        let (re, im) = osc.generate_sample();
        assert!(((re * re + im * im).sqrt() - 1.0).abs() < 1e-6);
    }
}
