//! Output mix stage: pre-engine input gain, equal-power wet/dry crossfade,
//! and post-engine master gain (spec.md §4.9).
//!
//! Grounded on `original_source/include/CqtReverb.h`'s gain-staging order
//! (input gain applied before analysis, so it also shifts the feature
//! thresholds in `features.rs`; mix and master applied only to the final
//! signal path) and on `SmoothedFloat.h` for the ~20 ms smoothing time
//! constant, reused here via [`crate::smoother::LinearSmoother`] rather than
//! `SmoothedFloat`'s countdown ramp reimplemented a second time.

use crate::math::db_amp;
use crate::smoother::{LinearSmoother, DEFAULT_SMOOTHING_MS};

/// Per-channel gain staging: input gain (dB, pre-engine), wet/dry mix
/// (linear `0..1`, equal-power), and master gain (dB, post-engine).
pub struct OutputMix {
    input_gain_db: LinearSmoother,
    mix: LinearSmoother,
    master_gain_db: LinearSmoother,
}

impl OutputMix {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            input_gain_db: LinearSmoother::new(sample_rate, DEFAULT_SMOOTHING_MS, 0.0),
            mix: LinearSmoother::new(sample_rate, DEFAULT_SMOOTHING_MS, 0.3),
            master_gain_db: LinearSmoother::new(sample_rate, DEFAULT_SMOOTHING_MS, 0.0),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.input_gain_db.set_sample_rate(sample_rate);
        self.mix.set_sample_rate(sample_rate);
        self.master_gain_db.set_sample_rate(sample_rate);
    }

    pub fn set_input_gain_db(&mut self, db: f64) {
        self.input_gain_db.set_target(db);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix.set_target(mix.clamp(0.0, 1.0));
    }

    pub fn set_master_gain_db(&mut self, db: f64) {
        self.master_gain_db.set_target(db);
    }

    /// Apply the smoothed input gain to one raw sample, ahead of analysis.
    /// Spec.md §4.9: input gain runs pre-engine, so it also scales the
    /// magnitudes `features.rs` gates against.
    #[inline]
    pub fn apply_input_gain(&mut self, x: f64) -> f64 {
        x * db_amp(self.input_gain_db.next_value())
    }

    /// Equal-power crossfade of `dry` (the gain-staged input, delayed to
    /// match engine latency) against `wet` (the resynthesized signal),
    /// followed by the post-engine master gain.
    #[inline]
    pub fn apply_output_stage(&mut self, dry: f64, wet: f64) -> f64 {
        let mix = self.mix.next_value();
        let dry_gain = (1.0 - mix).sqrt();
        let wet_gain = mix.sqrt();
        let mixed = dry * dry_gain + wet * wet_gain;
        mixed * db_amp(self.master_gain_db.next_value())
    }

    pub fn reset(&mut self) {
        self.input_gain_db.set_value_immediate(self.input_gain_db.value());
        self.mix.set_value_immediate(self.mix.value());
        self.master_gain_db.set_value_immediate(self.master_gain_db.value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(mix: &mut OutputMix, samples: usize) {
        for _ in 0..samples {
            mix.apply_input_gain(0.0);
            mix.apply_output_stage(0.0, 0.0);
        }
    }

    #[test]
    fn mix_zero_is_bypass() {
        let mut mix = OutputMix::new(1000.0);
        mix.set_mix(0.0);
        settle(&mut mix, 200);
        let out = mix.apply_output_stage(0.5, 999.0);
        assert!((out - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mix_one_is_fully_wet() {
        let mut mix = OutputMix::new(1000.0);
        mix.set_mix(1.0);
        settle(&mut mix, 200);
        let out = mix.apply_output_stage(999.0, 0.5);
        assert!((out - 0.5).abs() < 1e-6);
    }

    #[test]
    fn equal_power_crossfade_preserves_power_at_midpoint() {
        let mut mix = OutputMix::new(1000.0);
        mix.set_mix(0.5);
        settle(&mut mix, 200);
        let out = mix.apply_output_stage(1.0, 1.0);
        // sqrt(0.5) + sqrt(0.5) ≈ 1.414, not 1.0 (equal power, not equal
        // gain) and not 2.0 (not a plain sum).
        assert!((out - std::f64::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn input_gain_of_zero_db_is_unity() {
        let mut mix = OutputMix::new(1000.0);
        settle(&mut mix, 200);
        assert!((mix.apply_input_gain(2.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn master_gain_attenuates_in_decibels() {
        let mut mix = OutputMix::new(1000.0);
        mix.set_mix(1.0);
        mix.set_master_gain_db(-20.0);
        settle(&mut mix, 500);
        let out = mix.apply_output_stage(0.0, 1.0);
        assert!((out - 0.1).abs() < 1e-3);
    }
}
