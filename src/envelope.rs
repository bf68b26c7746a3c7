//! Per-bin asymmetric one-pole envelope follower bank (spec.md §4.6).
//!
//! Grounded on `original_source/include/SmoothedFloat.h`'s
//! `SmoothedFloatUpDown`, restructured as a flat `O*B` array per the
//! arena/index design note in spec.md §9 rather than nested per-bin objects,
//! and conceptually paired with the teacher's `AFollow` (`follow.rs`), which
//! is the same asymmetric-attack/release idea applied to fundsp's generic
//! `AudioNode` graph.

/// One asymmetric one-pole follower. `target > current` uses `alpha_up`;
/// otherwise `alpha_down`. Spec.md §4.6: "Higher attack/decay values -> slower
/// envelopes (coefficients closer to 0)".
#[derive(Clone, Copy, Debug, Default)]
struct OnePoleUpDown {
    current: f64,
    target: f64,
}

impl OnePoleUpDown {
    #[inline]
    fn set_target(&mut self, target: f64) {
        self.target = super::denormal::sanitize_gain(target);
    }

    #[inline]
    fn step(&mut self, alpha_up: f64, alpha_down: f64) -> f64 {
        if self.target > self.current {
            self.current = alpha_up * self.target + (1.0 - alpha_up) * self.current;
        } else {
            self.current = alpha_down * self.target + (1.0 - alpha_down) * self.current;
        }
        self.current
    }
}

/// The full `O*B` bank of envelope followers, one per CQT bin, each running
/// at its own octave's decimated rate (the caller is responsible for calling
/// `generate_block` with the correct per-octave sample count).
pub struct EnvelopeBank {
    octaves: usize,
    bins: usize,
    state: Vec<OnePoleUpDown>,
    alpha_up: f64,
    alpha_down: f64,
}

impl EnvelopeBank {
    pub fn new(octaves: usize, bins: usize) -> Self {
        Self {
            octaves,
            bins,
            state: vec![OnePoleUpDown::default(); octaves * bins],
            alpha_up: super::math::shape_to_coeff(0.25),
            alpha_down: super::math::shape_to_coeff(0.5),
        }
    }

    #[inline]
    fn index(&self, octave: usize, bin: usize) -> usize {
        octave * self.bins + bin
    }

    /// Set attack/decay shape parameters in `[0, 1]`; spec.md §4.6's mapping.
    pub fn set_attack_decay(&mut self, attack: f64, decay: f64) {
        self.alpha_up = super::math::shape_to_coeff(attack);
        self.alpha_down = super::math::shape_to_coeff(decay);
    }

    /// Current smoothed value for one bin (used for meters and for the
    /// Feature & Threshold Stage's `*_current` statistics).
    #[inline]
    pub fn value(&self, octave: usize, bin: usize) -> f64 {
        self.state[self.index(octave, bin)].current
    }

    /// Set the per-block target gain for one bin (spec.md §4.6: "target is
    /// set once per internal block").
    #[inline]
    pub fn set_target(&mut self, octave: usize, bin: usize, target: f64) {
        let idx = self.index(octave, bin);
        self.state[idx].set_target(target);
    }

    /// Advance one bin by `n` samples (its octave's decimated rate) and
    /// write the per-sample modulation values into `out`.
    #[inline]
    pub fn generate_block(&mut self, octave: usize, bin: usize, out: &mut [f64]) {
        let idx = self.index(octave, bin);
        let (alpha_up, alpha_down) = (self.alpha_up, self.alpha_down);
        let state = &mut self.state[idx];
        for slot in out.iter_mut() {
            *slot = state.step(alpha_up, alpha_down);
        }
    }

    pub fn reset(&mut self) {
        for s in self.state.iter_mut() {
            *s = OnePoleUpDown::default();
        }
    }

    #[inline]
    pub fn octaves(&self) -> usize {
        self.octaves
    }

    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// `min(alpha_up, alpha_down)`, the contraction rate bound used by
    /// testable property #4.
    #[inline]
    pub fn alpha_min(&self) -> f64 {
        self.alpha_up.min(self.alpha_down)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follower_is_a_contraction() {
        // Property #4: |y_{n+1} - target| <= (1 - alpha_min) * |y_n - target|.
        let mut bank = EnvelopeBank::new(1, 1);
        bank.set_attack_decay(0.25, 0.5);
        bank.set_target(0, 0, 1.0);
        let alpha_min = bank.alpha_min();
        let mut out = [0.0; 200];
        bank.generate_block(0, 0, &mut out);
        let mut prev_err = 1.0_f64;
        for &y in out.iter() {
            let err = (y - 1.0).abs();
            assert!(err <= (1.0 - alpha_min) * prev_err + 1e-12);
            prev_err = err;
        }
    }

    #[test]
    fn rises_toward_target_then_falls_toward_zero() {
        let mut bank = EnvelopeBank::new(1, 1);
        bank.set_attack_decay(0.0, 0.9);
        bank.set_target(0, 0, 1.0);
        let mut out = [0.0; 64];
        bank.generate_block(0, 0, &mut out);
        assert!(out[63] > out[0]);

        bank.set_target(0, 0, 0.0);
        let mut decay = [0.0; 64];
        bank.generate_block(0, 0, &mut decay);
        // Monotonically decreasing tail (property exercised in scenario #5).
        for w in decay.windows(2) {
            assert!(w[1] <= w[0] + 1e-15);
        }
    }

    #[test]
    fn hazardous_targets_are_sanitized_not_propagated() {
        let mut bank = EnvelopeBank::new(1, 1);
        bank.set_target(0, 0, f64::NAN);
        let mut out = [0.0; 4];
        bank.generate_block(0, 0, &mut out);
        assert!(out.iter().all(|x| x.is_finite()));
    }
}
