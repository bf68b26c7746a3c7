//! Sliding constant-Q transform glue (spec.md §4.2).
//!
//! Per spec.md §1, the sliding CQT itself is "treated as an external library
//! providing forward/inverse transforms on a per-octave basis" and the engine
//! "never peeks into the CQT's internal state beyond" the accessors named in
//! §4.2. That external boundary is modeled here as the [`SlidingCqt`] trait;
//! [`DecimatedCqt`] is the concrete implementation this crate ships, since no
//! publishable sliding-CQT crate exists to depend on (see `DESIGN.md`).
//!
//! [`DecimatedCqt`] analyzes each octave with a bank of recursive complex
//! one-pole resonators (a "sliding Goertzel"), one per bin, run on an
//! anti-alias-filtered, decimated copy of the raw input block. Synthesis
//! writes amplitude-modulated oscillator samples directly into the same
//! per-bin buffers (spec.md §4.8's "consume analysis, synthesize anew") and
//! reconstructs the output block by summing each octave's bins and
//! upsampling back to the full sample rate.

use num_complex::Complex64;

/// Nominal selectivity of the per-bin analysis resonator. Not user-facing;
/// an internal implementation choice for how sharply a bin discriminates its
/// neighbors.
const RESONATOR_Q: f64 = 10.0;

/// The external interface the engine depends on, named exactly per spec.md
/// §4.2.
pub trait SlidingCqt {
    /// Feed one internal block (`B_int` samples) of raw input at the full
    /// sample rate.
    fn input_block(&mut self, samples: &[f64]);

    /// Number of samples octave `o` produces/consumes this internal block
    /// (`n_o = B_int / 2^o`).
    fn samples_to_process(&self, octave: usize) -> usize;

    /// Read-write access to octave `o`, bin `b`'s per-sample complex buffer
    /// for this internal block (length `samples_to_process(o)`). The engine
    /// reads the newest (last) sample for feature extraction, then later
    /// overwrites the whole slice with synthesized values.
    fn bin_buffer(&mut self, octave: usize, bin: usize) -> &mut [Complex64];

    /// Magnitude of the newest analysis sample for bin `b` of octave `o`.
    fn newest_magnitude(&self, octave: usize, bin: usize) -> f64;

    /// Reconstruct and return the `B_int`-sample time-domain output block.
    /// Must be called after all octaves' bin buffers have been overwritten
    /// with synthesis values for this internal block.
    fn output_block(&mut self) -> &[f64];

    /// Center frequencies (Hz) of octave `o`'s bins, depends on tuning.
    fn octave_bin_freqs(&self, octave: usize) -> &[f64];

    /// Decimated sample rate of octave `o` (`sample_rate / 2^o`).
    fn octave_sample_rate(&self, octave: usize) -> f64;

    /// Retune: recompute every bin's center frequency and analysis pole.
    fn set_concert_pitch(&mut self, concert_pitch_hz: f64);
}

/// Two cascaded real one-pole lowpass stages, used as a cheap anti-alias
/// filter ahead of per-octave decimation.
#[derive(Clone, Copy, Debug, Default)]
struct AntiAlias {
    coeff: f64,
    s1: f64,
    s2: f64,
}

impl AntiAlias {
    fn new(cutoff_hz: f64, sample_rate: f64) -> Self {
        let coeff = 1.0 - (-core::f64::consts::TAU * cutoff_hz / sample_rate).exp();
        Self {
            coeff,
            s1: 0.0,
            s2: 0.0,
        }
    }

    #[inline]
    fn step(&mut self, x: f64) -> f64 {
        self.s1 += self.coeff * (x - self.s1);
        self.s2 += self.coeff * (self.s1 - self.s2);
        self.s2
    }

    fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }
}

/// Recursive complex one-pole bandpass resonator tuned to a single bin's
/// center frequency. `y[n] = pole * y[n-1] + (1 - r) * x[n]`, where
/// `pole = r * e^{i*omega}`. This is algebraically a baseband exponential
/// moving average demodulated at `omega` and remodulated back up (the
/// frequency-shift property of LTI systems), so `|y|` tracks half the local
/// amplitude of any sinusoidal component of `x` near `omega`, low-pass
/// filtered with one-pole bandwidth set by `r`.
#[derive(Clone, Copy, Debug, Default)]
struct Resonator {
    y: Complex64,
    pole: Complex64,
    gain: f64,
}

impl Resonator {
    fn new(frequency_hz: f64, sample_rate: f64) -> Self {
        let mut r = Self::default();
        r.retune(frequency_hz, sample_rate);
        r
    }

    fn retune(&mut self, frequency_hz: f64, sample_rate: f64) {
        let bandwidth_hz = (frequency_hz / RESONATOR_Q).max(1.0e-6);
        let r = (-core::f64::consts::PI * bandwidth_hz / sample_rate).exp();
        let omega = core::f64::consts::TAU * frequency_hz / sample_rate;
        self.pole = r * Complex64::from_polar(1.0, omega);
        self.gain = 1.0 - r;
    }

    #[inline]
    fn step(&mut self, x: f64) -> Complex64 {
        self.y = self.pole * self.y + self.gain * x;
        self.y
    }

    fn reset(&mut self) {
        self.y = Complex64::default();
    }
}

/// Concrete sliding CQT: one instance per audio channel.
pub struct DecimatedCqt {
    sample_rate: f64,
    internal_block: usize,
    octaves: usize,
    bins: usize,
    octave_ref: usize,
    tuning: f64,

    anti_alias: Vec<AntiAlias>,
    resonators: Vec<Resonator>,
    bin_freqs: Vec<Vec<f64>>,
    /// `bin_buffer[o][b]` has length `samples_to_process(o)`.
    bin_buffer: Vec<Vec<Vec<Complex64>>>,
    decimated: Vec<Vec<f64>>,

    output: Vec<f64>,
}

impl DecimatedCqt {
    pub fn new(
        sample_rate: f64,
        internal_block: usize,
        octaves: usize,
        bins: usize,
        tuning: f64,
    ) -> Self {
        let octave_ref = (octaves.saturating_sub(1)) / 2;
        let mut cqt = Self {
            sample_rate,
            internal_block,
            octaves,
            bins,
            octave_ref,
            tuning,
            anti_alias: Vec::new(),
            resonators: Vec::new(),
            bin_freqs: Vec::new(),
            bin_buffer: Vec::new(),
            decimated: Vec::new(),
            output: vec![0.0; internal_block],
        };
        cqt.rebuild();
        cqt
    }

    fn octave_decimation(&self, octave: usize) -> usize {
        1usize << octave
    }

    fn rebuild(&mut self) {
        self.anti_alias = (0..self.octaves)
            .map(|o| {
                let sr_o = self.sample_rate / self.octave_decimation(o) as f64;
                AntiAlias::new(sr_o * 0.45, self.sample_rate)
            })
            .collect();

        self.decimated = (0..self.octaves)
            .map(|o| vec![0.0; self.internal_block / self.octave_decimation(o)])
            .collect();

        self.bin_freqs = (0..self.octaves)
            .map(|_| vec![0.0; self.bins])
            .collect();
        self.resonators = vec![Resonator::default(); self.octaves * self.bins];
        self.recompute_tuning();

        self.bin_buffer = (0..self.octaves)
            .map(|o| {
                let n_o = self.internal_block / self.octave_decimation(o);
                (0..self.bins).map(|_| vec![Complex64::default(); n_o]).collect()
            })
            .collect();
    }

    fn recompute_tuning(&mut self) {
        for o in 0..self.octaves {
            let sr_o = self.octave_sample_rate(o);
            for b in 0..self.bins {
                let f = self.tuning
                    * 2f64.powf(self.octave_ref as f64 - o as f64)
                    * 2f64.powf(b as f64 / self.bins as f64);
                self.bin_freqs[o][b] = f;
                self.resonators[o * self.bins + b] = Resonator::new(f, sr_o);
            }
        }
    }

    pub fn reset(&mut self) {
        for f in self.anti_alias.iter_mut() {
            f.reset();
        }
        for r in self.resonators.iter_mut() {
            r.reset();
        }
        for buf in self.bin_buffer.iter_mut() {
            for b in buf.iter_mut() {
                b.iter_mut().for_each(|x| *x = Complex64::default());
            }
        }
        self.output.iter_mut().for_each(|x| *x = 0.0);
    }

    /// Linear-interpolation upsample of `src` (decimated octave signal) by
    /// integer `factor`, accumulated additively into `dst` (full-rate
    /// output), matching spec.md §2 point 9's inverse-transform role.
    fn upsample_add(src: &[f64], factor: usize, dst: &mut [f64]) {
        if factor == 1 {
            for (d, &s) in dst.iter_mut().zip(src.iter()) {
                *d += s;
            }
            return;
        }
        let n = src.len();
        for k in 0..n {
            let a = src[k];
            let b = if k + 1 < n { src[k + 1] } else { src[k] };
            let base = k * factor;
            for i in 0..factor {
                let idx = base + i;
                if idx >= dst.len() {
                    break;
                }
                let t = i as f64 / factor as f64;
                dst[idx] += super::math::lerp(a, b, t);
            }
        }
    }
}

impl SlidingCqt for DecimatedCqt {
    fn input_block(&mut self, samples: &[f64]) {
        debug_assert_eq!(samples.len(), self.internal_block);
        for o in 0..self.octaves {
            let decim = self.octave_decimation(o);
            let filter = &mut self.anti_alias[o];
            let decimated = &mut self.decimated[o];
            let mut w = 0usize;
            for (i, &x) in samples.iter().enumerate() {
                let filtered = filter.step(x);
                if i % decim == 0 {
                    if w < decimated.len() {
                        decimated[w] = filtered;
                    }
                    w += 1;
                }
            }
            for b in 0..self.bins {
                let resonator = &mut self.resonators[o * self.bins + b];
                let buffer = &mut self.bin_buffer[o][b];
                for (slot, &x) in buffer.iter_mut().zip(decimated.iter()) {
                    *slot = resonator.step(x);
                }
            }
        }
    }

    fn samples_to_process(&self, octave: usize) -> usize {
        self.internal_block / self.octave_decimation(octave)
    }

    fn bin_buffer(&mut self, octave: usize, bin: usize) -> &mut [Complex64] {
        &mut self.bin_buffer[octave][bin]
    }

    fn newest_magnitude(&self, octave: usize, bin: usize) -> f64 {
        self.bin_buffer[octave][bin]
            .last()
            .map(|c| 2.0 * c.norm())
            .unwrap_or(0.0)
    }

    fn output_block(&mut self) -> &[f64] {
        self.output.iter_mut().for_each(|x| *x = 0.0);
        for o in 0..self.octaves {
            let n_o = self.samples_to_process(o);
            let decim = self.octave_decimation(o);
            // Sum bins' real parts into this octave's band signal, then
            // upsample-add straight into the output accumulator.
            let mut band = vec![0.0; n_o];
            for b in 0..self.bins {
                for (slot, c) in band.iter_mut().zip(self.bin_buffer[o][b].iter()) {
                    *slot += c.re;
                }
            }
            Self::upsample_add(&band, decim, &mut self.output);
        }
        &self.output
    }

    fn octave_bin_freqs(&self, octave: usize) -> &[f64] {
        &self.bin_freqs[octave]
    }

    fn octave_sample_rate(&self, octave: usize) -> f64 {
        self.sample_rate / self.octave_decimation(octave) as f64
    }

    fn set_concert_pitch(&mut self, concert_pitch_hz: f64) {
        self.tuning = concert_pitch_hz;
        self.recompute_tuning();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octave_sample_rates_halve() {
        let cqt = DecimatedCqt::new(48000.0, 256, 9, 12, 440.0);
        for o in 0..8 {
            assert!((cqt.octave_sample_rate(o) / cqt.octave_sample_rate(o + 1) - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn reference_bin_is_concert_pitch() {
        let cqt = DecimatedCqt::new(48000.0, 256, 9, 12, 440.0);
        let o_ref = cqt.octave_ref;
        assert!((cqt.octave_bin_freqs(o_ref)[0] - 440.0).abs() < 1e-9);
    }

    #[test]
    fn retuning_rescales_every_bin_proportionally() {
        let mut cqt = DecimatedCqt::new(48000.0, 256, 9, 12, 440.0);
        let before: Vec<f64> = cqt.octave_bin_freqs(0).to_vec();
        cqt.set_concert_pitch(466.164);
        let after = cqt.octave_bin_freqs(0);
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((b / a - 466.164 / 440.0).abs() < 1e-9);
        }
    }

    #[test]
    fn resonator_settles_to_input_amplitude_at_matching_frequency() {
        let sr = 48000.0;
        let f = 440.0;
        let mut r = Resonator::new(f, sr);
        let amplitude = 0.7;
        let mut last = Complex64::default();
        for n in 0..20000 {
            let x = amplitude * (core::f64::consts::TAU * f * n as f64 / sr).cos();
            last = r.step(x);
        }
        assert!((2.0 * last.norm() - amplitude).abs() < 0.05);
    }

    #[test]
    fn resonator_rejects_energy_far_from_center_frequency() {
        let sr = 48000.0;
        let mut r = Resonator::new(440.0, sr);
        let mut last = Complex64::default();
        for n in 0..20000 {
            let x = (core::f64::consts::TAU * 4000.0 * n as f64 / sr).cos();
            last = r.step(x);
        }
        assert!(2.0 * last.norm() < 0.1);
    }

    #[test]
    fn silence_in_produces_silence_out() {
        let mut cqt = DecimatedCqt::new(48000.0, 256, 9, 12, 440.0);
        let zeros = vec![0.0; 256];
        for _ in 0..8 {
            cqt.input_block(&zeros);
            for o in 0..9 {
                for b in 0..12 {
                    assert_eq!(cqt.newest_magnitude(o, b), 0.0);
                }
            }
            let out = cqt.output_block();
            assert!(out.iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn bin_buffer_consumed_length_equals_pushed_length() {
        // Testable property #2: samples consumed == samples pushed back.
        let mut cqt = DecimatedCqt::new(48000.0, 256, 9, 12, 440.0);
        cqt.input_block(&vec![0.0; 256]);
        for o in 0..9 {
            let n_o = cqt.samples_to_process(o);
            for b in 0..12 {
                let buf = cqt.bin_buffer(o, b);
                assert_eq!(buf.len(), n_o);
                for slot in buf.iter_mut() {
                    *slot = Complex64::new(1.0, 0.0);
                }
                assert_eq!(cqt.bin_buffer(o, b).len(), n_o);
            }
        }
    }
}
