//! Top-level engine: orchestrates the ten-stage per-channel pipeline spec.md
//! §4 describes, once per internal block.
//!
//! Grounded on `original_source/include/CqtReverb.h`'s `prepareToPlay` /
//! `processBlock` / `releaseResources` lifecycle, and on the teacher's habit
//! (`audiounit.rs`, `net.rs`) of a single top-level struct that owns every
//! per-channel subsystem and exposes a narrow `prepare`/`process`/`release`
//! surface to the host.

use num_complex::Complex64;

use crate::block_adapter::BlockAdapter;
use crate::cqt::{DecimatedCqt, SlidingCqt};
use crate::envelope::EnvelopeBank;
use crate::error::{ConfigError, FaultCounter, ProcessFault};
use crate::features::FeatureStage;
use crate::math::finite_or;
use crate::meter::MeterSnapshot;
use crate::mix::OutputMix;
use crate::params::Params;
use crate::ring::Ring;
use crate::shift::{self, BaseOctaveTracker, TiltColour};
use crate::wavetable::ComplexOscillator;

/// Bins per octave (`original_source/HarmonicReverb/PluginProcessor.h`'s
/// `BinsPerOctave`).
pub const BINS_PER_OCTAVE: usize = 12;
/// Number of octaves analyzed (`OctaveNumber`).
pub const OCTAVE_COUNT: usize = 9;
/// Default channel count the engine is prepared for (`ChannelNumber`);
/// spec.md §6 also allows mono via [`Engine::set_channel_count`].
pub const CHANNEL_COUNT: usize = 2;
/// Samples per internal processing block, independent of whatever block
/// size the host calls `process` with (spec.md §4.1).
pub const INTERNAL_BLOCK_SIZE: usize = 256;
/// How long the base-octave tracker's follower takes to settle.
const BASE_OCTAVE_TIME_CONSTANT_S: f64 = 1.0;

struct ChannelState {
    adapter: BlockAdapter,
    cqt: DecimatedCqt,
    envelope: EnvelopeBank,
    features: FeatureStage,
    oscillators: Vec<ComplexOscillator>,
    base_tracker: BaseOctaveTracker,
    output_mix: OutputMix,
    meter: MeterSnapshot,
    dry_delay: Ring,

    gained_scratch: Vec<f64>,
    dry_scratch: Vec<f64>,
    envelope_scratch: Vec<f64>,
    oscillator_scratch: Vec<(f64, f64)>,
    raw_gain: Vec<Vec<f64>>,
    shifted_scratch: Vec<f64>,
    octave_energy: Vec<f64>,

    /// Host-format (32-bit float, spec.md §6 "Audio I/O") conversion
    /// buffers, sized to the prepared `max_block_size`. The rest of the
    /// pipeline is `f64` throughout (spec.md §3's "O x B doubles" data
    /// model); these are the only place a host block's samples are widened
    /// on the way in and narrowed on the way out.
    host_in: Vec<f64>,
    host_out: Vec<f64>,

    last_tuning: f64,
}

impl ChannelState {
    fn new(
        sample_rate: f64,
        internal_block: usize,
        max_block_size: usize,
        octaves: usize,
        bins: usize,
        tuning: f64,
    ) -> Self {
        let cqt = DecimatedCqt::new(sample_rate, internal_block, octaves, bins, tuning);
        let oscillators = (0..octaves)
            .flat_map(|o| {
                let sr_o = cqt.octave_sample_rate(o);
                let freqs = cqt.octave_bin_freqs(o).to_vec();
                freqs.into_iter().map(move |f| ComplexOscillator::new(sr_o, f))
            })
            .collect();

        // Pre-fill the dry-delay ring with one internal block of silence so
        // every subsequent block can pull before it pushes, giving the dry
        // path a constant one-internal-block delay to match the latency
        // the analysis/resynthesis path necessarily introduces.
        let mut dry_delay = Ring::new(internal_block * 2);
        dry_delay.push(&vec![0.0; internal_block]);

        Self {
            adapter: BlockAdapter::new(internal_block, max_block_size.max(1)),
            cqt,
            envelope: EnvelopeBank::new(octaves, bins),
            features: FeatureStage::new(octaves, bins),
            oscillators,
            base_tracker: BaseOctaveTracker::new(sample_rate, internal_block, BASE_OCTAVE_TIME_CONSTANT_S),
            output_mix: OutputMix::new(sample_rate),
            meter: MeterSnapshot::new(octaves, bins),
            dry_delay,
            gained_scratch: vec![0.0; internal_block],
            dry_scratch: vec![0.0; internal_block],
            envelope_scratch: vec![0.0; internal_block],
            oscillator_scratch: vec![(0.0, 0.0); internal_block],
            raw_gain: vec![vec![0.0; bins]; octaves],
            shifted_scratch: vec![0.0; bins],
            octave_energy: vec![0.0; octaves],
            host_in: vec![0.0; max_block_size.max(1)],
            host_out: vec![0.0; max_block_size.max(1)],
            last_tuning: tuning,
        }
    }

    fn reset(&mut self) {
        self.adapter.reset();
        self.cqt.reset();
        self.envelope.reset();
        self.features.reset();
        for osc in self.oscillators.iter_mut() {
            osc.reset_phase();
        }
        self.base_tracker.reset(0.0);
        self.output_mix.reset();
        self.dry_delay.reset();
        self.dry_delay.push(&vec![0.0; self.gained_scratch.len()]);
    }
}

/// The full resynthesis engine: one [`Params`] bank shared by every channel,
/// plus per-channel analysis/synthesis state.
pub struct Engine {
    sample_rate: f64,
    internal_block: usize,
    octaves: usize,
    bins: usize,

    params: Params,
    colour: TiltColour,
    faults: FaultCounter,

    channel_count: usize,
    channels: Vec<ChannelState>,
    prepared: bool,
}

impl Engine {
    /// Construct an unprepared engine, defaulting to stereo ([`CHANNEL_COUNT`]).
    /// Call [`Self::set_channel_count`] beforehand for mono, then
    /// [`Self::prepare`] before [`Self::process`].
    pub fn new() -> Self {
        Self {
            sample_rate: 0.0,
            internal_block: INTERNAL_BLOCK_SIZE,
            octaves: OCTAVE_COUNT,
            bins: BINS_PER_OCTAVE,
            params: Params::new(),
            colour: TiltColour::new(OCTAVE_COUNT),
            faults: FaultCounter::new(),
            channel_count: CHANNEL_COUNT,
            channels: Vec::new(),
            prepared: false,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn faults(&self) -> &FaultCounter {
        &self.faults
    }

    /// Select mono (1) or stereo (2) channel layout for the next
    /// [`Self::prepare`]. Per spec.md §6 ("the processor... rejects anything
    /// other than mono or stereo matched on both sides") and the Non-goal
    /// that channel counts aren't reconfigured at runtime, this must be
    /// called before `prepare`, not between `process` calls.
    pub fn set_channel_count(&mut self, channels: usize) {
        self.channel_count = channels;
    }

    /// Allocate every per-channel subsystem for the given host sample rate.
    /// The only allocation point in the engine's lifecycle (spec.md §7:
    /// "all allocation happens in `prepare`; `process` never allocates").
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) -> Result<(), ConfigError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            crate::rt_log_warn!("cqt_reverb: rejecting prepare(), invalid sample rate {sample_rate}");
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }
        if max_block_size == 0 {
            crate::rt_log_warn!("cqt_reverb: rejecting prepare(), max_block_size must be >= 1");
            return Err(ConfigError::InvalidBlockSize(max_block_size));
        }
        if self.channel_count != 1 && self.channel_count != 2 {
            crate::rt_log_warn!(
                "cqt_reverb: rejecting prepare(), unsupported channel count {}",
                self.channel_count
            );
            return Err(ConfigError::InvalidChannelCount(self.channel_count));
        }

        // Spec.md §7: "denormal handling is enabled globally for the
        // processing scope". `prepare` runs off the audio thread, so this
        // is the one place to set it before any `process` call can occur.
        crate::denormal::prevent_denormals();

        let tuning = self.params.tuning();
        self.sample_rate = sample_rate;
        self.channels = (0..self.channel_count)
            .map(|_| {
                ChannelState::new(
                    sample_rate,
                    self.internal_block,
                    max_block_size,
                    self.octaves,
                    self.bins,
                    tuning,
                )
            })
            .collect();
        self.prepared = true;
        crate::rt_log_debug!(
            "cqt_reverb: prepared at {sample_rate} Hz, max_block_size={max_block_size}, octaves={}, bins={}",
            self.octaves,
            self.bins
        );
        Ok(())
    }

    /// Release engine state without necessarily freeing allocations; a
    /// subsequent `prepare` is required before `process` again.
    pub fn release(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.reset();
        }
        self.faults.reset();
        self.prepared = false;
        crate::rt_log_debug!("cqt_reverb: released");
    }

    #[inline]
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn meter(&self, channel: usize) -> &MeterSnapshot {
        &self.channels[channel].meter
    }

    pub fn clear_meter_frequencies_changed(&mut self, channel: usize) {
        self.channels[channel].meter.clear_frequencies_changed();
    }

    /// The slowly-tracked octave index currently carrying the most energy,
    /// for display purposes only (spec.md §4.5's base-octave tracker does
    /// not feed back into the shift/mix signal path itself).
    pub fn base_octave(&self, channel: usize) -> f64 {
        self.channels[channel].base_tracker.value()
    }

    /// Process one host block, per channel. `inputs[c]` and `outputs[c]`
    /// must have equal, matching lengths (at most the `max_block_size`
    /// given to [`Self::prepare`]); `inputs.len()` and `outputs.len()` must
    /// both equal the channel count given to [`Self::set_channel_count`]
    /// before `prepare` (mono or stereo — spec.md §6: "rejects anything
    /// other than mono or stereo matched on both sides").
    ///
    /// A layout mismatch discovered here is a real-time contract violation,
    /// not a configuration error: it panics in debug builds and, in release
    /// builds, zero-fills every output buffer and records a
    /// [`ProcessFault::ChannelCountMismatch`] instead (spec.md §7).
    ///
    /// Host buffers are 32-bit float (spec.md §6 "Audio I/O": "Two-channel
    /// (stereo) 32-bit float buffers per call"); every stage downstream of
    /// this boundary runs in `f64` per spec.md §3's data model, so each
    /// host block is widened on the way in and narrowed back on the way
    /// out, entirely within the per-channel scratch buffers allocated in
    /// [`Self::prepare`] (no allocation on this path).
    pub fn process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        debug_assert!(self.prepared, "process called before prepare");
        debug_assert_eq!(inputs.len(), self.channels.len(), "input channel count does not match the prepared layout");
        debug_assert_eq!(outputs.len(), self.channels.len(), "output channel count does not match the prepared layout");
        if inputs.len() != self.channels.len() || outputs.len() != self.channels.len() {
            self.faults.record(ProcessFault::ChannelCountMismatch);
            for output in outputs.iter_mut() {
                output.fill(0.0);
            }
            return;
        }

        let octave_shift = self.params.octave_shift();
        let octave_mix = self.params.octave_mix();
        let colour_value = self.params.colour();
        let attack = self.params.attack();
        let decay = self.params.decay();
        let sparsity = self.params.sparsity();
        let tuning = self.params.tuning();
        let input_gain_db = self.params.input_gain_db();
        let mix = self.params.mix();
        let master_gain_db = self.params.master_gain_db();

        self.colour.set_colour(colour_value);

        let octaves = self.octaves;
        let bins = self.bins;
        let colour = &self.colour;
        let faults = &self.faults;

        for (channel, (&input, output)) in self.channels.iter_mut().zip(inputs.iter().zip(outputs.iter_mut())) {
            let output: &mut [f32] = &mut **output;
            let n = input.len();
            debug_assert_eq!(n, output.len());
            debug_assert!(n <= channel.host_in.len(), "host block exceeds prepared max_block_size");

            channel.envelope.set_attack_decay(attack, decay);
            channel.features.set_sparsity(sparsity);
            channel.output_mix.set_input_gain_db(input_gain_db);
            channel.output_mix.set_mix(mix);
            channel.output_mix.set_master_gain_db(master_gain_db);

            if (tuning - channel.last_tuning).abs() > 1.0e-9 {
                channel.cqt.set_concert_pitch(tuning);
                for o in 0..octaves {
                    let sr_o = channel.cqt.octave_sample_rate(o);
                    let freqs = channel.cqt.octave_bin_freqs(o).to_vec();
                    for (b, f) in freqs.iter().enumerate() {
                        let osc = &mut channel.oscillators[o * bins + b];
                        osc.set_sample_rate(sr_o);
                        osc.set_frequency(*f);
                    }
                    channel.meter.set_frequencies(o, &freqs);
                }
                channel.last_tuning = tuning;
            }

            let ChannelState {
                ref mut adapter,
                ref mut cqt,
                ref mut envelope,
                ref mut features,
                ref mut oscillators,
                ref mut base_tracker,
                ref mut output_mix,
                ref mut meter,
                ref mut dry_delay,
                ref mut gained_scratch,
                ref mut dry_scratch,
                ref mut envelope_scratch,
                ref mut oscillator_scratch,
                ref mut raw_gain,
                ref mut shifted_scratch,
                ref mut octave_energy,
                ref mut host_in,
                ref mut host_out,
                ..
            } = channel;

            let host_in = &mut host_in[..n];
            let host_out = &mut host_out[..n];
            for (slot, &x) in host_in.iter_mut().zip(input.iter()) {
                *slot = x as f64;
            }

            adapter.process(host_in, host_out, |block_in, block_out| {
                run_internal_block(
                    block_in,
                    block_out,
                    cqt,
                    envelope,
                    features,
                    oscillators,
                    base_tracker,
                    output_mix,
                    meter,
                    dry_delay,
                    colour,
                    octaves,
                    bins,
                    octave_shift,
                    octave_mix,
                    faults,
                    gained_scratch,
                    dry_scratch,
                    envelope_scratch,
                    oscillator_scratch,
                    raw_gain,
                    shifted_scratch,
                    octave_energy,
                );
            });

            for (slot, &x) in output.iter_mut().zip(host_out.iter()) {
                *slot = x as f32;
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// One internal block's worth of work for one channel, run by the block
/// adapter once enough host samples have accumulated. Implements spec.md
/// §4's stage order: input gain -> analysis -> envelope -> feature gating
/// -> shift/mix/colour -> resynthesis -> output mix.
#[allow(clippy::too_many_arguments)]
fn run_internal_block(
    block_in: &[f64],
    block_out: &mut [f64],
    cqt: &mut DecimatedCqt,
    envelope: &mut EnvelopeBank,
    features: &mut FeatureStage,
    oscillators: &mut [ComplexOscillator],
    base_tracker: &mut BaseOctaveTracker,
    output_mix: &mut OutputMix,
    meter: &mut MeterSnapshot,
    dry_delay: &mut Ring,
    colour: &TiltColour,
    octaves: usize,
    bins: usize,
    octave_shift: f64,
    octave_mix: f64,
    faults: &FaultCounter,
    gained_scratch: &mut [f64],
    dry_scratch: &mut [f64],
    envelope_scratch: &mut [f64],
    oscillator_scratch: &mut [(f64, f64)],
    raw_gain: &mut [Vec<f64>],
    shifted_scratch: &mut [f64],
    octave_energy: &mut [f64],
) {
    // Pull before push: the ring always holds exactly one internal block of
    // history, so this yields the previous block's gain-staged input,
    // time-aligned with the wet signal's one-block analysis/resynthesis
    // latency.
    dry_delay.pull(dry_scratch);

    for (slot, &x) in gained_scratch.iter_mut().zip(block_in.iter()) {
        let sanitized = finite_or(x, 0.0);
        if sanitized != x {
            faults.record(ProcessFault::NonFiniteInput);
        }
        *slot = output_mix.apply_input_gain(sanitized);
    }
    dry_delay.push(gained_scratch);

    cqt.input_block(gained_scratch);

    // Feature & Threshold Stage (§4.3): statistics are the instantaneous CQT
    // magnitude and the *current* envelope value — i.e. the envelope's state
    // as left by the end of the previous internal block, reflecting what is
    // already being played back. The envelope itself is not advanced here;
    // its target for *this* block isn't known until after shift/mix/colour.
    for o in 0..octaves {
        for b in 0..bins {
            let instantaneous = cqt.newest_magnitude(o, b);
            let env_value = envelope.value(o, b);
            features.set_magnitude(o, b, instantaneous, env_value);
        }
    }
    features.compute();

    for o in 0..octaves {
        let mut energy = 0.0;
        for b in 0..bins {
            let m = cqt.newest_magnitude(o, b);
            let gated = if features.passes(o, b) { m } else { 0.0 };
            raw_gain[o][b] = gated;
            energy += gated * gated;
        }
        octave_energy[o] = energy;
    }
    let base = base_tracker.update(octave_energy);

    // Octave Shift & Mix (§4.4) -> Color EQ (§4.5) -> per-bin envelope
    // (§4.6), run last so its target is GainMixed[o,b], the value actually
    // being synthesized, not the raw pre-gate magnitude.
    for o in 0..octaves {
        shift::shift_octave_gains(raw_gain, o, octave_shift, shifted_scratch);
        let gain_tilt = colour.gain(o, base);
        let n_o = cqt.samples_to_process(o);

        for b in 0..bins {
            let gain_mixed = shift::blend_shifted(raw_gain[o][b], shifted_scratch[b], octave_mix) * gain_tilt;

            envelope.set_target(o, b, gain_mixed);
            envelope.generate_block(o, b, &mut envelope_scratch[..n_o]);

            let osc = &mut oscillators[o * bins + b];
            osc.generate_block(&mut oscillator_scratch[..n_o]);

            let buffer = cqt.bin_buffer(o, b);
            for ((slot, &(re, im)), &mod_value) in buffer
                .iter_mut()
                .zip(oscillator_scratch[..n_o].iter())
                .zip(envelope_scratch[..n_o].iter())
            {
                // Synthesis write-back (§4.8): y[k] = osc[k] * mod[k], a
                // complex-by-real product that keeps the oscillator's
                // imaginary half rather than projecting to the real axis
                // before it reaches the bin buffer.
                let sample = Complex64::new(re, im) * mod_value;
                let sanitized_re = finite_or(sample.re, 0.0);
                let sanitized_im = finite_or(sample.im, 0.0);
                if sanitized_re != sample.re || sanitized_im != sample.im {
                    faults.record(ProcessFault::NonFiniteSynthesis);
                }
                *slot = Complex64::new(sanitized_re, sanitized_im);
            }
        }
        for b in 0..bins {
            meter.set_magnitude(o, b, raw_gain[o][b]);
        }
    }

    let wet = cqt.output_block();
    for i in 0..block_out.len() {
        block_out[i] = output_mix.apply_output_stage(dry_scratch[i], wet[i]);
    }
}
