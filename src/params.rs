//! User-facing parameters: lock-free real-time storage plus a serializable
//! snapshot for persistence (spec.md §6 "Parameter surface"/"Persisted
//! state", testable property #8).
//!
//! Ranges and defaults grounded on
//! `original_source/HarmonicReverb/PluginProcessor.h`'s parameter range
//! declarations (`AttackRange`, `DecayRange`, `OctaveShiftRange`,
//! `OctaveMixRange`, `ColourRange`, `SparsityRange`, `TuningRange`,
//! `GainRange`, `MixRange`, `MasterRange`); the atomic-handoff mechanism is
//! grounded on the teacher's `shared.rs` (`Shared`/`AtomicCell`-style
//! single-writer/single-reader pattern), specialized here to `f64` bit
//! patterns in `atomic.rs`.

use serde::{Deserialize, Serialize};

use crate::atomic::AtomicParam;

/// One parameter's valid range and default, used both to clamp incoming
/// host automation and to construct [`Params`]'s defaults.
#[derive(Clone, Copy, Debug)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl Range {
    #[inline]
    pub const fn new(min: f64, max: f64, default: f64) -> Self {
        Self { min, max, default }
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        crate::math::clamp(self.min, self.max, value)
    }
}

pub const ATTACK_RANGE: Range = Range::new(0.0, 1.0, 0.25);
pub const DECAY_RANGE: Range = Range::new(0.0, 1.0, 0.5);
pub const OCTAVE_SHIFT_RANGE: Range = Range::new(-3.0, 3.0, 1.0);
pub const OCTAVE_MIX_RANGE: Range = Range::new(0.0, 1.0, 0.3);
pub const COLOUR_RANGE: Range = Range::new(-1.0, 1.0, 0.0);
pub const SPARSITY_RANGE: Range = Range::new(0.0, 10.0, 1.0);
pub const TUNING_RANGE: Range = Range::new(415.305, 466.164, 440.0);
pub const GAIN_RANGE: Range = Range::new(-20.0, 20.0, 0.0);
pub const MIX_RANGE: Range = Range::new(0.0, 1.0, 0.3);
pub const MASTER_RANGE: Range = Range::new(-20.0, 20.0, 0.0);

/// Lock-free parameter bank: a host-automation (or UI) thread calls the
/// setters, the audio thread calls the getters once per internal block.
/// Each field is independently atomic, so there is no torn-read risk and no
/// blocking in either direction, at the cost of individual parameters being
/// only eventually consistent with each other across a single block
/// boundary (spec.md §9 accepts this as the deliberate tradeoff of the
/// single-writer/single-reader design).
pub struct Params {
    attack: AtomicParam,
    decay: AtomicParam,
    octave_shift: AtomicParam,
    octave_mix: AtomicParam,
    colour: AtomicParam,
    sparsity: AtomicParam,
    tuning: AtomicParam,
    input_gain_db: AtomicParam,
    mix: AtomicParam,
    master_gain_db: AtomicParam,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            attack: AtomicParam::new(ATTACK_RANGE.default),
            decay: AtomicParam::new(DECAY_RANGE.default),
            octave_shift: AtomicParam::new(OCTAVE_SHIFT_RANGE.default),
            octave_mix: AtomicParam::new(OCTAVE_MIX_RANGE.default),
            colour: AtomicParam::new(COLOUR_RANGE.default),
            sparsity: AtomicParam::new(SPARSITY_RANGE.default),
            tuning: AtomicParam::new(TUNING_RANGE.default),
            input_gain_db: AtomicParam::new(GAIN_RANGE.default),
            mix: AtomicParam::new(MIX_RANGE.default),
            master_gain_db: AtomicParam::new(MASTER_RANGE.default),
        }
    }
}

macro_rules! param_accessors {
    ($field:ident, $range:expr, $setter:ident, $getter:ident) => {
        pub fn $setter(&self, value: f64) {
            self.$field.set($range.clamp(value));
        }

        #[inline]
        pub fn $getter(&self) -> f64 {
            self.$field.get()
        }
    };
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    param_accessors!(attack, ATTACK_RANGE, set_attack, attack);
    param_accessors!(decay, DECAY_RANGE, set_decay, decay);
    param_accessors!(octave_shift, OCTAVE_SHIFT_RANGE, set_octave_shift, octave_shift);
    param_accessors!(octave_mix, OCTAVE_MIX_RANGE, set_octave_mix, octave_mix);
    param_accessors!(colour, COLOUR_RANGE, set_colour, colour);
    param_accessors!(sparsity, SPARSITY_RANGE, set_sparsity, sparsity);
    param_accessors!(tuning, TUNING_RANGE, set_tuning, tuning);
    param_accessors!(input_gain_db, GAIN_RANGE, set_input_gain_db, input_gain_db);
    param_accessors!(mix, MIX_RANGE, set_mix, mix);
    param_accessors!(master_gain_db, MASTER_RANGE, set_master_gain_db, master_gain_db);

    /// Take a plain-data snapshot suitable for serialization.
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            attack: self.attack(),
            decay: self.decay(),
            octave_shift: self.octave_shift(),
            octave_mix: self.octave_mix(),
            colour: self.colour(),
            sparsity: self.sparsity(),
            tuning: self.tuning(),
            input_gain_db: self.input_gain_db(),
            mix: self.mix(),
            master_gain_db: self.master_gain_db(),
        }
    }

    /// Apply a snapshot, clamping every field to its range in case it was
    /// produced by a future version with wider ranges.
    pub fn restore(&self, snapshot: &ParamSnapshot) {
        self.set_attack(snapshot.attack);
        self.set_decay(snapshot.decay);
        self.set_octave_shift(snapshot.octave_shift);
        self.set_octave_mix(snapshot.octave_mix);
        self.set_colour(snapshot.colour);
        self.set_sparsity(snapshot.sparsity);
        self.set_tuning(snapshot.tuning);
        self.set_input_gain_db(snapshot.input_gain_db);
        self.set_mix(snapshot.mix);
        self.set_master_gain_db(snapshot.master_gain_db);
    }
}

/// Plain-data mirror of [`Params`] for persistence (preset save/load).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamSnapshot {
    pub attack: f64,
    pub decay: f64,
    pub octave_shift: f64,
    pub octave_mix: f64,
    pub colour: f64,
    pub sparsity: f64,
    pub tuning: f64,
    pub input_gain_db: f64,
    pub mix: f64,
    pub master_gain_db: f64,
}

impl Default for ParamSnapshot {
    fn default() -> Self {
        Params::default().snapshot()
    }
}

impl ParamSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
