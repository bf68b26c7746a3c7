//! Single-writer/single-reader atomic parameter cells.
//!
//! Every control value is stored as the bit pattern of an `f64` inside an
//! `AtomicU64`, so a write from a control thread can never tear under a
//! concurrent read from the audio thread, without any locking on either
//! side.

use core::sync::atomic::{AtomicU64, Ordering};

/// A single `f64` control value, written from the control thread and read
/// from the audio thread (or vice versa for metering). Lock-free, wait-free,
/// never allocates.
#[derive(Debug)]
pub struct AtomicParam {
    bits: AtomicU64,
}

impl AtomicParam {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    /// Store a new value. Safe to call from any single writer thread.
    #[inline]
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Load the current value. Safe to call from any single reader thread.
    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Clone for AtomicParam {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl Default for AtomicParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}
