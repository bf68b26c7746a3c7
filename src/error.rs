//! Error types and the fatal-fault counter (spec.md §7).
//!
//! Grounded on the teacher's convention of `thiserror`-derived error enums
//! at public API boundaries (see e.g. `wave.rs`'s `WaveError`), applied here
//! to the two boundaries spec.md names: configuration (`prepare`, which can
//! fail before any audio flows) and in-stream processing faults (which
//! must never abort the real-time path, only be counted and reported).

use std::sync::atomic::{AtomicU64, Ordering};

/// Failures that can occur while configuring the engine, before processing
/// starts.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),

    #[error("max block size must be at least 1, got {0}")]
    InvalidBlockSize(usize),

    #[error("channel count must be at least 1, got {0}")]
    InvalidChannelCount(usize),
}

/// Faults that can occur mid-stream. Per spec.md §7, "the real-time path
/// never panics and never returns an `Err` from `process`"; these are
/// recorded via [`FaultCounter`] instead and surfaced to the caller only
/// out-of-band (metering, logging).
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessFault {
    #[error("a non-finite sample was sanitized to silence before analysis")]
    NonFiniteInput,

    #[error("a non-finite value was sanitized during resynthesis")]
    NonFiniteSynthesis,

    #[error("process() called with a channel count that does not match the prepared layout")]
    ChannelCountMismatch,
}

/// A monotonically increasing, lock-free count of faults encountered on the
/// real-time path, readable from any thread without blocking it.
#[derive(Debug, Default)]
pub struct FaultCounter {
    count: AtomicU64,
}

impl FaultCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record(&self, _fault: ProcessFault) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_zero_and_increments() {
        let counter = FaultCounter::new();
        assert_eq!(counter.count(), 0);
        counter.record(ProcessFault::NonFiniteInput);
        counter.record(ProcessFault::NonFiniteSynthesis);
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn reset_clears_the_count() {
        let counter = FaultCounter::new();
        counter.record(ProcessFault::NonFiniteInput);
        counter.reset();
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn config_errors_carry_the_offending_value() {
        let err = ConfigError::InvalidSampleRate(-1.0);
        assert!(err.to_string().contains("-1"));
    }
}
