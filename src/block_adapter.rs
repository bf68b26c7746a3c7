//! Block-rate adapter between the host's arbitrary per-call block size and
//! the engine's fixed internal block size (spec.md §4.1).
//!
//! Grounded on `original_source/include/CqtReverb.h`'s `mInputBuffer` /
//! `mOutputBuffer` `CircularBuffer<double>` pair and its "accumulate, then
//! drain in fixed-size chunks" processing loop, reimplemented here on top of
//! [`crate::ring::Ring`] rather than hand-rolled indexing.

use crate::ring::Ring;

/// One channel's input/output accumulation rings plus the bookkeeping to
/// call a fixed-size inner step repeatedly as samples become available.
pub struct BlockAdapter {
    internal_block: usize,
    input: Ring,
    output: Ring,
    /// Scratch space sized `internal_block`, reused every inner step to
    /// avoid allocating on the real-time path.
    scratch_in: Vec<f64>,
    scratch_out: Vec<f64>,
}

impl BlockAdapter {
    /// `max_block_size` bounds how many samples the host can hand in per
    /// `process` call; the rings are sized to tolerate one full host block
    /// of slop on top of one internal block (spec.md §4.1: "the adapter must
    /// never allow its rings to overflow for any host block size up to the
    /// prepared maximum").
    pub fn new(internal_block: usize, max_block_size: usize) -> Self {
        let capacity = internal_block + max_block_size;
        Self {
            internal_block,
            input: Ring::new(capacity),
            output: Ring::new(capacity),
            scratch_in: vec![0.0; internal_block],
            scratch_out: vec![0.0; internal_block],
        }
    }

    pub fn reset(&mut self) {
        self.input.reset();
        self.output.reset();
        self.scratch_in.iter_mut().for_each(|x| *x = 0.0);
        self.scratch_out.iter_mut().for_each(|x| *x = 0.0);
    }

    /// Push one host block of `input` samples, run `step` once for every
    /// full internal block now available, and pull exactly `output.len()`
    /// samples back out.
    ///
    /// `step` consumes `internal_block` fresh input samples and produces
    /// `internal_block` fresh output samples; it is the engine's per-channel
    /// inner pipeline (spec.md §4's ten stages run once per internal
    /// block).
    pub fn process(&mut self, input: &[f64], output: &mut [f64], mut step: impl FnMut(&[f64], &mut [f64])) {
        debug_assert_eq!(input.len(), output.len());
        self.input.push(input);

        while self.input.len() >= self.internal_block {
            self.input.pull(&mut self.scratch_in);
            step(&self.scratch_in, &mut self.scratch_out);
            self.output.push(&self.scratch_out);
        }

        if self.output.len() < output.len() {
            // Startup priming, not a contract violation (spec.md §4.1 point
            // 3): the host's block size doesn't yet line up with an internal
            // block boundary, so there's nothing buffered to pull. Emit
            // zeros instead of reading past what's there.
            output.iter_mut().for_each(|x| *x = 0.0);
        } else {
            self.output.pull(output);
        }
    }
}
