//! Testable property #1 (spec.md §8): for every host block size up to the
//! prepared maximum, `Engine::process` writes exactly that many samples and
//! performs zero heap allocation. Verified with a trapping global
//! allocator rather than just asserted in prose.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};
use cqt_reverb::Engine;

#[cfg(debug_assertions)]
#[global_allocator]
static ALLOCATOR: AllocDisabler = AllocDisabler;

const BLOCK: usize = 256;

#[test]
fn process_allocates_nothing_once_prepared() {
    let mut engine = Engine::new();
    engine.prepare(48000.0, BLOCK).unwrap();

    let sr = 48000.0;
    let input_l: Vec<f32> = (0..BLOCK)
        .map(|i| (0.3 * (core::f64::consts::TAU * 440.0 * i as f64 / sr).sin()) as f32)
        .collect();
    let input_r = input_l.clone();
    let mut output_l = vec![0.0f32; BLOCK];
    let mut output_r = vec![0.0f32; BLOCK];

    // Every allocation happens above, outside the checked scope; `prepare`
    // is the one place the engine is allowed to allocate (spec.md §7).
    assert_no_alloc(|| {
        let inputs: [&[f32]; 2] = [&input_l, &input_r];
        let mut outputs: [&mut [f32]; 2] = [&mut output_l, &mut output_r];
        engine.process(&inputs, &mut outputs);
    });
}

#[test]
fn process_allocates_nothing_across_varied_host_block_sizes() {
    // spec.md §8 property #1: "For all N in [1, max_block_size]".
    let mut engine = Engine::new();
    engine.prepare(48000.0, 512).unwrap();

    for &n in &[1usize, 7, 64, 255, 256, 511, 512] {
        let input_l = vec![0.1f32; n];
        let input_r = vec![-0.1f32; n];
        let mut output_l = vec![0.0f32; n];
        let mut output_r = vec![0.0f32; n];
        assert_no_alloc(|| {
            let inputs: [&[f32]; 2] = [&input_l, &input_r];
            let mut outputs: [&mut [f32]; 2] = [&mut output_l, &mut output_r];
            engine.process(&inputs, &mut outputs);
        });
    }
}

#[test]
fn parameter_writes_from_the_control_side_allocate_nothing() {
    // The lock-free atomic parameter cells (spec.md §5) must be settable
    // from a "control thread" without allocating either.
    let mut engine = Engine::new();
    engine.prepare(48000.0, BLOCK).unwrap();

    assert_no_alloc(|| {
        engine.params().set_attack(0.9);
        engine.params().set_decay(0.1);
        engine.params().set_colour(-0.5);
        engine.params().set_sparsity(3.0);
        engine.params().set_tuning(442.0);
    });
}
