use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cqt_reverb::Engine;

const BLOCK: usize = 256;

fn bench_process(c: &mut Criterion) {
    let mut engine = Engine::new();
    engine.prepare(48000.0, BLOCK).unwrap();
    engine.params().set_mix(0.7);

    let sr = 48000.0;
    let input_l: Vec<f32> = (0..BLOCK)
        .map(|i| (0.3 * (core::f64::consts::TAU * 440.0 * i as f64 / sr).sin()) as f32)
        .collect();
    let input_r = input_l.clone();
    let mut output_l = vec![0.0f32; BLOCK];
    let mut output_r = vec![0.0f32; BLOCK];

    c.bench_function("engine_process_one_internal_block", |b| {
        b.iter(|| {
            let inputs: [&[f32]; 2] = [&input_l, &input_r];
            let mut outputs: [&mut [f32]; 2] = [&mut output_l, &mut output_r];
            engine.process(black_box(&inputs), black_box(&mut outputs));
        });
    });
}

criterion_group!(benches, bench_process);
criterion_main!(benches);
