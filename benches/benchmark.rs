use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use thumbcore::config::{DeltaConfig, SamplerConfig};
use thumbcore::engine::{compute_difference_box, intensity, optimize, AnimationFrame, PixelBuffer};

fn noise_rgba(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    (0..width * height * 4)
        .map(|_| {
            // xorshift32
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// `count` frames where each one repaints a small square of its predecessor.
fn moving_square(width: u32, height: u32, count: u32) -> Vec<Vec<u8>> {
    let base = noise_rgba(width, height, 7);
    (0..count)
        .map(|i| {
            let mut frame = base.clone();
            let offset = (i * 4) % (width.min(height) - 16);
            for y in offset..offset + 16 {
                for x in offset..offset + 16 {
                    let p = ((y * width + x) * 4) as usize;
                    frame[p..p + 4].copy_from_slice(&[255, 255, 255, 255]);
                }
            }
            frame
        })
        .collect()
}

pub fn intensity_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("intensity");
    for size in [64u32, 512, 2048] {
        let data = noise_rgba(size, size, size);
        let buf = PixelBuffer::rgba8(size, size, &data).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &buf, |b, buf| {
            b.iter(|| intensity(black_box(buf), &SamplerConfig::default()))
        });
    }
    group.finish();
}

pub fn optimize_benchmark(c: &mut Criterion) {
    let frames = moving_square(320, 240, 24);
    let inputs: Vec<AnimationFrame<'_>> = frames
        .iter()
        .map(|f| AnimationFrame::new(PixelBuffer::rgba8(320, 240, f).unwrap(), 4))
        .collect();

    c.bench_function("difference box 320x240", |b| {
        b.iter(|| {
            compute_difference_box(
                black_box(&inputs[0].buffer),
                black_box(&inputs[1].buffer),
                &DeltaConfig::default(),
            )
        })
    });
    c.bench_function("optimize 24 frames 320x240", |b| {
        b.iter(|| optimize(black_box(&inputs), &DeltaConfig::default()))
    });
}

criterion_group!(benches, intensity_benchmark, optimize_benchmark);
criterion_main!(benches);
