#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use thumbcore::config::DeltaConfig;
use thumbcore::engine::{optimize, reconstruct, AnimationFrame, PixelBuffer};

#[derive(Arbitrary, Debug)]
struct Seed {
    width: u8,
    height: u8,
    frames: u8,
    threshold: u32,
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);
    let seed = match Seed::arbitrary(&mut unstructured) {
        Ok(seed) => seed,
        Err(_) => return,
    };
    let width = seed.width as u32 % 32 + 1;
    let height = seed.height as u32 % 32 + 1;
    let count = seed.frames as usize % 8 + 1;
    let frame_len = (width * height * 4) as usize;

    let rest = unstructured.take_rest();
    if rest.is_empty() {
        return;
    }
    let pixels: Vec<Vec<u8>> = (0..count)
        .map(|f| {
            (0..frame_len)
                .map(|i| rest[(f * frame_len + i) % rest.len()])
                .collect()
        })
        .collect();

    let frames: Vec<AnimationFrame<'_>> = pixels
        .iter()
        .filter_map(|p| PixelBuffer::rgba8(width, height, p).ok())
        .map(|buffer| AnimationFrame::new(buffer, 10))
        .collect();

    let config = DeltaConfig::with_threshold(seed.threshold as u64);
    if let Ok(out) = optimize(&frames, &config) {
        assert_eq!(out.len(), frames.len());
        let _ = reconstruct(&out);
    }
});
