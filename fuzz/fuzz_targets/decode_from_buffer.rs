#![no_main]

use libfuzzer_sys::fuzz_target;
use thumbcore::config::ResourceLimits;
use thumbcore::engine::{FrameDecoder, ImageCrateDecoder, RasterImage};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Small limits keep decompression bombs from exhausting the fuzzer.
    let limits = ResourceLimits {
        max_memory_bytes: 64 * 1024 * 1024,
        max_pixels: 4_000_000,
        max_dimension: 4096,
        ..ResourceLimits::default()
    };
    let decoded = match ImageCrateDecoder::with_limits(limits).decode(data) {
        Ok(decoded) => decoded,
        Err(_) => return,
    };
    if let Ok(mut image) = RasterImage::from_decoded(decoded) {
        let _ = image.intensities();
        image.optimize();
        let _ = image.to_gif();
    }
});
