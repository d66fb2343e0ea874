// src/engine.rs
//
// The thumbnailing core. Two pure computations sit at the center:
// 1. Quadrant intensity sampling of one composited frame (sampler)
// 2. Delta optimization of a coalesced animation (diff + delta)
//
// Everything else adapts collaborators around them: the image crate for
// decoding, the gif crate for animated output, fast_image_resize for scaling,
// the backend for process-wide limits and the batch worker pool.
//
// This file is a facade over the modules in engine/.

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Larger images are rejected at decode time to stop decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height) per frame.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod backend;
pub mod batch;
pub mod buffer;
pub mod common;
pub mod decoder;
pub mod delta;
pub mod diff;
pub mod encoder;
pub mod io;
pub mod median;
pub mod pipeline;
pub mod raster;
pub mod sampler;

pub use batch::{intensity_batch, optimize_batch};
pub use buffer::{OwnedFrame, OwnedSamples, PixelBuffer, PixelLayout, Rect, Samples};
pub use common::{run_with_panic_policy, EngineResult};
pub use decoder::{DecodedFrame, DecodedImage, FrameDecoder, ImageCrateDecoder};
pub use delta::{optimize, reconstruct, AnimationFrame, DeltaFrame, Disposal, FrameKind, FrameRef};
pub use diff::{compute_difference_box, pixel_distance, BoundingBox};
pub use encoder::{encode_png, FrameEncoder, GifFrameEncoder, OutputFormat};
pub use io::Source;
pub use median::{median_frame_index, select_median_time, MedianPick, TimedFrame};
pub use pipeline::{calc_scale_dimensions, scale_frame, scale_frames};
pub use raster::RasterImage;
pub use sampler::{intensity, luminance, region_intensity, sample, Intensity, Quadrant, RectSum};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeltaConfig, SamplerConfig};

    fn checkerboard(size: u32, cell: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((size * size * 3) as usize);
        for y in 0..size {
            for x in 0..size {
                let v = if ((x / cell) + (y / cell)) % 2 == 0 { 255 } else { 0 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        data
    }

    #[test]
    fn checkerboard_diagonals_match() {
        let data = checkerboard(16, 8);
        let buf = PixelBuffer::rgb8(16, 16, &data).unwrap();
        let i = intensity(&buf, &SamplerConfig::default()).unwrap();
        assert_eq!(i.nw, i.se);
        assert_eq!(i.ne, i.sw);
        assert!(i.nw.unwrap() > i.ne.unwrap());
        assert!(i.avg > i.ne.unwrap() && i.avg < i.nw.unwrap());
    }

    #[test]
    fn sampler_and_optimizer_agree_on_frames() {
        let a = vec![0u8; 8 * 8 * 3];
        let mut b = a.clone();
        b[0..3].copy_from_slice(&[255, 255, 255]);
        let frames = [
            AnimationFrame::new(PixelBuffer::rgb8(8, 8, &a).unwrap(), 10),
            AnimationFrame::new(PixelBuffer::rgb8(8, 8, &b).unwrap(), 10),
        ];
        let out = optimize(&frames, &DeltaConfig::default()).unwrap();
        assert_eq!(out[1].origin(), (0, 0));
        assert_eq!((out[1].width(), out[1].height()), (1, 1));

        let before = intensity(&frames[0].buffer, &SamplerConfig::default()).unwrap();
        let after = intensity(&frames[1].buffer, &SamplerConfig::default()).unwrap();
        assert_eq!(before.se, after.se);
        assert!(after.nw > before.nw);
    }

    #[test]
    fn limits_match_config_defaults() {
        let limits = crate::config::ResourceLimits::default();
        assert_eq!(limits.max_dimension, MAX_DIMENSION);
        assert_eq!(limits.max_pixels, MAX_PIXELS);
    }
}
