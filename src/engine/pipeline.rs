// src/engine/pipeline.rs
//
// Frame scaling: proportional target size and the fast_image_resize path,
// with the image crate as fallback.

use crate::engine::buffer::{try_alloc, OwnedFrame, OwnedSamples, PixelLayout};
use crate::engine::decoder::{dynamic_from_frame, frame_from_dynamic};
use crate::error::ThumbError;
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};
use image::imageops::FilterType;
use tracing::{debug, warn};

type PipelineResult<T> = std::result::Result<T, ThumbError>;

/// Largest size that fits inside `max_w` x `max_h` while keeping the aspect
/// ratio. Both axes use the smaller of the two ratios; results are floored
/// and never drop below one pixel.
pub fn calc_scale_dimensions(
    width: u32,
    height: u32,
    max_w: u32,
    max_h: u32,
) -> PipelineResult<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(ThumbError::invalid_geometry(format!(
            "cannot scale a {width}x{height} image"
        )));
    }
    if max_w == 0 || max_h == 0 {
        return Err(ThumbError::invalid_argument(
            "max_size",
            format!("{max_w}x{max_h}"),
            "bounding box must be non-empty",
        ));
    }
    let ratio = (max_w as f64 / width as f64).min(max_h as f64 / height as f64);
    let scaled = |dim: u32| ((dim as f64 * ratio).floor() as u32).max(1);
    Ok((scaled(width), scaled(height)))
}

fn pixel_type(layout: PixelLayout) -> PixelType {
    match layout {
        PixelLayout::Rgb8 => PixelType::U8x3,
        PixelLayout::Rgba8 => PixelType::U8x4,
        PixelLayout::Rgb16 => PixelType::U16x3,
        PixelLayout::Rgba16 => PixelType::U16x4,
    }
}

fn default_resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear))
}

/// Resize one frame to exactly `dst_width` x `dst_height`, keeping its layout.
pub fn scale_frame(frame: &OwnedFrame, dst_width: u32, dst_height: u32) -> PipelineResult<OwnedFrame> {
    if dst_width == 0 || dst_height == 0 {
        return Err(ThumbError::resize_failed(
            frame.dimensions(),
            (dst_width, dst_height),
            "target size must be non-empty",
        ));
    }
    if frame.dimensions() == (dst_width, dst_height) {
        return Ok(frame.clone());
    }

    match fast_resize(frame, dst_width, dst_height, default_resize_options()) {
        Ok(out) => Ok(out),
        Err(err) => {
            warn!(target: "thumbcore::pipeline", error = %err, "fast resize failed, using image crate");
            resize_with_image_crate_fallback(frame, dst_width, dst_height)
                .map_err(|fallback| {
                    ThumbError::resize_failed(
                        frame.dimensions(),
                        (dst_width, dst_height),
                        format!("{err}; image crate fallback failed: {fallback}"),
                    )
                })
        }
    }
}

/// Scale every frame by the same factor so they fit in `max_w` x `max_h`.
pub fn scale_frames(frames: &[OwnedFrame], max_w: u32, max_h: u32) -> PipelineResult<Vec<OwnedFrame>> {
    let first = frames
        .first()
        .ok_or_else(|| ThumbError::invalid_geometry("cannot scale an empty frame sequence"))?;
    let (width, height) = first.dimensions();
    let (dst_width, dst_height) = calc_scale_dimensions(width, height, max_w, max_h)?;

    let mut out = try_alloc::<OwnedFrame>(frames.len(), "scaled frames")?;
    for frame in frames {
        if frame.dimensions() != (width, height) {
            return Err(ThumbError::invalid_geometry(format!(
                "frame is {}x{}, expected {width}x{height}",
                frame.width(),
                frame.height()
            )));
        }
        out.push(scale_frame(frame, dst_width, dst_height)?);
    }

    debug!(
        target: "thumbcore::pipeline",
        frames = out.len(),
        from_width = width,
        from_height = height,
        to_width = dst_width,
        to_height = dst_height,
        "scaled frames"
    );
    Ok(out)
}

fn fast_resize(
    frame: &OwnedFrame,
    dst_width: u32,
    dst_height: u32,
    options: ResizeOptions,
) -> Result<OwnedFrame, String> {
    let layout = frame.layout();
    let pixel_type = pixel_type(layout);
    let (src_width, src_height) = frame.dimensions();

    // Image::new allocates a buffer aligned for the pixel type, so 16-bit
    // samples are copied in rather than reinterpreted.
    let mut src_image = fir::images::Image::new(src_width, src_height, pixel_type);
    {
        let dst = src_image.buffer_mut();
        match frame.samples() {
            OwnedSamples::U8(s) => {
                if dst.len() != s.len() {
                    return Err(format!("fir buffer is {} bytes, frame has {}", dst.len(), s.len()));
                }
                dst.copy_from_slice(s);
            }
            OwnedSamples::U16(s) => {
                if dst.len() != s.len() * 2 {
                    return Err(format!("fir buffer is {} bytes, frame has {}", dst.len(), s.len() * 2));
                }
                for (bytes, sample) in dst.chunks_exact_mut(2).zip(s) {
                    bytes.copy_from_slice(&sample.to_ne_bytes());
                }
            }
        }
    }

    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);
    let mul_div = MulDiv::default();
    if layout.has_alpha() {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if layout.has_alpha() {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    let bytes = dst_image.into_vec();
    let samples = if layout.is_sixteen_bit() {
        OwnedSamples::U16(
            bytes
                .chunks_exact(2)
                .map(|b| u16::from_ne_bytes([b[0], b[1]]))
                .collect(),
        )
    } else {
        OwnedSamples::U8(bytes)
    };
    OwnedFrame::new(dst_width, dst_height, layout, samples).map_err(|e| e.to_string())
}

fn resize_with_image_crate_fallback(
    frame: &OwnedFrame,
    dst_width: u32,
    dst_height: u32,
) -> Result<OwnedFrame, String> {
    let img = dynamic_from_frame(frame).map_err(|e| e.to_string())?;
    let resized = img.resize_exact(dst_width, dst_height, FilterType::Triangle);
    frame_from_dynamic(resized).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, layout: PixelLayout) -> OwnedFrame {
        let pixels = (width * height) as usize;
        let samples = match layout {
            PixelLayout::Rgb8 => OwnedSamples::U8([200, 100, 50].repeat(pixels)),
            PixelLayout::Rgba8 => OwnedSamples::U8([200, 100, 50, 255].repeat(pixels)),
            PixelLayout::Rgb16 => OwnedSamples::U16([40_000, 20_000, 10_000].repeat(pixels)),
            PixelLayout::Rgba16 => OwnedSamples::U16([40_000, 20_000, 10_000, 65_535].repeat(pixels)),
        };
        OwnedFrame::new(width, height, layout, samples).unwrap()
    }

    fn close(a: [u16; 4], b: [u16; 4]) -> bool {
        a.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 257)
    }

    #[test]
    fn scale_dimensions_use_smaller_ratio() {
        assert_eq!(calc_scale_dimensions(1000, 500, 100, 100).unwrap(), (100, 50));
        assert_eq!(calc_scale_dimensions(500, 1000, 100, 100).unwrap(), (50, 100));
        assert_eq!(calc_scale_dimensions(300, 200, 100, 100).unwrap(), (100, 66));
    }

    #[test]
    fn scale_dimensions_never_reach_zero() {
        assert_eq!(calc_scale_dimensions(10_000, 1, 10, 10).unwrap(), (10, 1));
    }

    #[test]
    fn scale_dimensions_reject_empty_inputs() {
        assert!(matches!(
            calc_scale_dimensions(0, 10, 5, 5),
            Err(ThumbError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            calc_scale_dimensions(10, 10, 0, 5),
            Err(ThumbError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn scale_frame_keeps_layout_and_solid_colour() {
        for layout in [
            PixelLayout::Rgb8,
            PixelLayout::Rgba8,
            PixelLayout::Rgb16,
            PixelLayout::Rgba16,
        ] {
            let frame = solid(16, 8, layout);
            let scaled = scale_frame(&frame, 4, 2).unwrap();
            assert_eq!(scaled.dimensions(), (4, 2), "{}", layout.name());
            assert_eq!(scaled.layout(), layout);
            assert!(close(scaled.as_buffer().pixel16(1, 1), frame.as_buffer().pixel16(0, 0)));
        }
    }

    #[test]
    fn scale_frames_applies_one_factor_to_all() {
        let frames = vec![solid(40, 20, PixelLayout::Rgba8), solid(40, 20, PixelLayout::Rgba8)];
        let out = scale_frames(&frames, 10, 10).unwrap();
        assert!(out.iter().all(|f| f.dimensions() == (10, 5)));
    }

    #[test]
    fn scale_frames_rejects_mixed_sizes() {
        let frames = vec![solid(40, 20, PixelLayout::Rgb8), solid(20, 20, PixelLayout::Rgb8)];
        assert!(scale_frames(&frames, 10, 10).is_err());
    }

    #[test]
    fn same_size_is_a_copy() {
        let frame = solid(3, 3, PixelLayout::Rgb8);
        assert_eq!(scale_frame(&frame, 3, 3).unwrap(), frame);
    }
}
