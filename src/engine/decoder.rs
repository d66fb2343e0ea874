// src/engine/decoder.rs
//
// Decoder collaborator: turns encoded bytes into coalesced frames.
// All decoding is done by the image crate; this module only adapts its
// output to OwnedFrame, enforces resource limits and applies the EXIF
// orientation of still images.

use crate::config::ResourceLimits;
use crate::engine::backend;
use crate::engine::buffer::{OwnedFrame, OwnedSamples, PixelLayout};
use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::delta::AnimationFrame;
use crate::error::ThumbError;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::{AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageFormat};
use std::io::Cursor;
use tracing::{debug, trace};

/// One coalesced frame. `delay` is in hundredths of a second.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    pub frame: OwnedFrame,
    pub delay: u32,
}

/// Fully decoded image: every frame is a complete canvas-sized image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<DecodedFrame>,
}

impl DecodedImage {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn animation_frames(&self) -> Vec<AnimationFrame<'_>> {
        self.frames
            .iter()
            .map(|f| AnimationFrame::new(f.frame.as_buffer(), f.delay))
            .collect()
    }
}

/// Source of decoded, coalesced frames.
pub trait FrameDecoder {
    fn decode(&self, data: &[u8]) -> EngineResult<DecodedImage>;
}

/// Decoder backed by the image crate (JPEG, PNG/APNG, GIF, WebP stills).
#[derive(Clone, Debug, Default)]
pub struct ImageCrateDecoder {
    limits: Option<ResourceLimits>,
}

impl ImageCrateDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `limits` instead of the backend's.
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self {
            limits: Some(limits),
        }
    }

    fn limits(&self) -> ResourceLimits {
        self.limits.unwrap_or_else(backend::effective_limits)
    }
}

impl FrameDecoder for ImageCrateDecoder {
    fn decode(&self, data: &[u8]) -> EngineResult<DecodedImage> {
        let format = image::guess_format(data)
            .map_err(|e| ThumbError::decode_failed(format!("unrecognized image data: {e}")))?;
        let limits = self.limits();

        let decoded = match format {
            ImageFormat::Gif => run_with_panic_policy("decode:gif", || decode_gif(data, &limits))?,
            ImageFormat::Png => run_with_panic_policy("decode:png", || decode_png(data, &limits))?,
            other => run_with_panic_policy("decode:image", || {
                let img = image::load_from_memory_with_format(data, other)
                    .map_err(|e| ThumbError::decode_failed(format!("decode failed: {e}")))?;
                limits.enforce(img.width(), img.height(), 1)?;
                still(img, data)
            })?,
        };

        debug!(
            target: "thumbcore::decoder",
            format = ?format,
            width = decoded.width,
            height = decoded.height,
            frames = decoded.frames.len(),
            "decoded image"
        );
        Ok(decoded)
    }
}

fn decode_gif(data: &[u8], limits: &ResourceLimits) -> EngineResult<DecodedImage> {
    let decoder = GifDecoder::new(Cursor::new(data))
        .map_err(|e| ThumbError::decode_failed(format!("gif: {e}")))?;
    let (width, height) = decoder.dimensions();
    limits.enforce(width, height, 1)?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| ThumbError::decode_failed(format!("gif: {e}")))?;
    animation(width, height, frames, limits)
}

fn decode_png(data: &[u8], limits: &ResourceLimits) -> EngineResult<DecodedImage> {
    let decoder = PngDecoder::new(Cursor::new(data))
        .map_err(|e| ThumbError::decode_failed(format!("png: {e}")))?;
    let (width, height) = decoder.dimensions();
    limits.enforce(width, height, 1)?;

    let is_apng = decoder
        .is_apng()
        .map_err(|e| ThumbError::decode_failed(format!("png: {e}")))?;
    if is_apng {
        let frames = decoder
            .apng()
            .map_err(|e| ThumbError::decode_failed(format!("apng: {e}")))?
            .into_frames()
            .collect_frames()
            .map_err(|e| ThumbError::decode_failed(format!("apng: {e}")))?;
        return animation(width, height, frames, limits);
    }

    let img = DynamicImage::from_decoder(decoder)
        .map_err(|e| ThumbError::decode_failed(format!("png: {e}")))?;
    still(img, data)
}

fn animation(
    width: u32,
    height: u32,
    frames: Vec<Frame>,
    limits: &ResourceLimits,
) -> EngineResult<DecodedImage> {
    if frames.is_empty() {
        return Err(ThumbError::decode_failed("animation has no frames"));
    }
    limits.enforce(width, height, frames.len())?;

    let frames = frames
        .into_iter()
        .map(|f| {
            let delay = delay_to_centiseconds(f.delay().numer_denom_ms());
            let buffer = f.into_buffer();
            let (w, h) = buffer.dimensions();
            let frame = OwnedFrame::new(w, h, PixelLayout::Rgba8, OwnedSamples::U8(buffer.into_raw()))?;
            Ok(DecodedFrame { frame, delay })
        })
        .collect::<EngineResult<Vec<_>>>()?;

    Ok(DecodedImage {
        width,
        height,
        frames,
    })
}

/// Single-frame image, turned upright according to its EXIF orientation.
fn still(img: DynamicImage, data: &[u8]) -> EngineResult<DecodedImage> {
    let img = match detect_exif_orientation(data) {
        Some(orientation) => {
            trace!(target: "thumbcore::decoder", orientation, "applying exif orientation");
            apply_orientation(img, orientation)
        }
        None => img,
    };
    let (width, height) = (img.width(), img.height());
    Ok(DecodedImage {
        width,
        height,
        frames: vec![DecodedFrame {
            frame: frame_from_dynamic(img)?,
            delay: 0,
        }],
    })
}

/// EXIF Orientation tag (1-8) of the primary image, if present and valid.
pub fn detect_exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = u16::try_from(field.value.get_uint(0)?).ok()?;
    (1..=8).contains(&orientation).then_some(orientation)
}

/// Rotate/flip `img` so that orientation 1 holds.
fn apply_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Round a millisecond ratio to hundredths of a second.
fn delay_to_centiseconds((numer, denom): (u32, u32)) -> u32 {
    if denom == 0 {
        return 0;
    }
    let denom = denom as u64 * 10;
    ((numer as u64 + denom / 2) / denom).min(u32::MAX as u64) as u32
}

/// Convert a decoded image, keeping 8/16-bit RGB(A) as is and widening
/// everything else to RGBA of the nearest depth.
pub fn frame_from_dynamic(img: DynamicImage) -> EngineResult<OwnedFrame> {
    let (w, h) = (img.width(), img.height());
    match img {
        DynamicImage::ImageRgb8(b) => OwnedFrame::new(w, h, PixelLayout::Rgb8, OwnedSamples::U8(b.into_raw())),
        DynamicImage::ImageRgba8(b) => OwnedFrame::new(w, h, PixelLayout::Rgba8, OwnedSamples::U8(b.into_raw())),
        DynamicImage::ImageRgb16(b) => OwnedFrame::new(w, h, PixelLayout::Rgb16, OwnedSamples::U16(b.into_raw())),
        DynamicImage::ImageRgba16(b) => OwnedFrame::new(w, h, PixelLayout::Rgba16, OwnedSamples::U16(b.into_raw())),
        other @ (DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_)) => OwnedFrame::new(
            w,
            h,
            PixelLayout::Rgba16,
            OwnedSamples::U16(other.to_rgba16().into_raw()),
        ),
        other => OwnedFrame::new(w, h, PixelLayout::Rgba8, OwnedSamples::U8(other.to_rgba8().into_raw())),
    }
}

/// Inverse of `frame_from_dynamic`.
pub fn dynamic_from_frame(frame: &OwnedFrame) -> EngineResult<DynamicImage> {
    let (w, h) = frame.dimensions();
    let mismatch = || ThumbError::internal_panic("frame samples do not match its layout");
    let img = match (frame.layout(), frame.samples()) {
        (PixelLayout::Rgb8, OwnedSamples::U8(v)) => {
            DynamicImage::ImageRgb8(image::RgbImage::from_raw(w, h, v.clone()).ok_or_else(mismatch)?)
        }
        (PixelLayout::Rgba8, OwnedSamples::U8(v)) => {
            DynamicImage::ImageRgba8(image::RgbaImage::from_raw(w, h, v.clone()).ok_or_else(mismatch)?)
        }
        (PixelLayout::Rgb16, OwnedSamples::U16(v)) => DynamicImage::ImageRgb16(
            image::ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(mismatch)?,
        ),
        (PixelLayout::Rgba16, OwnedSamples::U16(v)) => DynamicImage::ImageRgba16(
            image::ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(mismatch)?,
        ),
        _ => return Err(mismatch()),
    };
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Rgba, RgbaImage};

    fn gif_bytes(colors: &[[u8; 4]], delay_ms: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut out);
            for c in colors {
                let img = RgbaImage::from_pixel(4, 4, Rgba(*c));
                let frame = Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(delay_ms, 1));
                encoder.encode_frame(frame).unwrap();
            }
        }
        out
    }

    #[test]
    fn delay_rounds_to_centiseconds() {
        assert_eq!(delay_to_centiseconds((100, 1)), 10);
        assert_eq!(delay_to_centiseconds((104, 1)), 10);
        assert_eq!(delay_to_centiseconds((105, 1)), 11);
        assert_eq!(delay_to_centiseconds((1, 0)), 0);
    }

    #[test]
    fn decodes_png_still() {
        let img = image::RgbImage::from_pixel(5, 3, image::Rgb([1, 2, 3]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();

        let decoded = ImageCrateDecoder::new().decode(&buf).unwrap();
        assert_eq!((decoded.width, decoded.height), (5, 3));
        assert_eq!(decoded.frame_count(), 1);
        assert_eq!(decoded.frames[0].frame.layout(), PixelLayout::Rgb8);
    }

    #[test]
    fn decodes_gif_frames_with_delay() {
        let bytes = gif_bytes(&[[255, 0, 0, 255], [0, 0, 255, 255], [0, 255, 0, 255]], 70);
        let decoded = ImageCrateDecoder::new().decode(&bytes).unwrap();
        assert_eq!(decoded.frame_count(), 3);
        assert_eq!((decoded.width, decoded.height), (4, 4));
        assert!(decoded.frames.iter().all(|f| f.delay == 7));
        assert!(decoded
            .frames
            .iter()
            .all(|f| f.frame.dimensions() == (4, 4) && f.frame.layout() == PixelLayout::Rgba8));
    }

    #[test]
    fn enforces_limits() {
        let bytes = gif_bytes(&[[0, 0, 0, 255]], 10);
        let limits = ResourceLimits {
            max_dimension: 2,
            ..ResourceLimits::default()
        };
        let err = ImageCrateDecoder::with_limits(limits).decode(&bytes).unwrap_err();
        assert!(matches!(err, ThumbError::DimensionExceedsLimit { .. }));
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 60, 30]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg).unwrap();
        buf
    }

    // Big-endian TIFF block with a single IFD0 Orientation entry, placed in an
    // APP1 segment right after SOI.
    fn with_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
        let mut app1 = b"Exif\0\0MM\0\x2a".to_vec();
        app1.extend_from_slice(&8u32.to_be_bytes());
        app1.extend_from_slice(&1u16.to_be_bytes());
        app1.extend_from_slice(&0x0112u16.to_be_bytes());
        app1.extend_from_slice(&3u16.to_be_bytes());
        app1.extend_from_slice(&1u32.to_be_bytes());
        app1.extend_from_slice(&orientation.to_be_bytes());
        app1.extend_from_slice(&[0, 0]);
        app1.extend_from_slice(&0u32.to_be_bytes());

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn detects_exif_orientation() {
        let plain = jpeg(4, 2);
        assert_eq!(detect_exif_orientation(&plain), None);
        assert_eq!(detect_exif_orientation(&with_orientation(&plain, 6)), Some(6));
        assert_eq!(detect_exif_orientation(&with_orientation(&plain, 9)), None);
    }

    #[test]
    fn orientation_6_swaps_dimensions() {
        let bytes = with_orientation(&jpeg(4, 2), 6);
        let decoded = ImageCrateDecoder::new().decode(&bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 4));
        assert_eq!(decoded.frames[0].frame.dimensions(), (2, 4));
    }

    #[test]
    fn orientation_3_keeps_dimensions() {
        let bytes = with_orientation(&jpeg(4, 2), 3);
        let decoded = ImageCrateDecoder::new().decode(&bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (4, 2));
    }

    #[test]
    fn apply_orientation_moves_pixels() {
        let mut img = image::RgbImage::new(3, 1);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        let rotated = apply_orientation(DynamicImage::ImageRgb8(img), 6).to_rgb8();
        assert_eq!(rotated.dimensions(), (1, 3));
        // Rotating 90 degrees clockwise moves the left end to the top.
        assert_eq!(rotated.get_pixel(0, 0).0, [255, 0, 0]);
        let flipped = apply_orientation(DynamicImage::ImageRgb8(rotated), 2).to_rgb8();
        assert_eq!(flipped.get_pixel(0, 0).0, [255, 0, 0]);
    }

    #[test]
    fn garbage_is_decode_failure() {
        let err = ImageCrateDecoder::new().decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ThumbError::DecodeFailed { .. }));
    }

    #[test]
    fn dynamic_round_trip_keeps_layout() {
        let img = DynamicImage::ImageRgb16(image::ImageBuffer::from_pixel(2, 2, image::Rgb([1u16, 2, 3])));
        let frame = frame_from_dynamic(img.clone()).unwrap();
        assert_eq!(frame.layout(), PixelLayout::Rgb16);
        assert_eq!(dynamic_from_frame(&frame).unwrap(), img);
    }
}
