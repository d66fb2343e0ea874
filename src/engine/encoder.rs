// src/engine/encoder.rs
//
// Encoder collaborator: serializes positioned frames (GIF, through the gif
// crate) or a single frame (PNG, through the image crate). Failures surface as
// EncodingFailure and are not interpreted further.

use crate::engine::buffer::{OwnedFrame, OwnedSamples, PixelLayout};
use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::decoder::dynamic_from_frame;
use crate::engine::delta::{Disposal, FrameRef};
use crate::error::ThumbError;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::str::FromStr;
use tracing::debug;

/// Output container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Gif,
    Png,
}

impl FromStr for OutputFormat {
    type Err = ThumbError;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format.to_lowercase().as_str() {
            "gif" => Ok(Self::Gif),
            "png" => Ok(Self::Png),
            other => Err(ThumbError::invalid_argument(
                "format",
                other.to_string(),
                "expected gif or png",
            )),
        }
    }
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Gif => "gif",
            OutputFormat::Png => "png",
        }
    }
}

/// Sink for positioned frames. The first frame defines the canvas.
pub trait FrameEncoder {
    fn encode(&self, frames: &[FrameRef<'_>]) -> EngineResult<Vec<u8>>;
}

/// Animated GIF encoder.
///
/// The logical screen is the first frame's size. Every frame is written at its
/// origin with its own disposal method; delays are already GIF ticks.
#[derive(Clone, Copy, Debug)]
pub struct GifFrameEncoder {
    pub repeat: bool,
    /// NeuQuant speed for frames with more than 256 colours, 1 (best) to 30.
    pub speed: i32,
}

impl Default for GifFrameEncoder {
    fn default() -> Self {
        Self {
            repeat: true,
            speed: 10,
        }
    }
}

fn gif_disposal(disposal: Disposal) -> gif::DisposalMethod {
    match disposal {
        Disposal::Unspecified => gif::DisposalMethod::Any,
        Disposal::DoNotDispose => gif::DisposalMethod::Keep,
        Disposal::RestoreBackground => gif::DisposalMethod::Background,
        Disposal::RestorePrevious => gif::DisposalMethod::Previous,
    }
}

fn gif_u16(value: u32, what: &str) -> EngineResult<u16> {
    u16::try_from(value)
        .map_err(|_| ThumbError::encoding_failure("gif", format!("{what} {value} exceeds 65535")))
}

impl FrameEncoder for GifFrameEncoder {
    fn encode(&self, frames: &[FrameRef<'_>]) -> EngineResult<Vec<u8>> {
        let first = frames
            .first()
            .ok_or_else(|| ThumbError::encoding_failure("gif", "no frames to encode"))?;
        let (canvas_w, canvas_h) = (first.width(), first.height());
        let screen_w = gif_u16(canvas_w, "canvas width")?;
        let screen_h = gif_u16(canvas_h, "canvas height")?;
        let speed = self.speed.clamp(1, 30);

        let mut gif_frames = Vec::with_capacity(frames.len());
        for (index, f) in frames.iter().enumerate() {
            let (x, y) = f.origin();
            if x as u64 + f.width() as u64 > canvas_w as u64
                || y as u64 + f.height() as u64 > canvas_h as u64
            {
                return Err(ThumbError::encoding_failure(
                    "gif",
                    format!(
                        "frame {index} ({}x{} at {x},{y}) lies outside the {canvas_w}x{canvas_h} canvas",
                        f.width(),
                        f.height()
                    ),
                ));
            }
            let width = gif_u16(f.width(), "frame width")?;
            let height = gif_u16(f.height(), "frame height")?;
            let mut rgba = to_rgba8(f.frame)?.into_raw();
            let mut frame = run_with_panic_policy("encode:gif-quantize", || {
                Ok(gif::Frame::from_rgba_speed(width, height, &mut rgba, speed))
            })?;
            frame.left = x as u16;
            frame.top = y as u16;
            frame.delay = u16::try_from(f.delay).unwrap_or(u16::MAX);
            frame.dispose = gif_disposal(f.disposal);
            gif_frames.push(frame);
        }

        let repeat = self.repeat;
        let out = run_with_panic_policy("encode:gif", move || {
            let gif_err = |e: gif::EncodingError| ThumbError::encoding_failure("gif", e.to_string());
            let mut out = Vec::new();
            {
                let mut encoder = gif::Encoder::new(&mut out, screen_w, screen_h, &[]).map_err(gif_err)?;
                if repeat {
                    encoder.set_repeat(gif::Repeat::Infinite).map_err(gif_err)?;
                }
                for frame in &gif_frames {
                    encoder.write_frame(frame).map_err(gif_err)?;
                }
            }
            Ok(out)
        })?;

        debug!(target: "thumbcore::encoder", frames = frames.len(), bytes = out.len(), "encoded gif");
        Ok(out)
    }
}

/// Encode one frame as PNG, keeping its sample depth.
pub fn encode_png(frame: &OwnedFrame) -> EngineResult<Vec<u8>> {
    let img = dynamic_from_frame(frame)?;
    run_with_panic_policy("encode:png", || {
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| ThumbError::encoding_failure("png", e.to_string()))?;
        Ok(out)
    })
}

/// RGBA8 copy of any frame; 16-bit samples keep their high byte.
pub fn to_rgba8(frame: &OwnedFrame) -> EngineResult<RgbaImage> {
    let (w, h) = frame.dimensions();
    let channels = frame.layout().channels();
    let mut out = Vec::with_capacity(w as usize * h as usize * 4);
    match frame.samples() {
        OwnedSamples::U8(s) => {
            if frame.layout() == PixelLayout::Rgba8 {
                out.extend_from_slice(s);
            } else {
                for px in s.chunks_exact(channels) {
                    out.extend_from_slice(&[px[0], px[1], px[2], u8::MAX]);
                }
            }
        }
        OwnedSamples::U16(s) => {
            for px in s.chunks_exact(channels) {
                let alpha = if channels == 4 { (px[3] >> 8) as u8 } else { u8::MAX };
                out.extend_from_slice(&[
                    (px[0] >> 8) as u8,
                    (px[1] >> 8) as u8,
                    (px[2] >> 8) as u8,
                    alpha,
                ]);
            }
        }
    }
    RgbaImage::from_raw(w, h, out)
        .ok_or_else(|| ThumbError::internal_panic("rgba8 conversion produced a short buffer"))
}
