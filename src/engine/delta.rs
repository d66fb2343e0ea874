// src/engine/delta.rs
//
// Animation delta optimizer.
//
// Rewrites a sequence of coalesced frames into one full frame followed by
// frames holding only the region that changed since the previous source
// frame. Frames with no perceptible change collapse into a 1x1 transparent
// placeholder that only carries the delay.
//
// All or nothing: output is built in a local Vec and only returned once every
// frame succeeded.

use crate::config::DeltaConfig;
use crate::engine::buffer::{try_alloc, OwnedFrame, OwnedSamples, PixelBuffer, PixelLayout};
use crate::engine::diff::compute_difference_box;
use crate::error::ThumbError;
use tracing::{debug, trace};

type DeltaResult<T> = std::result::Result<T, ThumbError>;

/// What a renderer does with a frame's area before drawing the next frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Disposal {
    #[default]
    Unspecified,
    DoNotDispose,
    RestoreBackground,
    RestorePrevious,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Complete frame covering the whole canvas.
    Full,
    /// Cropped region that changed.
    Delta,
    /// 1x1 transparent frame kept only for its delay.
    Placeholder,
}

/// One coalesced input frame. `delay` is in hundredths of a second.
#[derive(Clone, Copy, Debug)]
pub struct AnimationFrame<'a> {
    pub buffer: PixelBuffer<'a>,
    pub delay: u32,
}

impl<'a> AnimationFrame<'a> {
    pub fn new(buffer: PixelBuffer<'a>, delay: u32) -> Self {
        Self { buffer, delay }
    }
}

/// Output frame positioned on the animation canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaFrame {
    pub frame: OwnedFrame,
    pub x: u32,
    pub y: u32,
    pub delay: u32,
    pub disposal: Disposal,
    pub kind: FrameKind,
}

impl DeltaFrame {
    pub fn origin(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn layout(&self) -> PixelLayout {
        self.frame.layout()
    }

    pub fn pixels(&self) -> &OwnedSamples {
        self.frame.samples()
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == FrameKind::Placeholder
    }

    /// Whole-canvas frame at the origin.
    pub fn full(frame: OwnedFrame, delay: u32) -> Self {
        Self {
            frame,
            x: 0,
            y: 0,
            delay,
            disposal: Disposal::DoNotDispose,
            kind: FrameKind::Full,
        }
    }

    pub fn as_frame_ref(&self) -> FrameRef<'_> {
        FrameRef {
            frame: &self.frame,
            x: self.x,
            y: self.y,
            delay: self.delay,
            disposal: self.disposal,
            kind: self.kind,
        }
    }

    fn placeholder(layout: PixelLayout, delay: u32) -> DeltaResult<Self> {
        Ok(Self {
            frame: OwnedFrame::zeroed(1, 1, layout.with_alpha())?,
            x: 0,
            y: 0,
            delay,
            disposal: Disposal::DoNotDispose,
            kind: FrameKind::Placeholder,
        })
    }
}

/// Borrowed counterpart of `DeltaFrame`, handed to encoders so that frames
/// are never copied just to be written out.
#[derive(Clone, Copy, Debug)]
pub struct FrameRef<'a> {
    pub frame: &'a OwnedFrame,
    pub x: u32,
    pub y: u32,
    pub delay: u32,
    pub disposal: Disposal,
    pub kind: FrameKind,
}

impl<'a> FrameRef<'a> {
    /// Whole-canvas frame at the origin.
    pub fn full(frame: &'a OwnedFrame, delay: u32) -> Self {
        Self {
            frame,
            x: 0,
            y: 0,
            delay,
            disposal: Disposal::DoNotDispose,
            kind: FrameKind::Full,
        }
    }

    pub fn origin(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }
}

/// Optimize a coalesced animation into delta frames.
///
/// Every frame must share the first frame's dimensions and layout. Each frame is
/// compared against its uncropped predecessor, never against the emitted delta.
pub fn optimize(frames: &[AnimationFrame<'_>], config: &DeltaConfig) -> DeltaResult<Vec<DeltaFrame>> {
    config.validate()?;
    let (first, rest) = frames
        .split_first()
        .ok_or_else(|| ThumbError::invalid_geometry("cannot optimize an empty frame sequence"))?;

    let (width, height) = first.buffer.dimensions();
    if width == 0 || height == 0 {
        return Err(ThumbError::invalid_geometry(format!(
            "cannot optimize {width}x{height} frames"
        )));
    }
    let layout = first.buffer.layout();
    for (index, frame) in rest.iter().enumerate() {
        if frame.buffer.dimensions() != (width, height) || frame.buffer.layout() != layout {
            return Err(ThumbError::invalid_geometry(format!(
                "frame {} is {}x{} {}, expected {width}x{height} {}",
                index + 1,
                frame.buffer.width(),
                frame.buffer.height(),
                frame.buffer.layout().name(),
                layout.name()
            )));
        }
    }

    let mut out = try_alloc::<DeltaFrame>(frames.len(), "delta frame list")?;
    out.push(DeltaFrame::full(
        first.buffer.crop(first.buffer.bounds())?,
        first.delay,
    ));

    let mut previous = &first.buffer;
    for (offset, current) in rest.iter().enumerate() {
        let index = offset + 1;
        let bbox = compute_difference_box(previous, &current.buffer, config)?;
        let emitted = match bbox.rect() {
            Some(rect) => {
                trace!(
                    target: "thumbcore::delta",
                    index,
                    x = rect.start_x,
                    y = rect.start_y,
                    width = rect.width(),
                    height = rect.height(),
                    "delta frame"
                );
                DeltaFrame {
                    frame: current.buffer.crop(rect)?,
                    x: rect.start_x,
                    y: rect.start_y,
                    delay: current.delay,
                    disposal: Disposal::DoNotDispose,
                    kind: FrameKind::Delta,
                }
            }
            None => {
                trace!(target: "thumbcore::delta", index, "placeholder frame");
                DeltaFrame::placeholder(layout, current.delay)?
            }
        };
        out.push(emitted);
        previous = &current.buffer;
    }

    debug!(
        target: "thumbcore::delta",
        frames = out.len(),
        placeholders = out.iter().filter(|f| f.is_placeholder()).count(),
        width,
        height,
        "optimized animation"
    );
    Ok(out)
}

/// Replay a delta sequence onto a canvas and return the composited frames.
///
/// The first frame must be a `Full` frame; it fixes the canvas size and layout.
/// Placeholders leave the canvas untouched.
pub fn reconstruct(frames: &[DeltaFrame]) -> DeltaResult<Vec<OwnedFrame>> {
    let first = frames
        .first()
        .ok_or_else(|| ThumbError::invalid_geometry("cannot reconstruct an empty sequence"))?;
    if first.kind != FrameKind::Full {
        return Err(ThumbError::invalid_geometry(
            "sequence must start with a full frame",
        ));
    }

    let mut canvas = OwnedFrame::zeroed(first.width(), first.height(), first.layout())?;
    let mut out = try_alloc::<OwnedFrame>(frames.len(), "reconstructed frames")?;
    for frame in frames {
        let saved = match frame.disposal {
            Disposal::RestorePrevious => Some(canvas.clone()),
            _ => None,
        };
        if frame.kind != FrameKind::Placeholder {
            canvas.blit(&frame.frame.as_buffer(), frame.x, frame.y)?;
        }
        out.push(canvas.clone());

        match frame.disposal {
            Disposal::RestoreBackground if frame.kind != FrameKind::Placeholder => {
                let clear = OwnedFrame::zeroed(frame.width(), frame.height(), canvas.layout())?;
                canvas.blit(&clear.as_buffer(), frame.x, frame.y)?;
            }
            Disposal::RestorePrevious => {
                if let Some(saved) = saved {
                    canvas = saved;
                }
            }
            _ => {}
        }
    }
    Ok(out)
}
