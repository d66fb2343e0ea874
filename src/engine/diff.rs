// src/engine/diff.rs
//
// Perceptual pixel distance and the bounding box of everything that changed
// between two frames.

use crate::config::{DeltaConfig, LumaWeights};
use crate::engine::buffer::{PixelBuffer, Rect};
use crate::error::ThumbError;

/// Weighted squared distance between two pixels given on a 16-bit quantum
/// (`[r, g, b, a]`).
///
/// Colour deltas are scaled by their weight and truncated toward zero before
/// squaring; the alpha delta is squared unweighted.
#[inline]
pub fn pixel_distance(a: [u16; 4], b: [u16; 4], weights: &LumaWeights) -> u64 {
    let weighted = |i: usize, w: f64| -> i64 { ((a[i] as i64 - b[i] as i64) as f64 * w) as i64 };
    let r = weighted(0, weights.red);
    let g = weighted(1, weights.green);
    let b_ = weighted(2, weights.blue);
    let alpha = a[3] as i64 - b[3] as i64;
    (r * r + g * g + b_ * b_ + alpha * alpha) as u64
}

/// Smallest rectangle covering every point unioned into it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundingBox {
    rect: Rect,
    valid: bool,
}

impl BoundingBox {
    /// An invalid (empty) box.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn rect(&self) -> Option<Rect> {
        self.valid.then_some(self.rect)
    }

    /// Grow the box to include `(x, y)`.
    pub fn union(&mut self, x: u32, y: u32) {
        if !self.valid {
            self.rect = Rect::cell(x, y);
            self.valid = true;
            return;
        }
        let r = &mut self.rect;
        r.start_x = r.start_x.min(x);
        r.start_y = r.start_y.min(y);
        r.end_x = r.end_x.max(x + 1);
        r.end_y = r.end_y.max(y + 1);
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.valid && self.rect.contains(x, y)
    }
}

/// Bounding box of every pixel whose distance exceeds `config.diff_threshold`.
///
/// Frames must have identical dimensions; their layouts may differ since pixels
/// are compared on a common 16-bit quantum. Returns an invalid box when nothing
/// changed beyond the threshold.
pub fn compute_difference_box(
    prev: &PixelBuffer<'_>,
    curr: &PixelBuffer<'_>,
    config: &DeltaConfig,
) -> Result<BoundingBox, ThumbError> {
    if prev.dimensions() != curr.dimensions() {
        return Err(ThumbError::invalid_geometry(format!(
            "cannot diff a {}x{} frame against a {}x{} frame",
            prev.width(),
            prev.height(),
            curr.width(),
            curr.height()
        )));
    }

    let mut bbox = BoundingBox::new();
    for y in 0..curr.height() {
        for x in 0..curr.width() {
            let d = pixel_distance(prev.pixel16(x, y), curr.pixel16(x, y), &config.weights);
            if d > config.diff_threshold {
                bbox.union(x, y);
            }
        }
    }
    Ok(bbox)
}
