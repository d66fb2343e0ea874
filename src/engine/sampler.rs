// src/engine/sampler.rs
//
// Quadrant intensity sampling: perceptual luminance of the four quadrants
// and of the whole frame, used to pick a focal point when thumbnailing.

use crate::config::{LumaWeights, SamplerConfig};
use crate::engine::buffer::{PixelBuffer, Rect, Samples};
use crate::error::ThumbError;
use tracing::trace;

type SamplerResult<T> = std::result::Result<T, ThumbError>;

/// Channel sums over a region, each sample brought to 8-bit scale first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RectSum {
    pub r: u64,
    pub g: u64,
    pub b: u64,
}

/// Luminance of the four quadrants and of the whole frame.
///
/// A quadrant with zero area (1-pixel-wide or 1-pixel-tall frames) is `None`.
/// `avg` covers the entire frame and is not the mean of the quadrants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intensity {
    pub nw: Option<f32>,
    pub ne: Option<f32>,
    pub sw: Option<f32>,
    pub se: Option<f32>,
    pub avg: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Intensity {
    pub fn quadrants(&self) -> [(Quadrant, Option<f32>); 4] {
        [
            (Quadrant::NorthWest, self.nw),
            (Quadrant::NorthEast, self.ne),
            (Quadrant::SouthWest, self.sw),
            (Quadrant::SouthEast, self.se),
        ]
    }

    /// Quadrant with the highest luminance; ties go to the earlier quadrant
    /// in nw, ne, sw, se order.
    pub fn brightest_quadrant(&self) -> Option<Quadrant> {
        self.quadrants()
            .into_iter()
            .filter_map(|(q, v)| v.map(|v| (q, v)))
            .fold(None, |best: Option<(Quadrant, f32)>, (q, v)| match best {
                Some((_, bv)) if bv >= v => best,
                _ => Some((q, v)),
            })
            .map(|(q, _)| q)
    }
}

/// Sum the channels of every pixel in `region`, row by row.
///
/// The region must lie inside the buffer. An empty region sums to zero.
pub fn sample(buffer: &PixelBuffer<'_>, region: Rect) -> SamplerResult<RectSum> {
    if !region.fits_within(buffer.width(), buffer.height()) {
        return Err(ThumbError::invalid_geometry(format!(
            "region ({},{})..({},{}) is outside the {}x{} frame",
            region.start_x,
            region.start_y,
            region.end_x,
            region.end_y,
            buffer.width(),
            buffer.height()
        )));
    }
    if region.is_empty() {
        return Ok(RectSum::default());
    }

    let channels = buffer.layout().channels();
    let stride = buffer.width() as usize * channels;
    let row_len = region.width() as usize * channels;
    let rows = region.start_y as usize..region.end_y as usize;
    let offset = region.start_x as usize * channels;

    let sum = match buffer.samples() {
        Samples::U8(s) => sum_rows(s, rows, stride, offset, row_len, channels, |v| v as u64),
        Samples::U16(s) => {
            sum_rows(s, rows, stride, offset, row_len, channels, |v| (v >> 8) as u64)
        }
    };
    Ok(sum)
}

fn sum_rows<T: Copy>(
    samples: &[T],
    rows: std::ops::Range<usize>,
    stride: usize,
    offset: usize,
    row_len: usize,
    channels: usize,
    to_8bit: impl Fn(T) -> u64,
) -> RectSum {
    let mut sum = RectSum::default();
    for y in rows {
        let start = y * stride + offset;
        for px in samples[start..start + row_len].chunks_exact(channels) {
            sum.r += to_8bit(px[0]);
            sum.g += to_8bit(px[1]);
            sum.b += to_8bit(px[2]);
        }
    }
    sum
}

/// Weighted luminance of a channel sum over `pixels` pixels.
///
/// Channel means are combined in red, green, blue order and the result is
/// scaled by 1/3, which keeps values comparable with stored legacy intensities.
pub fn luminance(sum: RectSum, pixels: u64, weights: &LumaWeights) -> SamplerResult<f32> {
    if pixels == 0 {
        return Err(ThumbError::invalid_geometry(
            "luminance of a zero-pixel region is undefined",
        ));
    }
    let n = pixels as f64;
    let value = ((sum.r as f64 / n) * weights.red
        + (sum.g as f64 / n) * weights.green
        + (sum.b as f64 / n) * weights.blue)
        / 3.0;
    Ok(value as f32)
}

/// Luminance of a single region; zero-area regions are `InvalidGeometry`.
pub fn region_intensity(
    buffer: &PixelBuffer<'_>,
    region: Rect,
    config: &SamplerConfig,
) -> SamplerResult<f32> {
    if region.is_empty() {
        return Err(ThumbError::invalid_geometry(format!(
            "region {}x{} has zero area",
            region.width(),
            region.height()
        )));
    }
    let sum = sample(buffer, region)?;
    luminance(sum, region.area(), &config.weights)
}

/// Quadrant and whole-frame luminance of one fully composited frame.
pub fn intensity(buffer: &PixelBuffer<'_>, config: &SamplerConfig) -> SamplerResult<Intensity> {
    let (w, h) = buffer.dimensions();
    if w == 0 || h == 0 {
        return Err(ThumbError::invalid_geometry(format!(
            "cannot sample intensity of a {w}x{h} frame"
        )));
    }
    config.weights.validate()?;

    let (mx, my) = (w / 2, h / 2);
    let quadrant = |region: Rect| -> SamplerResult<Option<f32>> {
        if region.is_empty() {
            return Ok(None);
        }
        region_intensity(buffer, region, config).map(Some)
    };

    let result = Intensity {
        nw: quadrant(Rect::new(0, 0, mx, my)?)?,
        ne: quadrant(Rect::new(mx, 0, w, my)?)?,
        sw: quadrant(Rect::new(0, my, mx, h)?)?,
        se: quadrant(Rect::new(mx, my, w, h)?)?,
        avg: region_intensity(buffer, Rect::full(w, h), config)?,
    };
    trace!(
        target: "thumbcore::sampler",
        width = w,
        height = h,
        avg = result.avg,
        "sampled intensity"
    );
    Ok(result)
}
