// src/engine/buffer.rs
//
// Pixel buffers and rectangles shared by the sampler and the delta optimizer.
// Buffers are flat, row-major and interleaved (RGB or RGBA, 8 or 16 bits per sample).

use crate::error::ThumbError;

type BufferResult<T> = std::result::Result<T, ThumbError>;

/// Channel layout and sample depth of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Rgb8,
    Rgba8,
    Rgb16,
    Rgba16,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Rgb16 => 3,
            PixelLayout::Rgba8 | PixelLayout::Rgba16 => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        self.channels() == 4
    }

    pub fn is_sixteen_bit(self) -> bool {
        matches!(self, PixelLayout::Rgb16 | PixelLayout::Rgba16)
    }

    /// Same depth, with an alpha channel.
    pub fn with_alpha(self) -> Self {
        if self.is_sixteen_bit() {
            PixelLayout::Rgba16
        } else {
            PixelLayout::Rgba8
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelLayout::Rgb8 => "rgb8",
            PixelLayout::Rgba8 => "rgba8",
            PixelLayout::Rgb16 => "rgb16",
            PixelLayout::Rgba16 => "rgba16",
        }
    }

    /// Number of samples (not bytes) for a `width` x `height` image.
    pub fn sample_count(self, width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.channels())
    }
}

/// Half-open rectangle `[start, end)` on both axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
}

impl Rect {
    pub fn new(start_x: u32, start_y: u32, end_x: u32, end_y: u32) -> BufferResult<Self> {
        if start_x > end_x || start_y > end_y {
            return Err(ThumbError::invalid_geometry(format!(
                "rect ({start_x},{start_y})..({end_x},{end_y}) has start past end"
            )));
        }
        Ok(Self {
            start_x,
            start_y,
            end_x,
            end_y,
        })
    }

    /// The whole `width` x `height` frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            start_x: 0,
            start_y: 0,
            end_x: width,
            end_y: height,
        }
    }

    /// The single cell at `(x, y)`.
    pub fn cell(x: u32, y: u32) -> Self {
        Self {
            start_x: x,
            start_y: y,
            end_x: x + 1,
            end_y: y + 1,
        }
    }

    pub fn width(&self) -> u32 {
        self.end_x - self.start_x
    }

    pub fn height(&self) -> u32 {
        self.end_y - self.start_y
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.start_x == self.end_x || self.start_y == self.end_y
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.start_x && x < self.end_x && y >= self.start_y && y < self.end_y
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.start_x <= self.end_x
            && self.start_y <= self.end_y
            && self.end_x <= width
            && self.end_y <= height
    }
}

/// Borrowed samples of a buffer.
#[derive(Clone, Copy, Debug)]
pub enum Samples<'a> {
    U8(&'a [u8]),
    U16(&'a [u16]),
}

/// Read-only view over decoded pixels owned by the caller.
#[derive(Clone, Copy, Debug)]
pub struct PixelBuffer<'a> {
    width: u32,
    height: u32,
    layout: PixelLayout,
    samples: Samples<'a>,
}

impl<'a> PixelBuffer<'a> {
    pub fn rgb8(width: u32, height: u32, data: &'a [u8]) -> BufferResult<Self> {
        Self::from_samples(width, height, PixelLayout::Rgb8, Samples::U8(data))
    }

    pub fn rgba8(width: u32, height: u32, data: &'a [u8]) -> BufferResult<Self> {
        Self::from_samples(width, height, PixelLayout::Rgba8, Samples::U8(data))
    }

    pub fn rgb16(width: u32, height: u32, data: &'a [u16]) -> BufferResult<Self> {
        Self::from_samples(width, height, PixelLayout::Rgb16, Samples::U16(data))
    }

    pub fn rgba16(width: u32, height: u32, data: &'a [u16]) -> BufferResult<Self> {
        Self::from_samples(width, height, PixelLayout::Rgba16, Samples::U16(data))
    }

    pub fn from_samples(
        width: u32,
        height: u32,
        layout: PixelLayout,
        samples: Samples<'a>,
    ) -> BufferResult<Self> {
        let (actual, sixteen) = match samples {
            Samples::U8(s) => (s.len(), false),
            Samples::U16(s) => (s.len(), true),
        };
        if sixteen != layout.is_sixteen_bit() {
            return Err(ThumbError::unsupported_layout(format!(
                "{} with {}-bit samples",
                layout.name(),
                if sixteen { 16 } else { 8 }
            )));
        }
        let expected = layout.sample_count(width, height).ok_or_else(|| {
            ThumbError::invalid_geometry(format!("{width}x{height} overflows the address space"))
        })?;
        if actual != expected {
            return Err(ThumbError::buffer_size_mismatch(
                width,
                height,
                layout.name(),
                expected,
                actual,
            ));
        }
        Ok(Self {
            width,
            height,
            layout,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn samples(&self) -> Samples<'a> {
        self.samples
    }

    pub fn bounds(&self) -> Rect {
        Rect::full(self.width, self.height)
    }

    fn sample_index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.layout.channels()
    }

    /// Pixel at `(x, y)` widened to a 16-bit quantum; alpha is opaque when absent.
    ///
    /// Panics when `(x, y)` is outside the buffer.
    pub fn pixel16(&self, x: u32, y: u32) -> [u16; 4] {
        let i = self.sample_index(x, y);
        match self.samples {
            Samples::U8(s) => {
                let alpha = if self.layout.has_alpha() { s[i + 3] } else { u8::MAX };
                [
                    widen(s[i]),
                    widen(s[i + 1]),
                    widen(s[i + 2]),
                    widen(alpha),
                ]
            }
            Samples::U16(s) => {
                let alpha = if self.layout.has_alpha() { s[i + 3] } else { u16::MAX };
                [s[i], s[i + 1], s[i + 2], alpha]
            }
        }
    }

    /// Copy `rect` out of this buffer into a new owned frame.
    pub fn crop(&self, rect: Rect) -> BufferResult<OwnedFrame> {
        if !rect.fits_within(self.width, self.height) {
            return Err(ThumbError::invalid_geometry(format!(
                "crop ({},{})..({},{}) exceeds {}x{}",
                rect.start_x, rect.start_y, rect.end_x, rect.end_y, self.width, self.height
            )));
        }
        let channels = self.layout.channels();
        let row_start = |y: u32| self.sample_index(rect.start_x, y);
        let row_len = rect.width() as usize * channels;
        let total = row_len * rect.height() as usize;

        let data = match self.samples {
            Samples::U8(s) => {
                let mut out = try_alloc::<u8>(total, "crop")?;
                for y in rect.start_y..rect.end_y {
                    let start = row_start(y);
                    out.extend_from_slice(&s[start..start + row_len]);
                }
                OwnedSamples::U8(out)
            }
            Samples::U16(s) => {
                let mut out = try_alloc::<u16>(total, "crop")?;
                for y in rect.start_y..rect.end_y {
                    let start = row_start(y);
                    out.extend_from_slice(&s[start..start + row_len]);
                }
                OwnedSamples::U16(out)
            }
        };
        Ok(OwnedFrame {
            width: rect.width(),
            height: rect.height(),
            layout: self.layout,
            data,
        })
    }
}

#[inline]
fn widen(sample: u8) -> u16 {
    sample as u16 * 257
}

/// Vec with `len` reserved up front; allocation failure is reported, not aborted on.
pub(crate) fn try_alloc<T>(len: usize, purpose: &'static str) -> BufferResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| {
        ThumbError::allocation_failure(len.saturating_mul(std::mem::size_of::<T>()), purpose)
    })?;
    Ok(v)
}

/// Owned samples of a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OwnedSamples {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

/// Owned, row-major frame. Produced by the decoder adapter and by cropping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedFrame {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: OwnedSamples,
}

impl OwnedFrame {
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: OwnedSamples,
    ) -> BufferResult<Self> {
        let samples = match &data {
            OwnedSamples::U8(v) => Samples::U8(v.as_slice()),
            OwnedSamples::U16(v) => Samples::U16(v.as_slice()),
        };
        PixelBuffer::from_samples(width, height, layout, samples)?;
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// All-zero frame (transparent for layouts with alpha, black otherwise).
    pub fn zeroed(width: u32, height: u32, layout: PixelLayout) -> BufferResult<Self> {
        let len = layout.sample_count(width, height).ok_or_else(|| {
            ThumbError::invalid_geometry(format!("{width}x{height} overflows the address space"))
        })?;
        let data = if layout.is_sixteen_bit() {
            let mut v = try_alloc::<u16>(len, "frame")?;
            v.resize(len, 0);
            OwnedSamples::U16(v)
        } else {
            let mut v = try_alloc::<u8>(len, "frame")?;
            v.resize(len, 0);
            OwnedSamples::U8(v)
        };
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn samples(&self) -> &OwnedSamples {
        &self.data
    }

    pub fn into_samples(self) -> OwnedSamples {
        self.data
    }

    pub fn as_buffer(&self) -> PixelBuffer<'_> {
        let samples = match &self.data {
            OwnedSamples::U8(v) => Samples::U8(v.as_slice()),
            OwnedSamples::U16(v) => Samples::U16(v.as_slice()),
        };
        PixelBuffer {
            width: self.width,
            height: self.height,
            layout: self.layout,
            samples,
        }
    }

    /// Copy `src` into this frame with its top-left corner at `(x, y)`.
    /// Layouts must match and `src` must fit entirely.
    pub fn blit(&mut self, src: &PixelBuffer<'_>, x: u32, y: u32) -> BufferResult<()> {
        if src.layout() != self.layout {
            return Err(ThumbError::invalid_geometry(format!(
                "cannot blit {} onto {}",
                src.layout().name(),
                self.layout.name()
            )));
        }
        let fits = x
            .checked_add(src.width())
            .zip(y.checked_add(src.height()))
            .is_some_and(|(ex, ey)| ex <= self.width && ey <= self.height);
        if !fits {
            return Err(ThumbError::invalid_geometry(format!(
                "{}x{} at ({x},{y}) does not fit in {}x{}",
                src.width(),
                src.height(),
                self.width,
                self.height
            )));
        }

        let channels = self.layout.channels();
        let row_len = src.width() as usize * channels;
        let dst_stride = self.width as usize * channels;
        for row in 0..src.height() as usize {
            let src_start = row * row_len;
            let dst_start = (y as usize + row) * dst_stride + x as usize * channels;
            match (&mut self.data, src.samples()) {
                (OwnedSamples::U8(dst), Samples::U8(s)) => dst[dst_start..dst_start + row_len]
                    .copy_from_slice(&s[src_start..src_start + row_len]),
                (OwnedSamples::U16(dst), Samples::U16(s)) => dst[dst_start..dst_start + row_len]
                    .copy_from_slice(&s[src_start..src_start + row_len]),
                _ => {
                    return Err(ThumbError::internal_panic(
                        "layout check passed with mismatched sample depth",
                    ))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_rgba8(width: u32, height: u32) -> Vec<u8> {
        let mut v = Vec::new();
        for y in 0..height {
            for x in 0..width {
                v.extend_from_slice(&[x as u8, y as u8, (x + y) as u8, 255]);
            }
        }
        v
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        let data = vec![0u8; 11];
        let err = PixelBuffer::rgba8(2, 2, &data).unwrap_err();
        assert!(matches!(
            err,
            ThumbError::BufferSizeMismatch {
                expected: 16,
                actual: 11,
                ..
            }
        ));
    }

    #[test]
    fn rejects_depth_mismatch() {
        let data = vec![0u16; 12];
        let err = PixelBuffer::from_samples(2, 2, PixelLayout::Rgb8, Samples::U16(&data));
        assert!(matches!(err, Err(ThumbError::UnsupportedLayout { .. })));
    }

    #[test]
    fn rect_rejects_inverted_bounds() {
        assert!(Rect::new(3, 0, 2, 1).is_err());
        let r = Rect::new(1, 1, 1, 5).unwrap();
        assert!(r.is_empty());
        assert_eq!(r.area(), 0);
    }

    #[test]
    fn pixel16_widens_and_fills_alpha() {
        let data = [255u8, 128, 0];
        let buf = PixelBuffer::rgb8(1, 1, &data).unwrap();
        assert_eq!(buf.pixel16(0, 0), [65535, 128 * 257, 0, 65535]);
    }

    #[test]
    fn crop_copies_region_rows() {
        let data = gradient_rgba8(4, 3);
        let buf = PixelBuffer::rgba8(4, 3, &data).unwrap();
        let cropped = buf.crop(Rect::new(1, 1, 3, 3).unwrap()).unwrap();
        assert_eq!(cropped.dimensions(), (2, 2));
        assert_eq!(cropped.as_buffer().pixel16(0, 0), buf.pixel16(1, 1));
        assert_eq!(cropped.as_buffer().pixel16(1, 1), buf.pixel16(2, 2));
    }

    #[test]
    fn crop_out_of_bounds_is_invalid_geometry() {
        let data = gradient_rgba8(2, 2);
        let buf = PixelBuffer::rgba8(2, 2, &data).unwrap();
        let err = buf.crop(Rect::new(1, 1, 3, 2).unwrap()).unwrap_err();
        assert!(matches!(err, ThumbError::InvalidGeometry { .. }));
    }

    #[test]
    fn blit_places_pixels_at_offset() {
        let mut canvas = OwnedFrame::zeroed(4, 4, PixelLayout::Rgba8).unwrap();
        let patch = [9u8, 8, 7, 255];
        let src = PixelBuffer::rgba8(1, 1, &patch).unwrap();
        canvas.blit(&src, 3, 2).unwrap();
        assert_eq!(canvas.as_buffer().pixel16(3, 2), src.pixel16(0, 0));
        assert_eq!(canvas.as_buffer().pixel16(2, 2), [0, 0, 0, 0]);
        assert!(canvas.blit(&src, 4, 0).is_err());
    }
}
