// src/engine/raster.rs
//
// RasterImage: a decoded, coalesced image plus the thumbnailing operations
// built on the core (sample the median frame, scale, delta-optimize, encode).

use crate::config::{DeltaConfig, SamplerConfig};
use crate::engine::common::EngineResult;
use crate::engine::decoder::{DecodedFrame, DecodedImage, FrameDecoder, ImageCrateDecoder};
use crate::engine::delta::{self, AnimationFrame, DeltaFrame, FrameRef};
use crate::engine::encoder::{encode_png, FrameEncoder, GifFrameEncoder, OutputFormat};
use crate::engine::io::Source;
use crate::engine::median::median_frame_index;
use crate::engine::pipeline;
use crate::engine::sampler::{self, Intensity};
use crate::error::ThumbError;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct RasterImage {
    width: u32,
    height: u32,
    frames: Vec<DecodedFrame>,
    optimized: Option<Vec<DeltaFrame>>,
    sampler: SamplerConfig,
    delta: DeltaConfig,
}

impl RasterImage {
    /// Decode `data` with the image crate decoder.
    pub fn from_buffer(data: &[u8]) -> EngineResult<Self> {
        Self::decode_with(&ImageCrateDecoder::new(), data)
    }

    pub fn from_source(source: &Source) -> EngineResult<Self> {
        Self::from_buffer(source.as_bytes())
    }

    /// Memory-map and decode the file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let source = Source::from_file(path)?;
        Self::from_source(&source)
    }

    pub fn decode_with(decoder: &dyn FrameDecoder, data: &[u8]) -> EngineResult<Self> {
        let decoded = decoder.decode(data)?;
        Self::from_decoded(decoded)
    }

    pub fn from_decoded(decoded: DecodedImage) -> EngineResult<Self> {
        let image = Self::from_frames(decoded.frames)?;
        if image.dimensions() != (decoded.width, decoded.height) {
            return Err(ThumbError::invalid_geometry(format!(
                "frames are {}x{} but the canvas is {}x{}",
                image.width, image.height, decoded.width, decoded.height
            )));
        }
        Ok(image)
    }

    /// Build from coalesced frames; all must share the first frame's size.
    pub fn from_frames(frames: Vec<DecodedFrame>) -> EngineResult<Self> {
        let first = frames
            .first()
            .ok_or_else(|| ThumbError::invalid_geometry("image has no frames"))?;
        let (width, height) = first.frame.dimensions();
        if width == 0 || height == 0 {
            return Err(ThumbError::invalid_geometry(format!(
                "image is {width}x{height}"
            )));
        }
        if let Some(index) = frames
            .iter()
            .position(|f| f.frame.dimensions() != (width, height))
        {
            return Err(ThumbError::invalid_geometry(format!(
                "frame {index} does not match the {width}x{height} canvas"
            )));
        }
        Ok(Self {
            width,
            height,
            frames,
            optimized: None,
            sampler: SamplerConfig::default(),
            delta: DeltaConfig::default(),
        })
    }

    pub fn with_sampler_config(mut self, config: SamplerConfig) -> Self {
        self.sampler = config;
        self
    }

    pub fn with_delta_config(mut self, config: DeltaConfig) -> Self {
        self.delta = config;
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[DecodedFrame] {
        &self.frames
    }

    /// Delta frames from the last successful `optimize()`.
    pub fn delta_frames(&self) -> Option<&[DeltaFrame]> {
        self.optimized.as_deref()
    }

    pub fn is_optimized(&self) -> bool {
        self.optimized.is_some()
    }

    /// Quadrant intensities of the median frame.
    pub fn intensities(&self) -> EngineResult<Intensity> {
        let index = median_frame_index(self.frames.len())
            .ok_or_else(|| ThumbError::invalid_geometry("image has no frames"))?;
        let frame = &self.frames[index].frame;
        debug!(target: "thumbcore::raster", index, frames = self.frames.len(), "sampling median frame");
        sampler::intensity(&frame.as_buffer(), &self.sampler)
    }

    /// New image whose frames all fit inside `max_w` x `max_h`, scaled by the
    /// same factor. Delays are kept; optimization is not.
    pub fn scale(&self, max_w: u32, max_h: u32) -> EngineResult<Self> {
        let sources: Vec<_> = self.frames.iter().map(|f| f.frame.clone()).collect();
        let scaled = pipeline::scale_frames(&sources, max_w, max_h)?;
        let frames = scaled
            .into_iter()
            .zip(&self.frames)
            .map(|(frame, src)| DecodedFrame {
                frame,
                delay: src.delay,
            })
            .collect();
        Ok(Self::from_frames(frames)?
            .with_sampler_config(self.sampler)
            .with_delta_config(self.delta))
    }

    /// Delta-optimize the animation.
    ///
    /// Returns `true` when delta frames were produced. Single-frame images and
    /// failed optimizations return `false` and keep the full frames.
    pub fn optimize(&mut self) -> bool {
        if self.frames.len() < 2 {
            return false;
        }
        let inputs: Vec<AnimationFrame<'_>> = self
            .frames
            .iter()
            .map(|f| AnimationFrame::new(f.frame.as_buffer(), f.delay))
            .collect();
        match delta::optimize(&inputs, &self.delta) {
            Ok(frames) => {
                self.optimized = Some(frames);
                true
            }
            Err(err) => {
                warn!(target: "thumbcore::raster", error = %err, "optimization failed, keeping full frames");
                false
            }
        }
    }

    /// Frames handed to the encoder: the delta sequence when optimized,
    /// otherwise every full frame at the origin. Borrows the pixels.
    pub fn output_frames(&self) -> Vec<FrameRef<'_>> {
        match &self.optimized {
            Some(frames) => frames.iter().map(DeltaFrame::as_frame_ref).collect(),
            None => self
                .frames
                .iter()
                .map(|f| FrameRef::full(&f.frame, f.delay))
                .collect(),
        }
    }

    pub fn encode_with(&self, encoder: &dyn FrameEncoder) -> EngineResult<Vec<u8>> {
        encoder.encode(&self.output_frames())
    }

    pub fn to_gif(&self) -> EngineResult<Vec<u8>> {
        self.encode_with(&GifFrameEncoder::default())
    }

    /// PNG of the first frame.
    pub fn to_png(&self) -> EngineResult<Vec<u8>> {
        encode_png(&self.frames[0].frame)
    }

    pub fn encode(&self, format: OutputFormat) -> EngineResult<Vec<u8>> {
        match format {
            OutputFormat::Gif => self.to_gif(),
            OutputFormat::Png => self.to_png(),
        }
    }

    /// Encode as `format` and write to `path`. Returns the number of bytes written.
    ///
    /// The data goes to a temporary file in the target directory first and is
    /// renamed into place, so `path` never holds a partial image.
    pub fn to_file(&self, path: impl AsRef<Path>, format: OutputFormat) -> EngineResult<usize> {
        let path = path.as_ref();
        let data = self.encode(format)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp_file = NamedTempFile::new_in(dir)
            .map_err(|e| ThumbError::file_write_failed(dir.display().to_string(), e))?;
        let temp_path = temp_file.path().display().to_string();
        temp_file
            .write_all(&data)
            .map_err(|e| ThumbError::file_write_failed(temp_path.clone(), e))?;
        temp_file
            .as_file_mut()
            .sync_all()
            .map_err(|e| ThumbError::file_write_failed(temp_path, e))?;
        temp_file
            .persist(path)
            .map_err(|e| ThumbError::file_write_failed(path.display().to_string(), e.error))?;

        debug!(target: "thumbcore::raster", path = %path.display(), format = format.as_str(), bytes = data.len(), "wrote image");
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::{OwnedFrame, OwnedSamples, PixelLayout};
    use crate::engine::delta::FrameKind;

    fn frame(width: u32, height: u32, value: u8, delay: u32) -> DecodedFrame {
        let len = (width * height * 4) as usize;
        DecodedFrame {
            frame: OwnedFrame::new(width, height, PixelLayout::Rgba8, OwnedSamples::U8(vec![value; len]))
                .unwrap(),
            delay,
        }
    }

    #[test]
    fn rejects_empty_and_mismatched_frames() {
        assert!(RasterImage::from_frames(vec![]).is_err());
        assert!(RasterImage::from_frames(vec![frame(4, 4, 0, 1), frame(4, 3, 0, 1)]).is_err());
    }

    #[test]
    fn single_frame_is_not_optimized() {
        let mut img = RasterImage::from_frames(vec![frame(4, 4, 10, 0)]).unwrap();
        assert!(!img.optimize());
        assert!(img.delta_frames().is_none());
        assert_eq!(img.output_frames().len(), 1);
    }

    #[test]
    fn optimize_replaces_repeated_frames() {
        let mut img =
            RasterImage::from_frames(vec![frame(4, 4, 10, 3), frame(4, 4, 10, 4)]).unwrap();
        assert!(img.optimize());
        let out = img.delta_frames().unwrap();
        assert_eq!(out[0].kind, FrameKind::Full);
        assert!(out[1].is_placeholder());
        assert_eq!(out[1].delay, 4);
    }

    #[test]
    fn intensities_sample_the_median_frame() {
        let img = RasterImage::from_frames(vec![
            frame(4, 4, 0, 1),
            frame(4, 4, 0, 1),
            frame(4, 4, 255, 1),
            frame(4, 4, 0, 1),
        ])
        .unwrap();
        let intensity = img.intensities().unwrap();
        assert!(intensity.avg > 84.0);
    }

    #[test]
    fn scale_keeps_delays_and_frame_count() {
        let img = RasterImage::from_frames(vec![frame(20, 10, 50, 2), frame(20, 10, 60, 5)]).unwrap();
        let scaled = img.scale(10, 10).unwrap();
        assert_eq!(scaled.dimensions(), (10, 5));
        assert_eq!(scaled.frame_count(), 2);
        assert_eq!(scaled.frames()[1].delay, 5);
        assert!(!scaled.is_optimized());
    }

    #[test]
    fn encode_dispatches_on_format() {
        let img = RasterImage::from_frames(vec![frame(3, 2, 90, 0)]).unwrap();
        let png = img.encode("png".parse().unwrap()).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let gif = img.encode(OutputFormat::Gif).unwrap();
        assert_eq!(&gif[..3], b"GIF");
    }

    #[test]
    fn output_frames_borrow_the_optimized_sequence() {
        let mut img =
            RasterImage::from_frames(vec![frame(4, 4, 10, 3), frame(4, 4, 90, 4)]).unwrap();
        assert!(img.output_frames().iter().all(|f| f.kind == FrameKind::Full));
        assert!(img.optimize());
        let out = img.output_frames();
        let deltas = img.delta_frames().unwrap();
        assert_eq!(out.len(), deltas.len());
        for (view, owned) in out.iter().zip(deltas) {
            assert!(std::ptr::eq(view.frame, &owned.frame));
            assert_eq!((view.origin(), view.delay, view.kind), (owned.origin(), owned.delay, owned.kind));
        }
    }

    #[test]
    fn to_file_writes_encoded_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thumb.gif");
        let mut img =
            RasterImage::from_frames(vec![frame(4, 4, 0, 5), frame(4, 4, 200, 5)]).unwrap();
        img.optimize();

        let written = img.to_file(&path, OutputFormat::Gif).unwrap();
        assert_eq!(written as u64, std::fs::metadata(&path).unwrap().len());
        let back = RasterImage::from_file(&path).unwrap();
        assert_eq!(back.frame_count(), 2);
        assert_eq!(back.dimensions(), (4, 4));
    }

    #[test]
    fn to_file_into_missing_directory_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("thumb.png");
        let img = RasterImage::from_frames(vec![frame(2, 2, 30, 0)]).unwrap();
        let err = img.to_file(&path, OutputFormat::Png).unwrap_err();
        assert!(matches!(err, ThumbError::FileWriteFailed { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn gif_round_trip_preserves_frames() {
        let mut img = RasterImage::from_frames(vec![frame(4, 4, 0, 5), frame(4, 4, 0, 5)]).unwrap();
        img.optimize();
        let bytes = img.to_gif().unwrap();
        let decoded = RasterImage::from_buffer(&bytes).unwrap();
        assert_eq!(decoded.frame_count(), 2);
        assert_eq!(decoded.dimensions(), (4, 4));
    }
}
