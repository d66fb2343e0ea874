// lib.rs
//
// thumbcore: the pixel-level core of a thumbnailing pipeline.
//
// - Quadrant intensity sampling picks where a thumbnail should focus
// - Delta optimization shrinks animated thumbnails by keeping only what changed
// - RasterImage ties decoding, scaling, optimizing and encoding together
//
// The core is synchronous and holds no global state; the backend module is the
// only process-wide piece and it is driven explicitly by the host.

pub mod config;
pub mod engine;
pub mod error;

pub use config::{DeltaConfig, LumaWeights, ResourceLimits, SamplerConfig};
pub use engine::backend;
pub use engine::{
    compute_difference_box, intensity, optimize, AnimationFrame, DeltaFrame, Intensity,
    PixelBuffer, PixelLayout, RasterImage, Rect,
};
pub use error::{ErrorCategory, ThumbError};

use image::ImageReader;
use std::io::{BufRead, BufReader, Cursor, Seek};

/// Header information read without decoding pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

fn read_inspect_metadata<R: BufRead + Seek>(reader: R) -> error::Result<InspectMetadata> {
    let reader = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| ThumbError::decode_failed(format!("failed to read image header: {e}")))?;

    let format = reader.format().map(|f| format!("{:?}", f).to_lowercase());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ThumbError::decode_failed(format!("failed to read dimensions: {e}")))?;

    Ok(InspectMetadata {
        width,
        height,
        format,
    })
}

/// Read dimensions and format from the header of `data`.
pub fn inspect_header_from_bytes(data: &[u8]) -> error::Result<InspectMetadata> {
    read_inspect_metadata(Cursor::new(data))
}

pub fn inspect_header_from_path(path: &str) -> error::Result<InspectMetadata> {
    use std::fs::File;

    let file = File::open(path).map_err(|e| ThumbError::file_read_failed(path.to_string(), e))?;
    read_inspect_metadata(BufReader::new(file))
}
