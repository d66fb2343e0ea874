// src/engine/io.rs
//
// Input sources: owned buffers and memory-mapped files.

use crate::error::ThumbError;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Encoded image bytes, either owned or mapped from a file.
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory image data.
    Memory(Arc<Vec<u8>>),
    /// Memory-mapped file (zero-copy access).
    Mapped(Arc<Mmap>),
}

impl Source {
    pub fn from_vec(data: Vec<u8>) -> Self {
        Source::Memory(Arc::new(data))
    }

    /// Map `path` into memory. Empty files are read instead, since they
    /// cannot be mapped on every platform.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ThumbError> {
        let path = path.as_ref();
        let display = path.to_string_lossy().to_string();
        let file =
            File::open(path).map_err(|e| ThumbError::file_read_failed(display.clone(), e))?;
        let len = file
            .metadata()
            .map_err(|e| ThumbError::file_read_failed(display.clone(), e))?
            .len();
        if len == 0 {
            return Ok(Source::from_vec(Vec::new()));
        }

        // Safety: the file is assumed not to be modified externally while mapped.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ThumbError::mmap_failed(display, e))?;
        Ok(Source::Mapped(Arc::new(mmap)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Source::Memory(data) => data.as_slice(),
            Source::Mapped(mmap) => mmap.as_ref(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
