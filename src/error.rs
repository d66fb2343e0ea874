// src/error.rs
//
// Unified error handling for thumbcore
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Contract violations by the caller (bad geometry, bad arguments)
// - CodecError: Failures reported by the decoder/encoder collaborators
// - ResourceLimit: Memory/dimension limits, allocation and I/O failures
// - InternalBug: Library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used to decide how a caller should react.
///
/// - UserError: precondition failure, fix the caller
/// - CodecError: collaborator failure, fall back or give up
/// - ResourceLimit: limits or allocation, may succeed with smaller input
/// - InternalBug: should not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    UserError,
    CodecError,
    ResourceLimit,
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "THUMBCORE_USER_ERROR",
            ErrorCategory::CodecError => "THUMBCORE_CODEC_ERROR",
            ErrorCategory::ResourceLimit => "THUMBCORE_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "THUMBCORE_INTERNAL_BUG",
        }
    }
}

/// thumbcore error types
#[derive(Debug, Error)]
pub enum ThumbError {
    // Geometry Errors
    #[error("Invalid geometry: {message}")]
    InvalidGeometry { message: Cow<'static, str> },

    #[error("Buffer of {actual} samples does not match {width}x{height} {layout} ({expected} samples)")]
    BufferSizeMismatch {
        width: u32,
        height: u32,
        layout: Cow<'static, str>,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported pixel layout: {layout}")]
    UnsupportedLayout { layout: Cow<'static, str> },

    // Resource Errors
    #[error("Failed to allocate {bytes} bytes for {purpose}")]
    AllocationFailure {
        bytes: usize,
        purpose: Cow<'static, str>,
    },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to memory-map file '{path}': {source}")]
    MmapFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Collaborator Errors
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Failed to encode as {format}: {message}")]
    EncodingFailure {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    // Configuration Errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Backend is not initialized. Call backend::initialize() first")]
    BackendNotInitialized,

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl Clone for ThumbError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidGeometry { message } => Self::InvalidGeometry {
                message: message.clone(),
            },
            Self::BufferSizeMismatch {
                width,
                height,
                layout,
                expected,
                actual,
            } => Self::BufferSizeMismatch {
                width: *width,
                height: *height,
                layout: layout.clone(),
                expected: *expected,
                actual: *actual,
            },
            Self::UnsupportedLayout { layout } => Self::UnsupportedLayout {
                layout: layout.clone(),
            },
            Self::AllocationFailure { bytes, purpose } => Self::AllocationFailure {
                bytes: *bytes,
                purpose: purpose.clone(),
            },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::FileWriteFailed { path, source } => Self::FileWriteFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::MmapFailed { path, source } => Self::MmapFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::EncodingFailure { format, message } => Self::EncodingFailure {
                format: format.clone(),
                message: message.clone(),
            },
            Self::ResizeFailed {
                source_width,
                source_height,
                target_width,
                target_height,
                message,
            } => Self::ResizeFailed {
                source_width: *source_width,
                source_height: *source_height,
                target_width: *target_width,
                target_height: *target_height,
                message: message.clone(),
            },
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::BackendNotInitialized => Self::BackendNotInitialized,
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl ThumbError {
    pub fn invalid_geometry(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    pub fn buffer_size_mismatch(
        width: u32,
        height: u32,
        layout: impl Into<Cow<'static, str>>,
        expected: usize,
        actual: usize,
    ) -> Self {
        Self::BufferSizeMismatch {
            width,
            height,
            layout: layout.into(),
            expected,
            actual,
        }
    }

    pub fn unsupported_layout(layout: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedLayout {
            layout: layout.into(),
        }
    }

    pub fn allocation_failure(bytes: usize, purpose: impl Into<Cow<'static, str>>) -> Self {
        Self::AllocationFailure {
            bytes,
            purpose: purpose.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn mmap_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::MmapFailed {
            path: path.into(),
            source,
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn encoding_failure(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodingFailure {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn backend_not_initialized() -> Self {
        Self::BackendNotInitialized
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable by the caller.
    ///
    /// UserError and ResourceLimit are recoverable, CodecError and InternalBug
    /// are not. Geometry and buffer contract violations are UserErrors that are
    /// never recoverable: retrying the same call fails the same way.
    pub fn is_recoverable(&self) -> bool {
        if self.is_contract_violation() {
            return false;
        }
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Precondition failures from the sampler, the accumulator and buffer views.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidGeometry { .. }
                | Self::BufferSizeMismatch { .. }
                | Self::UnsupportedLayout { .. }
        )
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidGeometry { .. }
            | Self::BufferSizeMismatch { .. }
            | Self::UnsupportedLayout { .. }
            | Self::InvalidArgument { .. }
            | Self::BackendNotInitialized => ErrorCategory::UserError,
            Self::DecodeFailed { .. }
            | Self::EncodingFailure { .. }
            | Self::ResizeFailed { .. } => ErrorCategory::CodecError,
            // File errors are grouped with limits: usually disk or memory pressure,
            // and fixable by the caller either way.
            Self::AllocationFailure { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::FileReadFailed { .. }
            | Self::FileWriteFailed { .. }
            | Self::MmapFailed { .. } => ErrorCategory::ResourceLimit,
            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }
}

pub type Result<T> = std::result::Result<T, ThumbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ThumbError::invalid_geometry("region 0x4 has zero area");
        assert!(err.to_string().contains("zero area"));

        let err = ThumbError::buffer_size_mismatch(2, 2, "rgba8", 16, 12);
        assert_eq!(
            err.to_string(),
            "Buffer of 12 samples does not match 2x2 rgba8 (16 samples)"
        );
    }

    #[test]
    fn test_error_recoverable() {
        assert!(!ThumbError::invalid_geometry("x").is_recoverable());
        assert!(!ThumbError::buffer_size_mismatch(2, 2, "rgb8", 12, 10).is_recoverable());
        assert!(ThumbError::invalid_argument("format", "bmp", "expected gif or png").is_recoverable());
        assert!(ThumbError::file_write_failed(
            "out.gif",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied)
        )
        .is_recoverable());
        assert!(ThumbError::allocation_failure(1024, "delta crop").is_recoverable());
        assert!(!ThumbError::decode_failed("bad header").is_recoverable());
        assert!(!ThumbError::encoding_failure("gif", "broken pipe").is_recoverable());
        assert!(!ThumbError::internal_panic("boom").is_recoverable());
    }

    #[test]
    fn test_error_category_mapping() {
        assert_eq!(
            ThumbError::invalid_geometry("x").category(),
            ErrorCategory::UserError
        );
        assert_eq!(
            ThumbError::backend_not_initialized().category(),
            ErrorCategory::UserError
        );
        assert_eq!(
            ThumbError::encoding_failure("gif", "x").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            ThumbError::resize_failed((4, 4), (2, 2), "x").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            ThumbError::pixel_count_exceeds_limit(10, 5).category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(
            ThumbError::file_read_failed(
                "missing.gif",
                std::io::Error::from(std::io::ErrorKind::NotFound)
            )
            .category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(
            ThumbError::internal_panic("x").category(),
            ErrorCategory::InternalBug
        );
    }

    #[test]
    fn test_clone_preserves_io_kind() {
        let err = ThumbError::mmap_failed(
            "a.gif",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        match err.clone() {
            ThumbError::MmapFailed { path, source } => {
                assert_eq!(path, "a.gif");
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected clone: {other:?}"),
        }
    }

    #[test]
    fn test_category_codes() {
        assert_eq!(ErrorCategory::UserError.code(), "THUMBCORE_USER_ERROR");
        assert_eq!(ErrorCategory::InternalBug.as_str(), "InternalBug");
    }
}
