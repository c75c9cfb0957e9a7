//! Error types for vpipe-core.
//!
//! Covers the failure modes of describing surfaces and validating
//! pixel-level parameters before any backend is involved:
//! - Surface shape validation (zero or odd dimensions, stride)
//! - Buffer length checks for raw frames and views
//! - Channel map validation
//!
//! # Usage
//!
//! ```rust
//! use vpipe_core::{Error, CoreResult, YuvLayout};
//!
//! fn check(width: u32, height: u32) -> CoreResult<()> {
//!     YuvLayout::Nv12.validate(width, height)
//! }
//!
//! assert!(check(640, 480).is_ok());
//! assert!(matches!(check(641, 480), Err(Error::InvalidDimensions { .. })));
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type CoreResult<T> = std::result::Result<T, Error>;

/// Errors raised while describing or validating pixel data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Width or height unusable for the requested format or layout.
    ///
    /// Zero-sized surfaces are rejected everywhere; chroma-subsampled
    /// layouts additionally require even dimensions.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Why the dimensions were rejected
        reason: String,
    },

    /// A byte or element buffer has the wrong length.
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Row stride is smaller than one tightly packed row.
    #[error("stride {stride} is less than minimum {min_stride} for width {width}")]
    InvalidStride {
        /// Provided stride in bytes
        stride: usize,
        /// Minimum stride in bytes
        min_stride: usize,
        /// Surface width
        width: u32,
    },

    /// The pixel format cannot be used for this operation.
    #[error("unsupported pixel format: {format}")]
    UnsupportedFormat {
        /// Format name or description
        format: String,
    },

    /// A channel map references a source channel outside 0..=3.
    #[error("invalid channel map: index {index} out of range 0..=3")]
    InvalidChannelMap {
        /// Offending index
        index: u8,
    },
}

impl Error {
    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::BufferSizeMismatch`] error.
    #[inline]
    pub fn buffer_size_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }

    /// Creates an [`Error::UnsupportedFormat`] error.
    #[inline]
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }
}
