//! Surface shape descriptors.
//!
//! A [`SurfaceDesc`] is the backend-independent description of a 2D pixel
//! buffer: size, row stride and [`PixelFormat`]. Backends allocate surfaces
//! from a descriptor and never change it afterwards.

use std::fmt;

use crate::error::{CoreResult, Error};
use crate::format::PixelFormat;

/// Shape and format of a 2D surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride in bytes.
    pub stride: usize,
    /// Element type and channel count.
    pub format: PixelFormat,
}

impl SurfaceDesc {
    /// Creates a tightly packed descriptor.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> CoreResult<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_dimensions(width, height, "zero-sized surface"));
        }
        Ok(Self {
            width,
            height,
            stride: width as usize * format.bytes_per_pixel() as usize,
            format,
        })
    }

    /// Creates a descriptor with an explicit row stride (in bytes).
    pub fn with_stride(width: u32, height: u32, stride: usize, format: PixelFormat) -> CoreResult<Self> {
        let desc = Self::new(width, height, format)?;
        let min_stride = desc.stride;
        let elem = format.bytes_per_channel() as usize;
        if stride < min_stride {
            return Err(Error::InvalidStride { stride, min_stride, width });
        }
        if stride % elem != 0 {
            return Err(Error::InvalidStride { stride, min_stride, width });
        }
        Ok(Self { stride, ..desc })
    }

    /// Bytes in one tightly packed row.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel() as usize
    }

    /// Row stride measured in channel elements.
    #[inline]
    pub fn stride_elements(&self) -> usize {
        self.stride / self.format.bytes_per_channel() as usize
    }

    /// Total bytes occupied including row padding.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.stride * self.height as usize
    }

    /// Total channel elements occupied including row padding.
    #[inline]
    pub fn element_len(&self) -> usize {
        self.stride_elements() * self.height as usize
    }

    /// Bytes of a tightly packed frame (what callers upload and read back).
    #[inline]
    pub fn packed_len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether rows carry no padding.
    #[inline]
    pub fn is_packed(&self) -> bool {
        self.stride == self.row_bytes()
    }

    /// Same size with another format (tightly packed).
    pub fn with_format(&self, format: PixelFormat) -> Self {
        Self {
            width: self.width,
            height: self.height,
            stride: self.width as usize * format.bytes_per_pixel() as usize,
            format,
        }
    }
}

impl fmt::Display for SurfaceDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.format)
    }
}
