//! Pixel formats and YUV memory layouts.
//!
//! # Types
//!
//! - [`PixelFormat`] - element type and channel count of a surface
//! - [`YuvLayout`] - arrangement of luma/chroma samples in a raw frame
//!
//! # Raw frame shapes
//!
//! Raw YUV frames are carried in ordinary surfaces. Planar and semi-planar
//! layouts stack their planes vertically in a single-channel surface, packed
//! 4:2:2 layouts store one `Y0 U Y1 V` macropixel per four-channel texel:
//!
//! ```rust
//! use vpipe_core::{PixelFormat, YuvLayout};
//!
//! let nv12 = YuvLayout::Nv12.raw_desc(640, 480).unwrap();
//! assert_eq!((nv12.width, nv12.height, nv12.format), (640, 720, PixelFormat::U8C1));
//!
//! let uyvy = YuvLayout::Uyvy.raw_desc(640, 480).unwrap();
//! assert_eq!((uyvy.width, uyvy.height, uyvy.format), (320, 480, PixelFormat::U8C4));
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreResult, Error};
use crate::surface::SurfaceDesc;

/// Element type and channel count of a surface.
///
/// Immutable once a surface has been allocated with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit single channel (raw planar YUV, masks).
    U8C1,
    /// 8-bit three channel (RGB24 captures).
    U8C3,
    /// 8-bit four channel (RGBA working format, packed YUV macropixels).
    #[default]
    U8C4,
    /// 32-bit float four channel.
    F32C4,
}

impl PixelFormat {
    /// Number of channels per pixel.
    #[inline]
    pub const fn channels(&self) -> u32 {
        match self {
            Self::U8C1 => 1,
            Self::U8C3 => 3,
            Self::U8C4 | Self::F32C4 => 4,
        }
    }

    /// Bytes per channel element.
    #[inline]
    pub const fn bytes_per_channel(&self) -> u32 {
        match self {
            Self::U8C1 | Self::U8C3 | Self::U8C4 => 1,
            Self::F32C4 => 4,
        }
    }

    /// Bytes per pixel.
    #[inline]
    pub const fn bytes_per_pixel(&self) -> u32 {
        self.channels() * self.bytes_per_channel()
    }

    /// Whether elements are floating point.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F32C4)
    }

    /// Short lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::U8C1 => "u8c1",
            Self::U8C3 => "u8c3",
            Self::U8C4 => "u8c4",
            Self::F32C4 => "f32c4",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "u8c1" | "gray8" => Ok(Self::U8C1),
            "u8c3" | "rgb24" => Ok(Self::U8C3),
            "u8c4" | "rgba" => Ok(Self::U8C4),
            "f32c4" | "rgbaf" => Ok(Self::F32C4),
            other => Err(Error::unsupported_format(other)),
        }
    }
}

/// Arrangement of luma and chroma samples in a raw frame.
///
/// Selects the kernel variant a color-convert layer dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum YuvLayout {
    /// Semi-planar 4:2:0: Y plane followed by an interleaved UV plane.
    #[default]
    Nv12,
    /// Planar with full-width, half-height U and V planes; each chroma row
    /// is shared by a vertical pair of luma rows.
    Yuy2Planar,
    /// Planar 4:2:0: Y plane, then U, then V at quarter size each.
    I420,
    /// Packed 4:2:2 `Y0 U Y1 V`.
    Yuy2,
    /// Packed 4:2:2 `Y0 V Y1 U`.
    Yvyu,
    /// Packed 4:2:2 `U Y0 V Y1`.
    Uyvy,
    /// Not a YUV layout (RGB captures).
    Other,
}

impl YuvLayout {
    /// All layouts with a conversion kernel.
    pub const CONVERTIBLE: [YuvLayout; 6] = [
        Self::Nv12,
        Self::Yuy2Planar,
        Self::I420,
        Self::Yuy2,
        Self::Yvyu,
        Self::Uyvy,
    ];

    /// Planar or semi-planar layouts (single-channel stacked planes).
    #[inline]
    pub const fn is_planar(&self) -> bool {
        matches!(self, Self::Nv12 | Self::Yuy2Planar | Self::I420)
    }

    /// Packed 4:2:2 layouts (one macropixel per four-channel texel).
    #[inline]
    pub const fn is_packed(&self) -> bool {
        matches!(self, Self::Yuy2 | Self::Yvyu | Self::Uyvy)
    }

    /// Whether chroma is shared across a vertical pair of rows.
    #[inline]
    pub const fn subsamples_vertically(&self) -> bool {
        matches!(self, Self::Nv12 | Self::Yuy2Planar | Self::I420)
    }

    /// Byte positions of `[Y0, U, Y1, V]` inside a packed macropixel.
    ///
    /// Returns `None` for non-packed layouts.
    pub const fn packed_order(&self) -> Option<[usize; 4]> {
        match self {
            Self::Yuy2 => Some([0, 1, 2, 3]),
            Self::Yvyu => Some([0, 3, 2, 1]),
            Self::Uyvy => Some([1, 0, 3, 2]),
            _ => None,
        }
    }

    /// Checks that an image of `width`x`height` can use this layout.
    pub fn validate(&self, width: u32, height: u32) -> CoreResult<()> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_dimensions(width, height, "zero-sized frame"));
        }
        if matches!(self, Self::Other) {
            return Ok(());
        }
        if width % 2 != 0 {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("{} requires an even width", self.name()),
            ));
        }
        if self.subsamples_vertically() && height % 2 != 0 {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("{} requires an even height", self.name()),
            ));
        }
        Ok(())
    }

    /// Shape of the raw surface holding one `width`x`height` frame.
    ///
    /// `Other` has no fixed raw shape and is rejected.
    pub fn raw_desc(&self, width: u32, height: u32) -> CoreResult<SurfaceDesc> {
        self.validate(width, height)?;
        match self {
            Self::Nv12 | Self::I420 => SurfaceDesc::new(width, height * 3 / 2, PixelFormat::U8C1),
            Self::Yuy2Planar => SurfaceDesc::new(width, height * 2, PixelFormat::U8C1),
            Self::Yuy2 | Self::Yvyu | Self::Uyvy => {
                SurfaceDesc::new(width / 2, height, PixelFormat::U8C4)
            }
            Self::Other => Err(Error::unsupported_format("layout 'other' has no raw shape")),
        }
    }

    /// Recovers the image size from a raw surface shape.
    pub fn image_size(&self, raw: &SurfaceDesc) -> CoreResult<(u32, u32)> {
        let expected = match self {
            Self::Nv12 | Self::I420 | Self::Yuy2Planar => PixelFormat::U8C1,
            Self::Yuy2 | Self::Yvyu | Self::Uyvy => PixelFormat::U8C4,
            Self::Other => return Err(Error::unsupported_format("layout 'other' has no raw shape")),
        };
        if raw.format != expected {
            return Err(Error::unsupported_format(format!(
                "{} expects {} input, got {}",
                self.name(),
                expected,
                raw.format
            )));
        }
        let size = match self {
            Self::Nv12 | Self::I420 => {
                if raw.height % 3 != 0 {
                    return Err(Error::invalid_dimensions(
                        raw.width,
                        raw.height,
                        "4:2:0 raw height must be a multiple of 3",
                    ));
                }
                (raw.width, raw.height / 3 * 2)
            }
            Self::Yuy2Planar => (raw.width, raw.height / 2),
            _ => (raw.width * 2, raw.height),
        };
        self.validate(size.0, size.1)?;
        Ok(size)
    }

    /// Short lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Nv12 => "nv12",
            Self::Yuy2Planar => "yuy2p",
            Self::I420 => "i420",
            Self::Yuy2 => "yuy2",
            Self::Yvyu => "yvyu",
            Self::Uyvy => "uyvy",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for YuvLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for YuvLayout {
    type Err = Error;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nv12" | "yuv420sp" => Ok(Self::Nv12),
            "yuy2p" | "yuy2-planar" => Ok(Self::Yuy2Planar),
            "i420" | "yuv420p" => Ok(Self::I420),
            "yuy2" | "yuyv" => Ok(Self::Yuy2),
            "yvyu" => Ok(Self::Yvyu),
            "uyvy" => Ok(Self::Uyvy),
            "other" => Ok(Self::Other),
            other => Err(Error::unsupported_format(other)),
        }
    }
}
