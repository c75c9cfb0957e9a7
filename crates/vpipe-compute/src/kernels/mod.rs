//! Stateless pixel kernels.
//!
//! Every kernel reads one or two borrowed source views and writes a
//! destination view, parallelised over destination rows with rayon. Color
//! math runs in normalized `f32`; 8-bit stores round to nearest and clamp.
//!
//! YUV conversions are monomorphised per layout. [`yuv_to_rgba_kernel`] and
//! [`rgba_to_yuv_kernel`] form the lookup table from a [`YuvLayout`] to the
//! specialised entry point, so the per-pixel loop never branches on format.

mod channel;
mod composite;
mod operate;
mod resize;
pub mod yuv;

pub use channel::{copy, packed_to_planar4, planar4_to_packed, remap_channels, to_float};
pub use composite::blend;
pub use operate::{operate, OperateParams};
pub use resize::{resize, ResizeFilter};
pub use yuv::{rgba_to_yuv, yuv_to_rgba};

use vpipe_core::{ImageView, ImageViewMut, YuvLayout};

use crate::{ComputeError, ComputeResult};

/// Specialised raw-to-RGBA conversion entry point.
pub type YuvToRgbaFn = fn(&ImageView<'_, u8>, &mut ImageViewMut<'_, u8>) -> ComputeResult<()>;

/// Specialised RGBA-to-raw conversion entry point.
pub type RgbaToYuvFn = fn(&ImageView<'_, u8>, &mut ImageViewMut<'_, u8>) -> ComputeResult<()>;

/// Looks up the decode kernel for `layout`.
///
/// Returns `None` for [`YuvLayout::Other`].
pub fn yuv_to_rgba_kernel(layout: YuvLayout) -> Option<YuvToRgbaFn> {
    use yuv::marker::*;
    let kernel: YuvToRgbaFn = match layout {
        YuvLayout::Nv12 => yuv::planar_to_rgba::<Nv12>,
        YuvLayout::Yuy2Planar => yuv::planar_to_rgba::<Yuy2Planar>,
        YuvLayout::I420 => yuv::planar_to_rgba::<I420>,
        YuvLayout::Yuy2 => yuv::packed_to_rgba::<Yuy2>,
        YuvLayout::Yvyu => yuv::packed_to_rgba::<Yvyu>,
        YuvLayout::Uyvy => yuv::packed_to_rgba::<Uyvy>,
        YuvLayout::Other => return None,
    };
    Some(kernel)
}

/// Looks up the encode kernel for `layout`.
///
/// Returns `None` for [`YuvLayout::Other`].
pub fn rgba_to_yuv_kernel(layout: YuvLayout) -> Option<RgbaToYuvFn> {
    use yuv::marker::*;
    let kernel: RgbaToYuvFn = match layout {
        YuvLayout::Nv12 => yuv::rgba_to_planar::<Nv12>,
        YuvLayout::Yuy2Planar => yuv::rgba_to_planar::<Yuy2Planar>,
        YuvLayout::I420 => yuv::rgba_to_planar::<I420>,
        YuvLayout::Yuy2 => yuv::rgba_to_packed::<Yuy2>,
        YuvLayout::Yvyu => yuv::rgba_to_packed::<Yvyu>,
        YuvLayout::Uyvy => yuv::rgba_to_packed::<Uyvy>,
        YuvLayout::Other => return None,
    };
    Some(kernel)
}

// ============================================================================
// Shape checks shared by kernels
// ============================================================================

pub(crate) fn expect_channels(what: &str, expected: usize, actual: usize) -> ComputeResult<()> {
    if expected != actual {
        return Err(ComputeError::format_mismatch(
            format!("{what} with {expected} channels"),
            format!("{actual} channels"),
        ));
    }
    Ok(())
}

pub(crate) fn expect_size(expected: (u32, u32), actual: (u32, u32)) -> ComputeResult<()> {
    if expected != actual {
        return Err(ComputeError::dimension_mismatch(expected, actual));
    }
    Ok(())
}
