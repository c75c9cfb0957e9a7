//! YUV <-> RGBA conversion kernels.
//!
//! # Raw layouts
//!
//! Planar layouts stack luma and chroma in one single-channel surface of
//! `width` columns. The first `height` rows are luma; chroma follows:
//!
//! | layout       | chroma region                                              |
//! |--------------|------------------------------------------------------------|
//! | `Nv12`       | `height/2` rows of interleaved `U V` pairs                 |
//! | `Yuy2Planar` | `height/2` rows of U, then `height/2` rows of V            |
//! | `I420`       | contiguous U plane then V plane, each `(w/2)*(h/2)` bytes  |
//!
//! Packed layouts store one `Y0 U Y1 V` macropixel (in a layout-specific
//! byte order) per four-channel texel, so a raw surface is `width/2` texels
//! wide and one texel decodes to two RGBA pixels sharing chroma.
//!
//! # Chroma resampling
//!
//! Decoding replicates each chroma sample over the luma samples it covers.
//! Encoding stores, per chroma sample, the arithmetic mean of the chroma of
//! every covered pixel, averaged in float and quantized once.

use glam::Vec3;
use rayon::prelude::*;
use vpipe_core::{ImageView, ImageViewMut, Texel, YuvLayout};

use super::{expect_channels, expect_size};
use crate::color;
use crate::{ComputeError, ComputeResult};

/// Zero-sized layout tags used to specialise the kernels.
pub mod marker {
    /// Semi-planar 4:2:0.
    pub struct Nv12;
    /// Planar, half-height full-width chroma.
    pub struct Yuy2Planar;
    /// Planar 4:2:0.
    pub struct I420;
    /// Packed `Y0 U Y1 V`.
    pub struct Yuy2;
    /// Packed `Y0 V Y1 U`.
    pub struct Yvyu;
    /// Packed `U Y0 V Y1`.
    pub struct Uyvy;
}

use marker::*;

/// Chroma addressing of a planar or semi-planar layout.
///
/// `chroma` always starts at the first byte after the luma rows.
pub trait PlanarLayout: Send + Sync + 'static {
    /// Runtime tag of this layout.
    const LAYOUT: YuvLayout;

    /// Chroma `(u, v)` for luma sample (`x`, `y`) of a `width`x`height` image.
    fn sample(chroma: &[u8], stride: usize, width: usize, height: usize, x: usize, y: usize) -> (u8, u8);

    /// Writes the downsampled chroma of `src` into `chroma`.
    fn encode(src: &ImageView<'_, u8>, chroma: &mut [u8], stride: usize);
}

/// Byte order of a packed 4:2:2 layout.
pub trait PackedLayout: Send + Sync + 'static {
    /// Runtime tag of this layout.
    const LAYOUT: YuvLayout;
    /// Texel positions of `[Y0, U, Y1, V]`.
    const ORDER: [usize; 4];
}

impl PlanarLayout for Nv12 {
    const LAYOUT: YuvLayout = YuvLayout::Nv12;

    #[inline]
    fn sample(chroma: &[u8], stride: usize, _width: usize, _height: usize, x: usize, y: usize) -> (u8, u8) {
        let base = (y / 2) * stride + (x / 2) * 2;
        (chroma[base], chroma[base + 1])
    }

    fn encode(src: &ImageView<'_, u8>, chroma: &mut [u8], stride: usize) {
        let cw = src.width() as usize / 2;
        let ch = src.height() as usize / 2;
        chroma
            .par_chunks_mut(stride)
            .take(ch)
            .enumerate()
            .for_each(|(cy, row)| {
                for cx in 0..cw {
                    let (u, v) = mean_chroma(src, cx * 2, cy * 2, 2, 2);
                    row[cx * 2] = u;
                    row[cx * 2 + 1] = v;
                }
            });
    }
}

impl PlanarLayout for Yuy2Planar {
    const LAYOUT: YuvLayout = YuvLayout::Yuy2Planar;

    #[inline]
    fn sample(chroma: &[u8], stride: usize, _width: usize, height: usize, x: usize, y: usize) -> (u8, u8) {
        let u = chroma[(y / 2) * stride + x];
        let v = chroma[(height / 2 + y / 2) * stride + x];
        (u, v)
    }

    fn encode(src: &ImageView<'_, u8>, chroma: &mut [u8], stride: usize) {
        let w = src.width() as usize;
        let ch = src.height() as usize / 2;
        let (u_plane, v_plane) = chroma.split_at_mut(ch * stride);
        u_plane
            .par_chunks_mut(stride)
            .zip(v_plane.par_chunks_mut(stride))
            .take(ch)
            .enumerate()
            .for_each(|(cy, (u_row, v_row))| {
                for x in 0..w {
                    let (u, v) = mean_chroma(src, x, cy * 2, 1, 2);
                    u_row[x] = u;
                    v_row[x] = v;
                }
            });
    }
}

impl PlanarLayout for I420 {
    const LAYOUT: YuvLayout = YuvLayout::I420;

    #[inline]
    fn sample(chroma: &[u8], _stride: usize, width: usize, height: usize, x: usize, y: usize) -> (u8, u8) {
        let cw = width / 2;
        let plane = cw * (height / 2);
        let idx = (y / 2) * cw + x / 2;
        (chroma[idx], chroma[plane + idx])
    }

    fn encode(src: &ImageView<'_, u8>, chroma: &mut [u8], _stride: usize) {
        let cw = src.width() as usize / 2;
        let ch = src.height() as usize / 2;
        let (u_plane, v_plane) = chroma.split_at_mut(cw * ch);
        u_plane
            .par_chunks_mut(cw)
            .zip(v_plane.par_chunks_mut(cw))
            .take(ch)
            .enumerate()
            .for_each(|(cy, (u_row, v_row))| {
                for cx in 0..cw {
                    let (u, v) = mean_chroma(src, cx * 2, cy * 2, 2, 2);
                    u_row[cx] = u;
                    v_row[cx] = v;
                }
            });
    }
}

impl PackedLayout for Yuy2 {
    const LAYOUT: YuvLayout = YuvLayout::Yuy2;
    const ORDER: [usize; 4] = [0, 1, 2, 3];
}

impl PackedLayout for Yvyu {
    const LAYOUT: YuvLayout = YuvLayout::Yvyu;
    const ORDER: [usize; 4] = [0, 3, 2, 1];
}

impl PackedLayout for Uyvy {
    const LAYOUT: YuvLayout = YuvLayout::Uyvy;
    const ORDER: [usize; 4] = [1, 0, 3, 2];
}

// ============================================================================
// Pixel helpers
// ============================================================================

#[inline]
fn store_rgba(out: &mut [u8], y: u8, u: u8, v: u8) {
    let rgb = color::yuv_to_rgb(y.to_unit(), u.to_unit(), v.to_unit());
    out[0] = u8::from_unit(rgb.x);
    out[1] = u8::from_unit(rgb.y);
    out[2] = u8::from_unit(rgb.z);
    out[3] = u8::OPAQUE;
}

#[inline]
fn yuv_at(src: &ImageView<'_, u8>, x: usize, y: usize) -> Vec3 {
    let px = src.pixel(x as u32, y as u32);
    color::rgb_to_yuv(Vec3::new(px[0].to_unit(), px[1].to_unit(), px[2].to_unit()))
}

/// Mean chroma of an `nx`x`ny` block, quantized once.
#[inline]
fn mean_chroma(src: &ImageView<'_, u8>, x0: usize, y0: usize, nx: usize, ny: usize) -> (u8, u8) {
    let mut u = 0.0f32;
    let mut v = 0.0f32;
    for y in y0..y0 + ny {
        for x in x0..x0 + nx {
            let yuv = yuv_at(src, x, y);
            u += yuv.y;
            v += yuv.z;
        }
    }
    let n = (nx * ny) as f32;
    (u8::from_unit(u / n), u8::from_unit(v / n))
}

// ============================================================================
// Kernels
// ============================================================================

/// Decodes a planar or semi-planar raw frame into RGBA.
///
/// The image size is taken from `dst`; `src` must have the matching raw shape.
pub fn planar_to_rgba<L: PlanarLayout>(src: &ImageView<'_, u8>, dst: &mut ImageViewMut<'_, u8>) -> ComputeResult<()> {
    expect_channels("planar YUV source", 1, src.channels())?;
    expect_channels("RGBA destination", 4, dst.channels())?;
    let raw = L::LAYOUT.raw_desc(dst.width(), dst.height())?;
    expect_size((raw.width, raw.height), (src.width(), src.height()))?;

    let w = dst.width() as usize;
    let h = dst.height() as usize;
    let stride = src.stride();
    let data = src.data();
    let (luma, chroma) = data.split_at(h * stride);
    let dst_stride = dst.stride();

    dst.data_mut()
        .par_chunks_mut(dst_stride)
        .take(h)
        .enumerate()
        .for_each(|(y, row)| {
            let luma_row = &luma[y * stride..y * stride + w];
            for (x, out) in row[..w * 4].chunks_exact_mut(4).enumerate() {
                let (u, v) = L::sample(chroma, stride, w, h, x, y);
                store_rgba(out, luma_row[x], u, v);
            }
        });
    Ok(())
}

/// Decodes a packed 4:2:2 raw frame into RGBA.
///
/// The image size is taken from `src`: each texel yields two pixels.
pub fn packed_to_rgba<L: PackedLayout>(src: &ImageView<'_, u8>, dst: &mut ImageViewMut<'_, u8>) -> ComputeResult<()> {
    expect_channels("packed YUV source", 4, src.channels())?;
    expect_channels("RGBA destination", 4, dst.channels())?;
    expect_size((src.width() * 2, src.height()), (dst.width(), dst.height()))?;

    let [iy0, iu, iy1, iv] = L::ORDER;
    let texels = src.width() as usize;
    let dst_stride = dst.stride();

    dst.data_mut()
        .par_chunks_mut(dst_stride)
        .take(src.height() as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = src.row(y as u32);
            for (mx, texel) in src_row.chunks_exact(4).take(texels).enumerate() {
                let (u, v) = (texel[iu], texel[iv]);
                let out = &mut row[mx * 8..mx * 8 + 8];
                store_rgba(&mut out[..4], texel[iy0], u, v);
                store_rgba(&mut out[4..], texel[iy1], u, v);
            }
        });
    Ok(())
}

/// Encodes RGBA into a planar or semi-planar raw frame.
///
/// The image size is taken from `src`.
pub fn rgba_to_planar<L: PlanarLayout>(src: &ImageView<'_, u8>, dst: &mut ImageViewMut<'_, u8>) -> ComputeResult<()> {
    expect_channels("RGBA source", 4, src.channels())?;
    expect_channels("planar YUV destination", 1, dst.channels())?;
    let raw = L::LAYOUT.raw_desc(src.width(), src.height())?;
    expect_size((raw.width, raw.height), (dst.width(), dst.height()))?;

    let w = src.width() as usize;
    let h = src.height() as usize;
    let stride = dst.stride();
    let (luma, chroma) = dst.data_mut().split_at_mut(h * stride);

    luma.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for (x, out) in row[..w].iter_mut().enumerate() {
            *out = u8::from_unit(yuv_at(src, x, y).x);
        }
    });
    L::encode(src, chroma, stride);
    Ok(())
}

/// Encodes RGBA into a packed 4:2:2 raw frame.
///
/// The image size is taken from `src`.
pub fn rgba_to_packed<L: PackedLayout>(src: &ImageView<'_, u8>, dst: &mut ImageViewMut<'_, u8>) -> ComputeResult<()> {
    expect_channels("RGBA source", 4, src.channels())?;
    expect_channels("packed YUV destination", 4, dst.channels())?;
    let raw = L::LAYOUT.raw_desc(src.width(), src.height())?;
    expect_size((raw.width, raw.height), (dst.width(), dst.height()))?;

    let [iy0, iu, iy1, iv] = L::ORDER;
    let texels = dst.width() as usize;
    let dst_stride = dst.stride();

    dst.data_mut()
        .par_chunks_mut(dst_stride)
        .take(src.height() as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for (mx, texel) in row.chunks_exact_mut(4).take(texels).enumerate() {
                let a = yuv_at(src, mx * 2, y);
                let b = yuv_at(src, mx * 2 + 1, y);
                texel[iy0] = u8::from_unit(a.x);
                texel[iy1] = u8::from_unit(b.x);
                texel[iu] = u8::from_unit((a.y + b.y) * 0.5);
                texel[iv] = u8::from_unit((a.z + b.z) * 0.5);
            }
        });
    Ok(())
}

/// Decodes a raw frame of `layout` into RGBA.
pub fn yuv_to_rgba(src: &ImageView<'_, u8>, dst: &mut ImageViewMut<'_, u8>, layout: YuvLayout) -> ComputeResult<()> {
    let kernel = super::yuv_to_rgba_kernel(layout).ok_or(ComputeError::UnsupportedLayout(layout))?;
    kernel(src, dst)
}

/// Encodes RGBA into a raw frame of `layout`.
pub fn rgba_to_yuv(src: &ImageView<'_, u8>, dst: &mut ImageViewMut<'_, u8>, layout: YuvLayout) -> ComputeResult<()> {
    let kernel = super::rgba_to_yuv_kernel(layout).ok_or(ComputeError::UnsupportedLayout(layout))?;
    kernel(src, dst)
}
