//! Borrowed 2D views over interleaved pixel storage.
//!
//! Kernels operate on [`ImageView`] / [`ImageViewMut`] rather than owned
//! buffers so that every backend can hand them its own storage. Element
//! access goes through the [`Texel`] trait, which fixes the normalisation
//! rule between storage and the `[0, 1]` working domain.

use crate::error::{CoreResult, Error};

/// Storage element of a surface channel.
///
/// 8-bit storage maps `0..=255` onto `[0, 1]`; writing back rounds to the
/// nearest code value after clamping (never truncates).
pub trait Texel: Copy + Default + Send + Sync + 'static {
    /// Value of a fully opaque alpha channel.
    const OPAQUE: Self;

    /// Converts to the normalized working domain.
    fn to_unit(self) -> f32;

    /// Converts from the normalized working domain.
    fn from_unit(v: f32) -> Self;
}

impl Texel for u8 {
    const OPAQUE: Self = 255;

    #[inline]
    fn to_unit(self) -> f32 {
        self as f32 / 255.0
    }

    #[inline]
    fn from_unit(v: f32) -> Self {
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

impl Texel for f32 {
    const OPAQUE: Self = 1.0;

    #[inline]
    fn to_unit(self) -> f32 {
        self
    }

    #[inline]
    fn from_unit(v: f32) -> Self {
        v
    }
}

fn required_len(width: u32, height: u32, channels: usize, stride: usize) -> usize {
    if height == 0 {
        return 0;
    }
    stride * (height as usize - 1) + width as usize * channels
}

fn check_shape(width: u32, height: u32, channels: usize, stride: usize, len: usize) -> CoreResult<()> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_dimensions(width, height, "zero-sized view"));
    }
    let row = width as usize * channels;
    if stride < row {
        return Err(Error::InvalidStride {
            stride,
            min_stride: row,
            width,
        });
    }
    let expected = required_len(width, height, channels, stride);
    if len < expected {
        return Err(Error::buffer_size_mismatch(expected, len));
    }
    Ok(())
}

/// Read-only view of interleaved pixels.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: u32,
    height: u32,
    channels: usize,
    stride: usize,
}

impl<'a, T: Texel> ImageView<'a, T> {
    /// Creates a view with an explicit row stride (in elements).
    pub fn new(data: &'a [T], width: u32, height: u32, channels: usize, stride: usize) -> CoreResult<Self> {
        check_shape(width, height, channels, stride, data.len())?;
        Ok(Self { data, width, height, channels, stride })
    }

    /// Creates a view over tightly packed rows.
    pub fn packed(data: &'a [T], width: u32, height: u32, channels: usize) -> CoreResult<Self> {
        Self::new(data, width, height, channels, width as usize * channels)
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channels per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Row stride in elements.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Underlying storage.
    #[inline]
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// Row `y` without padding.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [T] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.channels]
    }

    /// Channels of pixel (`x`, `y`).
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &'a [T] {
        let start = y as usize * self.stride + x as usize * self.channels;
        &self.data[start..start + self.channels]
    }

    /// Copies the visible pixels into a tightly packed vector.
    pub fn to_packed_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * self.channels);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }
}

/// Mutable view of interleaved pixels.
#[derive(Debug)]
pub struct ImageViewMut<'a, T> {
    data: &'a mut [T],
    width: u32,
    height: u32,
    channels: usize,
    stride: usize,
}

impl<'a, T: Texel> ImageViewMut<'a, T> {
    /// Creates a view with an explicit row stride (in elements).
    pub fn new(data: &'a mut [T], width: u32, height: u32, channels: usize, stride: usize) -> CoreResult<Self> {
        check_shape(width, height, channels, stride, data.len())?;
        Ok(Self { data, width, height, channels, stride })
    }

    /// Creates a view over tightly packed rows.
    pub fn packed(data: &'a mut [T], width: u32, height: u32, channels: usize) -> CoreResult<Self> {
        Self::new(data, width, height, channels, width as usize * channels)
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channels per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Row stride in elements.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Mutable storage, including row padding.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        self.data
    }

    /// Row `y` without padding.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [T] {
        let start = y as usize * self.stride;
        let len = self.width as usize * self.channels;
        &mut self.data[start..start + len]
    }

    /// Iterates rows without padding, top to bottom.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [T]> + '_ {
        let len = self.width as usize * self.channels;
        self.data
            .chunks_mut(self.stride)
            .take(self.height as usize)
            .map(move |row| &mut row[..len])
    }

    /// Reborrows as a read-only view.
    pub fn as_view(&self) -> ImageView<'_, T> {
        ImageView {
            data: self.data,
            width: self.width,
            height: self.height,
            channels: self.channels,
            stride: self.stride,
        }
    }
}
