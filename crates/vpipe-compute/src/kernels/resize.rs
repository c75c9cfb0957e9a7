//! Frame resampling.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use vpipe_core::{ImageView, ImageViewMut, Texel};

use super::expect_channels;
use crate::{ComputeError, ComputeResult};

/// Resize filter modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResizeFilter {
    /// Nearest-neighbor (fast, blocky).
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Bilinear,
}

impl ResizeFilter {
    /// Short lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResizeFilter {
    type Err = ComputeError;

    fn from_str(s: &str) -> ComputeResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" | "point" => Ok(Self::Nearest),
            "bilinear" | "linear" => Ok(Self::Bilinear),
            other => Err(ComputeError::LaunchFailed(format!("unknown resize filter '{other}'"))),
        }
    }
}

/// Resamples `src` to the size of `dst`.
pub fn resize<T: Texel>(src: &ImageView<'_, T>, dst: &mut ImageViewMut<'_, T>, filter: ResizeFilter) -> ComputeResult<()> {
    expect_channels("resize destination", src.channels(), dst.channels())?;

    let (sw, sh) = (src.width() as usize, src.height() as usize);
    let (dw, dh) = (dst.width() as usize, dst.height() as usize);
    let c = src.channels();
    let sx = sw as f32 / dw as f32;
    let sy = sh as f32 / dh as f32;

    let stride = dst.stride();
    dst.data_mut()
        .par_chunks_mut(stride)
        .take(dh)
        .enumerate()
        .for_each(|(dy, row)| {
            let fy = dy as f32 * sy;
            let y0 = (fy as usize).min(sh - 1);
            let y1 = (y0 + 1).min(sh - 1);
            let wy = fy - y0 as f32;

            for dx in 0..dw {
                let fx = dx as f32 * sx;
                let x0 = (fx as usize).min(sw - 1);
                let out = &mut row[dx * c..dx * c + c];

                match filter {
                    ResizeFilter::Nearest => {
                        out.copy_from_slice(src.pixel(x0 as u32, y0 as u32));
                    }
                    ResizeFilter::Bilinear => {
                        let x1 = (x0 + 1).min(sw - 1);
                        let wx = fx - x0 as f32;
                        let p00 = src.pixel(x0 as u32, y0 as u32);
                        let p10 = src.pixel(x1 as u32, y0 as u32);
                        let p01 = src.pixel(x0 as u32, y1 as u32);
                        let p11 = src.pixel(x1 as u32, y1 as u32);
                        for ch in 0..c {
                            let c00 = p00[ch].to_unit();
                            let c10 = p10[ch].to_unit();
                            let c01 = p01[ch].to_unit();
                            let c11 = p11[ch].to_unit();
                            let top = c00 + wx * (c10 - c00);
                            let bot = c01 + wx * (c11 - c01);
                            out[ch] = T::from_unit(top + wy * (bot - top));
                        }
                    }
                }
            }
        });
    Ok(())
}
