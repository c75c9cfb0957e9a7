//! Flip and gamma.

use rayon::prelude::*;
use vpipe_core::{ImageView, ImageViewMut, Texel};

use super::{expect_channels, expect_size};
use crate::{ComputeError, ComputeResult};

/// Parameters of the flip/gamma operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperateParams {
    /// Exponent applied to color channels.
    pub gamma: f32,
    /// Mirror horizontally.
    pub flip_x: bool,
    /// Mirror vertically.
    pub flip_y: bool,
}

impl Default for OperateParams {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            flip_x: false,
            flip_y: false,
        }
    }
}

impl OperateParams {
    /// Whether the operator changes nothing.
    pub fn is_identity(&self) -> bool {
        self.gamma == 1.0 && !self.flip_x && !self.flip_y
    }
}

/// Mirrors the sampling coordinate, then raises color channels to `gamma`.
///
/// Alpha (the fourth channel, if any) is copied unchanged.
pub fn operate<T: Texel>(src: &ImageView<'_, T>, dst: &mut ImageViewMut<'_, T>, params: OperateParams) -> ComputeResult<()> {
    if !params.gamma.is_finite() || params.gamma <= 0.0 {
        return Err(ComputeError::LaunchFailed(format!("invalid gamma {}", params.gamma)));
    }
    expect_channels("operate destination", src.channels(), dst.channels())?;
    expect_size((src.width(), src.height()), (dst.width(), dst.height()))?;

    let c = src.channels();
    let color = c.min(3);
    let w = src.width();
    let h = src.height();
    let apply_gamma = params.gamma != 1.0;

    let stride = dst.stride();
    dst.data_mut()
        .par_chunks_mut(stride)
        .take(h as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            let sy = if params.flip_y { h - 1 - y } else { y };
            for x in 0..w {
                let sx = if params.flip_x { w - 1 - x } else { x };
                let inp = src.pixel(sx, sy);
                let out = &mut row[x as usize * c..x as usize * c + c];
                out.copy_from_slice(inp);
                if apply_gamma {
                    for v in &mut out[..color] {
                        *v = T::from_unit(v.to_unit().powf(params.gamma));
                    }
                }
            }
        });
    Ok(())
}
