//! Channel reordering and channel-count conversions.

use rayon::prelude::*;
use vpipe_core::{ChannelMap, ImageView, ImageViewMut, Texel};

use super::{expect_channels, expect_size};
use crate::ComputeResult;

fn same_size<A: Texel, B: Texel>(src: &ImageView<'_, A>, dst: &ImageViewMut<'_, B>) -> ComputeResult<()> {
    expect_size((src.width(), src.height()), (dst.width(), dst.height()))
}

/// Permutes four channels: output slot `i` takes source channel `map[i]`.
///
/// Values are moved, not re-quantized, so a permutation followed by its
/// inverse reproduces the source exactly.
pub fn remap_channels<T: Texel>(src: &ImageView<'_, T>, dst: &mut ImageViewMut<'_, T>, map: ChannelMap) -> ComputeResult<()> {
    map.validate()?;
    expect_channels("remap source", 4, src.channels())?;
    expect_channels("remap destination", 4, dst.channels())?;
    same_size(src, dst)?;

    let w = dst.width() as usize;
    let stride = dst.stride();
    dst.data_mut()
        .par_chunks_mut(stride)
        .take(src.height() as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = src.row(y as u32);
            for (out, inp) in row[..w * 4].chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                out.copy_from_slice(&map.apply(inp));
            }
        });
    Ok(())
}

/// Expands three channels to four with an opaque alpha.
pub fn packed_to_planar4<T: Texel>(src: &ImageView<'_, T>, dst: &mut ImageViewMut<'_, T>) -> ComputeResult<()> {
    expect_channels("3-channel source", 3, src.channels())?;
    expect_channels("4-channel destination", 4, dst.channels())?;
    same_size(src, dst)?;

    let w = dst.width() as usize;
    let stride = dst.stride();
    dst.data_mut()
        .par_chunks_mut(stride)
        .take(src.height() as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = src.row(y as u32);
            for (out, inp) in row[..w * 4].chunks_exact_mut(4).zip(src_row.chunks_exact(3)) {
                out[..3].copy_from_slice(inp);
                out[3] = T::OPAQUE;
            }
        });
    Ok(())
}

/// Drops the alpha channel, keeping channel order.
///
/// BGR output is a [`remap_channels`] with [`ChannelMap::bgra`] ahead of this.
pub fn planar4_to_packed<T: Texel>(src: &ImageView<'_, T>, dst: &mut ImageViewMut<'_, T>) -> ComputeResult<()> {
    expect_channels("4-channel source", 4, src.channels())?;
    expect_channels("3-channel destination", 3, dst.channels())?;
    same_size(src, dst)?;

    let w = dst.width() as usize;
    let stride = dst.stride();
    dst.data_mut()
        .par_chunks_mut(stride)
        .take(src.height() as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = src.row(y as u32);
            for (out, inp) in row[..w * 3].chunks_exact_mut(3).zip(src_row.chunks_exact(4)) {
                out.copy_from_slice(&inp[..3]);
            }
        });
    Ok(())
}

/// Promotes 8-bit storage to normalized float.
pub fn to_float(src: &ImageView<'_, u8>, dst: &mut ImageViewMut<'_, f32>) -> ComputeResult<()> {
    expect_channels("float destination", src.channels(), dst.channels())?;
    same_size(src, dst)?;

    let len = dst.width() as usize * dst.channels();
    let stride = dst.stride();
    dst.data_mut()
        .par_chunks_mut(stride)
        .take(src.height() as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for (out, &inp) in row[..len].iter_mut().zip(src.row(y as u32)) {
                *out = inp.to_unit();
            }
        });
    Ok(())
}

/// Copies visible pixels between views of identical shape.
pub fn copy<T: Texel>(src: &ImageView<'_, T>, dst: &mut ImageViewMut<'_, T>) -> ComputeResult<()> {
    expect_channels("copy destination", src.channels(), dst.channels())?;
    same_size(src, dst)?;

    let len = dst.width() as usize * dst.channels();
    let stride = dst.stride();
    dst.data_mut()
        .par_chunks_mut(stride)
        .take(src.height() as usize)
        .enumerate()
        .for_each(|(y, row)| row[..len].copy_from_slice(src.row(y as u32)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_swap() {
        let px = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let src = ImageView::packed(&px, 2, 1, 4).unwrap();
        let mut out = [0u8; 8];
        let mut dst = ImageViewMut::packed(&mut out, 2, 1, 4).unwrap();
        remap_channels(&src, &mut dst, ChannelMap::bgra()).unwrap();
        assert_eq!(out, [3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_remap_rejects_bad_map() {
        let px = [0u8; 4];
        let src = ImageView::packed(&px, 1, 1, 4).unwrap();
        let mut out = [0u8; 4];
        let mut dst = ImageViewMut::packed(&mut out, 1, 1, 4).unwrap();
        let map = ChannelMap { red: 7, green: 1, blue: 2, alpha: 3 };
        assert!(remap_channels(&src, &mut dst, map).is_err());
    }

    #[test]
    fn test_rgb_to_rgba_and_back() {
        let rgb = [10u8, 20, 30, 40, 50, 60];
        let src = ImageView::packed(&rgb, 2, 1, 3).unwrap();
        let mut rgba = [0u8; 8];
        let mut dst = ImageViewMut::packed(&mut rgba, 2, 1, 4).unwrap();
        packed_to_planar4(&src, &mut dst).unwrap();
        assert_eq!(rgba, [10, 20, 30, 255, 40, 50, 60, 255]);

        let src = ImageView::packed(&rgba, 2, 1, 4).unwrap();
        let mut back = [0u8; 6];
        let mut dst = ImageViewMut::packed(&mut back, 2, 1, 3).unwrap();
        planar4_to_packed(&src, &mut dst).unwrap();
        assert_eq!(back, rgb);
    }

    #[test]
    fn test_to_float() {
        let px = [0u8, 51, 255, 255];
        let src = ImageView::packed(&px, 1, 1, 4).unwrap();
        let mut out = [0.0f32; 4];
        let mut dst = ImageViewMut::packed(&mut out, 1, 1, 4).unwrap();
        to_float(&src, &mut dst).unwrap();
        assert!((out[1] - 0.2).abs() < 1e-6);
        assert_eq!(out[2], 1.0);
    }

    #[test]
    fn test_copy_into_padded_rows() {
        let px = [1u8, 2, 3, 4];
        let src = ImageView::packed(&px, 2, 2, 1).unwrap();
        let mut out = [0u8; 6];
        let mut dst = ImageViewMut::new(&mut out, 2, 2, 1, 3).unwrap();
        copy(&src, &mut dst).unwrap();
        assert_eq!(out, [1, 2, 0, 3, 4, 0]);
    }

    #[test]
    fn test_size_mismatch() {
        let px = [0u8; 8];
        let src = ImageView::packed(&px, 2, 1, 4).unwrap();
        let mut out = [0u8; 4];
        let mut dst = ImageViewMut::packed(&mut out, 1, 1, 4).unwrap();
        assert!(copy(&src, &mut dst).is_err());
    }
}
