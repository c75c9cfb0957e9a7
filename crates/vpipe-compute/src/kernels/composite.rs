//! Rectangle blend of an overlay onto a source frame.

use rayon::prelude::*;
use tracing::trace;
use vpipe_core::{ImageView, ImageViewMut, Texel};

use super::{expect_channels, expect_size};
use crate::ComputeResult;

/// Composites `overlay` onto `src` inside the rectangle at (`left`, `top`).
///
/// Inside `[left, left + overlay.width) x [top, top + overlay.height)`:
/// `dst = overlay * (1 - opacity) + src * opacity`, all channels. Outside,
/// `dst` equals `src`. `opacity` weights the *source*, so `1.0` leaves the
/// frame untouched and `0.0` shows the overlay alone. The rectangle may
/// extend past any edge of the frame.
pub fn blend<T: Texel>(
    src: &ImageView<'_, T>,
    overlay: &ImageView<'_, T>,
    dst: &mut ImageViewMut<'_, T>,
    left: i32,
    top: i32,
    opacity: f32,
) -> ComputeResult<()> {
    expect_channels("blend overlay", src.channels(), overlay.channels())?;
    expect_channels("blend destination", src.channels(), dst.channels())?;
    expect_size((src.width(), src.height()), (dst.width(), dst.height()))?;

    let opacity = opacity.clamp(0.0, 1.0);
    let c = src.channels();
    let w = dst.width() as usize;
    let x_range = (left as i64, left as i64 + overlay.width() as i64);
    let y_range = (top as i64, top as i64 + overlay.height() as i64);
    trace!(left, top, opacity, "blend");

    let stride = dst.stride();
    dst.data_mut()
        .par_chunks_mut(stride)
        .take(src.height() as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = src.row(y as u32);
            let row = &mut row[..w * c];
            row.copy_from_slice(src_row);

            let yi = y as i64;
            if yi < y_range.0 || yi >= y_range.1 {
                return;
            }
            let oy = (yi - y_range.0) as u32;
            let x0 = x_range.0.max(0) as usize;
            let x1 = x_range.1.clamp(0, w as i64) as usize;
            for x in x0..x1 {
                let ox = (x as i64 - x_range.0) as u32;
                let over = overlay.pixel(ox, oy);
                let out = &mut row[x * c..x * c + c];
                for (ch, o) in out.iter_mut().enumerate() {
                    let s = src_row[x * c + ch].to_unit();
                    *o = T::from_unit(over[ch].to_unit() * (1.0 - opacity) + s * opacity);
                }
            }
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: u32, h: u32, value: u8) -> Vec<u8> {
        vec![value; (w * h * 4) as usize]
    }

    #[test]
    fn test_opacity_one_keeps_source() {
        let src: Vec<u8> = (0..64).map(|i| (i * 4) as u8).collect();
        let over = frame(2, 2, 200);
        let mut out = vec![0u8; 64];
        blend(
            &ImageView::packed(&src, 4, 4, 4).unwrap(),
            &ImageView::packed(&over, 2, 2, 4).unwrap(),
            &mut ImageViewMut::packed(&mut out, 4, 4, 4).unwrap(),
            1,
            1,
            1.0,
        )
        .unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_opacity_zero_shows_overlay_inside_rect() {
        let src = frame(4, 4, 10);
        let over = frame(2, 2, 200);
        let mut out = vec![0u8; 64];
        blend(
            &ImageView::packed(&src, 4, 4, 4).unwrap(),
            &ImageView::packed(&over, 2, 2, 4).unwrap(),
            &mut ImageViewMut::packed(&mut out, 4, 4, 4).unwrap(),
            1,
            2,
            0.0,
        )
        .unwrap();
        for y in 0..4usize {
            for x in 0..4usize {
                let inside = (1..3).contains(&x) && (2..4).contains(&y);
                let expected = if inside { 200 } else { 10 };
                assert_eq!(out[(y * 4 + x) * 4], expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_half_opacity_mixes() {
        let src = frame(1, 1, 0);
        let over = frame(1, 1, 255);
        let mut out = vec![0u8; 4];
        blend(
            &ImageView::packed(&src, 1, 1, 4).unwrap(),
            &ImageView::packed(&over, 1, 1, 4).unwrap(),
            &mut ImageViewMut::packed(&mut out, 1, 1, 4).unwrap(),
            0,
            0,
            0.25,
        )
        .unwrap();
        // 255 * 0.75 = 191.25
        assert_eq!(out[0], 191);
    }

    #[test]
    fn test_overlay_clipped_at_negative_offset() {
        let src = frame(2, 2, 0);
        let over: Vec<u8> = (0..16).map(|i| i as u8 * 10).collect();
        let mut out = vec![0u8; 16];
        blend(
            &ImageView::packed(&src, 2, 2, 4).unwrap(),
            &ImageView::packed(&over, 2, 2, 4).unwrap(),
            &mut ImageViewMut::packed(&mut out, 2, 2, 4).unwrap(),
            -1,
            -1,
            0.0,
        )
        .unwrap();
        // overlay pixel (1, 1) lands on frame pixel (0, 0)
        assert_eq!(&out[..4], &over[12..16]);
        assert_eq!(&out[4..8], &[0, 0, 0, 0]);
    }
}
