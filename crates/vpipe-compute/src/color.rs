//! BT.601 full-range YUV <-> RGB transforms.
//!
//! All values are normalized to `[0, 1]`; chroma is stored with a `0.5`
//! offset, so `(y, 0.5, 0.5)` is neutral gray.

use glam::{Mat3, Vec3};

/// Chroma zero point in the normalized domain.
pub const CHROMA_OFFSET: f32 = 0.5;

/// YUV (chroma centered on zero) to RGB.
pub const YUV_TO_RGB: Mat3 = Mat3::from_cols(
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(0.0, -0.344_136, 1.772),
    Vec3::new(1.402, -0.714_136, 0.0),
);

/// RGB to YUV (chroma centered on zero).
pub const RGB_TO_YUV: Mat3 = Mat3::from_cols(
    Vec3::new(0.299, -0.168_736, 0.5),
    Vec3::new(0.587, -0.331_264, -0.418_688),
    Vec3::new(0.114, 0.5, -0.081_312),
);

/// Converts normalized `(y, u, v)` to unclamped RGB.
#[inline]
pub fn yuv_to_rgb(y: f32, u: f32, v: f32) -> Vec3 {
    YUV_TO_RGB * Vec3::new(y, u - CHROMA_OFFSET, v - CHROMA_OFFSET)
}

/// Converts normalized RGB to `(y, u, v)` with offset chroma.
#[inline]
pub fn rgb_to_yuv(rgb: Vec3) -> Vec3 {
    RGB_TO_YUV * rgb + Vec3::new(0.0, CHROMA_OFFSET, CHROMA_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gray_has_neutral_chroma() {
        let yuv = rgb_to_yuv(Vec3::splat(0.5));
        assert_abs_diff_eq!(yuv.x, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(yuv.y, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(yuv.z, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_matrices_are_inverse() {
        let product = YUV_TO_RGB * RGB_TO_YUV;
        for (i, col) in [product.x_axis, product.y_axis, product.z_axis].iter().enumerate() {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((col[j] - expected).abs() < 1e-4, "[{i}][{j}] = {}", col[j]);
            }
        }
    }

    #[test]
    fn test_primaries_round_trip() {
        for rgb in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE, Vec3::ZERO] {
            let yuv = rgb_to_yuv(rgb);
            let back = yuv_to_rgb(yuv.x, yuv.y, yuv.z);
            assert!((back - rgb).abs().max_element() < 1e-4, "{rgb} -> {back}");
        }
    }
}
