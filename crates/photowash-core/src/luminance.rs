//! Grayscale conversion using ITU-R BT.601 luma coefficients.
//!
//! This is the weighting used by common "L" / `RGB2GRAY` conversions, and is
//! shared by the adjustments and the auto-crop analyzers.

use image::{GrayImage, Luma};

use crate::decode::PixelBuffer;

/// BT.601 coefficient for red, in thousandths.
pub const LUMA_R: u32 = 299;

/// BT.601 coefficient for green, in thousandths.
pub const LUMA_G: u32 = 587;

/// BT.601 coefficient for blue, in thousandths.
pub const LUMA_B: u32 = 114;

/// Gray level of an 8-bit RGB triple, rounded to nearest.
#[inline]
pub fn gray_u8(r: u8, g: u8, b: u8) -> u8 {
    ((LUMA_R * r as u32 + LUMA_G * g as u32 + LUMA_B * b as u32 + 500) / 1000) as u8
}

/// Convert a buffer to an 8-bit grayscale image, ignoring alpha.
pub fn to_gray(image: &PixelBuffer) -> GrayImage {
    let channels = image.channels();
    let mut gray = GrayImage::new(image.width, image.height);
    for (dst, px) in gray.pixels_mut().zip(image.pixels.chunks_exact(channels)) {
        *dst = Luma([gray_u8(px[0], px[1], px[2])]);
    }
    gray
}

/// Mean gray level over the rectangle `[x0, x0+w) x [y0, y0+h)`.
///
/// Returns `None` for an empty rectangle.
pub fn mean_gray(gray: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> Option<f64> {
    if w == 0 || h == 0 {
        return None;
    }
    let mut sum = 0u64;
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            sum += gray.get_pixel(x, y).0[0] as u64;
        }
    }
    Some(sum as f64 / (w as u64 * h as u64) as f64)
}
