//! Inverse-mapping samplers shared by rotation and perspective warps.
//!
//! Coordinates are continuous, with pixel `i` covering `[i, i + 1)`. A
//! destination pixel is sampled at its center and mapped back into the
//! source; the mapped point is "covered" when it falls inside the source
//! rectangle `[0, w] x [0, h]`. Uncovered points produce the fill color.

use crate::decode::PixelBuffer;

/// Interpolation filter for rotation and warp operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationFilter {
    /// Fast bilinear interpolation - good for preview rendering.
    #[default]
    Bilinear,
    /// High-quality Lanczos3 interpolation - good for export.
    Lanczos3,
}

/// Sample `image` at continuous source point `(x, y)`.
///
/// Always returns four components; RGB sources report alpha 255.
#[inline]
pub(crate) fn sample(
    image: &PixelBuffer,
    x: f64,
    y: f64,
    filter: InterpolationFilter,
    fill: [u8; 4],
) -> [u8; 4] {
    let (w, h) = (image.width as f64, image.height as f64);
    if image.is_empty() || !(0.0..=w).contains(&x) || !(0.0..=h).contains(&y) {
        return fill;
    }

    // Shift from continuous coordinates to pixel-center coordinates.
    let (px, py) = (x - 0.5, y - 0.5);
    match filter {
        InterpolationFilter::Bilinear => sample_bilinear(image, px, py),
        InterpolationFilter::Lanczos3 => sample_lanczos3(image, px, py),
    }
}

/// Get a pixel as [f64; 4] with coordinates clamped to the image edge.
#[inline]
fn get_pixel_f64(image: &PixelBuffer, px: i64, py: i64) -> [f64; 4] {
    let x = px.clamp(0, image.width as i64 - 1) as u32;
    let y = py.clamp(0, image.height as i64 - 1) as u32;
    image.pixel(x, y).map(f64::from)
}

/// Bilinear interpolation over the 4 nearest pixel centers.
fn sample_bilinear(image: &PixelBuffer, x: f64, y: f64) -> [u8; 4] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let p00 = get_pixel_f64(image, x0, y0);
    let p10 = get_pixel_f64(image, x0 + 1, y0);
    let p01 = get_pixel_f64(image, x0, y0 + 1);
    let p11 = get_pixel_f64(image, x0 + 1, y0 + 1);

    let mut result = [0u8; 4];
    for i in 0..4 {
        let v = p00[i] * (1.0 - fx) * (1.0 - fy)
            + p10[i] * fx * (1.0 - fy)
            + p01[i] * (1.0 - fx) * fy
            + p11[i] * fx * fy;
        result[i] = v.clamp(0.0, 255.0).round() as u8;
    }
    result
}

/// Lanczos3 interpolation over a 6x6 neighborhood.
///
/// Falls back to bilinear within the kernel radius of the border, where
/// the clamped neighborhood would smear edge pixels.
fn sample_lanczos3(image: &PixelBuffer, x: f64, y: f64) -> [u8; 4] {
    let (w, h) = (image.width as f64, image.height as f64);
    if x < 2.0 || x >= w - 3.0 || y < 2.0 || y >= h - 3.0 {
        return sample_bilinear(image, x, y);
    }

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;

    let mut sum = [0.0f64; 4];
    let mut weight_sum = 0.0;

    for ky in -2..=3 {
        for kx in -2..=3 {
            let px = x0 + kx;
            let py = y0 + ky;
            let weight = lanczos_weight(x - px as f64, 3.0) * lanczos_weight(y - py as f64, 3.0);

            let pixel = get_pixel_f64(image, px, py);
            for i in 0..4 {
                sum[i] += pixel[i] * weight;
            }
            weight_sum += weight;
        }
    }

    let mut result = [0u8; 4];
    if weight_sum > 0.0 {
        for i in 0..4 {
            result[i] = (sum[i] / weight_sum).clamp(0.0, 255.0).round() as u8;
        }
    }
    result
}

/// Lanczos kernel weight function.
///
/// ```text
/// L(x) = sinc(x) * sinc(x/a)  for |x| < a
/// L(x) = 0                     for |x| >= a
/// ```
fn lanczos_weight(x: f64, a: f64) -> f64 {
    if x.abs() < f64::EPSILON {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }

    let pi_x = std::f64::consts::PI * x;
    let pi_x_a = pi_x / a;
    (a * pi_x.sin() * pi_x_a.sin()) / (pi_x * pi_x)
}
