//! Image rotation with bilinear and Lanczos3 interpolation.
//!
//! The rotation uses inverse mapping: for each pixel center in the output
//! image, we calculate the source point it came from and interpolate there.
//!
//! Positive angles rotate clockwise on screen (y grows downward). For a
//! rotation by θ the inverse transform is:
//! ```text
//! src_x = (dst_x - dst_cx) * cos(-θ) - (dst_y - dst_cy) * sin(-θ) + src_cx
//! src_y = (dst_x - dst_cx) * sin(-θ) + (dst_y - dst_cy) * cos(-θ) + src_cy
//! ```

use super::sample::{sample, InterpolationFilter};
use crate::decode::{ChannelMode, PixelBuffer};
use crate::geometry::inscribed_rect_size;

/// Compute the dimensions of the bounding box for a rotated image.
///
/// When an image is rotated, the corners extend beyond the original bounds.
/// This function calculates the minimum bounding box that contains the
/// entire rotated image.
///
/// # Arguments
///
/// * `width` - Original image width
/// * `height` - Original image height
/// * `angle_degrees` - Rotation angle in degrees (sign does not matter)
///
/// # Returns
///
/// Tuple of (new_width, new_height) for the rotated bounding box.
pub fn compute_rotated_bounds(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    // Normalize angle to handle 360, 720, etc.
    let angle_normalized = angle_degrees % 360.0;

    // Fast path: no rotation needed (including near-zero and multiples of 360)
    if angle_normalized.abs() < 0.001 || (360.0 - angle_normalized.abs()).abs() < 0.001 {
        return (width, height);
    }

    // Fast path: exact 90/270 degree rotations (swap dimensions)
    let abs_angle = angle_normalized.abs();
    if (abs_angle - 90.0).abs() < 0.001 || (abs_angle - 270.0).abs() < 0.001 {
        return (height, width);
    }

    // Fast path: exact 180 degree rotation (same dimensions)
    if (abs_angle - 180.0).abs() < 0.001 {
        return (width, height);
    }

    let angle_rad = angle_degrees.to_radians();
    let cos = angle_rad.cos().abs();
    let sin = angle_rad.sin().abs();

    let w = width as f64;
    let h = height as f64;

    // The bounding box of a rotated rectangle is:
    // new_w = |w*cos| + |h*sin|
    // new_h = |w*sin| + |h*cos|
    let new_w = (w * cos + h * sin).ceil() as u32;
    let new_h = (w * sin + h * cos).ceil() as u32;

    (new_w.max(1), new_h.max(1))
}

/// Rotate an image clockwise by `angle_degrees`, expanding the canvas.
///
/// The image is rotated around its center and the output canvas is sized to
/// fit the entire rotated footprint (no clipping). Uncovered corners are
/// black for RGB input and fully transparent for RGBA input.
///
/// # Arguments
///
/// * `image` - Source image to rotate
/// * `angle_degrees` - Clockwise rotation in degrees
/// * `filter` - Interpolation method (Bilinear for preview, Lanczos3 for export)
pub fn rotate_expand(
    image: &PixelBuffer,
    angle_degrees: f64,
    filter: InterpolationFilter,
) -> PixelBuffer {
    // Fast path: no rotation needed
    if angle_degrees.abs() < 0.001 || image.is_empty() {
        return image.clone();
    }

    let (src_w, src_h) = (image.width as f64, image.height as f64);
    let (dst_w, dst_h) = compute_rotated_bounds(image.width, image.height, angle_degrees);

    // Negate so positive angles turn content clockwise
    let angle_rad = -angle_degrees.to_radians();
    let cos = angle_rad.cos();
    let sin = angle_rad.sin();

    // Center of source and destination images
    let src_cx = src_w / 2.0;
    let src_cy = src_h / 2.0;
    let dst_cx = dst_w as f64 / 2.0;
    let dst_cy = dst_h as f64 / 2.0;

    let mode = image.mode;
    let channels = mode.channels();
    let fill = match mode {
        ChannelMode::Rgb => [0, 0, 0, 255],
        ChannelMode::Rgba => [0, 0, 0, 0],
    };

    let mut output = vec![0u8; dst_w as usize * dst_h as usize * channels];

    for (dst_y, row) in output
        .chunks_exact_mut(dst_w as usize * channels)
        .enumerate()
    {
        for (dst_x, px) in row.chunks_exact_mut(channels).enumerate() {
            // Translate destination pixel center to origin at center
            let dx = dst_x as f64 + 0.5 - dst_cx;
            let dy = dst_y as f64 + 0.5 - dst_cy;

            // Apply inverse rotation to find source coordinates
            let src_x = dx * cos - dy * sin + src_cx;
            let src_y = dx * sin + dy * cos + src_cy;

            let pixel = sample(image, src_x, src_y, filter, fill);
            px.copy_from_slice(&pixel[..channels]);
        }
    }

    PixelBuffer::with_mode(dst_w, dst_h, mode, output)
}

/// Rotate clockwise by `angle_degrees` and crop to the inscribed rectangle.
///
/// The canvas is first expanded so no content is lost, then center-cropped
/// to [`inscribed_rect_size`] of the pre-rotation dimensions, so the result
/// has no blank corners. Angle 0 returns a copy.
pub fn rotate_and_inscribe(
    image: &PixelBuffer,
    angle_degrees: f64,
    filter: InterpolationFilter,
) -> PixelBuffer {
    if angle_degrees == 0.0 || image.is_empty() {
        return image.clone();
    }

    let rotated = rotate_expand(image, angle_degrees, filter);
    let (crop_w, crop_h) = inscribed_rect_size(image.width, image.height, angle_degrees);
    let crop_w = crop_w.min(rotated.width);
    let crop_h = crop_h.min(rotated.height);

    let left = (rotated.width - crop_w) / 2;
    let top = (rotated.height - crop_h) / 2;

    super::crop_region(&rotated, left, top, left + crop_w, top + crop_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a simple test image with a gradient pattern.
    fn test_image(width: u32, height: u32) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = (((x + y) * 8) % 200 + 20) as u8;
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        PixelBuffer::new(width, height, pixels)
    }

    /// Left half gray 50, right half gray 200.
    fn split_image(size: u32) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((size * size * 3) as usize);
        for _ in 0..size {
            for x in 0..size {
                let v = if x < size / 2 { 50 } else { 200 };
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        PixelBuffer::new(size, size, pixels)
    }

    #[test]
    fn test_rotate_expand_zero_is_copy() {
        let img = test_image(100, 50);
        assert_eq!(rotate_expand(&img, 0.0, InterpolationFilter::Bilinear), img);
    }

    #[test]
    fn test_bounds_for_variation_angles() {
        assert_eq!(compute_rotated_bounds(1000, 800, 2.0), (1028, 835));
        assert_eq!(compute_rotated_bounds(1000, 800, -2.0), (1028, 835));
        assert_eq!(compute_rotated_bounds(1000, 800, 362.0), (1028, 835));
    }

    #[test]
    fn test_rotate_expand_rgb_corners_are_black() {
        let img = PixelBuffer::filled(60, 40, ChannelMode::Rgb, [200, 150, 100, 255]);
        let result = rotate_expand(&img, 10.0, InterpolationFilter::Bilinear);

        assert_eq!((result.width, result.height), (67, 50));
        assert_eq!(result.mode, ChannelMode::Rgb);
        assert_eq!(result.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(result.pixel(33, 25), [200, 150, 100, 255]);
    }

    #[test]
    fn test_rotate_expand_rgba_corners_are_transparent() {
        let img = PixelBuffer::filled(40, 40, ChannelMode::Rgba, [200, 200, 200, 255]);
        let result = rotate_expand(&img, -30.0, InterpolationFilter::Lanczos3);

        assert!(result.has_alpha());
        assert_eq!(result.alpha(0, 0), 0);
        assert_eq!(result.alpha(result.width - 1, result.height - 1), 0);
        assert_eq!(result.alpha(result.width / 2, result.height / 2), 255);
    }

    #[test]
    fn test_positive_angle_turns_clockwise() {
        let img = split_image(200);

        // Inscribed 156x156. The vertical boundary leans right at the top.
        let cw = rotate_and_inscribe(&img, 20.0, InterpolationFilter::Bilinear);
        assert_eq!((cw.width, cw.height), (156, 156));
        assert_eq!(cw.pixel(92, 0)[0], 50);
        assert_eq!(cw.pixel(64, 155)[0], 200);

        let ccw = rotate_and_inscribe(&img, -20.0, InterpolationFilter::Bilinear);
        assert_eq!(ccw.pixel(92, 0)[0], 200);
        assert_eq!(ccw.pixel(64, 155)[0], 50);
    }

    #[test]
    fn test_rotate_and_inscribe_tiny_and_thin_sources() {
        let tiny = test_image(12, 12);
        let result = rotate_and_inscribe(&tiny, 30.0, InterpolationFilter::Bilinear);
        assert_eq!((result.width, result.height), (8, 8));

        let thin = test_image(100, 3);
        let result = rotate_and_inscribe(&thin, 5.0, InterpolationFilter::Bilinear);
        assert_eq!((result.width, result.height), (25, 1));
    }

    #[test]
    fn test_rotate_and_inscribe_zero_is_copy() {
        let img = test_image(40, 30);
        assert_eq!(rotate_and_inscribe(&img, 0.0, InterpolationFilter::Bilinear), img);
    }

    #[test]
    fn test_rotate_and_inscribe_dimensions() {
        let img = test_image(1000, 800);
        let expected = inscribed_rect_size(1000, 800, 10.0);
        for filter in [InterpolationFilter::Bilinear, InterpolationFilter::Lanczos3] {
            let result = rotate_and_inscribe(&img, 10.0, filter);
            assert_eq!((result.width, result.height), expected);
        }
    }

    #[test]
    fn test_rotate_and_inscribe_has_no_blank_corners() {
        // Source never contains pure black, so black means uncovered
        let img = test_image(300, 200);
        for angle in [-7.5, 3.0, 12.0, 25.0] {
            let result = rotate_and_inscribe(&img, angle, InterpolationFilter::Bilinear);
            for (x, y) in [
                (0, 0),
                (result.width - 1, 0),
                (0, result.height - 1),
                (result.width - 1, result.height - 1),
            ] {
                assert_ne!(result.pixel(x, y)[0], 0, "blank corner at {angle} deg");
            }
        }
    }

    #[test]
    fn test_rotate_and_inscribe_rgba_is_opaque() {
        let img = PixelBuffer::filled(120, 90, ChannelMode::Rgba, [50, 60, 70, 255]);
        let result = rotate_and_inscribe(&img, -4.0, InterpolationFilter::Lanczos3);

        assert!(result.has_alpha());
        assert!(result.pixels.chunks_exact(4).all(|p| p[3] == 255));
    }
}
