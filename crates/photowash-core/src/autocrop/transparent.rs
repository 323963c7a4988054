//! Approximate largest opaque interior rectangle.
//!
//! After a perspective warp the canvas has transparent wedges along some
//! edges. We look for a large axis-aligned rectangle whose rows all stay
//! within their opaque span. The search samples at most
//! [`MAX_SAMPLED_ROWS`] top rows and sweeps bottom rows with the same
//! stride, so cost grows with the sample count rather than with the square
//! of the image height. The result is an approximation of the true maximum.

use tracing::debug;

use crate::decode::PixelBuffer;
use crate::transform::crop_region;

/// Default alpha at or above which a pixel counts as opaque.
pub const DEFAULT_MIN_ALPHA: u8 = 10;

/// Maximum number of candidate top rows.
pub const MAX_SAMPLED_ROWS: usize = 200;

/// Opaque column span `[left, right)` of every row; `right <= left` marks a
/// row with no opaque pixels.
fn row_spans(image: &PixelBuffer, min_alpha: u8) -> (Vec<u32>, Vec<u32>) {
    let (w, h) = (image.width, image.height);
    let mut row_left = vec![w; h as usize];
    let mut row_right = vec![0u32; h as usize];

    for y in 0..h {
        let first = (0..w).find(|&x| image.alpha(x, y) >= min_alpha);
        if let Some(first) = first {
            let last = (first..w).rev().find(|&x| image.alpha(x, y) >= min_alpha).unwrap_or(first);
            row_left[y as usize] = first;
            row_right[y as usize] = last + 1;
        }
    }
    (row_left, row_right)
}

/// Best rectangle found by the sampled sweep as `(left, top, right, bottom)`
/// (exclusive right/bottom) and its area.
fn sampled_search(row_left: &[u32], row_right: &[u32]) -> Option<((u32, u32, u32, u32), u64)> {
    let valid: Vec<usize> = (0..row_left.len())
        .filter(|&y| row_right[y] > row_left[y])
        .collect();
    let last_valid = *valid.last()?;

    let n_samples = MAX_SAMPLED_ROWS.min(valid.len());
    let step = (valid.len() / n_samples).max(1);

    let mut best_area = 0u64;
    let mut best = None;

    for &top in valid.iter().step_by(step) {
        let mut left_max = row_left[top];
        let mut right_min = row_right[top];

        for bottom in (top..=last_valid).step_by(step) {
            if row_right[bottom] <= row_left[bottom] {
                continue;
            }
            left_max = left_max.max(row_left[bottom]);
            right_min = right_min.min(row_right[bottom]);
            if left_max >= right_min {
                break;
            }

            let area = (right_min - left_max) as u64 * (bottom - top + 1) as u64;
            if area > best_area {
                best_area = area;
                best = Some((left_max, top as u32, right_min, bottom as u32 + 1));
            }
        }
    }

    best.map(|rect| (rect, best_area))
}

/// Bounding box of all pixels with alpha `>= min_alpha`.
fn opaque_bbox(row_left: &[u32], row_right: &[u32]) -> Option<(u32, u32, u32, u32)> {
    let rows: Vec<usize> = (0..row_left.len())
        .filter(|&y| row_right[y] > row_left[y])
        .collect();
    let (&top, &bottom) = (rows.first()?, rows.last()?);
    let left = rows.iter().map(|&y| row_left[y]).min()?;
    let right = rows.iter().map(|&y| row_right[y]).max()?;
    Some((left, top as u32, right, bottom as u32 + 1))
}

/// Crop an RGBA image to a large rectangle containing only pixels with
/// alpha `>= min_alpha`.
///
/// # Behavior
///
/// - Non-alpha input, or input with no opaque pixels, is returned unchanged.
/// - If the sampled search finds no rectangle of positive area, the image is
///   cropped to the bounding box of its opaque pixels instead.
/// - A result covering the whole image returns a copy.
pub fn crop_transparent_interior(image: &PixelBuffer, min_alpha: u8) -> PixelBuffer {
    if !image.has_alpha() || image.is_empty() {
        return image.clone();
    }

    let (row_left, row_right) = row_spans(image, min_alpha);

    let rect = match sampled_search(&row_left, &row_right) {
        Some((rect, area)) if area > 0 => rect,
        _ => match opaque_bbox(&row_left, &row_right) {
            Some(bbox) => bbox,
            None => {
                debug!("crop_transparent: no opaque pixels");
                return image.clone();
            }
        },
    };

    let (left, top, right, bottom) = rect;
    if (left, top, right, bottom) == (0, 0, image.width, image.height) {
        return image.clone();
    }

    debug!(left, top, right, bottom, "crop_transparent");
    crop_region(image, left, top, right, bottom)
}
