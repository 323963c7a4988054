//! Image resizing for preview working copies and size restoration.
//!
//! Every function returns a new `PixelBuffer` without modifying the input.

use super::{DecodeError, FilterType, PixelBuffer};

/// Longest edge of the interactive preview working copy.
pub const MAX_PREVIEW_SIZE: u32 = 512;

/// Resize an image to exact dimensions.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` for zero target dimensions and
/// `DecodeError::CorruptedFile` if the buffer does not match its dimensions.
pub fn resize_exact(
    image: &PixelBuffer,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<PixelBuffer, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidFormat);
    }

    // Fast path: if dimensions match, just clone
    if image.width == width && image.height == height {
        return Ok(image.clone());
    }

    let dynamic = image
        .to_dynamic()
        .ok_or_else(|| DecodeError::CorruptedFile("Failed to create image buffer".to_string()))?;

    let resized = dynamic.resize_exact(width, height, filter.to_image_filter());

    Ok(match image.has_alpha() {
        true => PixelBuffer::from_rgba_image(resized.into_rgba8()),
        false => PixelBuffer::from_rgb_image(resized.into_rgb8()),
    })
}

/// Resize with optional target dimensions.
///
/// * Neither dimension given: returns a copy.
/// * `keep_ratio` with both dimensions: scales by `min(w/orig_w, h/orig_h)`.
/// * `keep_ratio` with one dimension: derives the other from the aspect ratio.
/// * Without `keep_ratio`: uses the given dimensions, falling back to the
///   original size for an unspecified one.
///
/// Resampling uses Lanczos3.
pub fn resize(
    image: &PixelBuffer,
    width: Option<u32>,
    height: Option<u32>,
    keep_ratio: bool,
) -> Result<PixelBuffer, DecodeError> {
    let Some((new_width, new_height)) =
        target_dimensions(image.width, image.height, width, height, keep_ratio)
    else {
        return Ok(image.clone());
    };

    resize_exact(image, new_width, new_height, FilterType::Lanczos3)
}

fn target_dimensions(
    orig_w: u32,
    orig_h: u32,
    width: Option<u32>,
    height: Option<u32>,
    keep_ratio: bool,
) -> Option<(u32, u32)> {
    let width = width.filter(|w| *w > 0);
    let height = height.filter(|h| *h > 0);
    let (ow, oh) = (orig_w as f64, orig_h as f64);

    let dims = match (width, height, keep_ratio) {
        (None, None, _) => return None,
        (w, h, false) => (w.unwrap_or(orig_w), h.unwrap_or(orig_h)),
        (Some(w), Some(h), true) => {
            let ratio = (w as f64 / ow).min(h as f64 / oh);
            ((ow * ratio) as u32, (oh * ratio) as u32)
        }
        (Some(w), None, true) => (w, (oh * (w as f64 / ow)) as u32),
        (None, Some(h), true) => ((ow * (h as f64 / oh)) as u32, h),
    };

    Some((dims.0.max(1), dims.1.max(1)))
}

/// Generate the downscaled working copy used for interactive previews.
///
/// The result fits within a `max_size x max_size` box while preserving the
/// aspect ratio. Images that already fit are returned unchanged.
pub fn thumbnail(image: &PixelBuffer, max_size: u32) -> Result<PixelBuffer, DecodeError> {
    let (w, h) = thumbnail_size(image.width, image.height, max_size);
    resize_exact(image, w, h, FilterType::Lanczos3)
}

/// Dimensions of the preview working copy for an image of the given size.
pub fn thumbnail_size(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width <= max_size && height <= max_size {
        return (width, height);
    }

    let ratio = (max_size as f64 / width as f64).min(max_size as f64 / height as f64);
    let new_w = (width as f64 * ratio) as u32;
    let new_h = (height as f64 * ratio) as u32;
    (new_w.max(1), new_h.max(1))
}
