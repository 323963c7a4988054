//! Edge cropping and padding.
//!
//! Margins are signed pixel counts. Positive values cut inward from the
//! corresponding edge; a single negative value switches the whole call into
//! padding mode, where every negative margin grows the canvas and positive
//! margins are ignored.
//!
//! Both modes keep output dimensions even, which some encoders and chroma
//! subsampling schemes expect.

use serde::{Deserialize, Serialize};

use crate::decode::PixelBuffer;

/// Fill color for padded canvas area.
const PAD_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Signed per-edge margins in pixels. Negative values pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CropMargins {
    pub top: i32,
    pub bottom: i32,
    pub left: i32,
    pub right: i32,
}

impl CropMargins {
    /// The same margin on all four edges.
    pub fn uniform(value: i32) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }

    /// Whether all margins are zero.
    pub fn is_zero(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }

    /// Whether any margin requests padding.
    pub fn is_padding(&self) -> bool {
        self.top < 0 || self.bottom < 0 || self.left < 0 || self.right < 0
    }

    /// Scale margins to a different working resolution.
    pub fn scaled(&self, factor: f64) -> Self {
        let s = |v: i32| (v as f64 * factor).round() as i32;
        Self {
            top: s(self.top),
            bottom: s(self.bottom),
            left: s(self.left),
            right: s(self.right),
        }
    }
}

/// Crop or pad the edges of an image.
///
/// # Behavior
///
/// - All margins zero: returns a copy.
/// - Any margin negative: pads by `max(0, -margin)` on each side with opaque
///   white, then grows the right/bottom edge by one pixel where needed to
///   make the dimensions even.
/// - Otherwise: crops, keeping at least one pixel of interior, then drops a
///   trailing column/row to make the dimensions even (never below 2 px).
///   The crop box is clamped to the image.
pub fn crop_edges(image: &PixelBuffer, margins: CropMargins) -> PixelBuffer {
    if margins.is_zero() {
        return image.clone();
    }

    if margins.is_padding() {
        return pad_edges(image, margins);
    }

    let (w, h) = (image.width as i64, image.height as i64);
    if w == 0 || h == 0 {
        return image.clone();
    }

    let left = (margins.left as i64).min(w - 1);
    let top = (margins.top as i64).min(h - 1);
    let mut right = (left + 1).max(w - margins.right as i64);
    let mut bottom = (top + 1).max(h - margins.bottom as i64);

    if (right - left) % 2 == 1 {
        right -= 1;
    }
    if (bottom - top) % 2 == 1 {
        bottom -= 1;
    }

    let right = (left + 2).max(right).min(w);
    let bottom = (top + 2).max(bottom).min(h);

    crop_region(image, left as u32, top as u32, right as u32, bottom as u32)
}

fn pad_edges(image: &PixelBuffer, margins: CropMargins) -> PixelBuffer {
    let pad = |v: i32| v.min(0).unsigned_abs();
    let pad_top = pad(margins.top);
    let pad_left = pad(margins.left);
    let mut pad_right = pad(margins.right);
    let mut pad_bottom = pad(margins.bottom);

    let mut new_w = image.width + pad_left + pad_right;
    let mut new_h = image.height + pad_top + pad_bottom;

    if new_w % 2 == 1 {
        new_w += 1;
        pad_right += 1;
    }
    if new_h % 2 == 1 {
        new_h += 1;
        pad_bottom += 1;
    }
    debug_assert_eq!(new_w, image.width + pad_left + pad_right);
    debug_assert_eq!(new_h, image.height + pad_top + pad_bottom);

    let mut output = PixelBuffer::filled(new_w, new_h, image.mode, PAD_COLOR);
    paste(&mut output, image, pad_left, pad_top);
    output
}

/// Copy `src` into `dst` with its top-left corner at `(x0, y0)`.
///
/// Both buffers must share a channel mode; rows that fall outside `dst` are
/// clipped.
fn paste(dst: &mut PixelBuffer, src: &PixelBuffer, x0: u32, y0: u32) {
    let channels = src.channels();
    debug_assert_eq!(channels, dst.channels());

    let copy_w = src.width.min(dst.width.saturating_sub(x0)) as usize;
    let src_stride = src.width as usize * channels;
    let dst_stride = dst.width as usize * channels;

    for y in 0..src.height.min(dst.height.saturating_sub(y0)) {
        let src_start = y as usize * src_stride;
        let dst_start = (y0 + y) as usize * dst_stride + x0 as usize * channels;
        let len = copy_w * channels;
        dst.pixels[dst_start..dst_start + len]
            .copy_from_slice(&src.pixels[src_start..src_start + len]);
    }
}

/// Crop to the pixel box `[left, right) x [top, bottom)`.
///
/// Coordinates are clamped to the image; the result is at least 1x1 for a
/// non-empty input. The channel mode is preserved.
pub fn crop_region(image: &PixelBuffer, left: u32, top: u32, right: u32, bottom: u32) -> PixelBuffer {
    if image.is_empty() {
        return image.clone();
    }

    let left = left.min(image.width - 1);
    let top = top.min(image.height - 1);
    let right = right.clamp(left + 1, image.width);
    let bottom = bottom.clamp(top + 1, image.height);

    // Fast path: full region returns a clone
    if left == 0 && top == 0 && right == image.width && bottom == image.height {
        return image.clone();
    }

    let channels = image.channels();
    let out_width = right - left;
    let out_height = bottom - top;
    let row_len = out_width as usize * channels;
    let src_stride = image.width as usize * channels;

    // Copy pixel data row by row for efficiency
    let mut output = Vec::with_capacity(row_len * out_height as usize);
    for y in top..bottom {
        let start = y as usize * src_stride + left as usize * channels;
        output.extend_from_slice(&image.pixels[start..start + row_len]);
    }

    PixelBuffer::with_mode(out_width, out_height, image.mode, output)
}
