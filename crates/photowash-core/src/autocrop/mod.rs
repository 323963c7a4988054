//! Auto-crop analyzers.
//!
//! - Background classification from corner samples
//! - Foreground extraction, morphology and contour bounding
//! - Opaque interior search for post-warp trimming

mod background;
mod mask;
mod transparent;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decode::PixelBuffer;
use crate::luminance::to_gray;
use crate::transform::crop_region;

pub use background::{detect_background, Background, DEFAULT_SAMPLE_SIZE, DEFAULT_WHITE_THRESHOLD};
pub use mask::{close, dilate, erode, foreground_bounds, foreground_mask, open, ForegroundBounds, Kernel};
pub use transparent::{crop_transparent_interior, DEFAULT_MIN_ALPHA, MAX_SAMPLED_ROWS};

/// Parameters for [`auto_crop_background`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoCropSettings {
    /// Distance from the background level that counts as foreground.
    pub threshold: u8,
    /// Extra pixels kept around the detected foreground.
    pub padding: u32,
    /// Minimum summed foreground box area before cropping happens.
    pub min_area: u64,
    /// Structuring element size `(width, height)`.
    pub kernel: (u32, u32),
}

impl Default for AutoCropSettings {
    fn default() -> Self {
        Self {
            threshold: 12,
            padding: 0,
            min_area: 1000,
            kernel: (5, 5),
        }
    }
}

/// Crop away a uniform white or black border around the subject.
///
/// 1. Convert to gray and classify the background from the corners
/// 2. Binarize into a foreground mask
/// 3. Close (2 iterations) then open (1 iteration) with an elliptical kernel
/// 4. Merge the bounding boxes of the outermost foreground regions
/// 5. Skip if the summed region area is below `min_area`
/// 6. Pad, clamp and crop unless the box is the whole image
pub fn auto_crop_background(image: &PixelBuffer, settings: &AutoCropSettings) -> PixelBuffer {
    if image.is_empty() {
        return image.clone();
    }

    let gray = to_gray(image);
    let background = detect_background(&gray, DEFAULT_SAMPLE_SIZE, DEFAULT_WHITE_THRESHOLD);

    let kernel = Kernel::ellipse(settings.kernel.0, settings.kernel.1);
    let fg = foreground_mask(&gray, background, settings.threshold);
    let fg = close(&fg, &kernel, 2);
    let fg = open(&fg, &kernel, 1);

    let Some(bounds) = foreground_bounds(&fg) else {
        debug!(?background, "auto_crop: no foreground");
        return image.clone();
    };

    if bounds.area < settings.min_area {
        debug!(area = bounds.area, "auto_crop: foreground below min area");
        return image.clone();
    }

    let left = bounds.left.saturating_sub(settings.padding);
    let top = bounds.top.saturating_sub(settings.padding);
    let right = bounds.right.saturating_add(settings.padding).min(image.width);
    let bottom = bounds.bottom.saturating_add(settings.padding).min(image.height);

    if (left, top, right, bottom) == (0, 0, image.width, image.height) {
        return image.clone();
    }

    debug!(?background, left, top, right, bottom, "auto_crop");
    crop_region(image, left, top, right, bottom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ChannelMode;

    fn framed(width: u32, height: u32, bg: u8, fg: u8, inner: (u32, u32, u32, u32)) -> PixelBuffer {
        let (l, t, r, b) = inner;
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = if x >= l && x < r && y >= t && y < b { fg } else { bg };
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        PixelBuffer::new(width, height, pixels)
    }

    #[test]
    fn test_uniform_image_unchanged() {
        for v in [0u8, 128, 255] {
            let img = PixelBuffer::filled(80, 60, ChannelMode::Rgb, [v, v, v, 255]);
            assert_eq!(auto_crop_background(&img, &AutoCropSettings::default()), img);
        }
    }

    #[test]
    fn test_crops_white_border() {
        let img = framed(200, 150, 255, 40, (30, 20, 170, 130));
        let result = auto_crop_background(&img, &AutoCropSettings::default());
        assert_eq!((result.width, result.height), (140, 110));
        assert_eq!(result.pixel(0, 0), [40, 40, 40, 255]);
    }

    #[test]
    fn test_crops_black_border() {
        let img = framed(200, 150, 0, 220, (10, 40, 190, 120));
        let result = auto_crop_background(&img, &AutoCropSettings::default());
        assert_eq!((result.width, result.height), (180, 80));
    }

    #[test]
    fn test_padding_is_clamped() {
        let img = framed(200, 150, 255, 40, (5, 50, 150, 100));
        let settings = AutoCropSettings {
            padding: 10,
            ..Default::default()
        };
        let result = auto_crop_background(&img, &settings);
        // left clamps to 0: [0, 160) x [40, 110)
        assert_eq!((result.width, result.height), (160, 70));
    }

    #[test]
    fn test_small_subject_below_min_area() {
        let img = framed(200, 150, 255, 0, (100, 70, 110, 80));
        let result = auto_crop_background(&img, &AutoCropSettings::default());
        assert_eq!(result, img);
    }

    #[test]
    fn test_speckles_are_ignored() {
        let mut img = framed(200, 150, 255, 30, (50, 50, 150, 100));
        // Isolated dark pixel far from the subject
        let idx = (5 * 200 + 5) * 3;
        img.pixels[idx..idx + 3].copy_from_slice(&[0, 0, 0]);

        let result = auto_crop_background(&img, &AutoCropSettings::default());
        assert_eq!((result.width, result.height), (100, 50));
    }

    #[test]
    fn test_keeps_alpha_channel() {
        let img = framed(100, 100, 255, 20, (20, 20, 80, 80)).to_rgba();
        let result = auto_crop_background(&img, &AutoCropSettings::default());
        assert!(result.has_alpha());
        assert_eq!((result.width, result.height), (60, 60));
    }
}
