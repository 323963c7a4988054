//! Background color classification from corner samples.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::luminance::mean_gray;

/// Default corner patch size in pixels.
pub const DEFAULT_SAMPLE_SIZE: u32 = 10;

/// Default mean gray level at or above which the background is white.
pub const DEFAULT_WHITE_THRESHOLD: u8 = 200;

/// Background class, which picks the binarization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    White,
    #[default]
    Black,
}

/// Classify the background from the four corner patches of a gray image.
///
/// Patches are `s x s` with `s = min(sample_size, h/2, w/2)`. The mean gray
/// level of each patch is averaged over the four corners; the background is
/// [`Background::White`] when that average reaches `white_thresh`. Images
/// too small to sample are classified as black.
pub fn detect_background(gray: &GrayImage, sample_size: u32, white_thresh: u8) -> Background {
    let (w, h) = gray.dimensions();
    let s = sample_size.min(h / 2).min(w / 2);

    let origins = [(0, 0), (w - s, 0), (0, h - s), (w - s, h - s)];
    let means: Vec<f64> = origins
        .iter()
        .filter_map(|&(x, y)| mean_gray(gray, x, y, s, s))
        .collect();

    if means.is_empty() {
        return Background::Black;
    }

    let avg = means.iter().sum::<f64>() / means.len() as f64;
    if avg >= white_thresh as f64 {
        Background::White
    } else {
        Background::Black
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_white_corners() {
        let gray = GrayImage::from_pixel(50, 40, Luma([240]));
        assert_eq!(detect_background(&gray, 10, 200), Background::White);
    }

    #[test]
    fn test_black_corners() {
        let gray = GrayImage::from_pixel(50, 40, Luma([15]));
        assert_eq!(detect_background(&gray, 10, 200), Background::Black);
    }

    #[test]
    fn test_center_content_is_ignored() {
        let mut gray = GrayImage::from_pixel(60, 60, Luma([255]));
        for y in 15..45 {
            for x in 15..45 {
                gray.put_pixel(x, y, Luma([0]));
            }
        }
        assert_eq!(detect_background(&gray, 10, 200), Background::White);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let gray = GrayImage::from_pixel(20, 20, Luma([200]));
        assert_eq!(detect_background(&gray, 10, 200), Background::White);
    }

    #[test]
    fn test_tiny_image_defaults_to_black() {
        let gray = GrayImage::from_pixel(1, 1, Luma([255]));
        assert_eq!(detect_background(&gray, 10, 200), Background::Black);
    }

    #[test]
    fn test_sample_clamped_to_half_size() {
        // 4x4 -> 2x2 patches, one dark corner drags the average below 200
        let mut gray = GrayImage::from_pixel(4, 4, Luma([250]));
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            gray.put_pixel(x, y, Luma([0]));
        }
        // (0 + 250 * 3) / 4 = 187.5
        assert_eq!(detect_background(&gray, 10, 200), Background::Black);
    }
}
