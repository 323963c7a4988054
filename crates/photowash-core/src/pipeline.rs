//! Edit and save pipelines.
//!
//! Editing runs on the working copy (full resolution for jobs, a thumbnail
//! for previews):
//!
//! ```text
//! crop edges -> perspective -> rotate + inscribe -> brightness -> contrast -> saturation
//! ```
//!
//! Noise and the realized rotation are not applied there. They travel in
//! [`DeferredEffects`] next to the buffer and are consumed by [`finalize`]:
//!
//! ```text
//! restore size -> crop transparent -> flatten -> auto-crop -> margin trim -> noise
//! ```
//!
//! so noise is only ever added to pixels that end up in the output.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adjustments::{adjust_brightness, adjust_contrast, adjust_saturation};
use crate::autocrop::{auto_crop_background, crop_transparent_interior, AutoCropSettings, DEFAULT_MIN_ALPHA};
use crate::decode::{resize_exact, thumbnail, ChannelMode, DecodeError, FilterType, PixelBuffer};
use crate::encode::OutputFormat;
use crate::noise::add_noise;
use crate::transform::{crop_edges, crop_region, perspective_warp, rotate_and_inscribe, InterpolationFilter};
use crate::TransformOptions;

/// Default flatten color for formats without alpha.
pub const DEFAULT_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Effects recorded during editing and applied at save time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeferredEffects {
    /// Noise standard deviation to add last.
    pub noise: Option<f32>,
    /// Rotation that was applied, used to size the margin trim.
    pub rotation: Option<f64>,
    /// Size to scale a preview-resolution buffer back to.
    pub restore_size: Option<(u32, u32)>,
}

/// A buffer together with its pending effects.
#[derive(Debug, Clone, PartialEq)]
pub struct Staged {
    pub image: PixelBuffer,
    pub deferred: DeferredEffects,
}

impl Staged {
    /// Wrap a buffer with nothing pending.
    pub fn new(image: PixelBuffer) -> Self {
        Self {
            image,
            deferred: DeferredEffects::default(),
        }
    }

    /// Run an operator on the buffer, carrying the deferred effects over.
    pub fn map(self, op: impl FnOnce(&PixelBuffer) -> PixelBuffer) -> Self {
        Self {
            image: op(&self.image),
            deferred: self.deferred,
        }
    }
}

/// Apply the edit-time stages of `options` to `image`.
///
/// Perspective corners are rescaled from their reference size to `image`
/// before the warp. Identity stages are skipped.
pub fn apply_edits(image: &PixelBuffer, options: &TransformOptions, filter: InterpolationFilter) -> Staged {
    let mut staged = Staged::new(image.clone());

    if !options.crop.is_zero() {
        staged = staged.map(|img| crop_edges(img, options.crop));
    }

    if let Some(perspective) = options.perspective.filter(|p| !p.is_identity()) {
        let corners = perspective.scaled_to(image.width, image.height);
        staged = staged.map(|img| perspective_warp(img, &corners, filter));
    }

    if options.rotation != 0.0 {
        staged = staged.map(|img| rotate_and_inscribe(img, options.rotation, filter));
        staged.deferred.rotation = Some(options.rotation);
    }

    if options.brightness != 0 {
        staged = staged.map(|img| adjust_brightness(img, options.brightness));
    }
    if options.contrast != 0 {
        staged = staged.map(|img| adjust_contrast(img, options.contrast));
    }
    if options.saturation != 0 {
        staged = staged.map(|img| adjust_saturation(img, options.saturation));
    }

    if options.noise > 0.0 {
        staged.deferred.noise = Some(options.noise);
    }

    staged
}

/// Edit a downscaled copy of `image` for display.
///
/// Crop margins are scaled to the thumbnail. When the thumbnail is smaller
/// than the source, the result records the size the same edits would give
/// at full resolution so [`finalize`] can scale it back up.
pub fn render_preview(
    image: &PixelBuffer,
    options: &TransformOptions,
    max_size: u32,
) -> Result<Staged, DecodeError> {
    let thumb = thumbnail(image, max_size)?;
    if (thumb.width, thumb.height) == (image.width, image.height) {
        return Ok(apply_edits(&thumb, options, InterpolationFilter::Bilinear));
    }

    let sx = image.width as f64 / thumb.width as f64;
    let sy = image.height as f64 / thumb.height as f64;

    let mut scaled = options.clone();
    scaled.crop = options.crop.scaled(1.0 / sx);

    let mut staged = apply_edits(&thumb, &scaled, InterpolationFilter::Bilinear);
    let restore_w = (staged.image.width as f64 * sx).round().max(1.0) as u32;
    let restore_h = (staged.image.height as f64 * sy).round().max(1.0) as u32;
    staged.deferred.restore_size = Some((restore_w, restore_h));
    Ok(staged)
}

/// Save-time parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeSettings {
    pub format: OutputFormat,
    /// Flatten color when `format` has no alpha.
    pub background: [u8; 3],
    pub autocrop: AutoCropSettings,
    /// Alpha at or above which a pixel counts as opaque.
    pub min_alpha: u8,
}

impl Default for FinalizeSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            background: DEFAULT_BACKGROUND,
            autocrop: AutoCropSettings::default(),
            min_alpha: DEFAULT_MIN_ALPHA,
        }
    }
}

impl FinalizeSettings {
    /// Defaults for a given output format.
    pub fn for_format(format: OutputFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }
}

/// Run the save-time stages and consume the deferred effects.
pub fn finalize<R: Rng + ?Sized>(staged: Staged, settings: &FinalizeSettings, rng: &mut R) -> PixelBuffer {
    let Staged { mut image, deferred } = staged;

    if let Some((w, h)) = deferred.restore_size {
        match resize_exact(&image, w, h, FilterType::Lanczos3) {
            Ok(restored) => image = restored,
            Err(e) => warn!(error = %e, width = w, height = h, "finalize: size restore skipped"),
        }
    }

    if image.has_alpha() {
        image = crop_transparent_interior(&image, settings.min_alpha);
    }

    if !settings.format.has_alpha() && image.has_alpha() {
        image = flatten(&image, settings.background);
    }

    image = auto_crop_background(&image, &settings.autocrop);

    if let Some(angle) = deferred.rotation {
        image = trim_rotation_margin(&image, angle);
    }

    if let Some(noise) = deferred.noise {
        image = add_noise(&image, noise, rng);
    }

    image
}

/// Composite an RGBA buffer over a solid color, producing RGB.
///
/// RGB input is returned as a copy.
pub fn flatten(image: &PixelBuffer, background: [u8; 3]) -> PixelBuffer {
    if !image.has_alpha() {
        return image.clone();
    }

    let mut pixels = Vec::with_capacity(image.pixel_count() * 3);
    for px in image.pixels.chunks_exact(4) {
        let a = px[3] as u32;
        for (&c, &bg) in px[..3].iter().zip(&background) {
            pixels.push(((c as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8);
        }
    }
    PixelBuffer::with_mode(image.width, image.height, ChannelMode::Rgb, pixels)
}

/// Margin that [`trim_rotation_margin`] removes from each side, or `None`
/// when it would reach half the shorter side.
pub fn rotation_margin(width: u32, height: u32, angle_degrees: f64) -> Option<u32> {
    let short = width.min(height) as f64;
    let margin = angle_degrees.abs().to_radians().tan() * short * 0.6 + 2.0;
    (margin.is_finite() && margin < short / 2.0).then_some(margin as u32)
}

/// Trim interpolation fringes left along the edges of a rotated image.
pub fn trim_rotation_margin(image: &PixelBuffer, angle_degrees: f64) -> PixelBuffer {
    if angle_degrees == 0.0 || image.is_empty() {
        return image.clone();
    }

    let Some(m) = rotation_margin(image.width, image.height, angle_degrees) else {
        debug!(angle = angle_degrees, "margin trim skipped");
        return image.clone();
    };

    crop_region(image, m, m, image.width - m, image.height - m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::inscribed_rect_size;
    use crate::transform::{CropMargins, PerspectiveCorners};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Mid-tone texture with no uniform border.
    fn textured(width: u32, height: u32) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let r = 60 + ((x * 7 + y * 3) % 120) as u8;
                let g = 70 + ((x * 5 + y * 11) % 100) as u8;
                let b = 80 + ((x * 13 + y) % 90) as u8;
                pixels.extend_from_slice(&[r, g, b]);
            }
        }
        PixelBuffer::new(width, height, pixels)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    // ===== Staged Tests =====

    #[test]
    fn test_map_carries_deferred() {
        let mut staged = Staged::new(textured(10, 10));
        staged.deferred.noise = Some(2.0);
        staged.deferred.rotation = Some(-1.5);

        let mapped = staged.map(|img| crop_region(img, 1, 1, 9, 9));
        assert_eq!((mapped.image.width, mapped.image.height), (8, 8));
        assert_eq!(mapped.deferred.noise, Some(2.0));
        assert_eq!(mapped.deferred.rotation, Some(-1.5));
    }

    // ===== Edit Order Tests =====

    #[test]
    fn test_identity_options() {
        let img = textured(40, 30);
        let staged = apply_edits(&img, &TransformOptions::new(), InterpolationFilter::Bilinear);
        assert_eq!(staged.image, img);
        assert_eq!(staged.deferred, DeferredEffects::default());
    }

    #[test]
    fn test_noise_is_recorded_not_applied() {
        let img = textured(40, 30);
        let options = TransformOptions {
            noise: 3.5,
            ..Default::default()
        };
        let staged = apply_edits(&img, &options, InterpolationFilter::Bilinear);
        assert_eq!(staged.image, img);
        assert_eq!(staged.deferred.noise, Some(3.5));
    }

    #[test]
    fn test_crop_before_rotation() {
        let img = textured(200, 100);
        let options = TransformOptions {
            crop: CropMargins::uniform(10),
            rotation: 5.0,
            ..Default::default()
        };
        let staged = apply_edits(&img, &options, InterpolationFilter::Bilinear);
        assert_eq!(
            (staged.image.width, staged.image.height),
            inscribed_rect_size(180, 80, 5.0)
        );
    }

    #[test]
    fn test_rotate_scenario_edit_stage() {
        let img = textured(1000, 800);
        let options = TransformOptions {
            rotation: 10.0,
            brightness: 20,
            noise: 5.0,
            ..Default::default()
        };
        let staged = apply_edits(&img, &options, InterpolationFilter::Bilinear);

        assert_eq!(
            (staged.image.width, staged.image.height),
            inscribed_rect_size(1000, 800, 10.0)
        );
        assert!(!staged.image.has_alpha());
        assert_eq!(staged.deferred.rotation, Some(10.0));
        assert_eq!(staged.deferred.noise, Some(5.0));
    }

    #[test]
    fn test_rotate_scenario_save_stage() {
        let img = textured(1000, 800);
        let options = TransformOptions {
            rotation: 10.0,
            brightness: 20,
            noise: 5.0,
            ..Default::default()
        };
        let staged = apply_edits(&img, &options, InterpolationFilter::Bilinear);
        let (w, h) = (staged.image.width, staged.image.height);
        let m = rotation_margin(w, h, 10.0).unwrap();

        let settings = FinalizeSettings::for_format(OutputFormat::Jpeg);
        let mut quiet = staged.clone();
        quiet.deferred.noise = None;
        let clean = finalize(quiet, &settings, &mut rng());
        let noisy = finalize(staged, &settings, &mut rng());

        assert_eq!((clean.width, clean.height), (w - 2 * m, h - 2 * m));
        // Noise lands on the trimmed output only
        assert_eq!((noisy.width, noisy.height), (clean.width, clean.height));
        assert_ne!(noisy, clean);
    }

    #[test]
    fn test_perspective_scenario() {
        let (w, h) = (200u32, 150u32);
        let img = textured(w, h);
        let mut corners = PerspectiveCorners::identity(w, h);
        corners.corners[0] = (-3.0, -2.0);
        let options = TransformOptions {
            perspective: Some(corners),
            ..Default::default()
        };

        let staged = apply_edits(&img, &options, InterpolationFilter::Bilinear);
        assert_eq!((staged.image.width, staged.image.height), (w + 3, h + 2));
        assert!(staged.image.has_alpha());
        assert_eq!(staged.image.alpha(w + 2, 0), 0);

        let png = finalize(staged.clone(), &FinalizeSettings::for_format(OutputFormat::Png), &mut rng());
        assert!(png.has_alpha());
        assert!(png.pixels.chunks_exact(4).all(|p| p[3] >= DEFAULT_MIN_ALPHA));
        assert!(png.width <= w + 3 && png.height <= h + 2);
        assert!(png.width >= w - 3 && png.height >= h - 3);

        let jpeg = finalize(staged, &FinalizeSettings::for_format(OutputFormat::Jpeg), &mut rng());
        assert!(!jpeg.has_alpha());
    }

    #[test]
    fn test_perspective_corners_rescaled() {
        let img = textured(400, 300);
        // Authored on a 200x150 preview
        let mut corners = PerspectiveCorners::identity(200, 150);
        corners.corners[2] = (203.0, 151.0);
        let options = TransformOptions {
            perspective: Some(corners),
            ..Default::default()
        };
        let staged = apply_edits(&img, &options, InterpolationFilter::Bilinear);
        assert_eq!((staged.image.width, staged.image.height), (406, 302));
    }

    // ===== Preview Tests =====

    #[test]
    fn test_preview_records_restore_size() {
        let img = textured(1024, 768);
        let options = TransformOptions {
            crop: CropMargins::uniform(20),
            ..Default::default()
        };
        let staged = render_preview(&img, &options, 512).unwrap();
        // 512x384 thumbnail, crop scaled to 10 px per edge
        assert_eq!((staged.image.width, staged.image.height), (492, 364));
        assert_eq!(staged.deferred.restore_size, Some((984, 728)));

        let out = finalize(staged, &FinalizeSettings::for_format(OutputFormat::Png), &mut rng());
        assert_eq!((out.width, out.height), (984, 728));
    }

    #[test]
    fn test_preview_small_image_not_restored() {
        let img = textured(100, 80);
        let staged = render_preview(&img, &TransformOptions::new(), 512).unwrap();
        assert_eq!(staged.image, img);
        assert_eq!(staged.deferred.restore_size, None);
    }

    // ===== Save Stage Tests =====

    #[test]
    fn test_finalize_without_deferred_is_identity_on_texture() {
        let img = textured(120, 90);
        let out = finalize(Staged::new(img.clone()), &FinalizeSettings::default(), &mut rng());
        assert_eq!(out, img);
    }

    #[test]
    fn test_finalize_auto_crops_border() {
        let mut img = PixelBuffer::filled(200, 160, ChannelMode::Rgb, [255, 255, 255, 255]);
        let inner = textured(100, 80);
        for y in 0..80 {
            for x in 0..100 {
                let src = ((y * 100 + x) * 3) as usize;
                let dst = (((y + 40) * 200 + x + 50) * 3) as usize;
                img.pixels[dst..dst + 3].copy_from_slice(&inner.pixels[src..src + 3]);
            }
        }
        let out = finalize(Staged::new(img), &FinalizeSettings::default(), &mut rng());
        assert_eq!((out.width, out.height), (100, 80));
        assert_eq!(out, inner);
    }

    #[test]
    fn test_flatten() {
        let img = PixelBuffer::with_mode(
            3,
            1,
            ChannelMode::Rgba,
            vec![200, 100, 0, 255, 200, 100, 0, 0, 200, 100, 0, 128],
        );
        let flat = flatten(&img, [255, 255, 255]);
        assert_eq!(flat.mode, ChannelMode::Rgb);
        assert_eq!(&flat.pixels[0..3], &[200, 100, 0]);
        assert_eq!(&flat.pixels[3..6], &[255, 255, 255]);
        // 200*128 + 255*127 = 57985 -> (57985 + 127) / 255 = 227
        assert_eq!(flat.pixels[6], 227);

        let rgb = textured(4, 4);
        assert_eq!(flatten(&rgb, [0, 0, 0]), rgb);
    }

    #[test]
    fn test_rotation_margin() {
        // tan(10°) * 800 * 0.6 + 2 = 86.63
        assert_eq!(rotation_margin(1000, 800, 10.0), Some(86));
        assert_eq!(rotation_margin(1000, 800, -10.0), Some(86));
        // Too large for a tiny image
        assert_eq!(rotation_margin(4, 4, 10.0), None);
        assert_eq!(rotation_margin(100, 100, 60.0), None);
    }

    #[test]
    fn test_trim_rotation_margin() {
        let img = textured(100, 50);
        assert_eq!(trim_rotation_margin(&img, 0.0), img);

        // tan(1°) * 50 * 0.6 + 2 = 2.52 -> 2
        let out = trim_rotation_margin(&img, 1.0);
        assert_eq!((out.width, out.height), (96, 46));
        assert_eq!(out.pixel(0, 0), img.pixel(2, 2));
    }
}
