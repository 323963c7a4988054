//! Photometric adjustments: brightness, contrast and saturation.
//!
//! Each adjustment takes a signed percentage delta and blends every color
//! channel away from (or toward) a degenerate reference image by the factor
//! `1 + delta/100`:
//!
//! | Adjustment | Reference                        |
//! |------------|----------------------------------|
//! | Brightness | black                            |
//! | Contrast   | the image's mean gray level      |
//! | Saturation | each pixel's own gray level      |
//!
//! `out = ref + (in - ref) * factor`, truncated and clamped to 0..=255.
//! Alpha is never touched, and a delta of 0 returns a copy.
//!
//! ## Adjustment Order
//! 1. Brightness
//! 2. Contrast
//! 3. Saturation

use crate::decode::PixelBuffer;
use crate::luminance::{gray_u8, to_gray};

/// Blend factor for a percentage delta.
#[inline]
fn factor(delta: i32) -> f32 {
    1.0 + delta as f32 / 100.0
}

/// Blend a channel value against its reference.
#[inline]
fn blend(reference: f32, value: u8, factor: f32) -> u8 {
    // `as u8` saturates: negatives become 0, overflow becomes 255
    (reference + (value as f32 - reference) * factor) as u8
}

/// Scale all color channels by `1 + delta/100`.
pub fn adjust_brightness(image: &PixelBuffer, delta: i32) -> PixelBuffer {
    let mut result = image.clone();
    brightness_in_place(&mut result, delta);
    result
}

/// Stretch color channels away from the image's mean gray level.
pub fn adjust_contrast(image: &PixelBuffer, delta: i32) -> PixelBuffer {
    let mut result = image.clone();
    contrast_in_place(&mut result, delta);
    result
}

/// Push color channels away from each pixel's gray level.
pub fn adjust_saturation(image: &PixelBuffer, delta: i32) -> PixelBuffer {
    let mut result = image.clone();
    saturation_in_place(&mut result, delta);
    result
}

fn brightness_in_place(image: &mut PixelBuffer, delta: i32) {
    if delta == 0 {
        return;
    }
    let f = factor(delta);
    let channels = image.channels();
    for px in image.pixels.chunks_exact_mut(channels) {
        for c in &mut px[..3] {
            *c = blend(0.0, *c, f);
        }
    }
}

fn contrast_in_place(image: &mut PixelBuffer, delta: i32) {
    if delta == 0 || image.is_empty() {
        return;
    }
    let f = factor(delta);
    let mean = mean_level(image);
    let channels = image.channels();
    for px in image.pixels.chunks_exact_mut(channels) {
        for c in &mut px[..3] {
            *c = blend(mean, *c, f);
        }
    }
}

fn saturation_in_place(image: &mut PixelBuffer, delta: i32) {
    if delta == 0 {
        return;
    }
    let f = factor(delta);
    let channels = image.channels();
    for px in image.pixels.chunks_exact_mut(channels) {
        let gray = gray_u8(px[0], px[1], px[2]) as f32;
        for c in &mut px[..3] {
            *c = blend(gray, *c, f);
        }
    }
}

/// Mean gray level of the whole image, rounded to the nearest integer.
fn mean_level(image: &PixelBuffer) -> f32 {
    let gray = to_gray(image);
    let sum: u64 = gray.as_raw().iter().map(|&v| v as u64).sum();
    let mean = sum as f64 / image.pixel_count() as f64;
    (mean + 0.5).floor() as f32
}
