//! Foreground mask extraction and binary morphology.
//!
//! Masks are `GrayImage`s holding 0 (background) or 255 (foreground).
//! Morphology runs through `imageproc`'s grayscale operators with an
//! elliptical [`Mask`]; pixels outside the image never contribute to a
//! dilation and never block an erosion.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

use super::Background;

const FOREGROUND: u8 = 255;

/// Largest kernel side `imageproc` accepts.
const MAX_KERNEL_SIDE: u32 = 511;

/// Elliptical structuring element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    shape: GrayImage,
    center: (u8, u8),
    mask: Mask,
}

impl Kernel {
    /// Ellipse inscribed in a `width x height` box, anchored at its center.
    /// Sides are clamped to `1..=511`.
    ///
    /// A 5x5 ellipse is:
    /// ```text
    /// ..#..
    /// #####
    /// #####
    /// #####
    /// ..#..
    /// ```
    pub fn ellipse(width: u32, height: u32) -> Self {
        let kw = width.clamp(1, MAX_KERNEL_SIDE);
        let kh = height.clamp(1, MAX_KERNEL_SIDE);
        let (c, r) = (kw / 2, kh / 2);

        let mut shape = GrayImage::new(kw, kh);
        for i in 0..kh {
            let dy = i as f64 - r as f64;
            let dx = if r > 0 {
                let t = ((r * r) as f64 - dy * dy) / (r * r) as f64;
                (c as f64 * t.max(0.0).sqrt()).round() as u32
            } else {
                c
            };
            let x0 = c.saturating_sub(dx);
            let x1 = (c + dx + 1).min(kw);
            for x in x0..x1 {
                shape.put_pixel(x, i, Luma([FOREGROUND]));
            }
        }

        // Both sides are at most 511, so the centers fit in a u8
        let center = (c as u8, r as u8);
        let mask = Mask::from_image(&shape, center.0, center.1);
        Self { shape, center, mask }
    }

    /// Whether the kernel covers offset `(dx, dy)`.
    pub fn contains(&self, dx: i32, dy: i32) -> bool {
        let x = dx + i32::from(self.center.0);
        let y = dy + i32::from(self.center.1);
        x >= 0
            && y >= 0
            && (x as u32) < self.shape.width()
            && (y as u32) < self.shape.height()
            && self.shape.get_pixel(x as u32, y as u32).0[0] != 0
    }
}

/// Binarize a gray image against the detected background.
///
/// On a white background, pixels at or below `255 - threshold` are
/// foreground; on a black background, pixels above `threshold` are.
pub fn foreground_mask(gray: &GrayImage, background: Background, threshold: u8) -> GrayImage {
    let cutoff = match background {
        Background::White => 255 - threshold,
        Background::Black => threshold,
    };
    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (dst, src) in mask.pixels_mut().zip(gray.pixels()) {
        let v = src.0[0];
        let is_fg = match background {
            Background::White => v <= cutoff,
            Background::Black => v > cutoff,
        };
        *dst = Luma([if is_fg { FOREGROUND } else { 0 }]);
    }
    mask
}

/// Grow foreground regions by the kernel footprint.
pub fn dilate(mask: &GrayImage, kernel: &Kernel) -> GrayImage {
    grayscale_dilate(mask, &kernel.mask)
}

/// Shrink foreground regions by the kernel footprint.
pub fn erode(mask: &GrayImage, kernel: &Kernel) -> GrayImage {
    grayscale_erode(mask, &kernel.mask)
}

/// Morphological closing: `iterations` dilations then as many erosions.
pub fn close(mask: &GrayImage, kernel: &Kernel, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = dilate(&out, kernel);
    }
    for _ in 0..iterations {
        out = erode(&out, kernel);
    }
    out
}

/// Morphological opening: `iterations` erosions then as many dilations.
pub fn open(mask: &GrayImage, kernel: &Kernel, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = erode(&out, kernel);
    }
    for _ in 0..iterations {
        out = dilate(&out, kernel);
    }
    out
}

/// Union bounding box and summed per-region box area of the outermost
/// foreground regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForegroundBounds {
    pub left: u32,
    pub top: u32,
    /// Exclusive.
    pub right: u32,
    /// Exclusive.
    pub bottom: u32,
    pub area: u64,
}

/// Trace external contours and merge their bounding boxes.
///
/// Returns `None` when the mask has no foreground.
pub fn foreground_bounds(mask: &GrayImage) -> Option<ForegroundBounds> {
    let contours = find_contours::<u32>(mask);

    let mut bounds: Option<ForegroundBounds> = None;
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        let Some(first) = contour.points.first() else {
            continue;
        };
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &contour.points {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        let (right, bottom) = (x1 + 1, y1 + 1);
        let area = (right - x0) as u64 * (bottom - y0) as u64;

        bounds = Some(match bounds {
            None => ForegroundBounds {
                left: x0,
                top: y0,
                right,
                bottom,
                area,
            },
            Some(b) => ForegroundBounds {
                left: b.left.min(x0),
                top: b.top.min(y0),
                right: b.right.max(right),
                bottom: b.bottom.max(bottom),
                area: b.area + area,
            },
        });
    }
    bounds
}
