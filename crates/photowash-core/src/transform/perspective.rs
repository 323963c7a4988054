//! Projective (keystone) warp.
//!
//! The four source corners (top-left, top-right, bottom-right, bottom-left)
//! are moved to caller-supplied destination positions. The output canvas is
//! the bounding box of the destination quad; anything the warped source
//! does not cover is fully transparent.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sample::{sample, InterpolationFilter};
use crate::decode::{ChannelMode, PixelBuffer};
use crate::geometry::{solve_homography, Point};

/// Largest output span, as a multiple of the matching source dimension.
const MAX_CANVAS_FACTOR: f64 = 4.0;

/// Destination corners for a perspective warp, authored against an image of
/// `reference_size`.
///
/// Corners are stored in the pixel space they were authored in (typically
/// the preview working copy) and rescaled with [`PerspectiveCorners::scaled_to`]
/// before warping an image of a different size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCorners {
    /// Top-left, top-right, bottom-right, bottom-left.
    pub corners: [Point; 4],
    pub reference_size: (u32, u32),
}

impl PerspectiveCorners {
    /// Corners at the identity positions of a `width x height` image.
    pub fn identity(width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self {
            corners: [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)],
            reference_size: (width, height),
        }
    }

    /// Whether every corner sits at its identity position.
    pub fn is_identity(&self) -> bool {
        *self == Self::identity(self.reference_size.0, self.reference_size.1)
    }

    /// Rescale the corners to an image of `width x height`.
    pub fn scaled_to(&self, width: u32, height: u32) -> [Point; 4] {
        let (rw, rh) = self.reference_size;
        if (rw, rh) == (width, height) || rw == 0 || rh == 0 {
            return self.corners;
        }
        let sx = width as f64 / rw as f64;
        let sy = height as f64 / rh as f64;
        self.corners.map(|(x, y)| (x * sx, y * sy))
    }
}

/// Warp `image` so its corners land on `corners`.
///
/// The result is always RGBA. It returns the input unchanged (in its
/// original mode) when the destination bounding box is empty, non-finite or
/// more than four times the source in either dimension, or when the corner
/// system is singular.
pub fn perspective_warp(
    image: &PixelBuffer,
    corners: &[Point; 4],
    filter: InterpolationFilter,
) -> PixelBuffer {
    if image.is_empty() {
        return image.clone();
    }
    if corners.iter().any(|&(x, y)| !x.is_finite() || !y.is_finite()) {
        debug!("perspective: non-finite corner, skipping");
        return image.clone();
    }

    let (w, h) = (image.width as f64, image.height as f64);
    let source = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    let (span_x, span_y) = (max_x - min_x, max_y - min_y);
    if span_x < 1.0 || span_y < 1.0 {
        debug!(span_x, span_y, "perspective: empty destination box, skipping");
        return image.clone();
    }
    if span_x > w * MAX_CANVAS_FACTOR || span_y > h * MAX_CANVAS_FACTOR {
        debug!(span_x, span_y, "perspective: destination box too large, skipping");
        return image.clone();
    }

    let target = corners.map(|(x, y)| (x - min_x, y - min_y));
    let Some(homography) = solve_homography(&source, &target) else {
        debug!("perspective: singular corner system, skipping");
        return image.clone();
    };

    let (out_w, out_h) = (span_x as u32, span_y as u32);
    let mut output = vec![0u8; out_w as usize * out_h as usize * 4];

    for (y, row) in output.chunks_exact_mut(out_w as usize * 4).enumerate() {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let pixel = match homography.map(x as f64 + 0.5, y as f64 + 0.5) {
                Some((sx, sy)) => sample(image, sx, sy, filter, [0, 0, 0, 0]),
                None => [0, 0, 0, 0],
            };
            px.copy_from_slice(&pixel);
        }
    }

    PixelBuffer::with_mode(out_w, out_h, ChannelMode::Rgba, output)
}
