//! Closed-form geometry used by the transform pipeline.
//!
//! - Inscribed rectangle sizing for rotations (no blank corners)
//! - Projective (homography) coefficient solving for perspective warps
//!
//! Nothing here touches pixel data.

/// A point in pixel space.
pub type Point = (f64, f64);

/// Size of the largest aspect-preserving rectangle that fits inside an
/// `orig_w x orig_h` image rotated by `angle_deg` about its center.
///
/// # Behavior
///
/// - An angle of exactly 0 returns the input size.
/// - Near 45 degrees (`|cos 2a| < 1e-10`) both dimensions are scaled by 1/√2.
/// - Otherwise the binding dimension is chosen by comparing `w·sin a` with
///   `h·cos a` and the other dimension follows from the aspect ratio.
/// - When either dimension comes out at 10 px or less (large angles), both
///   are scaled by `cos a` instead, floored at 10.
/// - The result never exceeds the exact aspect-preserving containment bound,
///   so the crop can't reach past the rotated footprint.
///
/// Outputs are truncated to integers.
pub fn inscribed_rect_size(orig_w: u32, orig_h: u32, angle_deg: f64) -> (u32, u32) {
    if angle_deg == 0.0 {
        return (orig_w, orig_h);
    }

    let (w, h) = (orig_w as f64, orig_h as f64);
    let angle = angle_deg.abs().to_radians();
    let cos_a = angle.cos().abs();
    let sin_a = angle.sin().abs();

    // cos(2a) = cos²a - sin²a
    let cos_2a = cos_a * cos_a - sin_a * sin_a;

    if cos_2a.abs() < 1e-10 {
        let scale = std::f64::consts::FRAC_1_SQRT_2;
        return ((w * scale) as u32, (h * scale) as u32);
    }

    let (new_w, new_h) = if w * sin_a >= h * cos_a {
        let new_w = (w * cos_a - h * sin_a) / cos_2a;
        (new_w, new_w * h / w)
    } else {
        let new_h = (h * cos_a - w * sin_a) / cos_2a;
        (new_h * w / h, new_h)
    };

    let (new_w, new_h) = if new_w <= 10.0 || new_h <= 10.0 {
        ((w * cos_a).max(10.0), (h * cos_a).max(10.0))
    } else {
        (new_w, new_h)
    };

    let bound = containment_scale(w, h, cos_a, sin_a);
    if new_w > w * bound || new_h > h * bound {
        return (((w * bound) as u32).max(1), ((h * bound) as u32).max(1));
    }

    (new_w as u32, new_h as u32)
}

/// Largest `k` such that a centered `k·w x k·h` rectangle fits inside the
/// rotated `w x h` footprint.
fn containment_scale(w: f64, h: f64, cos_a: f64, sin_a: f64) -> f64 {
    let by_width = w / (w * cos_a + h * sin_a);
    let by_height = h / (w * sin_a + h * cos_a);
    by_width.min(by_height).min(1.0)
}

/// Projective mapping from destination to source pixel coordinates.
///
/// ```text
/// src_x = (a·x + b·y + c) / (g·x + h·y + 1)
/// src_y = (d·x + e·y + f) / (g·x + h·y + 1)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    /// Coefficients `[a, b, c, d, e, f, g, h]`.
    pub coeffs: [f64; 8],
}

impl Homography {
    /// The identity mapping.
    pub fn identity() -> Self {
        Self {
            coeffs: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        }
    }

    /// Map a destination point to source space.
    ///
    /// Returns `None` when the point lies on the line at infinity.
    #[inline]
    pub fn map(&self, x: f64, y: f64) -> Option<Point> {
        let [a, b, c, d, e, f, g, h] = self.coeffs;
        let denom = g * x + h * y + 1.0;
        if denom.abs() < 1e-12 {
            return None;
        }
        Some(((a * x + b * y + c) / denom, (d * x + e * y + f) / denom))
    }
}

/// Solve the homography that maps each `target[i]` onto `source[i]`.
///
/// Each correspondence contributes two rows to an 8x8 linear system, which
/// is solved by Gaussian elimination with partial pivoting.
///
/// Returns `None` when the system is singular, e.g. when three or more
/// target corners are collinear. Callers treat that as "skip the warp".
pub fn solve_homography(source: &[Point; 4], target: &[Point; 4]) -> Option<Homography> {
    let mut m = [[0.0f64; 9]; 8];

    for (i, (s, t)) in source.iter().zip(target.iter()).enumerate() {
        let (sx, sy) = *s;
        let (tx, ty) = *t;
        m[2 * i] = [tx, ty, 1.0, 0.0, 0.0, 0.0, -sx * tx, -sx * ty, sx];
        m[2 * i + 1] = [0.0, 0.0, 0.0, tx, ty, 1.0, -sy * tx, -sy * ty, sy];
    }

    solve_linear_system(&mut m).map(|coeffs| Homography { coeffs })
}

/// Solve an 8x8 augmented system in place.
fn solve_linear_system(m: &mut [[f64; 9]; 8]) -> Option<[f64; 8]> {
    const N: usize = 8;

    let scale = m
        .iter()
        .flat_map(|row| row[..N].iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return None;
    }
    let epsilon = scale * 1e-10;

    for col in 0..N {
        let pivot = (col..N).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < epsilon {
            return None;
        }
        m.swap(col, pivot);

        for row in (col + 1)..N {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=N {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = [0.0f64; N];
    for row in (0..N).rev() {
        let tail: f64 = ((row + 1)..N).map(|k| m[row][k] * x[k]).sum();
        x[row] = (m[row][N] - tail) / m[row][row];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: inscribed rectangles are positive, smaller, and keep the
        /// aspect ratio within truncation error.
        #[test]
        fn prop_inscribed_smaller_same_aspect(
            w in 100u32..=4000,
            h in 100u32..=4000,
            angle in 0.05f64..89.95,
        ) {
            let (iw, ih) = inscribed_rect_size(w, h, angle);

            prop_assert!(iw > 0 && ih > 0);
            prop_assert!((iw as u64) * (ih as u64) < (w as u64) * (h as u64));

            let rw = iw as f64 / w as f64;
            let rh = ih as f64 / h as f64;
            let tolerance = 1.0 / w as f64 + 1.0 / h as f64 + 1e-9;
            prop_assert!((rw - rh).abs() <= tolerance, "{}x{} -> {}x{}", w, h, iw, ih);
        }

        /// Property: the inscribed rectangle's corners stay inside the
        /// rotated footprint.
        #[test]
        fn prop_inscribed_fits_inside_rotation(
            w in 100u32..=3000,
            h in 100u32..=3000,
            angle in 0.05f64..44.0,
        ) {
            let (iw, ih) = inscribed_rect_size(w, h, angle);
            let a = angle.to_radians();
            let (c, s) = (a.cos(), a.sin());
            let (hw, hh) = (iw as f64 / 2.0, ih as f64 / 2.0);

            // Corner of the crop expressed in the unrotated image frame.
            let x = hw * c + hh * s;
            let y = hw * s + hh * c;
            prop_assert!(x <= w as f64 / 2.0 + 1e-6);
            prop_assert!(y <= h as f64 / 2.0 + 1e-6);
        }

        /// Property: solved homographies reproduce all four correspondences.
        #[test]
        fn prop_homography_reproduces_corners(
            w in 20.0f64..2000.0,
            h in 20.0f64..2000.0,
            corner in 0usize..4,
            dx in -3.0f64..3.0,
            dy in -3.0f64..3.0,
        ) {
            let source = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
            let mut target = source;
            target[corner].0 += dx;
            target[corner].1 += dy;

            let hmg = solve_homography(&source, &target).unwrap();
            for (s, t) in source.iter().zip(target.iter()) {
                let (x, y) = hmg.map(t.0, t.1).unwrap();
                prop_assert!((x - s.0).abs() < 1e-4 && (y - s.1).abs() < 1e-4);
            }
        }
    }
}
