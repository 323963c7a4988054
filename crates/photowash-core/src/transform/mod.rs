//! Geometric operators: edge crop/pad, rotation and perspective warp.
//!
//! Every operator borrows its input and returns a new buffer. Degenerate
//! requests (empty boxes, singular corner systems) return the input
//! unchanged instead of failing.
//!
//! # Coordinate System
//!
//! - Pixel `(x, y)` covers the continuous square `[x, x+1) x [y, y+1)`
//! - Rotation angles are in degrees, positive = clockwise on screen
//! - Origin is top-left corner

mod crop;
mod perspective;
mod rotation;
mod sample;

pub use crop::{crop_edges, crop_region, CropMargins};
pub use perspective::{perspective_warp, PerspectiveCorners};
pub use rotation::{compute_rotated_bounds, rotate_and_inscribe, rotate_expand};
pub use sample::InterpolationFilter;
