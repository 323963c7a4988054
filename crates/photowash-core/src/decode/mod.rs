//! Image loading for photowash.
//!
//! This module provides functionality for:
//! - Decoding common raster formats (JPEG, PNG, BMP, TIFF, WebP, GIF)
//! - Applying EXIF orientation at load time
//! - Resizing for preview working copies and size restoration
//!
//! The pipeline never decodes container formats itself; everything past
//! this module works on [`PixelBuffer`] values.

mod load;
mod resize;
mod types;

pub use load::{decode_image, load_image};
pub use resize::{resize, resize_exact, thumbnail, thumbnail_size, MAX_PREVIEW_SIZE};
pub use types::{ChannelMode, DecodeError, FilterType, Orientation, PixelBuffer};
