//! Image encoding for export.
//!
//! This module provides functionality for:
//! - Encoding images to JPEG with configurable quality and an optional EXIF block
//! - Encoding images to PNG with optional `tEXt` metadata chunks
//! - Building camera/date metadata from [`MetadataAction`]
//!
//! # Examples
//!
//! ```ignore
//! use photowash_core::encode::encode_jpeg;
//!
//! let pixels = vec![128u8; 100 * 100 * 3]; // Gray image
//! let jpeg_bytes = encode_jpeg(&pixels, 100, 100, 90).unwrap();
//! println!("Encoded {} bytes", jpeg_bytes.len());
//! ```

mod jpeg;
mod metadata;
mod png;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::decode::PixelBuffer;

pub use jpeg::{encode_jpeg, encode_jpeg_with_exif, insert_exif};
pub use metadata::{
    build_exif, now_exif, parse_exif_datetime, png_text_entries, MetadataAction, MetadataError,
    MetadataOverrides, EXIF_DATETIME_FORMAT, MAX_EXIF_LEN, PNG_DATETIME_FORMAT, RANDOM_CAMERAS, SOFTWARE,
};
pub use png::{encode_png, encode_png_with_text};

/// Default JPEG quality for exports.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Errors that can occur during encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The encoder failed
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// The output is not a well-formed container to attach metadata to
    #[error("Malformed {0} stream")]
    Malformed(&'static str),
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Whether the container keeps an alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(self, OutputFormat::Png)
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    /// Guess the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        })
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("unsupported output format: {s}"))
    }
}

/// Encode a finished image in `format`, embedding metadata per `action`.
///
/// JPEG output drops any alpha channel; callers flatten first when the
/// composite matters. Metadata that cannot be built is omitted with a
/// warning rather than failing the export.
pub fn encode_image(
    image: &PixelBuffer,
    format: OutputFormat,
    jpeg_quality: u8,
    action: &MetadataAction,
) -> Result<Vec<u8>, EncodeError> {
    let overrides = action.overrides();

    match format {
        OutputFormat::Jpeg => {
            let rgb = if image.has_alpha() {
                debug!("encode: dropping alpha for JPEG");
                image.to_rgb()
            } else {
                image.clone()
            };

            let exif = overrides.and_then(|o| match build_exif(o) {
                Ok(tiff) => Some(tiff),
                Err(e) => {
                    warn!(error = %e, "metadata omitted");
                    None
                }
            });

            match exif {
                Some(tiff) => encode_jpeg_with_exif(&rgb.pixels, rgb.width, rgb.height, jpeg_quality, &tiff),
                None => encode_jpeg(&rgb.pixels, rgb.width, rgb.height, jpeg_quality),
            }
        }
        OutputFormat::Png => {
            let text = overrides.map(png_text_entries).unwrap_or_default();
            encode_png_with_text(image, &text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode_image, ChannelMode};
    use exif::{In, Tag};

    #[test]
    fn test_format_properties() {
        assert!(!OutputFormat::Jpeg.has_alpha());
        assert!(OutputFormat::Png.has_alpha());
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!("JPEG".parse::<OutputFormat>(), Ok(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_extension("PNG"), Some(OutputFormat::Png));
        assert!("gif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_encode_image_jpeg_with_override() {
        let img = PixelBuffer::filled(32, 24, ChannelMode::Rgb, [90, 120, 150, 255]);
        let action = MetadataAction::Override(MetadataOverrides {
            make: "Nikon".into(),
            model: "D850".into(),
            datetime: Some("2021:06:07 08:09:10".into()),
        });
        let bytes = encode_image(&img, OutputFormat::Jpeg, 90, &action).unwrap();

        let exif = exif::Reader::new()
            .read_from_container(&mut std::io::Cursor::new(&bytes))
            .unwrap();
        let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY).unwrap();
        match &field.value {
            exif::Value::Ascii(v) => assert_eq!(v[0], b"2021:06:07 08:09:10".to_vec()),
            other => panic!("unexpected value {other:?}"),
        }

        let decoded = decode_image(&bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (32, 24));
    }

    #[test]
    fn test_encode_image_strip_has_no_exif() {
        let img = PixelBuffer::filled(8, 8, ChannelMode::Rgb, [0, 0, 0, 255]);
        let bytes = encode_image(&img, OutputFormat::Jpeg, 90, &MetadataAction::RemoveAll).unwrap();
        assert!(exif::Reader::new()
            .read_from_container(&mut std::io::Cursor::new(&bytes))
            .is_err());
    }

    #[test]
    fn test_encode_image_jpeg_drops_alpha() {
        let img = PixelBuffer::filled(10, 10, ChannelMode::Rgba, [200, 10, 10, 128]);
        let bytes = encode_image(&img, OutputFormat::Jpeg, 90, &MetadataAction::Strip).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert!(!decoded.has_alpha());
    }

    #[test]
    fn test_encode_image_png_keeps_alpha() {
        let img = PixelBuffer::filled(10, 10, ChannelMode::Rgba, [200, 10, 10, 128]);
        let bytes = encode_image(&img, OutputFormat::Png, 90, &MetadataAction::Strip).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert!(decoded.has_alpha());
        assert_eq!(decoded.pixel(3, 3), [200, 10, 10, 128]);
    }
}
