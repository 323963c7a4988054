//! PNG encoding with optional `tEXt` chunks.
//!
//! Text chunks are inserted right after `IHDR`. Keywords and values are
//! written as Latin-1; characters outside it become `?`.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::io::Cursor;
use tracing::debug;

use super::EncodeError;
use crate::decode::{ChannelMode, PixelBuffer};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Offset just past the signature and the 13-byte `IHDR` chunk.
const AFTER_IHDR: usize = 8 + 4 + 4 + 13 + 4;

/// Encode a buffer to PNG, keeping its channel layout.
pub fn encode_png(image: &PixelBuffer) -> Result<Vec<u8>, EncodeError> {
    if image.width == 0 || image.height == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: image.width,
            height: image.height,
        });
    }

    let expected = image.pixel_count() * image.channels();
    if image.pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: image.pixels.len(),
        });
    }

    let color = match image.mode {
        ChannelMode::Rgb => ExtendedColorType::Rgb8,
        ChannelMode::Rgba => ExtendedColorType::Rgba8,
    };

    let mut buffer = Cursor::new(Vec::new());
    PngEncoder::new(&mut buffer)
        .write_image(&image.pixels, image.width, image.height, color)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}

/// Encode to PNG and attach one `tEXt` chunk per `(keyword, text)` pair.
///
/// Keywords must be 1-79 bytes; invalid ones are skipped.
pub fn encode_png_with_text(image: &PixelBuffer, text: &[(String, String)]) -> Result<Vec<u8>, EncodeError> {
    let png = encode_png(image)?;
    if text.is_empty() {
        return Ok(png);
    }
    insert_text_chunks(&png, text)
}

fn insert_text_chunks(png: &[u8], text: &[(String, String)]) -> Result<Vec<u8>, EncodeError> {
    if png.len() < AFTER_IHDR || png[..8] != SIGNATURE || &png[12..16] != b"IHDR" {
        return Err(EncodeError::Malformed("PNG"));
    }

    let mut out = Vec::with_capacity(png.len() + text.len() * 64);
    out.extend_from_slice(&png[..AFTER_IHDR]);

    for (keyword, value) in text {
        let keyword = latin1(keyword);
        if keyword.is_empty() || keyword.len() > 79 {
            debug!(len = keyword.len(), "png: skipping invalid tEXt keyword");
            continue;
        }
        let mut data = keyword;
        data.push(0);
        data.extend(latin1(value));
        write_chunk(&mut out, b"tEXt", &data);
    }

    out.extend_from_slice(&png[AFTER_IHDR..]);
    Ok(out)
}

fn latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}
