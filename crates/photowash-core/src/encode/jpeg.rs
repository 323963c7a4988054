//! JPEG encoding for export.
//!
//! Uses the `image` crate's baseline encoder. Camera metadata is attached
//! afterwards by splicing an APP1 `Exif` segment into the encoded stream,
//! directly after the JFIF APP0 header when one is present.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use image::ImageEncoder;
use std::io::Cursor;

use super::EncodeError;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: [u8; 2] = [0xFF, 0xE0];
const APP1: [u8; 2] = [0xFF, 0xE1];
const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Encode RGB pixel data to JPEG bytes.
///
/// # Arguments
///
/// * `pixels` - RGB pixel data (3 bytes per pixel, row-major order)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `quality` - JPEG quality (1-100, where 100 is highest quality)
///
/// Quality outside `1..=100` is clamped.
pub fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected_len = (width as usize) * (height as usize) * 3;
    if pixels.len() != expected_len {
        return Err(EncodeError::InvalidPixelData {
            expected: expected_len,
            actual: pixels.len(),
        });
    }

    let quality = quality.clamp(1, 100);

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .write_image(pixels, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}

/// Encode RGB pixel data to JPEG and embed a TIFF/EXIF block.
pub fn encode_jpeg_with_exif(
    pixels: &[u8],
    width: u32,
    height: u32,
    quality: u8,
    exif: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    let jpeg = encode_jpeg(pixels, width, height, quality)?;
    insert_exif(&jpeg, exif)
}

/// Splice an APP1 `Exif` segment carrying `tiff` into a JPEG stream.
pub fn insert_exif(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>, EncodeError> {
    if jpeg.len() < 4 || jpeg[..2] != SOI {
        return Err(EncodeError::Malformed("JPEG"));
    }

    let segment_len = 2 + EXIF_HEADER.len() + tiff.len();
    let segment_len = u16::try_from(segment_len)
        .map_err(|_| EncodeError::EncodingFailed(format!("EXIF block too large: {} bytes", tiff.len())))?;

    let mut at = 2;
    if jpeg[2..4] == APP0 {
        if jpeg.len() < 6 {
            return Err(EncodeError::Malformed("JPEG"));
        }
        let app0_len = u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
        at = 4 + app0_len;
        if at > jpeg.len() {
            return Err(EncodeError::Malformed("JPEG"));
        }
    }

    let mut out = Vec::with_capacity(jpeg.len() + segment_len as usize + 2);
    out.extend_from_slice(&jpeg[..at]);
    out.extend_from_slice(&APP1);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[at..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32) -> Vec<u8> {
        vec![128u8; (width * height * 3) as usize]
    }

    fn has_markers(jpeg: &[u8]) -> bool {
        jpeg.len() >= 4 && jpeg[..2] == SOI && jpeg[jpeg.len() - 2..] == [0xFF, 0xD9]
    }

    #[test]
    fn test_encode_jpeg_basic() {
        let jpeg = encode_jpeg(&gray(100, 60), 100, 60, 90).unwrap();
        assert!(has_markers(&jpeg));

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 60));
    }

    #[test]
    fn test_encode_jpeg_quality_clamping() {
        assert!(encode_jpeg(&gray(10, 10), 10, 10, 0).is_ok());
        assert!(encode_jpeg(&gray(10, 10), 10, 10, 255).is_ok());
    }

    #[test]
    fn test_encode_jpeg_rejects_bad_input() {
        let short = vec![128u8; 99 * 100 * 3];
        assert!(matches!(
            encode_jpeg(&short, 100, 100, 90),
            Err(EncodeError::InvalidPixelData { expected: 30_000, actual: 29_700 })
        ));
        assert!(matches!(
            encode_jpeg(&[], 0, 100, 90),
            Err(EncodeError::InvalidDimensions { width: 0, height: 100 })
        ));
    }

    #[test]
    fn test_insert_exif_after_app0() {
        let jpeg = encode_jpeg(&[10u8; 8 * 8 * 3], 8, 8, 90).unwrap();
        let tiff = b"II*\0\x08\0\0\0\0\0\0\0\0\0".to_vec();
        let out = insert_exif(&jpeg, &tiff).unwrap();

        assert_eq!(out.len(), jpeg.len() + 2 + 2 + 6 + tiff.len());
        assert_eq!(&out[..2], &SOI);

        let at = if jpeg[2..4] == APP0 {
            4 + u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize
        } else {
            2
        };
        assert_eq!(&out[at..at + 2], &APP1);
        assert_eq!(u16::from_be_bytes([out[at + 2], out[at + 3]]) as usize, 8 + tiff.len());
        assert_eq!(&out[at + 4..at + 10], EXIF_HEADER);
        assert_eq!(&out[at + 10..at + 10 + tiff.len()], tiff.as_slice());
        assert!(has_markers(&out));
    }

    #[test]
    fn test_insert_exif_without_app0() {
        let mut jpeg = encode_jpeg(&gray(4, 4), 4, 4, 90).unwrap();
        if jpeg[2..4] == APP0 {
            let app0_end = 4 + u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
            jpeg.drain(2..app0_end);
        }
        let out = insert_exif(&jpeg, b"MM\0*").unwrap();
        assert_eq!(&out[2..4], &APP1);
        assert_eq!(&out[16..], &jpeg[2..]);
    }

    #[test]
    fn test_insert_exif_rejects_non_jpeg() {
        let result = insert_exif(b"\x89PNG\r\n\x1a\n", b"II*\0");
        assert!(matches!(result, Err(EncodeError::Malformed(_))));
    }

    #[test]
    fn test_insert_exif_rejects_oversized_block() {
        let jpeg = encode_jpeg(&[0u8; 3], 1, 1, 90).unwrap();
        let tiff = vec![0u8; 70_000];
        assert!(matches!(insert_exif(&jpeg, &tiff), Err(EncodeError::EncodingFailed(_))));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_valid_input_produces_valid_jpeg(
            width in 1u32..=40,
            height in 1u32..=40,
            quality in 1u8..=100,
        ) {
            let pixels: Vec<u8> = (0..width * height * 3).map(|i| (i * 37 % 256) as u8).collect();
            let jpeg = encode_jpeg(&pixels, width, height, quality).unwrap();
            prop_assert_eq!(&jpeg[..2], &SOI);
            prop_assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
        }

        #[test]
        fn prop_invalid_pixel_length_returns_error(
            width in 1u32..=30,
            height in 1u32..=30,
            delta in prop_oneof![-10i64..=-1, 1i64..=10],
        ) {
            let expected = (width * height * 3) as i64;
            let pixels = vec![128u8; (expected + delta).max(0) as usize];
            prop_assert!(matches!(
                encode_jpeg(&pixels, width, height, 90),
                Err(EncodeError::InvalidPixelData { .. })
            ), "expected InvalidPixelData");
        }

        #[test]
        fn prop_exif_insertion_keeps_jpeg_decodable(
            (width, height) in (1u32..=24, 1u32..=24),
            payload in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let pixels = vec![90u8; (width * height * 3) as usize];
            let jpeg = encode_jpeg(&pixels, width, height, 85).unwrap();
            let out = insert_exif(&jpeg, &payload).unwrap();

            prop_assert_eq!(out.len(), jpeg.len() + 10 + payload.len());
            let decoded = image::load_from_memory(&out);
            prop_assert!(decoded.is_ok());
            let decoded = decoded.unwrap();
            prop_assert_eq!((decoded.width(), decoded.height()), (width, height));
        }
    }
}
