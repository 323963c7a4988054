//! Core types for loaded images.

use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image loading operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// I/O error during file reading.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Filter type for resampling operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    #[default]
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (flip horizontal + rotate 270 CW).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (flip horizontal + rotate 90 CW).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Channel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelMode {
    /// Three interleaved color channels.
    #[default]
    Rgb,
    /// Color plus straight (non-premultiplied) alpha.
    Rgba,
}

impl ChannelMode {
    /// Bytes per pixel for this layout.
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            ChannelMode::Rgb => 3,
            ChannelMode::Rgba => 4,
        }
    }
}

/// A decoded image with interleaved 8-bit pixel data.
///
/// Every pipeline stage borrows a buffer and produces a new one, so a
/// buffer is never modified while another stage still holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Channel layout of `pixels`.
    pub mode: ChannelMode,
    /// Pixel data in row-major order.
    /// Length should be width * height * mode.channels().
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Create a new RGB buffer with the given dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self::with_mode(width, height, ChannelMode::Rgb, pixels)
    }

    /// Create a buffer with an explicit channel layout.
    pub fn with_mode(width: u32, height: u32, mode: ChannelMode, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * mode.channels(),
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            mode,
            pixels,
        }
    }

    /// Create a buffer filled with a single color.
    ///
    /// For RGB buffers only the first three components of `color` are used.
    pub fn filled(width: u32, height: u32, mode: ChannelMode, color: [u8; 4]) -> Self {
        let channels = mode.channels();
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * channels);
        for _ in 0..count {
            pixels.extend_from_slice(&color[..channels]);
        }
        Self {
            width,
            height,
            mode,
            pixels,
        }
    }

    /// Create a buffer from an image::RgbImage.
    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            mode: ChannelMode::Rgb,
            pixels: img.into_raw(),
        }
    }

    /// Create a buffer from an image::RgbaImage.
    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            mode: ChannelMode::Rgba,
            pixels: img.into_raw(),
        }
    }

    /// Create a buffer from any decoded image, keeping alpha only when the
    /// source has it.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        if img.color().has_alpha() {
            Self::from_rgba_image(img.into_rgba8())
        } else {
            Self::from_rgb_image(img.into_rgb8())
        }
    }

    /// Convert to a DynamicImage for use with the image crate.
    pub fn to_dynamic(&self) -> Option<DynamicImage> {
        match self.mode {
            ChannelMode::Rgb => RgbImage::from_raw(self.width, self.height, self.pixels.clone())
                .map(DynamicImage::ImageRgb8),
            ChannelMode::Rgba => RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
                .map(DynamicImage::ImageRgba8),
        }
    }

    /// Whether this buffer carries an alpha channel.
    #[inline]
    pub fn has_alpha(&self) -> bool {
        self.mode == ChannelMode::Rgba
    }

    /// Bytes per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.mode.channels()
    }

    /// Return an RGBA copy of this buffer (opaque alpha for RGB input).
    pub fn to_rgba(&self) -> PixelBuffer {
        match self.mode {
            ChannelMode::Rgba => self.clone(),
            ChannelMode::Rgb => {
                let mut pixels = Vec::with_capacity(self.pixel_count() * 4);
                for px in self.pixels.chunks_exact(3) {
                    pixels.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
                PixelBuffer::with_mode(self.width, self.height, ChannelMode::Rgba, pixels)
            }
        }
    }

    /// Return an RGB copy of this buffer, dropping alpha without compositing.
    pub fn to_rgb(&self) -> PixelBuffer {
        match self.mode {
            ChannelMode::Rgb => self.clone(),
            ChannelMode::Rgba => {
                let mut pixels = Vec::with_capacity(self.pixel_count() * 3);
                for px in self.pixels.chunks_exact(4) {
                    pixels.extend_from_slice(&px[..3]);
                }
                PixelBuffer::new(self.width, self.height, pixels)
            }
        }
    }

    /// Pixel components at (x, y). Alpha is 255 for RGB buffers.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let c = self.channels();
        let idx = (y as usize * self.width as usize + x as usize) * c;
        let p = &self.pixels[idx..idx + c];
        if c == 4 {
            [p[0], p[1], p[2], p[3]]
        } else {
            [p[0], p[1], p[2], 255]
        }
    }

    /// Alpha value at (x, y), 255 for RGB buffers.
    #[inline]
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        match self.mode {
            ChannelMode::Rgb => 255,
            ChannelMode::Rgba => {
                self.pixels[(y as usize * self.width as usize + x as usize) * 4 + 3]
            }
        }
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}
