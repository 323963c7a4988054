//! Photowash Core - image variation library
//!
//! This crate provides the core functionality for photowash: geometric and
//! photometric operators, background-aware auto-cropping, the edit/save
//! pipeline with deferred effects, randomized variations, encoders with
//! metadata rewriting, and the per-file job and batch runner.

pub mod adjustments;
pub mod autocrop;
pub mod batch;
pub mod config;
pub mod decode;
pub mod encode;
pub mod geometry;
pub mod history;
pub mod job;
pub mod luminance;
pub mod noise;
pub mod pipeline;
pub mod transform;
pub mod variation;

pub use autocrop::{auto_crop_background, crop_transparent_interior, AutoCropSettings, Background};
pub use batch::{BatchEvent, BatchRunner, BatchSummary, CancelHandle, JobReport};
pub use config::{AppConfig, ConfigError};
pub use decode::{load_image, ChannelMode, DecodeError, PixelBuffer};
pub use encode::{EncodeError, MetadataAction, MetadataOverrides, OutputFormat};
pub use history::{HistoryRecord, TransformHistory};
pub use job::{process, run_job, JobError, JobOptions, JobOutput, OutputSettings};
pub use pipeline::{apply_edits, finalize, render_preview, DeferredEffects, FinalizeSettings, Staged};
pub use transform::{CropMargins, InterpolationFilter, PerspectiveCorners};
pub use variation::{generate_variation, RangeConfig, VariationParameters};

/// Edits applied to one image.
///
/// The value is immutable once a job starts; every job in a batch gets its
/// own copy.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Per-edge crop in pixels (negative pads)
    pub crop: CropMargins,
    /// Clockwise rotation in degrees
    pub rotation: f64,
    /// Brightness delta in percent (-100 to 100)
    pub brightness: i32,
    /// Contrast delta in percent (-100 to 100)
    pub contrast: i32,
    /// Saturation delta in percent (-100 to 100)
    pub saturation: i32,
    /// Gaussian noise standard deviation, applied at save time
    pub noise: f32,
    /// Destination corners for a keystone warp
    pub perspective: Option<PerspectiveCorners>,
    /// Metadata handling on save
    pub metadata: MetadataAction,
}

impl TransformOptions {
    /// Create options that leave the pixels untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no pixel-level edit is requested. Metadata is not considered.
    pub fn is_identity(&self) -> bool {
        self.crop.is_zero()
            && self.rotation == 0.0
            && self.brightness == 0
            && self.contrast == 0
            && self.saturation == 0
            && self.noise <= 0.0
            && self.perspective.is_none_or(|p| p.is_identity())
    }
}
