//! Randomized per-image variations.
//!
//! Every image gets independent draws: one crop amount for all four edges,
//! a rotation, a noise level, a jitter on exactly one perspective corner and
//! a capture date within the last few days. Perspective corners are drawn
//! against the preview-scale size of the image, matching how corners are
//! authored interactively.

use std::fmt;

use chrono::{Local, TimeDelta};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::encode::{MetadataAction, MetadataOverrides, EXIF_DATETIME_FORMAT};
use crate::transform::{CropMargins, PerspectiveCorners};
use crate::TransformOptions;

/// Draw ranges for [`generate_variation`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    /// Crop drawn from `0..=crop` pixels.
    pub crop: f64,
    /// Rotation drawn from `-rotation..=rotation` degrees.
    pub rotation: f64,
    /// Noise drawn from `0..=noise`.
    pub noise: f64,
    /// Corner offset drawn from `-perspective..=perspective` pixels per axis.
    pub perspective: f64,
    /// Capture date drawn from the last `date_days_back` days.
    pub date_days_back: u32,
    pub include_perspective: bool,
    pub include_date: bool,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            crop: 9.0,
            rotation: 1.3,
            noise: 4.0,
            perspective: 3.0,
            date_days_back: 7,
            include_perspective: true,
            include_date: true,
        }
    }
}

/// One image's draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationParameters {
    pub crop: i32,
    pub rotation: f64,
    pub noise: f32,
    pub perspective: Option<PerspectiveCorners>,
    /// EXIF-format capture date.
    pub datetime: Option<String>,
}

impl VariationParameters {
    /// Convert the draws into edit options.
    ///
    /// A drawn date becomes a metadata override with empty make and model.
    pub fn into_options(self) -> TransformOptions {
        let metadata = match self.datetime {
            Some(dt) => MetadataAction::Override(MetadataOverrides::with_datetime(dt)),
            None => MetadataAction::Strip,
        };
        TransformOptions {
            crop: CropMargins::uniform(self.crop),
            rotation: self.rotation,
            noise: self.noise,
            perspective: self.perspective,
            metadata,
            ..Default::default()
        }
    }

    /// Log line for one file, e.g.
    /// `[a.jpg] | Crop:+3px | Rotate:-0.4° | Noise:2.1 | Transform:(0.0,0.0),... | Date:...`
    pub fn log_line<'a>(&'a self, name: &'a str) -> VariationLog<'a> {
        VariationLog { name, params: self }
    }
}

/// [`fmt::Display`] adapter returned by [`VariationParameters::log_line`].
pub struct VariationLog<'a> {
    name: &'a str,
    params: &'a VariationParameters,
}

impl fmt::Display for VariationLog<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.params;
        write!(
            f,
            "[{}] | Crop:{:+}px | Rotate:{:+.1}° | Noise:{:.1}",
            self.name, p.crop, p.rotation, p.noise
        )?;
        if let Some(perspective) = &p.perspective {
            let corners: Vec<String> = perspective
                .corners
                .iter()
                .map(|(x, y)| format!("({x:.1},{y:.1})"))
                .collect();
            write!(f, " | Transform:{}", corners.join(","))?;
        }
        if let Some(dt) = &p.datetime {
            write!(f, " | Date:{dt}")?;
        }
        Ok(())
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if lo.is_finite() && hi.is_finite() && lo < hi {
        rng.random_range(lo..=hi)
    } else if lo.is_finite() {
        lo
    } else {
        0.0
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Draw a capture date uniformly from the last `days_back` days.
pub fn random_datetime<R: Rng + ?Sized>(days_back: u32, rng: &mut R) -> String {
    let seconds = uniform(rng, 0.0, days_back as f64 * 86_400.0);
    let delta = TimeDelta::try_seconds(seconds as i64).unwrap_or_default();
    (Local::now() - delta).format(EXIF_DATETIME_FORMAT).to_string()
}

/// Move one randomly chosen corner of the `width x height` quad.
pub fn random_perspective<R: Rng + ?Sized>(width: u32, height: u32, max_offset: f64, rng: &mut R) -> PerspectiveCorners {
    let mut corners = PerspectiveCorners::identity(width, height);
    let max_offset = max_offset.abs();
    let index = rng.random_range(0..4);
    let (x, y) = corners.corners[index];
    corners.corners[index] = (
        round1(x + uniform(rng, -max_offset, max_offset)),
        round1(y + uniform(rng, -max_offset, max_offset)),
    );
    corners
}

/// Draw one image's variation. `width`/`height` are the preview-scale size.
pub fn generate_variation<R: Rng + ?Sized>(
    config: &RangeConfig,
    width: u32,
    height: u32,
    rng: &mut R,
) -> VariationParameters {
    let crop = uniform(rng, 0.0, config.crop).round() as i32;
    let rotation = round1(uniform(rng, -config.rotation.abs(), config.rotation.abs()));
    let noise = round1(uniform(rng, 0.0, config.noise)) as f32;

    let perspective = config
        .include_perspective
        .then(|| random_perspective(width, height, config.perspective, rng));
    let datetime = config
        .include_date
        .then(|| random_datetime(config.date_days_back, rng));

    VariationParameters {
        crop,
        rotation,
        noise,
        perspective,
        datetime,
    }
}

/// [`generate_variation`] with the thread-local RNG, converted to options.
pub fn generate_variation_options(config: &RangeConfig, width: u32, height: u32) -> TransformOptions {
    generate_variation(config, width, height, &mut rand::rng()).into_options()
}
