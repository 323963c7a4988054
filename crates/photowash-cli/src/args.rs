//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use photowash_core::decode::MAX_PREVIEW_SIZE;
use photowash_core::{
    CropMargins, MetadataAction, MetadataOverrides, OutputFormat, PerspectiveCorners, RangeConfig, TransformOptions,
};

#[derive(Debug, Parser)]
#[command(name = "photowash", version, about = "Batch image variation tool")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process images in parallel into a new output folder
    Run(RunArgs),
    /// Render a downscaled preview of one image
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Image files or directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Base directory; a folder named after the edits is created inside
    #[arg(short, long)]
    pub output: PathBuf,

    /// Draw fresh edits for every image instead of using fixed values
    #[arg(long)]
    pub random: bool,

    #[command(flatten)]
    pub ranges: RangeArgs,

    #[command(flatten)]
    pub edits: EditArgs,

    #[command(flatten)]
    pub save: SaveArgs,

    /// Worker threads (default: cores minus one)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Settings file (default: ~/.photowash/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Edit history file (default: ~/.photowash/history.json)
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Print progress as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    pub input: PathBuf,

    /// PNG file to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Longest edge of the preview
    #[arg(long, default_value_t = MAX_PREVIEW_SIZE)]
    pub max_size: u32,

    /// Scale the edited preview back to the source resolution
    #[arg(long)]
    pub full_size: bool,

    #[command(flatten)]
    pub edits: EditArgs,

    /// Settings file (default: ~/.photowash/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Fixed edit values. Unset flags keep the configured defaults.
#[derive(Debug, Default, Args)]
pub struct EditArgs {
    /// Crop all four edges by N pixels (negative pads)
    #[arg(long, allow_negative_numbers = true)]
    pub crop: Option<i32>,

    #[arg(long, allow_negative_numbers = true)]
    pub crop_top: Option<i32>,

    #[arg(long, allow_negative_numbers = true)]
    pub crop_bottom: Option<i32>,

    #[arg(long, allow_negative_numbers = true)]
    pub crop_left: Option<i32>,

    #[arg(long, allow_negative_numbers = true)]
    pub crop_right: Option<i32>,

    /// Clockwise rotation in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub rotation: Option<f64>,

    #[arg(long, allow_negative_numbers = true, value_parser = clap::value_parser!(i32).range(-100..=100))]
    pub brightness: Option<i32>,

    #[arg(long, allow_negative_numbers = true, value_parser = clap::value_parser!(i32).range(-100..=100))]
    pub contrast: Option<i32>,

    #[arg(long, allow_negative_numbers = true, value_parser = clap::value_parser!(i32).range(-100..=100))]
    pub saturation: Option<i32>,

    /// Gaussian noise standard deviation
    #[arg(long)]
    pub noise: Option<f32>,

    /// Destination corners TL TR BR BL, each `x,y`
    #[arg(long, num_args = 4, value_name = "X,Y", allow_hyphen_values = true, value_parser = parse_point)]
    pub perspective: Option<Vec<(f64, f64)>>,

    /// Image size the corners refer to, `WxH` (default: the preview size)
    #[arg(long, value_parser = parse_size, requires = "perspective")]
    pub perspective_size: Option<(u32, u32)>,

    #[command(flatten)]
    pub metadata: MetadataArgs,
}

#[derive(Debug, Default, Args)]
pub struct MetadataArgs {
    /// Write no metadata at all
    #[arg(long, conflicts_with_all = ["make", "model", "datetime", "override_date", "random_camera"])]
    pub remove_metadata: bool,

    /// Camera make to embed
    #[arg(long)]
    pub make: Option<String>,

    /// Camera model to embed
    #[arg(long)]
    pub model: Option<String>,

    /// Capture date to embed, `YYYY:MM:DD HH:MM:SS`
    #[arg(long, conflicts_with = "override_date")]
    pub datetime: Option<String>,

    /// Embed the save time as capture date
    #[arg(long)]
    pub override_date: bool,

    /// Embed a random camera body and date
    #[arg(long, conflicts_with_all = ["make", "model", "datetime", "override_date"])]
    pub random_camera: bool,
}

#[derive(Debug, Default, Args)]
pub struct SaveArgs {
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// JPEG quality
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,
}

/// Range overrides for `--random`.
#[derive(Debug, Default, Args)]
pub struct RangeArgs {
    /// Maximum crop per edge in pixels
    #[arg(long, requires = "random")]
    pub crop_range: Option<f64>,

    /// Maximum rotation in degrees either way
    #[arg(long, requires = "random")]
    pub rotation_range: Option<f64>,

    /// Maximum noise level
    #[arg(long, requires = "random")]
    pub noise_range: Option<f64>,

    /// Maximum corner offset in preview pixels
    #[arg(long, requires = "random")]
    pub perspective_range: Option<f64>,

    /// Spread capture dates over this many past days
    #[arg(long, requires = "random")]
    pub days_back: Option<u32>,

    #[arg(long, requires = "random")]
    pub no_perspective: bool,

    #[arg(long, requires = "random")]
    pub no_date: bool,
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s.split_once(',').ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("`{v}`: {e}"));
    Ok((parse(x)?, parse(y)?))
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected `WxH`, got `{s}`"))?;
    let parse = |v: &str| v.trim().parse::<u32>().map_err(|e| format!("`{v}`: {e}"));
    match (parse(w)?, parse(h)?) {
        (0, _) | (_, 0) => Err("size must be non-zero".to_string()),
        size => Ok(size),
    }
}

impl EditArgs {
    /// Overlay the flags on `base`. `preview_size` is used as the corner
    /// reference when `--perspective-size` is not given.
    pub fn apply(&self, base: &TransformOptions, preview_size: (u32, u32)) -> TransformOptions {
        let mut options = base.clone();

        if let Some(c) = self.crop {
            options.crop = CropMargins::uniform(c);
        }
        let CropMargins { top, bottom, left, right } = &mut options.crop;
        for (edge, value) in [
            (top, self.crop_top),
            (bottom, self.crop_bottom),
            (left, self.crop_left),
            (right, self.crop_right),
        ] {
            if let Some(v) = value {
                *edge = v;
            }
        }

        if let Some(v) = self.rotation {
            options.rotation = v;
        }
        if let Some(v) = self.brightness {
            options.brightness = v;
        }
        if let Some(v) = self.contrast {
            options.contrast = v;
        }
        if let Some(v) = self.saturation {
            options.saturation = v;
        }
        if let Some(v) = self.noise {
            options.noise = v.max(0.0);
        }

        if let Some(points) = &self.perspective {
            if let &[tl, tr, br, bl] = points.as_slice() {
                options.perspective = Some(PerspectiveCorners {
                    corners: [tl, tr, br, bl],
                    reference_size: self.perspective_size.unwrap_or(preview_size),
                });
            }
        }

        if let Some(metadata) = self.metadata.action() {
            options.metadata = metadata;
        }
        options
    }

    /// Whether corners were given without an explicit reference size.
    pub fn needs_preview_size(&self) -> bool {
        self.perspective.is_some() && self.perspective_size.is_none()
    }
}

impl MetadataArgs {
    /// The requested action, or `None` to keep the configured one.
    pub fn action(&self) -> Option<MetadataAction> {
        if self.remove_metadata {
            return Some(MetadataAction::RemoveAll);
        }
        if self.random_camera {
            return Some(MetadataAction::Override(MetadataOverrides::random_camera(&mut rand::rng())));
        }
        if self.make.is_none() && self.model.is_none() && self.datetime.is_none() && !self.override_date {
            return None;
        }
        Some(MetadataAction::Override(MetadataOverrides {
            make: self.make.clone().unwrap_or_default(),
            model: self.model.clone().unwrap_or_default(),
            datetime: self.datetime.clone(),
        }))
    }
}

impl RangeArgs {
    pub fn apply(&self, base: &RangeConfig) -> RangeConfig {
        let mut ranges = *base;
        if let Some(v) = self.crop_range {
            ranges.crop = v;
        }
        if let Some(v) = self.rotation_range {
            ranges.rotation = v;
        }
        if let Some(v) = self.noise_range {
            ranges.noise = v;
        }
        if let Some(v) = self.perspective_range {
            ranges.perspective = v;
        }
        if let Some(v) = self.days_back {
            ranges.date_days_back = v;
        }
        if self.no_perspective {
            ranges.include_perspective = false;
        }
        if self.no_date {
            ranges.include_date = false;
        }
        ranges
    }
}
