//! Per-file job: load, edit, finalize, encode, write.
//!
//! A job never touches another job's state. Output names are reserved with
//! `create_new`, so two workers resolving the same stem get distinct files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::autocrop::AutoCropSettings;
use crate::decode::{load_image, thumbnail_size, DecodeError, PixelBuffer, MAX_PREVIEW_SIZE};
use crate::encode::{encode_image, now_exif, parse_exif_datetime, EncodeError, MetadataAction, OutputFormat, DEFAULT_JPEG_QUALITY};
use crate::pipeline::{apply_edits, finalize, FinalizeSettings, DEFAULT_BACKGROUND};
use crate::transform::InterpolationFilter;
use crate::variation::{generate_variation, RangeConfig};
use crate::TransformOptions;

/// Errors that fail a single job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The source could not be read or decoded
    #[error("failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// The finished image could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Writing the output failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source path has no file name to derive an output name from
    #[error("source has no file name: {}", .0.display())]
    InvalidSource(PathBuf),
}

/// Where and how finished images are written.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub format: OutputFormat,
    /// Flatten color for formats without alpha.
    pub background: [u8; 3],
    pub jpeg_quality: u8,
    pub autocrop: AutoCropSettings,
}

impl OutputSettings {
    /// JPEG output into `dir` with default settings.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            format: OutputFormat::Jpeg,
            background: DEFAULT_BACKGROUND,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            autocrop: AutoCropSettings::default(),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn finalize_settings(&self) -> FinalizeSettings {
        FinalizeSettings {
            format: self.format,
            background: self.background,
            autocrop: self.autocrop,
            ..Default::default()
        }
    }
}

/// What a job applies to its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOptions {
    /// The same options for every file.
    Fixed(TransformOptions),
    /// Fresh draws for every file.
    Randomized(RangeConfig),
}

/// A finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub source: PathBuf,
    pub path: PathBuf,
    /// Options actually applied, with the embedded datetime resolved.
    pub options: TransformOptions,
}

/// Process one file with fixed options.
pub fn process(source: &Path, options: &TransformOptions, settings: &OutputSettings) -> Result<JobOutput, JobError> {
    let image = load(source)?;
    process_loaded(source, &image, options, settings)
}

/// Process one file, drawing a variation first when randomized.
pub fn run_job(source: &Path, options: &JobOptions, settings: &OutputSettings) -> Result<JobOutput, JobError> {
    let image = load(source)?;
    match options {
        JobOptions::Fixed(options) => process_loaded(source, &image, options, settings),
        JobOptions::Randomized(config) => {
            let (tw, th) = thumbnail_size(image.width, image.height, MAX_PREVIEW_SIZE);
            let variation = generate_variation(config, tw, th, &mut rand::rng());
            info!("{}", variation.log_line(&display_name(source)));
            process_loaded(source, &image, &variation.into_options(), settings)
        }
    }
}

fn load(source: &Path) -> Result<PixelBuffer, JobError> {
    load_image(source).map_err(|e| JobError::Load {
        path: source.to_path_buf(),
        source: e,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn process_loaded(
    source: &Path,
    image: &PixelBuffer,
    options: &TransformOptions,
    settings: &OutputSettings,
) -> Result<JobOutput, JobError> {
    let name = source
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| JobError::InvalidSource(source.to_path_buf()))?;

    let mut options = options.clone();
    if let MetadataAction::Override(o) = &mut options.metadata {
        if o.datetime.as_deref().is_none_or(|d| d.trim().is_empty()) {
            o.datetime = Some(now_exif());
        }
    }

    let staged = apply_edits(image, &options, InterpolationFilter::Lanczos3);
    let finished = finalize(staged, &settings.finalize_settings(), &mut rand::rng());
    let bytes = encode_image(&finished, settings.format, settings.jpeg_quality, &options.metadata)?;

    let (path, mut file) = create_unique_file(&settings.dir, &name, settings.format).map_err(|e| JobError::Io {
        path: settings.dir.clone(),
        source: e,
    })?;
    write_or_discard(&path, &mut file, &bytes)?;

    if let Some(datetime) = options.metadata.overrides().and_then(|o| o.datetime.as_deref()) {
        if let Err(e) = set_modified(&file, datetime) {
            warn!(path = %path.display(), error = %e, "could not set file time");
        }
    }

    info!(
        source = %source.display(),
        output = %path.display(),
        width = finished.width,
        height = finished.height,
        "job finished"
    );

    Ok(JobOutput {
        source: source.to_path_buf(),
        path,
        options,
    })
}

/// Write `bytes` to a freshly reserved output, removing it on failure.
fn write_or_discard(path: &Path, out: &mut impl Write, bytes: &[u8]) -> Result<(), JobError> {
    if let Err(e) = out.write_all(bytes).and_then(|()| out.flush()) {
        if let Err(remove) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %remove, "could not remove partial output");
        }
        return Err(JobError::Io {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

fn set_modified(file: &File, datetime: &str) -> io::Result<()> {
    let naive = parse_exif_datetime(datetime).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "nonexistent local time"))?;
    file.set_modified(SystemTime::from(local))
}

fn candidate(dir: &Path, stem: &str, format: OutputFormat, counter: u32) -> PathBuf {
    let ext = format.extension();
    match counter {
        0 => dir.join(format!("{stem}.{ext}")),
        n => dir.join(format!("{stem}_{n}.{ext}")),
    }
}

/// First free `stem.ext`, `stem_1.ext`, `stem_2.ext`, ... in `dir`.
///
/// Only checks for existence. [`create_unique_file`] reserves the name
/// atomically and rescans when another job claimed it first.
pub fn unique_output_path(dir: &Path, source_name: &str, format: OutputFormat) -> PathBuf {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string());

    (0..)
        .map(|n| candidate(dir, &stem, format, n))
        .find(|p| !p.exists())
        .unwrap_or_else(|| candidate(dir, &stem, format, 0))
}

fn create_unique_file(dir: &Path, source_name: &str, format: OutputFormat) -> io::Result<(PathBuf, File)> {
    loop {
        let path = unique_output_path(dir, source_name, format);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Folder name describing the non-zero edits, `random` for randomized runs
/// and `output` when nothing is set.
pub fn output_folder_name(options: &TransformOptions, randomized: bool) -> String {
    if randomized {
        return "random".to_string();
    }

    let mut parts = Vec::new();
    if options.crop.top != 0 {
        parts.push(format!("crop{}", options.crop.top));
    }
    if options.rotation != 0.0 {
        parts.push(format!("rot{}", options.rotation));
    }
    if options.brightness != 0 {
        parts.push(format!("bright{}", options.brightness));
    }
    if options.contrast != 0 {
        parts.push(format!("contrast{}", options.contrast));
    }
    if options.saturation != 0 {
        parts.push(format!("sat{}", options.saturation));
    }
    if options.noise != 0.0 {
        parts.push(format!("noise{}", options.noise));
    }

    if parts.is_empty() {
        "output".to_string()
    } else {
        parts.join("_")
    }
}

/// Create a fresh output folder under `base`, suffixing `_1`, `_2`, ... if
/// the name is taken.
pub fn create_output_dir(base: &Path, options: &TransformOptions, randomized: bool) -> io::Result<PathBuf> {
    fs::create_dir_all(base)?;
    let name = output_folder_name(options, randomized);

    for n in 0u32.. {
        let dir = match n {
            0 => base.join(&name),
            n => base.join(format!("{name}_{n}")),
        };
        match fs::create_dir(&dir) {
            Ok(()) => {
                debug!(dir = %dir.display(), "output folder created");
                return Ok(dir);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::other("output folder names exhausted"))
}
