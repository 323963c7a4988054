//! Embedded metadata for exported files.
//!
//! JPEG output carries an EXIF block (Make, Model, DateTime,
//! DateTimeOriginal, DateTimeDigitized). PNG output carries `tEXt` chunks:
//! `Creation Time` (ISO 8601, what most file browsers show as "date taken"),
//! `Source` for the make, `Comment` for the model and `Software`.
//!
//! Dates are exchanged in EXIF form, `YYYY:MM:DD HH:MM:SS`.

use std::io::Cursor;

use chrono::{Local, NaiveDateTime};
use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EXIF date/time format.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// PNG `Creation Time` format.
pub const PNG_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Value written to the `Software` tag.
pub const SOFTWARE: &str = concat!("photowash ", env!("CARGO_PKG_VERSION"));

/// Largest TIFF block that fits in one APP1 segment after the
/// `Exif\0\0` header and the length field.
pub const MAX_EXIF_LEN: usize = 0xFFFF - 8;

/// Camera bodies used for randomized make/model overrides.
pub const RANDOM_CAMERAS: &[(&str, &str)] = &[
    ("Canon", "EOS 5D Mark IV"),
    ("Nikon", "D850"),
    ("Sony", "A7R IV"),
    ("Fujifilm", "X-T4"),
    ("Panasonic", "GH5"),
];

/// Errors that can occur while building metadata blocks.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The EXIF writer rejected the fields
    #[error("EXIF serialization failed: {0}")]
    Exif(String),

    /// The EXIF block does not fit in a single APP1 segment
    #[error("EXIF block too large: {0} bytes")]
    TooLarge(usize),

    /// The datetime string is not `YYYY:MM:DD HH:MM:SS`
    #[error("invalid EXIF datetime: {0:?}")]
    InvalidDatetime(String),
}

/// What to do with embedded metadata when saving.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataAction {
    /// Re-encode without carrying anything over.
    #[default]
    Strip,
    /// Explicitly remove all metadata. Output is the same as `Strip`; the
    /// distinction is kept for the transform history.
    RemoveAll,
    /// Write the given camera and date fields.
    Override(MetadataOverrides),
}

impl MetadataAction {
    /// Overrides to embed, if any.
    pub fn overrides(&self) -> Option<&MetadataOverrides> {
        match self {
            MetadataAction::Override(o) => Some(o),
            _ => None,
        }
    }

    /// Short labels for the transform history.
    pub fn history_labels(&self) -> Vec<String> {
        match self {
            MetadataAction::Strip => Vec::new(),
            MetadataAction::RemoveAll => vec!["remove_all".to_string()],
            MetadataAction::Override(o) => {
                let mut labels = vec!["override".to_string()];
                if !o.make.is_empty() {
                    labels.push(format!("make={}", o.make));
                }
                if !o.model.is_empty() {
                    labels.push(format!("model={}", o.model));
                }
                if let Some(dt) = &o.datetime {
                    labels.push(format!("datetime={dt}"));
                }
                labels
            }
        }
    }
}

/// Camera and date fields written on save. Empty strings are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataOverrides {
    pub make: String,
    pub model: String,
    /// EXIF-format datetime; `None` means "now" at save time.
    pub datetime: Option<String>,
}

impl MetadataOverrides {
    /// Overrides carrying only a datetime.
    pub fn with_datetime(datetime: impl Into<String>) -> Self {
        Self {
            datetime: Some(datetime.into()),
            ..Default::default()
        }
    }

    /// Random camera from [`RANDOM_CAMERAS`] with a random date between
    /// 2018 and 2024.
    pub fn random_camera<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (make, model) = RANDOM_CAMERAS.choose(rng).copied().unwrap_or(("Canon", "EOS 5D Mark IV"));
        let datetime = format!(
            "{}:{:02}:{:02} {:02}:{:02}:{:02}",
            rng.random_range(2018..=2024),
            rng.random_range(1..=12),
            rng.random_range(1..=28),
            rng.random_range(0..=23),
            rng.random_range(0..=59),
            rng.random_range(0..=59),
        );
        Self {
            make: make.to_string(),
            model: model.to_string(),
            datetime: Some(datetime),
        }
    }

    /// The datetime to embed: the override if set and non-empty, else now.
    pub fn resolved_datetime(&self) -> String {
        match self.datetime.as_deref() {
            Some(dt) if !dt.trim().is_empty() => dt.trim().to_string(),
            _ => now_exif(),
        }
    }
}

/// Current local time in EXIF form.
pub fn now_exif() -> String {
    Local::now().format(EXIF_DATETIME_FORMAT).to_string()
}

/// Parse an EXIF-format datetime.
pub fn parse_exif_datetime(value: &str) -> Result<NaiveDateTime, MetadataError> {
    NaiveDateTime::parse_from_str(value.trim(), EXIF_DATETIME_FORMAT)
        .map_err(|_| MetadataError::InvalidDatetime(value.to_string()))
}

fn ascii_field(tag: Tag, value: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![value.as_bytes().to_vec()]),
    }
}

/// Serialize overrides as a little-endian TIFF/EXIF block.
pub fn build_exif(overrides: &MetadataOverrides) -> Result<Vec<u8>, MetadataError> {
    let datetime = overrides.resolved_datetime();

    let mut fields = Vec::with_capacity(6);
    if !overrides.make.is_empty() {
        fields.push(ascii_field(Tag::Make, &overrides.make));
    }
    if !overrides.model.is_empty() {
        fields.push(ascii_field(Tag::Model, &overrides.model));
    }
    fields.push(ascii_field(Tag::Software, SOFTWARE));
    fields.push(ascii_field(Tag::DateTime, &datetime));
    fields.push(ascii_field(Tag::DateTimeOriginal, &datetime));
    fields.push(ascii_field(Tag::DateTimeDigitized, &datetime));

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }

    let mut buf = Cursor::new(Vec::new());
    writer
        .write(&mut buf, true)
        .map_err(|e| MetadataError::Exif(e.to_string()))?;

    let tiff = buf.into_inner();
    if tiff.len() > MAX_EXIF_LEN {
        return Err(MetadataError::TooLarge(tiff.len()));
    }
    Ok(tiff)
}

/// Key/value pairs for PNG `tEXt` chunks.
pub fn png_text_entries(overrides: &MetadataOverrides) -> Vec<(String, String)> {
    let datetime = overrides.resolved_datetime();
    let creation = match parse_exif_datetime(&datetime) {
        Ok(dt) => dt.format(PNG_DATETIME_FORMAT).to_string(),
        Err(_) => datetime,
    };

    let mut entries = vec![("Creation Time".to_string(), creation)];
    if !overrides.make.is_empty() {
        entries.push(("Source".to_string(), overrides.make.clone()));
    }
    if !overrides.model.is_empty() {
        entries.push(("Comment".to_string(), overrides.model.clone()));
    }
    entries.push(("Software".to_string(), SOFTWARE.to_string()));
    entries
}
