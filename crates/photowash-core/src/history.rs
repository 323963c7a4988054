//! Per-file record of the last edits applied.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::config::{app_dir, read_json, write_json, ConfigError};
use crate::job::JobOutput;
use crate::transform::CropMargins;
use crate::TransformOptions;

const HISTORY_FILE: &str = "history.json";

/// Edits applied to one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryRecord {
    pub crop: CropMargins,
    pub rotation: f64,
    pub brightness: i32,
    pub contrast: i32,
    pub saturation: i32,
    pub noise: f32,
    pub metadata_actions: Vec<String>,
    /// RFC 3339 local time of the edit
    pub timestamp: String,
}

impl Default for HistoryRecord {
    fn default() -> Self {
        Self::from_options(&TransformOptions::default())
    }
}

impl HistoryRecord {
    /// Snapshot `options`, stamped with the current time.
    pub fn from_options(options: &TransformOptions) -> Self {
        Self {
            crop: options.crop,
            rotation: options.rotation,
            brightness: options.brightness,
            contrast: options.contrast,
            saturation: options.saturation,
            noise: options.noise,
            metadata_actions: options.metadata.history_labels(),
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }
}

/// File name to last record, kept sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformHistory {
    records: BTreeMap<String, HistoryRecord>,
}

impl TransformHistory {
    /// `~/.photowash/history.json`
    pub fn default_path() -> PathBuf {
        app_dir().join(HISTORY_FILE)
    }

    /// Load from `path`. A missing file yields an empty history.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        write_json(path, self)
    }

    /// Store `options` for `filename`, replacing any earlier record.
    pub fn record(&mut self, filename: impl Into<String>, options: &TransformOptions) {
        self.records.insert(filename.into(), HistoryRecord::from_options(options));
    }

    /// Record a finished job under its source file name.
    pub fn record_output(&mut self, output: &JobOutput) {
        if let Some(name) = output.source.file_name() {
            self.record(name.to_string_lossy(), &output.options);
        }
    }

    pub fn get(&self, filename: &str) -> Option<&HistoryRecord> {
        self.records.get(filename)
    }

    pub fn remove(&mut self, filename: &str) -> Option<HistoryRecord> {
        self.records.remove(filename)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HistoryRecord)> {
        self.records.iter()
    }
}
