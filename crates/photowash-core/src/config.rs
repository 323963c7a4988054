//! Persistent application settings.
//!
//! Stored as pretty-printed JSON. Every field has a default, so a partial or
//! older file is merged over the defaults when loaded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::autocrop::AutoCropSettings;
use crate::encode::{OutputFormat, DEFAULT_JPEG_QUALITY};
use crate::job::OutputSettings;
use crate::variation::RangeConfig;
use crate::TransformOptions;

const APP_DIR: &str = ".photowash";
const CONFIG_FILE: &str = "config.json";

/// Errors reading or writing settings files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Per-user directory holding the config and history files.
pub fn app_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

/// Read a JSON file, returning `None` when it does not exist.
pub(crate) fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no file, using defaults");
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text).map(Some).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `value` as pretty JSON, creating the parent directory.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(io_err)
}

/// Saved settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub last_input_dir: Option<PathBuf>,
    pub last_output_dir: Option<PathBuf>,
    /// Edit values used when no flag overrides them
    pub defaults: TransformOptions,
    /// Draw ranges for randomized runs
    pub ranges: RangeConfig,
    pub format: OutputFormat,
    pub jpeg_quality: u8,
    /// Worker threads; `None` means cores minus one
    pub workers: Option<usize>,
    pub autocrop: AutoCropSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            last_input_dir: None,
            last_output_dir: None,
            defaults: TransformOptions::default(),
            ranges: RangeConfig::default(),
            format: OutputFormat::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            workers: None,
            autocrop: AutoCropSettings::default(),
        }
    }
}

impl AppConfig {
    /// `~/.photowash/config.json`
    pub fn default_path() -> PathBuf {
        app_dir().join(CONFIG_FILE)
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        write_json(path, self)
    }

    /// Output settings for `dir` built from the saved format and quality.
    pub fn output_settings(&self, dir: impl Into<PathBuf>) -> OutputSettings {
        let mut settings = OutputSettings::new(dir).with_format(self.format);
        settings.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        settings.autocrop = self.autocrop;
        settings
    }
}
