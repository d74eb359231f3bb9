//! Application configuration.
//!
//! The `[export]` section is the export settings; `[transfer]` tunes the
//! downloader and file cache; `[paths]` picks the default output root.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};
use super::settings::ExportSettings;

/// Bounds for the number of chunk requests kept in flight.
pub const MAX_CHUNK_WINDOW: usize = 8;

/// Downloader and cache tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Chunk requests in flight per file.
    #[serde(default = "default_chunk_window")]
    pub chunk_window: usize,

    /// Downloaded locations remembered for deduplication.
    #[serde(default = "default_location_cache_size")]
    pub location_cache_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_window: default_chunk_window(),
            location_cache_size: default_location_cache_size(),
        }
    }
}

const fn default_chunk_window() -> usize {
    2
}

const fn default_location_cache_size() -> usize {
    100_000
}

impl TransferConfig {
    /// # Errors
    /// Returns `AppError::Config` when a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CHUNK_WINDOW).contains(&self.chunk_window) {
            return Err(AppError::config(format!(
                "transfer.chunk_window must be within [1, {MAX_CHUNK_WINDOW}], got {}",
                self.chunk_window
            )));
        }
        if self.location_cache_size == 0 {
            return Err(AppError::config("transfer.location_cache_size must be positive"));
        }
        Ok(())
    }
}

/// Path configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Output root used when the export section leaves `path` empty.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub export: ExportSettings,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Output root, falling back to the configured or default directory.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        if !self.export.path.as_os_str().is_empty() {
            return self.export.path.clone();
        }
        self.paths
            .output_dir
            .clone()
            .unwrap_or_else(Self::default_output_dir)
    }

    #[must_use]
    pub fn default_output_dir() -> PathBuf {
        dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("takeout-export")
    }

    /// Directory holding the configuration file.
    #[must_use]
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("takeout-export")
    }

    /// Settings with the output root resolved.
    #[must_use]
    pub fn resolved_settings(&self) -> ExportSettings {
        ExportSettings {
            path: self.output_dir(),
            ..self.export.clone()
        }
    }

    /// # Errors
    /// Returns `AppError::Config` for the first invalid section.
    pub fn validate(&self) -> Result<()> {
        self.transfer.validate()?;
        self.resolved_settings().validate()
    }
}
