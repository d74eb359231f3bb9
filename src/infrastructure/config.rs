//! Configuration file management.
//!
//! Handles loading and saving TOML configuration files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Takeout export configuration
# Auto-generated - edit as needed

[export]
# Output format: "html", "json" or "text"
format = "html"

# Collections to export, as a bit set:
# personal_info = 1, userpics = 2, contacts = 4, sessions = 8,
# other_data = 16, personal_chats = 32, bot_chats = 64,
# private_groups = 128, public_groups = 256, private_channels = 512,
# public_channels = 1024
types = 175

# Chat types exported in full instead of only outgoing messages
full_chats = 224

# "newest_first" or "oldest_first"
message_order = "newest_first"

[export.media]
# Media types downloaded, as a bit set:
# photo = 1, video = 2, voice_message = 4, video_message = 8,
# sticker = 16, gif = 32, file = 64
types = 1

# Per-file size cutoff in bytes (at most 2 GiB)
size_limit = 8388608

[transfer]
# Chunk requests kept in flight per file
chunk_window = 2

# Downloaded locations remembered to avoid fetching a file twice
location_cache_size = 100000

[paths]
# Output root (optional, defaults to ~/Downloads/takeout-export)
# output_dir = "/custom/path"
"#;

/// Get the path to the default configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_config_dir().join("config.toml")
}

/// Load configuration from `path`, or from the default location.
///
/// A missing default file yields the built-in defaults; a missing
/// explicit file is an error.
///
/// # Errors
/// Returns error if the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return load_config_from_file(path);
    }
    let config_path = config_file_path();
    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        tracing::debug!(path = %config_path.display(), "No configuration file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io("Failed to read config file", path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| AppError::config(format!("Failed to parse {}: {e}", path.display())))?;

    tracing::debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// Save configuration to file.
///
/// # Errors
/// Returns error if file cannot be written.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", parent, e))?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| AppError::config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content).map_err(|e| AppError::io("Failed to write config file", path, e))?;

    tracing::info!(path = %path.display(), "Configuration saved");

    Ok(())
}

/// Create the default configuration file if it doesn't exist.
///
/// Returns whether a new file was written.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", parent, e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", path, e))?;

    tracing::info!(path = %path.display(), "Created default configuration");

    Ok(true)
}
