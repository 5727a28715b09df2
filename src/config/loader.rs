use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::SettingsFile;
use crate::flow::BufferPolicy;

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Settings validation failed: {message}")]
    ValidationError { message: String },
}

const INLINE_SOURCE: &str = "<inline>";

impl SettingsFile {
    /// Loads settings from a TOML file.
    ///
    /// - If the file doesn't exist, returns `SettingsFile::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(SettingsFile::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parses and validates settings from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, Path::new(INLINE_SOURCE))
    }

    fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let settings: SettingsFile =
            toml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                source: e,
            })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings.
    ///
    /// Checks:
    /// - A bounded side-effect buffer has a capacity of at least one
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.side_effect_buffer == BufferPolicy::DropOldest(0) {
            return Err(ConfigError::ValidationError {
                message: "side_effect_buffer drop_oldest capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
