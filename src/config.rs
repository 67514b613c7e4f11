//! Reader configuration
//!
//! Stored as JSON. Every field has a default, so a missing file or a file
//! with only some keys is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const APP_DIR: &str = "comic-page";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReaderConfig {
    /// SQLite catalog location
    /// - Linux: ~/.local/share/comic-page/catalog.db
    /// - macOS: ~/Library/Application Support/comic-page/catalog.db
    /// - Windows: %APPDATA%\comic-page\catalog.db
    pub database_path: PathBuf,

    /// Thumbnails generated at the same time by background workers
    pub thumbnail_workers: usize,

    /// Outline font (TTF/OTF) for text pages; the built-in bitmap font
    /// only covers Latin-1
    pub text_font_path: Option<PathBuf>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        let mut database_path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        database_path.push(APP_DIR);
        database_path.push("catalog.db");

        Self {
            database_path,
            thumbnail_workers: 4,
            text_font_path: None,
        }
    }
}

impl ReaderConfig {
    /// Where the config file is looked up by default
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(json)?;
        // Zero workers would never finish a batch
        config.thumbnail_workers = config.thumbnail_workers.max(1);
        Ok(config)
    }
}
