//! Configuration and data directory management.
//!
//! Musicbar keeps its preference store and an optional `config.json` in the
//! platform-standard data directory:
//! - Linux: `~/.local/share/musicbar/`
//! - macOS: `~/Library/Application Support/musicbar/`
//! - Windows: `%APPDATA%\musicbar\`
//!
//! The config file is optional; defaults cover the normal case of scripting
//! the stock "Music" application.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the Musicbar data directory, creating it if needed.
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!("Could not determine the system data directory for this platform")
    })?;

    let dir = base.join("musicbar");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory at {}", dir.display()))?;
    Ok(dir)
}

/// Path of the preference store database file.
pub fn default_db_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("musicbar.db"))
}

/// Runtime configuration, loaded from `config.json` in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Name of the scriptable player application.
    pub player_app: String,
    /// Override for the preference store location.
    pub db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player_app: "Music".to_string(),
            db_path: None,
        }
    }
}

impl Config {
    /// Load the configuration from the data directory. A missing file yields
    /// the defaults; an unreadable or malformed file is an error, silently
    /// ignoring a half-written config would mask user mistakes.
    pub fn load() -> Result<Self> {
        Self::load_from(&data_dir()?.join("config.json"))
    }

    /// Load from an explicit path (separated out for tests).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Malformed config file at {}", path.display()))
    }

    /// The preference store path this configuration resolves to.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => default_db_path(),
        }
    }
}
