//! Configuration defaults loading and config file resolution
//!
//! Playback options resolve in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file (`[playback]` table)
//! 4. Compiled default (fallback)
//!
//! This module covers step 3: locating and parsing the TOML file.

use crate::source::Interpolation;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "MODPLAY_CONFIG";

/// Playback defaults read from the `[playback]` table.
///
/// Every field is optional; absent fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerDefaults {
    pub channels: Option<u16>,
    pub fadeout: Option<f32>,
    pub interpolation: Option<Interpolation>,
    pub loops: Option<i32>,
    pub volume: Option<f32>,
    pub device: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    playback: PlayerDefaults,
}

impl PlayerDefaults {
    /// Parse defaults from TOML text. `origin` only labels errors.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str::<ConfigFile>(content)
            .map(|file| file.playback)
            .map_err(|e| Error::ConfigParse {
                path: origin.to_path_buf(),
                message: e.message().to_string(),
            })
    }

    /// Read and parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Load defaults following the resolution order.
    ///
    /// An explicit path (argument or `MODPLAY_CONFIG`) must exist. The
    /// platform locations are optional: when none exists, empty defaults are
    /// returned.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!("Loading config from {}", path.display());
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                debug!("Loading config from {} ({})", path, CONFIG_ENV_VAR);
                return Self::from_file(Path::new(&path));
            }
        }

        match default_config_file() {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                debug!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Platform config file locations, most specific first.
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // ~/.config/modplay/config.toml (Linux), ~/Library/Application Support (macOS),
    // %APPDATA% (Windows)
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("modplay").join("config.toml"));
    }

    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/modplay/config.toml"));
    }

    candidates
}

/// First existing platform config file, if any.
fn default_config_file() -> Option<PathBuf> {
    config_file_candidates().into_iter().find(|p| p.exists())
}
