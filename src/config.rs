use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::file::DEFAULT_MAX_FILE_BYTES;

/// Runtime settings, read from an optional TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files larger than this are refused rather than buffered
    pub max_file_bytes: u64,
    /// Cap on lines returned by `search_file`
    pub max_search_results: usize,
    /// Cap on entries returned by `list_directory`
    pub max_list_entries: usize,
    /// Default tracing filter, e.g. `info` or `lineshift=debug`
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_search_results: 200,
            max_list_entries: 1000,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    /// Parse a config from TOML text; missing keys take their defaults
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load from `path`, or return defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
