//! Runtime configuration
//!
//! Settings come from, in increasing precedence: built-in defaults, a JSON
//! config file, environment variables, command-line flags (applied by the
//! binary).

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::data::{FrequencyTable, RetryPolicy};
use crate::refresh::RefreshConfig;

/// Default API endpoint
pub const DEFAULT_API_BASE: &str = "https://fred-watch-api.onrender.com";

/// Environment variable overriding `api_base`
pub const API_BASE_ENV: &str = "FREDWATCH_API_BASE";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A setting parsed but is out of range
    #[error("Invalid config file {path}: {field} must be at least 1")]
    Invalid { path: PathBuf, field: &'static str },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the series API
    pub api_base: String,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Retries after the first attempt for timeouts and connection failures
    pub max_retries: u32,
    /// Fixed delay before each retry
    pub retry_delay_secs: u64,
    /// Series → frequency, merged over the built-in catalog
    pub frequencies: FrequencyTable,
    /// Watch mode reload interval
    pub refresh_interval_secs: u64,
    /// Watch mode cache sweep interval
    pub cleanup_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: 10,
            max_retries: 2,
            retry_delay_secs: 5,
            frequencies: FrequencyTable::default(),
            refresh_interval_secs: 300,
            cleanup_interval_secs: 1800,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Search order:
    /// 1. Explicit path if provided (must exist)
    /// 2. $XDG_CONFIG_HOME/fredwatch/config.json
    /// 3. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit_path {
            Some(p) if !p.exists() => Err(ConfigError::NotFound(p.to_path_buf())),
            Some(p) => Self::load_from_path(p),
            None => match Self::find_config_file() {
                Some(p) => Self::load_from_path(&p),
                None => Ok(Self::default()),
            },
        }
    }

    fn find_config_file() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "fredwatch")?;
        let path = project_dirs.config_dir().join("config.json");
        path.exists().then_some(path)
    }

    /// Reads and parses a config file, merging its frequency table over the catalog defaults
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        match config.zero_interval() {
            Some(field) => Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                field,
            }),
            None => Ok(config),
        }
    }

    /// Name of the first watch interval set to zero, if any
    fn zero_interval(&self) -> Option<&'static str> {
        if self.refresh_interval_secs == 0 {
            Some("refresh_interval_secs")
        } else if self.cleanup_interval_secs == 0 {
            Some("cleanup_interval_secs")
        } else {
            None
        }
    }

    fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let mut config: Config = serde_json::from_str(contents)?;
        let mut frequencies = FrequencyTable::default();
        frequencies.merge(config.frequencies);
        config.frequencies = frequencies;
        Ok(config)
    }

    /// Applies environment overrides, reading variables through `lookup`
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base) = lookup(API_BASE_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base = base;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    /// Watch intervals, never shorter than one second
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            interval: Duration::from_secs(self.refresh_interval_secs.max(1)),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs.max(1)),
            enabled: true,
        }
    }
}
