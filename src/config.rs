//! Configuration for the service endpoint, downloads and local paths.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::OutputFormat;

/// Environment variable that overrides `[server] base_url`.
pub const SERVER_ENV: &str = "VIDFETCH_SERVER";

/// Pause between two consecutive jobs of a batch, in milliseconds.
pub const INTER_JOB_PAUSE_MS: u64 = 800;

/// Longest free-text progress status shown for a job.
pub const STATUS_MAX_CHARS: usize = 60;

/// Where the fetch service lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the service, without a trailing slash.
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
        }
    }
}

/// Configuration for batch downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Format used when none is given on the command line.
    pub format: OutputFormat,
    /// Pause between jobs, in milliseconds.
    pub inter_job_pause_ms: u64,
    /// Maximum characters kept from a free-text progress status.
    pub status_max_chars: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            inter_job_pause_ms: INTER_JOB_PAUSE_MS,
            status_max_chars: STATUS_MAX_CHARS,
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default output format.
    #[must_use]
    pub const fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the pause between jobs.
    #[must_use]
    pub const fn with_inter_job_pause_ms(mut self, millis: u64) -> Self {
        self.inter_job_pause_ms = millis;
        self
    }

    /// Sets the maximum length of free-text statuses.
    #[must_use]
    pub const fn with_status_max_chars(mut self, chars: usize) -> Self {
        self.status_max_chars = chars;
        self
    }

    /// Returns the pause between jobs as a `Duration`.
    #[must_use]
    pub const fn inter_job_pause(&self) -> Duration {
        Duration::from_millis(self.inter_job_pause_ms)
    }
}

/// Path configuration for saved payloads and the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory where downloaded files are saved.
    pub download_dir: PathBuf,
    /// JSON file holding the download history.
    pub history_file: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            download_dir: PathBuf::from("."),
            history_file: data_dir.join("vidfetch").join("history.json"),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub download: DownloadConfig,
    pub paths: PathConfig,
}

impl AppConfig {
    /// Returns the default config file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidfetch")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file, then applies environment
    /// overrides. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(Error::Io(e)),
        };

        if let Ok(url) = std::env::var(SERVER_ENV) {
            config.server.base_url = url;
        }
        config.server.base_url = config.server.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the TOML is malformed.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }
}
