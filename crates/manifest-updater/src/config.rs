//! Runtime configuration for the updater itself.
//!
//! This is separate from the persisted [`Settings`](crate::settings::Settings):
//! it describes how the updater behaves (file names, timeouts, close timing,
//! archive policy, logging), not which application it updates.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::UpdateError;

/// Default name of the optional configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "updater.toml";

/// Main updater configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Names of the settings and manifest files
    #[serde(default)]
    pub files: FilesConfig,

    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Timing for closing the target application
    #[serde(default)]
    pub close: CloseConfig,

    /// Archive mode behavior
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl UpdaterConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, UpdateError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| UpdateError::ConfigError(e.to_string()))?;
        Ok(config)
    }

    /// Load from an explicit path, or from [`DEFAULT_CONFIG_FILE`] if it
    /// exists, or fall back to defaults.
    pub fn load_from(path: Option<&Path>) -> Result<Self, UpdateError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), UpdateError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| UpdateError::ConfigError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Fixed file names used by the updater.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Settings file, read from the working directory and written back
    /// into the application directory
    #[serde(default = "default_settings_file")]
    pub settings_file: String,

    /// Manifest file, read from the working directory
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
            manifest_file: default_manifest_file(),
        }
    }
}

/// Network configuration for downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Read timeout for streaming in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Timing used by the `waitAndKill` close method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseConfig {
    /// How long to wait for a graceful exit before force-killing
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,

    /// How often to check whether the process has exited
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for CloseConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// What to do when archive mode finds a master entry whose source is local.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalMasterPolicy {
    /// Skip download and extraction, log a warning
    #[default]
    Skip,
    /// Extract the local archive into the temp directory
    Extract,
    /// Treat it as a manifest error
    Reject,
}

impl std::fmt::Display for LocalMasterPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocalMasterPolicy::Skip => write!(f, "skip"),
            LocalMasterPolicy::Extract => write!(f, "extract"),
            LocalMasterPolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Archive mode configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub local_master: LocalMasterPolicy,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `manifest_updater=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for a log file (none = console only)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Log file name inside `directory`
    #[serde(default = "default_log_file")]
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_name: default_log_file(),
        }
    }
}

// Default value functions for serde
fn default_settings_file() -> String {
    "updater-settings.json".to_string()
}

fn default_manifest_file() -> String {
    "updater-files.json".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("manifest-updater/{}", env!("CARGO_PKG_VERSION"))
}

fn default_grace_period() -> u64 {
    5000
}

fn default_poll_interval() -> u64 {
    250
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "updater.log".to_string()
}
