//! Persisted updater settings.
//!
//! Settings are read from the working directory at start and written into
//! the target application's directory after a successful update. Values are
//! never mutated in place: [`Settings::with_app_path`] and
//! [`Settings::with_version`] return updated copies.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::UpdateError;

/// How the running target application is closed before files are replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseMethod {
    /// Leave the application alone
    #[default]
    None,
    /// Force-terminate immediately
    Kill,
    /// Ask for a graceful exit, force-terminate if still running
    WaitAndKill,
}

impl std::fmt::Display for CloseMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseMethod::None => write!(f, "none"),
            CloseMethod::Kill => write!(f, "kill"),
            CloseMethod::WaitAndKill => write!(f, "waitAndKill"),
        }
    }
}

/// Persisted settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    /// Install directory of the application being updated
    #[serde(default)]
    pub original_app_path: PathBuf,

    /// Scratch directory for downloads and extraction
    pub temp_dir: PathBuf,

    /// Whether the update ships as a master archive
    #[serde(default)]
    pub is_archive: bool,

    #[serde(default)]
    pub close_method: CloseMethod,

    /// Executable name of the target application
    #[serde(default)]
    pub exe_name: String,

    /// Whether to start the application again after updating
    #[serde(default)]
    pub relaunch: bool,

    /// Version currently installed
    #[serde(default)]
    pub current_version: String,
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, UpdateError> {
        debug!(path = %path.display(), "Loading settings");
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), UpdateError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        debug!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Copy of these settings targeting a different install directory.
    pub fn with_app_path(&self, app_path: impl Into<PathBuf>) -> Self {
        Self {
            original_app_path: app_path.into(),
            ..self.clone()
        }
    }

    /// Copy of these settings recording a new installed version.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            current_version: version.into(),
            ..self.clone()
        }
    }

    /// Check that the settings can drive a run.
    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.temp_dir.as_os_str().is_empty() {
            return Err(UpdateError::InvalidSettings(
                "TempDir must not be empty".to_string(),
            ));
        }
        if self.exe_name.trim().is_empty()
            && (self.relaunch || self.close_method != CloseMethod::None)
        {
            return Err(UpdateError::InvalidSettings(format!(
                "ExeName is required when CloseMethod is {} or Relaunch is set",
                self.close_method
            )));
        }
        Ok(())
    }
}
