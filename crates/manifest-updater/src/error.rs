//! Error types for the update pipeline.
//!
//! Every stage returns `Result<_, UpdateError>`. The top level classifies
//! the error once and turns it into a process [`ExitCode`].

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during an update run.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The manifest has no file list (`Files` missing or null)
    #[error("the list of files is null")]
    NullFileList,

    /// Archive mode is enabled but no entry is tagged `master`
    #[error("need a master file when archive mode is enabled")]
    MissingMaster,

    /// Archive mode is enabled and more than one entry is tagged `master`
    #[error("expected exactly one master file, found {count}")]
    DuplicateMaster { count: usize },

    /// Archive mode found a master with a local source and policy forbids it
    #[error("master file {source_path} is not remote and local masters are rejected")]
    LocalMasterRejected { source_path: String },

    /// Persisted settings are present but unusable
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Download failed with HTTP status
    #[error("download of {url} failed with status {status}")]
    DownloadFailed { url: String, status: u16 },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Archive could not be extracted
    #[error("extraction of {archive:?} failed: {message}")]
    ExtractionFailed { archive: PathBuf, message: String },

    /// Copying a file into place failed
    #[error("failed to copy {from:?} to {to:?}: {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Creating a destination directory failed
    #[error("failed to create directory {path:?}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Terminating the target application failed
    #[error("process error: {0}")]
    ProcessError(String),

    /// Relaunching the target application failed
    #[error("failed to launch {exe:?}: {source}")]
    LaunchFailed {
        exe: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        UpdateError::HttpError(err.to_string())
    }
}

/// Coarse classification of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad manifest or settings; retrying cannot help.
    Config,
    /// Filesystem, network, archive or process failure.
    Io,
}

impl UpdateError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            UpdateError::NullFileList
            | UpdateError::MissingMaster
            | UpdateError::DuplicateMaster { .. }
            | UpdateError::LocalMasterRejected { .. }
            | UpdateError::InvalidSettings(_)
            | UpdateError::ConfigError(_)
            | UpdateError::JsonError(_) => ErrorClass::Config,
            _ => ErrorClass::Io,
        }
    }

    /// Process exit code reported to the launcher for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            UpdateError::NullFileList
            | UpdateError::MissingMaster
            | UpdateError::DuplicateMaster { .. }
            | UpdateError::LocalMasterRejected { .. } => ExitCode::ManifestError,
            _ => ExitCode::PipelineError,
        }
    }
}

/// A non-fatal problem found while cleaning up after placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    /// Path that could not be removed
    pub path: PathBuf,
    /// Underlying error message
    pub message: String,
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not remove {}: {}", self.path.display(), self.message)
    }
}

/// Exit codes reported by the updater binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Update completed, including the relaunch-and-exit path (exit code 0)
    Success = 0,
    /// No application path was given (exit code 1)
    MissingArgument = 1,
    /// Null file list, missing or duplicate master (exit code 2)
    ManifestError = 2,
    /// Any other fatal error during the pipeline (exit code 3)
    PipelineError = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    /// Get the exit code name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::MissingArgument => "MISSING_ARGUMENT",
            ExitCode::ManifestError => "MANIFEST_ERROR",
            ExitCode::PipelineError => "PIPELINE_ERROR",
        }
    }
}
