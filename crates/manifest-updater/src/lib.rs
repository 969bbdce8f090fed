//! # manifest-updater
//!
//! Manifest-driven self-updater for an installed application.
//!
//! A run is:
//! - Load persisted settings and the file manifest
//! - Fetch remote files (and the master archive in archive mode) into a
//!   temp directory
//! - Close the running application according to its close method
//! - Place every file according to its tags (`master`, `static`,
//!   `skipExisting`, `dontCreateTargetDir`)
//! - Persist the new version into the application directory
//! - Optionally relaunch the application
//!
//! Each run is a fresh process; nothing is shared between runs and nothing
//! is rolled back on failure.

pub mod config;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod manifest;
pub mod place;
pub mod process;
#[cfg(test)]
mod proptests;
pub mod settings;

// Re-export main types for convenience
pub use config::{LocalMasterPolicy, UpdaterConfig};
pub use error::{CleanupWarning, ErrorClass, ExitCode, UpdateError};
pub use fetch::{fetch_all, Downloader, Extractor, FetchReport, HttpDownloader, ZipExtractor};
pub use lifecycle::{Collaborators, LifecycleController, RunOutcome, UpdateState};
pub use manifest::{EntryPolicy, FileEntry, Manifest, Source, Tag};
pub use place::{place_all, place_entry, resolve_destination, Placement, PlacementReport};
pub use process::{ProcessControl, SystemProcessControl};
pub use settings::{CloseMethod, Settings};
