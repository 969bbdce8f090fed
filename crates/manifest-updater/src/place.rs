//! Placement of fetched files into the application directory.
//!
//! Entries are processed strictly in manifest order; a later entry that
//! targets the same path as an earlier one overwrites it. Per entry:
//!
//! 1. Resolve the destination (under the install path unless `static`).
//! 2. Create the parent directory unless `dontCreateTargetDir`.
//! 3. Leave an existing destination alone if `skipExisting`.
//! 4. Copy from the temp directory (remote source) or from the source path
//!    (local source), overwriting.
//!
//! Remote `master` entries were consumed by extraction and are not copied.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{CleanupWarning, UpdateError};
use crate::manifest::{FileEntry, Manifest, Source};

/// Final destination of an entry.
///
/// Non-static destinations are placed under `install_path` with any
/// leading separators dropped; static destinations are used verbatim.
/// The entry itself is never modified, so resolving again yields the
/// same path.
pub fn resolve_destination(entry: &FileEntry, install_path: &Path) -> PathBuf {
    if entry.policy.static_destination {
        return PathBuf::from(&entry.destination);
    }

    let relative: PathBuf = Path::new(&entry.destination)
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    install_path.join(relative)
}

/// Outcome of placing one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// File written to this path
    Copied(PathBuf),
    /// Destination existed and the entry is `skipExisting`
    SkippedExisting(PathBuf),
    /// Remote master, already unpacked into the temp directory
    ConsumedByExtraction,
}

/// Result of a full placement pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementReport {
    pub copied: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub consumed: usize,
    /// Set when the temp directory could not be removed
    pub cleanup_warning: Option<CleanupWarning>,
}

/// Place a single entry.
pub fn place_entry(
    entry: &FileEntry,
    install_path: &Path,
    temp_dir: &Path,
) -> Result<Placement, UpdateError> {
    if entry.consumed_by_extraction() {
        debug!(source = %entry.source, "Master archive already extracted, not copying");
        return Ok(Placement::ConsumedByExtraction);
    }

    let destination = resolve_destination(entry, install_path);

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty()
            && !parent.exists()
            && !entry.policy.dont_create_target_dir
        {
            info!("Creating missing directory {}...", parent.display());
            std::fs::create_dir_all(parent).map_err(|source| UpdateError::CreateDirFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    if entry.policy.skip_existing && destination.exists() {
        info!(
            "Skipping {}, already exists and is marked 'skipExisting'.",
            destination.display()
        );
        return Ok(Placement::SkippedExisting(destination));
    }

    let from = match &entry.source {
        Source::Remote(_) => temp_dir.join(entry.source.local_file_name()?),
        Source::Local(path) => path.clone(),
    };

    std::fs::copy(&from, &destination).map_err(|source| UpdateError::CopyFailed {
        from: from.clone(),
        to: destination.clone(),
        source,
    })?;
    info!("Updated {}", destination.display());

    Ok(Placement::Copied(destination))
}

/// Place every manifest entry, then remove the temp directory.
///
/// The first failing entry aborts the pass; files placed before it stay
/// in place. Failure to remove the temp directory is reported in
/// [`PlacementReport::cleanup_warning`] and does not fail the pass.
pub fn place_all(
    manifest: &Manifest,
    install_path: &Path,
    temp_dir: &Path,
) -> Result<PlacementReport, UpdateError> {
    info!("Moving files...");
    let mut report = PlacementReport::default();

    for entry in &manifest.files {
        match place_entry(entry, install_path, temp_dir)? {
            Placement::Copied(path) => report.copied.push(path),
            Placement::SkippedExisting(path) => report.skipped.push(path),
            Placement::ConsumedByExtraction => report.consumed += 1,
        }
    }

    info!("Cleaning up...");
    report.cleanup_warning = remove_temp_dir(temp_dir);
    Ok(report)
}

fn remove_temp_dir(temp_dir: &Path) -> Option<CleanupWarning> {
    if !temp_dir.exists() {
        return None;
    }
    match std::fs::remove_dir_all(temp_dir) {
        Ok(()) => None,
        Err(e) => {
            let warning = CleanupWarning {
                path: temp_dir.to_path_buf(),
                message: e.to_string(),
            };
            warn!("{}", warning);
            Some(warning)
        }
    }
}
