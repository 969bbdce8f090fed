//! Property-based tests for manifest-updater.
//!
//! These tests use proptest to check placement and fetch behavior across
//! randomly generated manifests and paths.
//!
//! # Properties Tested
//!
//! - Property 1: Empty manifests are a no-op
//! - Property 2: Destination resolution is applied exactly once
//! - Property 3: `skipExisting` never changes an existing file
//! - Property 4: Missing parent directories are created
//! - Property 5: Archive mode without a master never downloads

#![cfg(test)]

use std::path::{Path, PathBuf};

use proptest::prelude::*;
use tempfile::TempDir;

use crate::config::LocalMasterPolicy;
use crate::error::UpdateError;
use crate::fetch::testing::{FakeDownloader, FakeExtractor};
use crate::fetch::fetch_all;
use crate::manifest::{FileEntry, Manifest};
use crate::place::{place_all, place_entry, resolve_destination, Placement};

// =============================================================================
// Generators
// =============================================================================

/// A single safe path segment.
fn arb_segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

/// A relative destination of one to three segments, optionally with a
/// leading slash.
fn arb_destination() -> impl Strategy<Value = String> {
    (prop::collection::vec(arb_segment(), 1..4), any::<bool>()).prop_map(|(segments, slash)| {
        let joined = segments.join("/");
        if slash {
            format!("/{}", joined)
        } else {
            joined
        }
    })
}

/// File contents.
fn arb_content() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Tags other than `static` and `master`.
fn arb_tags() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(vec!["skipExisting", "dontCreateTargetDir"], 0..=2)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn relative(destination: &str) -> PathBuf {
    PathBuf::from(destination.trim_start_matches('/'))
}

// =============================================================================
// Property 1: Empty manifests are a no-op
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// For any archive flag, an empty manifest fetches nothing and places
    /// nothing.
    #[test]
    fn prop_empty_manifest_noop(is_archive in any::<bool>(), version in "[0-9]\\.[0-9]") {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("app");
        std::fs::create_dir_all(&install).unwrap();
        let temp = dir.path().join("tmp");
        let manifest = Manifest { target_version: version, files: vec![] };
        let downloader = FakeDownloader::default();

        let fetched = runtime().block_on(fetch_all(
            &manifest,
            &temp,
            is_archive,
            LocalMasterPolicy::Skip,
            &downloader,
            &FakeExtractor::default(),
        ));
        prop_assert!(fetched.is_ok());
        prop_assert!(downloader.requests().is_empty());

        let report = place_all(&manifest, &install, &temp).unwrap();
        prop_assert!(report.copied.is_empty());
        prop_assert!(report.skipped.is_empty());
        prop_assert_eq!(std::fs::read_dir(&install).unwrap().count(), 0);
    }
}

// =============================================================================
// Property 2: Destination resolution is applied exactly once
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// For any non-static entry, the resolved destination is the install
    /// path joined with the destination, however often it is resolved.
    #[test]
    fn prop_resolution_single_application(
        destination in arb_destination(),
        install in prop::collection::vec(arb_segment(), 1..3),
        repeats in 1usize..5,
    ) {
        let install = Path::new("/").join(install.join("/"));
        let entry = FileEntry::new("http://x/file.bin", &destination, &[]);
        let expected = install.join(relative(&destination));

        for _ in 0..repeats {
            prop_assert_eq!(resolve_destination(&entry, &install), expected.clone());
        }
        prop_assert_eq!(entry.destination, destination);
    }

    /// Placing the same entry repeatedly writes to the same single path.
    #[test]
    fn prop_repeated_placement_same_target(
        destination in arb_destination(),
        content in arb_content(),
    ) {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("app");
        let temp = dir.path().join("tmp");
        std::fs::create_dir_all(&install).unwrap();
        std::fs::create_dir_all(&temp).unwrap();
        std::fs::write(temp.join("file.bin"), &content).unwrap();

        let entry = FileEntry::new("http://x/file.bin", &destination, &[]);
        let first = place_entry(&entry, &install, &temp).unwrap();
        let second = place_entry(&entry, &install, &temp).unwrap();

        let expected = install.join(relative(&destination));
        prop_assert_eq!(first, Placement::Copied(expected.clone()));
        prop_assert_eq!(second, Placement::Copied(expected.clone()));
        prop_assert_eq!(std::fs::read(&expected).unwrap(), content);
    }
}

// =============================================================================
// Property 3: skipExisting never changes an existing file
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_skip_existing_preserves_contents(
        destination in arb_destination(),
        existing in arb_content(),
        incoming in arb_content(),
    ) {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("app");
        let temp = dir.path().join("tmp");
        std::fs::create_dir_all(&temp).unwrap();
        std::fs::write(temp.join("file.bin"), &incoming).unwrap();

        let target = install.join(relative(&destination));
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, &existing).unwrap();

        let entry = FileEntry::new("http://x/file.bin", &destination, &["skipExisting"]);
        let placement = place_entry(&entry, &install, &temp).unwrap();

        prop_assert_eq!(placement, Placement::SkippedExisting(target.clone()));
        prop_assert_eq!(std::fs::read(&target).unwrap(), existing);
    }
}

// =============================================================================
// Property 4: Missing parent directories are created
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Without `dontCreateTargetDir` the parent always exists afterwards;
    /// with it, a missing parent makes the copy fail.
    #[test]
    fn prop_parent_directory_created(
        destination in arb_destination(),
        tags in arb_tags(),
        content in arb_content(),
    ) {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("app");
        let temp = dir.path().join("tmp");
        std::fs::create_dir_all(&temp).unwrap();
        std::fs::write(temp.join("file.bin"), &content).unwrap();

        let entry = FileEntry::new("http://x/file.bin", &destination, &tags);
        let target = install.join(relative(&destination));
        let parent = target.parent().unwrap().to_path_buf();
        prop_assert!(!parent.exists());

        let result = place_entry(&entry, &install, &temp);

        if entry.policy.dont_create_target_dir {
            let failed = matches!(result, Err(UpdateError::CopyFailed { .. }));
            prop_assert!(failed);
            prop_assert!(!parent.exists());
        } else {
            prop_assert!(result.is_ok());
            prop_assert!(parent.is_dir());
            prop_assert_eq!(std::fs::read(&target).unwrap(), content);
        }
    }
}

// =============================================================================
// Property 5: Archive mode without a master never downloads
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_archive_without_master_aborts(
        names in prop::collection::vec(arb_segment(), 1..6),
    ) {
        let dir = TempDir::new().unwrap();
        let files: Vec<FileEntry> = names
            .iter()
            .map(|name| FileEntry::new(&format!("http://x/{}.bin", name), name, &[]))
            .collect();
        let mut downloader = FakeDownloader::default();
        for name in &names {
            downloader = downloader.with(&format!("http://x/{}.bin", name), b"data");
        }
        let manifest = Manifest { target_version: "2.0".to_string(), files };

        let result = runtime().block_on(fetch_all(
            &manifest,
            &dir.path().join("tmp"),
            true,
            LocalMasterPolicy::Skip,
            &downloader,
            &FakeExtractor::default(),
        ));

        let missing = matches!(result, Err(UpdateError::MissingMaster));
        prop_assert!(missing);
        prop_assert!(downloader.requests().is_empty());
        prop_assert_eq!(UpdateError::MissingMaster.exit_code() as i32, 2);
    }
}
