//! File manifest model.
//!
//! The manifest is read as JSON in its wire form ([`RawManifest`]) and then
//! validated into a [`Manifest`]. Validation resolves each entry's tag list
//! into an [`EntryPolicy`] once, so later stages test named flags instead of
//! searching strings.
//!
//! ```text
//! {
//!   "TargetVersion": "2.0",
//!   "Files": [
//!     { "Source": "http://host/app.zip", "Destination": "app.zip", "Tags": ["master"] },
//!     { "Source": "http://host/readme.txt", "Destination": "/readme.txt", "Tags": ["static"] }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::UpdateError;

/// Manifest as it appears on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawManifest {
    #[serde(default)]
    pub target_version: String,

    /// `None` when the field is missing or `null`
    #[serde(default)]
    pub files: Option<Vec<RawFileEntry>>,
}

/// A single file entry as it appears on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawFileEntry {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Tags understood by the placement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// The archive extracted into the temp directory before anything else
    Master,
    /// Destination is used verbatim instead of under the install path
    Static,
    /// Leave an existing destination untouched
    SkipExisting,
    /// Never create the destination's parent directory
    DontCreateTargetDir,
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(Tag::Master),
            "static" => Ok(Tag::Static),
            "skipExisting" => Ok(Tag::SkipExisting),
            "dontCreateTargetDir" => Ok(Tag::DontCreateTargetDir),
            other => Err(other.to_string()),
        }
    }
}

/// Placement capabilities of one entry, resolved from its tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryPolicy {
    pub master: bool,
    pub static_destination: bool,
    pub skip_existing: bool,
    pub dont_create_target_dir: bool,
}

impl EntryPolicy {
    /// Resolve a tag list. Returns the policy and any tags that were not
    /// recognized.
    pub fn from_tags<I, S>(tags: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut policy = Self::default();
        let mut unknown = Vec::new();
        for tag in tags {
            match tag.as_ref().parse::<Tag>() {
                Ok(tag) => policy.set(tag),
                Err(other) => unknown.push(other),
            }
        }
        (policy, unknown)
    }

    fn set(&mut self, tag: Tag) {
        match tag {
            Tag::Master => self.master = true,
            Tag::Static => self.static_destination = true,
            Tag::SkipExisting => self.skip_existing = true,
            Tag::DontCreateTargetDir => self.dont_create_target_dir = true,
        }
    }
}

/// Where an entry's content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Downloaded into the temp directory before placement
    Remote(String),
    /// Copied straight from a path on disk
    Local(PathBuf),
}

impl Source {
    /// Any source beginning with `http` is treated as remote.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http") {
            Source::Remote(s.to_string())
        } else {
            Source::Local(PathBuf::from(s))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Source::Remote(_))
    }

    /// Name of the file a remote source is stored under in the temp
    /// directory: the last URL path segment.
    pub fn local_file_name(&self) -> Result<String, UpdateError> {
        match self {
            Source::Remote(url) => remote_file_name(url),
            Source::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    UpdateError::ConfigError(format!(
                        "source {} has no file name",
                        path.display()
                    ))
                }),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Remote(url) => write!(f, "{}", url),
            Source::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

fn remote_file_name(source: &str) -> Result<String, UpdateError> {
    let url = url::Url::parse(source)
        .map_err(|e| UpdateError::ConfigError(format!("invalid source URL {}: {}", source, e)))?;
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            UpdateError::ConfigError(format!("source URL {} does not name a file", source))
        })
}

/// A validated manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub source: Source,
    /// Destination as written in the manifest, never rewritten
    pub destination: String,
    pub policy: EntryPolicy,
}

impl FileEntry {
    pub fn new(source: &str, destination: &str, tags: &[&str]) -> Self {
        let (policy, _) = EntryPolicy::from_tags(tags);
        Self {
            source: Source::parse(source),
            destination: destination.to_string(),
            policy,
        }
    }

    /// Master entries with a remote source are consumed by extraction and
    /// never copied.
    pub fn consumed_by_extraction(&self) -> bool {
        self.policy.master && self.source.is_remote()
    }
}

/// A validated manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub target_version: String,
    pub files: Vec<FileEntry>,
}

impl Manifest {
    /// Load and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self, UpdateError> {
        debug!(path = %path.display(), "Loading manifest");
        let content = std::fs::read(path)?;
        Self::from_json(&content)
    }

    /// Parse and validate manifest JSON.
    pub fn from_json(data: &[u8]) -> Result<Self, UpdateError> {
        let raw: RawManifest = serde_json::from_slice(data)?;
        Self::from_raw(raw)
    }

    /// Validate the wire form. A missing or null file list is rejected;
    /// an empty one is a valid no-op update.
    pub fn from_raw(raw: RawManifest) -> Result<Self, UpdateError> {
        let raw_files = raw.files.ok_or(UpdateError::NullFileList)?;

        let files = raw_files
            .into_iter()
            .map(|entry| {
                let tags = entry.tags.unwrap_or_default();
                let (policy, unknown) = EntryPolicy::from_tags(&tags);
                if !unknown.is_empty() {
                    warn!(
                        destination = %entry.destination,
                        tags = ?unknown,
                        "Ignoring unknown tags"
                    );
                }
                FileEntry {
                    source: Source::parse(&entry.source),
                    destination: entry.destination,
                    policy,
                }
            })
            .collect();

        Ok(Self {
            target_version: raw.target_version,
            files,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The single `master` entry required in archive mode.
    pub fn archive_master(&self) -> Result<&FileEntry, UpdateError> {
        let mut masters = self.files.iter().filter(|f| f.policy.master);
        match (masters.next(), masters.count()) {
            (None, _) => Err(UpdateError::MissingMaster),
            (Some(master), 0) => Ok(master),
            (Some(_), rest) => Err(UpdateError::DuplicateMaster { count: rest + 1 }),
        }
    }

    /// Remote entries that are downloaded individually (everything remote
    /// except masters).
    pub fn remote_entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.files
            .iter()
            .filter(|f| f.source.is_remote() && !f.policy.master)
    }
}
