//! Fetching remote manifest entries into the temp directory.
//!
//! Network transfer and archive decompression sit behind the [`Downloader`]
//! and [`Extractor`] traits. [`fetch_all`] decides what to fetch and in which
//! order: the master archive first (archive mode), then every other remote
//! entry, one at a time in manifest order.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::config::{LocalMasterPolicy, NetworkConfig};
use crate::error::UpdateError;
use crate::manifest::{Manifest, Source};

/// Fetches a URL into a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `dest`, replacing any existing file.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), UpdateError>;
}

/// Unpacks an archive into a directory.
pub trait Extractor: Send + Sync {
    /// Extract every entry of `archive` under `dir`, overwriting existing files.
    fn extract(&self, archive: &Path, dir: &Path) -> Result<(), UpdateError>;
}

/// HTTP downloader backed by reqwest.
pub struct HttpDownloader {
    /// HTTP client configured with timeouts.
    client: reqwest::Client,
}

impl HttpDownloader {
    /// Create a downloader from the network configuration.
    pub fn new(config: &NetworkConfig) -> Result<Self, UpdateError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), UpdateError> {
        info!("Downloading {} -> {:?}", url, dest);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = File::create(dest)?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
        }

        // Ensure all data is written to disk
        file.sync_all()?;

        debug!("Download complete: {} bytes", downloaded);
        Ok(())
    }
}

/// Zip archive extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl Extractor for ZipExtractor {
    fn extract(&self, archive: &Path, dir: &Path) -> Result<(), UpdateError> {
        let failed = |message: String| UpdateError::ExtractionFailed {
            archive: archive.to_path_buf(),
            message,
        };

        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| failed(e.to_string()))?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| failed(e.to_string()))?;
            let Some(relative) = entry.enclosed_name() else {
                warn!(name = %entry.name(), "Skipping archive entry outside the target directory");
                continue;
            };
            let out_path = dir.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&out_path)?;
            } else {
                if let Some(parent) = out_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut outfile = File::create(&out_path)?;
                std::io::copy(&mut entry, &mut outfile)?;
            }
        }

        debug!("Extracted {} entries from {:?}", zip.len(), archive);
        Ok(())
    }
}

/// What [`fetch_all`] put into the temp directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Files downloaded, in order
    pub downloaded: Vec<PathBuf>,
    /// Archive that was extracted, if any
    pub extracted: Option<PathBuf>,
}

/// Populate `temp_dir` with everything placement needs.
///
/// An empty manifest is a no-op. In archive mode the single master entry is
/// validated before anything is downloaded; a remote master is downloaded
/// and extracted into `temp_dir`, a local master is handled according to
/// `local_master`.
pub async fn fetch_all(
    manifest: &Manifest,
    temp_dir: &Path,
    is_archive: bool,
    local_master: LocalMasterPolicy,
    downloader: &dyn Downloader,
    extractor: &dyn Extractor,
) -> Result<FetchReport, UpdateError> {
    let mut report = FetchReport::default();

    if manifest.is_empty() {
        info!("No files to fetch");
        return Ok(report);
    }

    let master = if is_archive {
        Some(manifest.archive_master()?)
    } else {
        None
    };

    if !temp_dir.exists() {
        tokio::fs::create_dir_all(temp_dir)
            .await
            .map_err(|source| UpdateError::CreateDirFailed {
                path: temp_dir.to_path_buf(),
                source,
            })?;
    }

    if let Some(master) = master {
        match &master.source {
            Source::Remote(url) => {
                let archive = temp_dir.join(master.source.local_file_name()?);
                downloader.download(url, &archive).await?;
                report.downloaded.push(archive.clone());

                info!("Decompressing master archive...");
                extractor.extract(&archive, temp_dir)?;
                report.extracted = Some(archive);
            }
            Source::Local(path) => match local_master {
                LocalMasterPolicy::Skip => {
                    warn!(
                        source = %path.display(),
                        "Master file is not remote, skipping extraction"
                    );
                }
                LocalMasterPolicy::Extract => {
                    info!(source = %path.display(), "Decompressing local master archive...");
                    extractor.extract(path, temp_dir)?;
                    report.extracted = Some(path.clone());
                }
                LocalMasterPolicy::Reject => {
                    return Err(UpdateError::LocalMasterRejected {
                        source_path: path.display().to_string(),
                    });
                }
            },
        }
    }

    info!("Downloading remote files...");
    for entry in manifest.remote_entries() {
        if let Source::Remote(url) = &entry.source {
            let dest = temp_dir.join(entry.source.local_file_name()?);
            downloader.download(url, &dest).await?;
            report.downloaded.push(dest);
        }
    }

    Ok(report)
}
