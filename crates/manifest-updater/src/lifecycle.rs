//! Lifecycle controller - sequences one complete update run.
//!
//! ```text
//! Idle -> Fetching -> Terminating -> Placing -> VersionUpdated -> [Relaunching] -> Done
//!   \________\____________\____________\______________\__________________-> Aborted
//! ```
//!
//! Settings and manifest are loaded before the controller is built and are
//! never mutated. The new version is written as a fresh copy of the
//! settings into the application directory. Nothing is rolled back on
//! failure: files placed before an error stay placed.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::UpdaterConfig;
use crate::error::UpdateError;
use crate::fetch::{fetch_all, Downloader, Extractor, FetchReport, HttpDownloader, ZipExtractor};
use crate::manifest::Manifest;
use crate::place::{place_all, PlacementReport};
use crate::process::{ProcessControl, SystemProcessControl};
use crate::settings::Settings;

/// Current state of an update run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateState {
    /// Inputs loaded, nothing done yet
    #[default]
    Idle,
    /// Downloading and extracting into the temp directory
    Fetching,
    /// Closing the running application
    Terminating,
    /// Copying files into place
    Placing,
    /// New version persisted to the application directory
    VersionUpdated,
    /// Relaunch requested
    Relaunching,
    /// Run finished successfully
    Done,
    /// Run stopped on a fatal error
    Aborted(String),
}

impl UpdateState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UpdateState::Done | UpdateState::Aborted(_))
    }
}

/// External collaborators used by the controller.
pub struct Collaborators {
    pub downloader: Box<dyn Downloader>,
    pub extractor: Box<dyn Extractor>,
    pub process: Box<dyn ProcessControl>,
}

impl Collaborators {
    /// Real network, zip and process implementations.
    pub fn system(config: &UpdaterConfig) -> Result<Self, UpdateError> {
        Ok(Self {
            downloader: Box::new(HttpDownloader::new(&config.network)?),
            extractor: Box::new(ZipExtractor),
            process: Box::new(SystemProcessControl::new(config.close.clone())),
        })
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub fetch: FetchReport,
    pub placement: PlacementReport,
    /// Settings as persisted after the update
    pub settings: Settings,
    /// Where the settings were written
    pub settings_path: PathBuf,
    pub relaunched: bool,
}

/// Drives a single update run.
pub struct LifecycleController {
    config: UpdaterConfig,
    settings: Settings,
    manifest: Manifest,
    collaborators: Collaborators,
    state: UpdateState,
    history: Vec<UpdateState>,
}

impl LifecycleController {
    pub fn new(
        config: UpdaterConfig,
        settings: Settings,
        manifest: Manifest,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            settings,
            manifest,
            collaborators,
            state: UpdateState::Idle,
            history: vec![UpdateState::Idle],
        }
    }

    /// Get the current state.
    pub fn state(&self) -> &UpdateState {
        &self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[UpdateState] {
        &self.history
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn install_path(&self) -> &Path {
        &self.settings.original_app_path
    }

    fn transition(&mut self, state: UpdateState) {
        self.state = state.clone();
        self.history.push(state);
    }

    /// Run the whole pipeline. Any error moves the controller to
    /// [`UpdateState::Aborted`] and is returned to the caller.
    pub async fn run(&mut self) -> Result<RunOutcome, UpdateError> {
        if self.state != UpdateState::Idle {
            return Err(UpdateError::ConfigError(format!(
                "update run already started (state {:?})",
                self.state
            )));
        }

        match self.run_stages().await {
            Ok(outcome) => {
                self.transition(UpdateState::Done);
                info!("Update completed.");
                Ok(outcome)
            }
            Err(e) => {
                error!("{}", e);
                self.transition(UpdateState::Aborted(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self) -> Result<RunOutcome, UpdateError> {
        self.transition(UpdateState::Fetching);
        let fetch = fetch_all(
            &self.manifest,
            &self.settings.temp_dir,
            self.settings.is_archive,
            self.config.archive.local_master,
            self.collaborators.downloader.as_ref(),
            self.collaborators.extractor.as_ref(),
        )
        .await?;

        self.transition(UpdateState::Terminating);
        self.collaborators
            .process
            .terminate(&self.settings.exe_name, self.settings.close_method)
            .await?;

        self.transition(UpdateState::Placing);
        let placement = place_all(&self.manifest, self.install_path(), &self.settings.temp_dir)?;
        if let Some(warning) = &placement.cleanup_warning {
            warn!("Temp directory cleanup failed: {}", warning);
        }

        let (settings, settings_path) = self.persist_version()?;
        self.transition(UpdateState::VersionUpdated);

        let relaunched = if settings.relaunch {
            self.transition(UpdateState::Relaunching);
            self.collaborators
                .process
                .launch(Path::new(&settings.exe_name), self.install_path())?;
            true
        } else {
            false
        };

        Ok(RunOutcome {
            fetch,
            placement,
            settings,
            settings_path,
            relaunched,
        })
    }

    fn persist_version(&self) -> Result<(Settings, PathBuf), UpdateError> {
        let updated = self.settings.with_version(&self.manifest.target_version);
        let path = self.install_path().join(&self.config.files.settings_file);
        updated.save(&path)?;
        info!(
            version = %updated.current_version,
            path = %path.display(),
            "Version updated"
        );
        Ok((updated, path))
    }
}
