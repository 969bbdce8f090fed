//! manifest-updater entry point

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use manifest_updater::{
    Collaborators, ExitCode, LifecycleController, Manifest, Settings, UpdateError, UpdaterConfig,
};

#[derive(Parser)]
#[command(name = "manifest-updater", version)]
#[command(about = "Update an installed application from a file manifest")]
struct Cli {
    /// Install directory of the application to update
    app_path: Option<PathBuf>,

    /// Settings file (defaults to the configured name in the working directory)
    #[arg(long, env = "UPDATER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Manifest file (defaults to the configured name in the working directory)
    #[arg(long, env = "UPDATER_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Updater configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, overrides RUST_LOG and the configured level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (config, config_error) = match UpdaterConfig::load_from(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (UpdaterConfig::default(), Some(e)),
    };

    let _log_guard = init_logging(&config, cli.log_level.as_deref());

    info!("--- manifest-updater version {} ---", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        warn!("Config error: {}. Using default configuration.", e);
    }

    let Some(app_path) = cli.app_path else {
        error!("No application path specified.");
        return ExitCode::MissingArgument.to_exit_code();
    };
    info!("Using application path: {}", app_path.display());

    let settings_path = cli
        .settings
        .unwrap_or_else(|| PathBuf::from(&config.files.settings_file));
    let manifest_path = cli
        .manifest
        .unwrap_or_else(|| PathBuf::from(&config.files.manifest_file));

    let (settings, manifest) = match load_inputs(&app_path, &settings_path, &manifest_path) {
        Ok(inputs) => inputs,
        Err(e) => return fail(&e),
    };

    let collaborators = match Collaborators::system(&config) {
        Ok(collaborators) => collaborators,
        Err(e) => return fail(&e),
    };

    let mut controller = LifecycleController::new(config, settings, manifest, collaborators);
    match controller.run().await {
        Ok(_) => ExitCode::Success.to_exit_code(),
        // already logged by the controller
        Err(e) => e.exit_code().to_exit_code(),
    }
}

/// Load settings and manifest; the settings are pointed at `app_path`.
fn load_inputs(
    app_path: &std::path::Path,
    settings_path: &std::path::Path,
    manifest_path: &std::path::Path,
) -> Result<(Settings, Manifest), UpdateError> {
    let settings = Settings::load(settings_path)?.with_app_path(app_path);
    settings.validate()?;

    let manifest = Manifest::load(manifest_path)?;
    info!(
        target_version = %manifest.target_version,
        current_version = %settings.current_version,
        files = manifest.files.len(),
        "Manifest loaded"
    );
    Ok((settings, manifest))
}

fn fail(e: &UpdateError) -> std::process::ExitCode {
    let code = e.exit_code();
    error!(class = ?e.class(), "{} ({})", e, code.name());
    code.to_exit_code()
}

/// Console logging plus an optional log file. The returned guard must be
/// held until exit so buffered file output is flushed.
fn init_logging(
    config: &UpdaterConfig,
    level_override: Option<&str>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = match level_override {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"))
        }),
    };

    let (file_layer, guard) = match &config.logging.directory {
        Some(directory) => {
            let appender =
                tracing_appender::rolling::never(directory, &config.logging.file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(filter)
        .init();

    guard
}
