mod model;
mod plugin;

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use model::config::AppConfig;
use plugin::{InstallError, Installer};

fn main() -> ExitCode {
    let _guard = init_logging();
    tracing::info!("geditpylint-install starting");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("install failed: {err:#}");
            eprintln!("geditpylint-install: {err:#}");
            let code = err.downcast_ref::<InstallError>().map_or(1, InstallError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let config = AppConfig::load()?;
    let cwd = std::env::current_dir().context("cannot determine working directory")?;

    let installer = Installer::from_config(cwd, &config.install);
    tracing::debug!("looking for plugin files in {}", installer.source_dir().display());

    let report = installer.install(|progress| println!("{progress}"))?;
    tracing::info!(
        "install complete: {} removed, {} linked",
        report.removed.len(),
        report.linked.len()
    );

    Ok(())
}

/// Log to a daily file in the data directory (never stdout). Logging is
/// skipped when that directory cannot be created.
fn init_logging() -> Option<WorkerGuard> {
    let log_dir = directories::ProjectDirs::from("", "", "geditpylint")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("geditpylint"));
    std::fs::create_dir_all(&log_dir).ok()?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "install.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("geditpylint_install=info"));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
