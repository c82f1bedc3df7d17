use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use lazy_static::lazy_static;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref DATA_FOLDER: Option<PathBuf> =
        std::env::var(format!("{}_DATA", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", PROJECT_NAME.clone());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

const DEFAULT_FILTER: &str = "rover=info,rover_proto=info";

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("de", "hhn", env!("CARGO_PKG_NAME"))
}

pub fn get_data_dir() -> PathBuf {
    if let Some(s) = DATA_FOLDER.clone() {
        s
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

/// Install the global subscriber. Events go to stdout, or to
/// `<data dir>/rover.log` when `log_to_file` is set, whose path is returned.
pub fn initialize(log_to_file: bool) -> Result<Option<PathBuf>> {
    std::env::set_var(
        "RUST_LOG",
        std::env::var("RUST_LOG")
            .or_else(|_| std::env::var(LOG_ENV.clone()))
            .unwrap_or_else(|_| DEFAULT_FILTER.to_string()),
    );

    if log_to_file {
        let directory = get_data_dir();
        std::fs::create_dir_all(&directory)
            .with_context(|| format!("creating {}", directory.display()))?;
        let log_path = directory.join(LOG_FILE.clone());
        let log_file = std::fs::File::create(&log_path)
            .with_context(|| format!("creating {}", log_path.display()))?;

        let file_subscriber = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_writer(log_file)
            .with_target(false)
            .with_ansi(false)
            .with_filter(EnvFilter::from_default_env());
        tracing_subscriber::registry()
            .with(file_subscriber)
            .with(ErrorLayer::default())
            .init();
        info!("Full log available in: {}", log_path.to_string_lossy());
        Ok(Some(log_path))
    } else {
        let stdout_subscriber = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(EnvFilter::from_default_env());
        tracing_subscriber::registry()
            .with(stdout_subscriber)
            .with(ErrorLayer::default())
            .init();
        Ok(None)
    }
}
