use std::env;
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/asset-sync.log";

/// Installs the stdout and file layers. Keep the returned guard alive for the
/// whole run or buffered file output is lost.
pub fn init_logger() -> impl Drop {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let log_file_path = env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let log_file_path = Path::new(&log_file_path);
    let directory = log_file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file_path
        .file_name()
        .unwrap_or_else(|| "asset-sync.log".as_ref());
    let dir_error = fs::create_dir_all(directory).err();

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let ansi = env::var_os("NO_COLOR").is_none();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .with_thread_names(true)
                .without_time()
                .with_ansi(ansi),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(false),
        )
        .with(filter_layer)
        .init();

    if let Some(e) = dir_error {
        warn!("Could not create log directory {}: {}", directory.display(), e);
    }
    info!(log_file = %log_file_path.display(), "Tracing is configured for stdout and file logging.");

    guard
}
