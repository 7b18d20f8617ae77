use std::env;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE_PATH: &str = "./logs/ef-squash.log";

/// Console gets warnings only (debug with `--verbose`) so it does not mix with
/// the operator-facing output; the log file follows `TRACING_LEVEL`.
///
/// When the log file cannot be opened the run continues with console logging
/// only and no guard is returned.
pub fn init_logger(verbose: bool, ansi: bool) -> Option<WorkerGuard> {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let log_file_path =
        env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE_PATH.to_string());

    let (file_writer, file_error) = match file_appender(Path::new(&log_file_path)) {
        Ok(appender) => (Some(tracing_appender::non_blocking(appender)), None),
        Err(err) => (None, Some(err)),
    };
    let (non_blocking, guard) = match file_writer {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .without_time()
                .with_ansi(ansi)
                .with_filter(console_level),
        )
        .with(non_blocking.map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter_layer)
        }))
        .init();

    match file_error {
        Some(err) => warn!("Cannot write log file {}: {}", log_file_path, err),
        None => debug!("Tracing is configured for stderr and file logging."),
    }

    guard
}

/// Never-rotating appender for `path`, creating its parent directory.
fn file_appender(path: &Path) -> io::Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))
}
