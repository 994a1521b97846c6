//! Logging setup.
//!
//! Console output always goes to stderr. With a log file, a second
//! non-blocking layer writes plain-text lines to it; keep the returned
//! [`LoggingGuard`] alive until shutdown or buffered lines are lost.

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "geomodel=info";

/// Keeps the file writer flushing while held.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Installs the global subscriber.
///
/// Fails if a subscriber is already installed or the log file cannot be
/// opened.
pub fn init_logging(log_file: Option<&Path>) -> io::Result<LoggingGuard> {
    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(build_filter(DEFAULT_FILTER));

    let (file_layer, file_guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(build_filter(DEFAULT_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    Ok(LoggingGuard { _file: file_guard })
}

/// `RUST_LOG` if set and valid, otherwise `default`.
fn build_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
