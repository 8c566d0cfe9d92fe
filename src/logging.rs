//! Logging setup
//!
//! Console output carries the bare message. The log file is truncated at
//! start and gets timestamps and levels, as plain text or JSON lines.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LogFormat;
use crate::error::{Result, VolleyError};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "volley=info";

/// Install the global subscriber
///
/// A log file that cannot be created is reported on the console and the run
/// continues without it.
pub fn init(log_file: &Path, format: LogFormat) -> Result<()> {
    let (file_layer, file_error) = match open_log_file(log_file) {
        Ok(file) => (Some(file_layer(file, format)), None),
        Err(e) => (None, Some(e)),
    };

    let console = fmt::layer()
        .without_time()
        .with_target(false)
        .with_level(false);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(env_filter())
        .with(console)
        .try_init()
        .map_err(|e| VolleyError::Internal(format!("failed to initialise logging: {}", e)))?;

    if let Some(e) = file_error {
        warn!(
            "Could not open log file {}: {}; logging to console only",
            log_file.display(),
            e
        );
    }

    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Create (or truncate) the log file
fn open_log_file(path: &Path) -> std::io::Result<File> {
    File::create(path)
}

fn file_layer(file: File, format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let writer = Mutex::new(file);
    match format {
        LogFormat::Text => fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .boxed(),
    }
}
