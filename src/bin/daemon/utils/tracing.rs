//! Tracing Utilities Module
//!
//! Installs the daemon's tracing subscriber: a stderr layer that is always on
//! and an optional non-blocking file layer.

use crate::config::LoggingConfig;
use crate::utils::error::Result;
use std::fs::OpenOptions;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Builds the level filter, preferring `RUST_LOG` over the configured level
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Initializes the tracing subscriber with console and optional file output
///
/// The returned guard flushes the file writer when dropped, so the caller must
/// keep it alive for as long as the daemon runs.
pub fn setup_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_filter(build_filter(config));

    let (file_layer, guard) = match &config.path {
        Some(path) => {
            let file = OpenOptions::new().append(true).create(true).open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(build_filter(config));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
