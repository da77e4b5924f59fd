//! Tracing setup: stdout plus a rolling file log.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Initializes the global subscriber. The returned guard must live as
/// long as the process so buffered file writes are flushed on shutdown.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let rotation = match config.rotation.as_str() {
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    };
    let appender = RollingFileAppender::new(rotation, &config.log_dir, &config.log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    // RUST_LOG wins; otherwise the configured level, with the crate's own
    // spans silenced when tracing is disabled.
    let default_filter = if config.enable_tracing {
        config.log_level.clone()
    } else {
        format!("{},matchbook=off", config.log_level)
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);

    if config.use_json {
        // Structured file output only; target kept for queries.
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer.json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer.with_target(false))
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }

    guard
}
