//! Tracing subscriber bootstrap shared by the workspace binaries.

use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config;

/// Directory that receives the rolling log files.
pub const LOG_DIR: &str = "logs";

/// Installs the global subscriber.
///
/// Logs always go to a daily-rolling file under [`LOG_DIR`]. When
/// `LOG_TO_STDOUT=true` a second, coloured layer writes to stdout. The filter
/// comes from the configured `LOG_LEVEL` and falls back to `grader=info` when
/// the directive does not parse.
///
/// # Returns
///
/// The non-blocking writer guard. Dropping it flushes and stops the file
/// writer, so callers keep it alive for the lifetime of `main`.
pub fn init_logging(log_file: &str) -> WorkerGuard {
    fs::create_dir_all(LOG_DIR).ok();

    let file_appender = rolling::daily(LOG_DIR, log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(true);

    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer);

    // try_init so a second call (tests, embedding) does not panic
    if config::log_to_stdout() {
        registry.with(stdout_layer).try_init().ok();
    } else {
        registry.try_init().ok();
    }

    guard
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_new(config::log_level()).unwrap_or_else(|_| EnvFilter::new("grader=info"))
}
