use std::fs;

use anyhow::Context;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::paths;

/// Initialize the structured logging system.
///
/// Sets up:
/// - File output: rolling log files in the data directory with daily
///   rotation, keeping the latest 5 files.
/// - Console output (stderr): human-readable format for development.
///   stdout is reserved for the IPC event stream.
/// - Environment filter: defaults to `info`, configurable via `RUST_LOG`.
pub fn init() -> anyhow::Result<()> {
    let log_dir = paths::get_log_dir();

    // Ensure the log directory exists
    let _ = fs::create_dir_all(&log_dir);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("redline")
        .filename_suffix("log")
        .max_log_files(5)
        .build(&log_dir)
        .context("failed to create log file appender")?;

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Console layer on stderr: stdout carries the JSON event stream.
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .compact();

    // Suppress noisy third-party crates that spam startup logs:
    //   reqwest / hyper — HTTP client internals
    //   tungstenite     — WebSocket frame internals
    //   mio             — async I/O polling
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,reqwest=warn,hyper=warn,tungstenite=warn,mio=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("failed to set tracing subscriber")?;

    tracing::info!(
        log_dir = %log_dir.display(),
        "Logger initialized"
    );
    Ok(())
}
